use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::blogs::model::{Blog, Page};

/// Public view of a post. Image entries are blob-store keys; clients resolve
/// them through the presigned-image endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct BlogResponse {
    pub id: Uuid,
    pub account_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            account_id: blog.account_id,
            title: blog.title,
            summary: blog.summary,
            content: blog.content,
            tags: blog.tags,
            images: blog.images,
            created_at: blog.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BlogListQuery {
    pub account_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl BlogListQuery {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset,
        }
    }
}
