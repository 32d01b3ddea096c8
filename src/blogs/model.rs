use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A published post. `images` holds blob-store keys, not URLs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Blog {
    pub id: Uuid,
    pub account_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
}

/// Draft of a new post; the service assigns the ID and the image keys.
#[derive(Debug, Clone, Default)]
pub struct BlogDraft {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update. Text fields override when set; images and tags are
/// appended, matching how posts grow over time.
#[derive(Debug, Clone, Default)]
pub struct BlogPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub add_images: Vec<String>,
    pub add_tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub account_id: Option<i64>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}
