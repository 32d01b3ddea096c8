use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::blogs::model::{Blog, BlogFilter, BlogPatch, Page};
use crate::error::ApiError;

#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>, ApiError>;
    /// Reverse-chronological listing; `page = None` returns the full history.
    async fn list(&self, filter: &BlogFilter, page: Option<Page>) -> Result<Vec<Blog>, ApiError>;
    async fn create(&self, blog: Blog) -> Result<Blog, ApiError>;
    async fn update(&self, id: Uuid, patch: BlogPatch) -> Result<Blog, ApiError>;
    async fn delete(&self, id: Uuid) -> Result<(), ApiError>;
}

pub struct PgBlogStore {
    db: PgPool,
}

impl PgBlogStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const BLOG_COLUMNS: &str = "id, account_id, title, summary, content, images, tags, created_at";

#[async_trait]
impl BlogStore for PgBlogStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>, ApiError> {
        let blog = sqlx::query_as::<_, Blog>(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(blog)
    }

    async fn list(&self, filter: &BlogFilter, page: Option<Page>) -> Result<Vec<Blog>, ApiError> {
        let blogs = sqlx::query_as::<_, Blog>(&format!(
            r#"
            SELECT {BLOG_COLUMNS} FROM blogs
            WHERE ($1::BIGINT IS NULL OR account_id = $1)
              AND ($2::TEXT IS NULL OR $2 = ANY (tags))
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.account_id)
        .bind(&filter.tag)
        .bind(page.map(|p| p.limit))
        .bind(page.map(|p| p.offset))
        .fetch_all(&self.db)
        .await?;
        Ok(blogs)
    }

    async fn create(&self, blog: Blog) -> Result<Blog, ApiError> {
        let created = sqlx::query_as::<_, Blog>(&format!(
            r#"
            INSERT INTO blogs (id, account_id, title, summary, content, images, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BLOG_COLUMNS}
            "#
        ))
        .bind(blog.id)
        .bind(blog.account_id)
        .bind(&blog.title)
        .bind(&blog.summary)
        .bind(&blog.content)
        .bind(&blog.images)
        .bind(&blog.tags)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: BlogPatch) -> Result<Blog, ApiError> {
        let updated = sqlx::query_as::<_, Blog>(&format!(
            r#"
            UPDATE blogs SET
                title   = COALESCE($2, title),
                summary = COALESCE($3, summary),
                content = COALESCE($4, content),
                images  = images || $5,
                tags    = tags || $6
            WHERE id = $1
            RETURNING {BLOG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.summary)
        .bind(&patch.content)
        .bind(&patch.add_images)
        .bind(&patch.add_tags)
        .fetch_optional(&self.db)
        .await?;

        updated.ok_or(ApiError::NotFound("blog"))
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("blog"));
        }
        Ok(())
    }
}
