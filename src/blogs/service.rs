use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::service::PostSource;
use crate::blogs::model::{Blog, BlogDraft, BlogFilter, BlogPatch, Page};
use crate::blogs::store::BlogStore;
use crate::error::ApiError;
use crate::storage::StorageClient;
use time::OffsetDateTime;

/// One image attachment as received from the handler layer.
pub struct UploadImage {
    pub bytes: Bytes,
    pub content_type: String,
}

pub struct BlogService {
    store: Arc<dyn BlogStore>,
    storage: Arc<dyn StorageClient>,
}

impl BlogService {
    pub fn new(store: Arc<dyn BlogStore>, storage: Arc<dyn StorageClient>) -> Self {
        Self { store, storage }
    }

    /// Publish a post: upload every image to the blob store first, then
    /// persist the post with the resulting keys.
    pub async fn create(
        &self,
        account_id: i64,
        draft: BlogDraft,
        images: Vec<UploadImage>,
    ) -> Result<Blog, ApiError> {
        if draft.title.trim().is_empty() {
            return Err(ApiError::MissingParam("title"));
        }

        let blog_id = Uuid::new_v4();
        let mut keys = Vec::with_capacity(images.len());
        for image in images {
            let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
            let key = format!("blogs/{}/{}/{}.{}", account_id, blog_id, Uuid::new_v4(), ext);
            self.storage
                .put_object(&key, image.bytes, &image.content_type)
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;
            keys.push(key);
        }

        let created = self
            .store
            .create(Blog {
                id: blog_id,
                account_id,
                title: draft.title.trim().to_owned(),
                summary: draft.summary,
                content: draft.content,
                images: keys,
                tags: normalize_tags(draft.tags),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(blog_id = %created.id, account_id, images = created.images.len(), "blog published");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Blog, ApiError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("blog"))
    }

    pub async fn list(&self, filter: BlogFilter, page: Option<Page>) -> Result<Vec<Blog>, ApiError> {
        self.store.list(&filter, page).await
    }

    pub async fn list_by_tag(&self, tag: &str, page: Option<Page>) -> Result<Vec<Blog>, ApiError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ApiError::MissingParam("tag"));
        }
        self.store
            .list(
                &BlogFilter {
                    tag: Some(tag.to_owned()),
                    ..Default::default()
                },
                page,
            )
            .await
    }

    /// Owner-only edit. Text fields override; images and tags are appended.
    pub async fn update(
        &self,
        account_id: i64,
        id: Uuid,
        draft: BlogDraft,
        images: Vec<UploadImage>,
    ) -> Result<Blog, ApiError> {
        let existing = self.get(id).await?;
        if existing.account_id != account_id {
            // Do not reveal other accounts' post IDs.
            return Err(ApiError::NotFound("blog"));
        }

        let mut add_images = Vec::with_capacity(images.len());
        for image in images {
            let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
            let key = format!("blogs/{}/{}/{}.{}", account_id, id, Uuid::new_v4(), ext);
            self.storage
                .put_object(&key, image.bytes, &image.content_type)
                .await
                .map_err(|e| ApiError::Storage(e.to_string()))?;
            add_images.push(key);
        }

        let title = draft.title.trim().to_owned();
        self.store
            .update(
                id,
                BlogPatch {
                    title: (!title.is_empty()).then_some(title),
                    summary: draft.summary,
                    content: draft.content,
                    add_images,
                    add_tags: normalize_tags(draft.tags),
                },
            )
            .await
    }

    /// Owner-only delete; removes the stored images as well. Image cleanup is
    /// best-effort: a failed object delete is logged, the post is gone either
    /// way.
    pub async fn delete(&self, account_id: i64, id: Uuid) -> Result<(), ApiError> {
        let existing = self.get(id).await?;
        if existing.account_id != account_id {
            return Err(ApiError::NotFound("blog"));
        }

        self.store.delete(id).await?;

        for key in &existing.images {
            if let Err(e) = self.storage.delete_object(key).await {
                warn!(error = %e, key = %key, "could not delete blog image");
            }
        }

        info!(blog_id = %id, account_id, "blog deleted");
        Ok(())
    }

    /// Presigned URL for a post's first image.
    pub async fn first_image_url(&self, id: Uuid) -> Result<String, ApiError> {
        const TTL_SECS: u64 = 30 * 60;
        let blog = self.get(id).await?;
        let key = blog.images.first().ok_or(ApiError::NotFound("image"))?;
        self.storage
            .presign_get(key, TTL_SECS)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))
    }
}

#[async_trait]
impl PostSource for BlogService {
    async fn posts_by_account(&self, account_id: i64) -> Result<Vec<Blog>, ApiError> {
        self.store
            .list(
                &BlogFilter {
                    account_id: Some(account_id),
                    ..Default::default()
                },
                None,
            )
            .await
    }
}

/// Trim, drop empties, dedup while preserving order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_owned());
    }
    out
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemBlogStore {
        blogs: Mutex<Vec<Blog>>,
    }

    #[async_trait]
    impl BlogStore for MemBlogStore {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Blog>, ApiError> {
            Ok(self.blogs.lock().unwrap().iter().find(|b| b.id == id).cloned())
        }

        async fn list(
            &self,
            filter: &BlogFilter,
            page: Option<Page>,
        ) -> Result<Vec<Blog>, ApiError> {
            let mut blogs: Vec<Blog> = self
                .blogs
                .lock()
                .unwrap()
                .iter()
                .filter(|b| filter.account_id.map_or(true, |id| b.account_id == id))
                .filter(|b| {
                    filter
                        .tag
                        .as_ref()
                        .map_or(true, |tag| b.tags.iter().any(|t| t == tag))
                })
                .cloned()
                .collect();
            blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(page) = page {
                blogs = blogs
                    .into_iter()
                    .skip(page.offset as usize)
                    .take(page.limit as usize)
                    .collect();
            }
            Ok(blogs)
        }

        async fn create(&self, blog: Blog) -> Result<Blog, ApiError> {
            self.blogs.lock().unwrap().push(blog.clone());
            Ok(blog)
        }

        async fn update(&self, id: Uuid, patch: BlogPatch) -> Result<Blog, ApiError> {
            let mut blogs = self.blogs.lock().unwrap();
            let blog = blogs
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(ApiError::NotFound("blog"))?;
            if let Some(title) = patch.title {
                blog.title = title;
            }
            if let Some(summary) = patch.summary {
                blog.summary = Some(summary);
            }
            if let Some(content) = patch.content {
                blog.content = Some(content);
            }
            blog.images.extend(patch.add_images);
            blog.tags.extend(patch.add_tags);
            Ok(blog.clone())
        }

        async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
            let mut blogs = self.blogs.lock().unwrap();
            let before = blogs.len();
            blogs.retain(|b| b.id != id);
            if blogs.len() == before {
                return Err(ApiError::NotFound("blog"));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(&self, key: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            self.puts.lock().unwrap().push(key.to_owned());
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.deletes.lock().unwrap().push(key.to_owned());
            Ok(())
        }
        async fn presign_get(&self, key: &str, _s: u64) -> anyhow::Result<String> {
            Ok(format!("https://fake.local/{}", key))
        }
    }

    fn service() -> (BlogService, Arc<MemBlogStore>, Arc<FakeStorage>) {
        let store = Arc::new(MemBlogStore::default());
        let storage = Arc::new(FakeStorage::default());
        (
            BlogService::new(store.clone(), storage.clone()),
            store,
            storage,
        )
    }

    fn draft(title: &str, tags: &[&str]) -> BlogDraft {
        BlogDraft {
            title: title.into(),
            summary: Some("a summary".into()),
            content: Some("the content".into()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn jpeg() -> UploadImage {
        UploadImage {
            bytes: Bytes::from_static(b"\xff\xd8\xff"),
            content_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn create_uploads_images_and_persists_their_keys() {
        let (svc, _store, storage) = service();

        let blog = svc
            .create(7, draft("sunrise", &["nature"]), vec![jpeg(), jpeg()])
            .await
            .expect("create succeeds");

        assert_eq!(blog.account_id, 7);
        assert_eq!(blog.images.len(), 2);
        assert!(blog.images.iter().all(|k| k.starts_with("blogs/7/")));
        assert!(blog.images.iter().all(|k| k.ends_with(".jpg")));
        assert_eq!(*storage.puts.lock().unwrap(), blog.images);
    }

    #[tokio::test]
    async fn create_requires_a_title() {
        let (svc, _store, _storage) = service();
        let err = svc.create(7, draft("   ", &[]), vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "missing-param");
    }

    #[tokio::test]
    async fn tags_are_trimmed_and_deduplicated() {
        let (svc, _store, _storage) = service();
        let blog = svc
            .create(7, draft("walk", &[" city ", "city", "", "night"]), vec![])
            .await
            .unwrap();
        assert_eq!(blog.tags, vec!["city".to_string(), "night".to_string()]);
    }

    #[tokio::test]
    async fn list_by_tag_filters_and_orders_newest_first() {
        let (svc, _store, _storage) = service();
        svc.create(1, draft("first", &["city"]), vec![]).await.unwrap();
        svc.create(1, draft("second", &["city"]), vec![]).await.unwrap();
        svc.create(1, draft("other", &["nature"]), vec![]).await.unwrap();

        let city = svc.list_by_tag("city", None).await.unwrap();
        assert_eq!(city.len(), 2);
        assert!(city[0].created_at >= city[1].created_at);

        let err = svc.list_by_tag("   ", None).await.unwrap_err();
        assert_eq!(err.kind(), "missing-param");
    }

    #[tokio::test]
    async fn update_rejects_non_owners_without_leaking() {
        let (svc, _store, _storage) = service();
        let blog = svc.create(7, draft("mine", &[]), vec![]).await.unwrap();

        let err = svc
            .update(8, blog.id, draft("stolen", &[]), vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "entity-not-found");
    }

    #[tokio::test]
    async fn update_appends_images_and_overrides_title() {
        let (svc, _store, _storage) = service();
        let blog = svc.create(7, draft("day one", &[]), vec![jpeg()]).await.unwrap();

        let updated = svc
            .update(7, blog.id, draft("day two", &["trip"]), vec![jpeg()])
            .await
            .unwrap();
        assert_eq!(updated.title, "day two");
        assert_eq!(updated.images.len(), 2);
        assert_eq!(updated.tags, vec!["trip".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_post_and_stored_images() {
        let (svc, _store, storage) = service();
        let blog = svc.create(7, draft("gone soon", &[]), vec![jpeg()]).await.unwrap();

        svc.delete(7, blog.id).await.expect("delete succeeds");

        assert_eq!(
            svc.get(blog.id).await.unwrap_err().kind(),
            "entity-not-found"
        );
        assert_eq!(*storage.deletes.lock().unwrap(), blog.images);
    }

    #[tokio::test]
    async fn delete_rejects_non_owners() {
        let (svc, _store, _storage) = service();
        let blog = svc.create(7, draft("mine", &[]), vec![]).await.unwrap();
        let err = svc.delete(8, blog.id).await.unwrap_err();
        assert_eq!(err.kind(), "entity-not-found");
    }

    #[tokio::test]
    async fn posts_by_account_returns_the_full_history_unpaginated() {
        let (svc, _store, _storage) = service();
        for i in 0..30 {
            svc.create(7, draft(&format!("post {i}"), &[]), vec![])
                .await
                .unwrap();
        }
        svc.create(8, draft("someone else", &[]), vec![]).await.unwrap();

        let posts = svc.posts_by_account(7).await.unwrap();
        assert_eq!(posts.len(), 30);
        assert!(posts.iter().all(|p| p.account_id == 7));
    }

    #[tokio::test]
    async fn first_image_url_presigns_the_first_key() {
        let (svc, _store, _storage) = service();
        let blog = svc.create(7, draft("pic", &[]), vec![jpeg()]).await.unwrap();

        let url = svc.first_image_url(blog.id).await.unwrap();
        assert!(url.contains(&blog.images[0]));

        let bare = svc.create(7, draft("no pics", &[]), vec![]).await.unwrap();
        assert_eq!(
            svc.first_image_url(bare.id).await.unwrap_err().kind(),
            "entity-not-found"
        );
    }

    #[test]
    fn ext_mapping() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }
}
