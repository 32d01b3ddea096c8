use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    blogs::dto::{BlogListQuery, BlogResponse},
    blogs::model::{BlogDraft, BlogFilter},
    blogs::service::UploadImage,
    error::ApiError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs).post(create_blog))
        .route(
            "/blogs/:id",
            get(get_blog).put(update_blog).delete(delete_blog),
        )
        .route("/blogs/:id/image", get(get_blog_image))
        .route("/blogs/tag/:tag", get(list_by_tag))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB of attachments
}

#[instrument(skip(state))]
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<Vec<BlogResponse>>, ApiError> {
    let filter = BlogFilter {
        account_id: query.account_id,
        ..Default::default()
    };
    let blogs = state.blogs.list(filter, Some(query.page())).await?;
    Ok(Json(blogs.into_iter().map(BlogResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn list_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<Vec<BlogResponse>>, ApiError> {
    let blogs = state.blogs.list_by_tag(&tag, Some(query.page())).await?;
    Ok(Json(blogs.into_iter().map(BlogResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlogResponse>, ApiError> {
    let blog = state.blogs.get(id).await?;
    Ok(Json(blog.into()))
}

#[instrument(skip(state))]
pub async fn get_blog_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let url = state.blogs.first_image_url(id).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state, multipart))]
pub async fn create_blog(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<BlogResponse>), ApiError> {
    let (draft, images) = parse_blog_form(multipart).await?;
    let blog = state.blogs.create(subject, draft, images).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/blogs/{}", blog.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(blog.into())))
}

#[instrument(skip(state, multipart))]
pub async fn update_blog(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<BlogResponse>, ApiError> {
    let (draft, images) = parse_blog_form(multipart).await?;
    let blog = state.blogs.update(subject, id, draft, images).await?;
    Ok(Json(blog.into()))
}

#[instrument(skip(state))]
pub async fn delete_blog(
    State(state): State<AppState>,
    AuthUser(subject): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.blogs.delete(subject, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart fields: `title`, `summary`, `content`, `tags` (comma separated)
/// plus any number of `images` file parts.
async fn parse_blog_form(mut multipart: Multipart) -> Result<(BlogDraft, Vec<UploadImage>), ApiError> {
    let mut draft = BlogDraft::default();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "unreadable multipart field");
        ApiError::InvalidParam("form data")
    })? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => {
                draft.title = field
                    .text()
                    .await
                    .map_err(|_| ApiError::InvalidParam("title"))?;
            }
            Some("summary") => {
                draft.summary = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::InvalidParam("summary"))?,
                );
            }
            Some("content") => {
                draft.content = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::InvalidParam("content"))?,
                );
            }
            Some("tags") => {
                draft.tags = field
                    .text()
                    .await
                    .map_err(|_| ApiError::InvalidParam("tags"))?
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .collect();
            }
            Some("images") | Some("images[]") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::InvalidParam("images"))?;
                images.push(UploadImage {
                    bytes,
                    content_type,
                });
            }
            _ => {}
        }
    }

    Ok((draft, images))
}
