//! Image-serving endpoint.
//!
//! Streams a resource's stored image as a file download. The endpoint is
//! bound to a resource kind at router-construction time through its generic
//! parameter, so an unbound media route cannot be expressed; a missing record
//! or a record without a stored image is a plain not-found. No caching
//! headers, no range requests.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    db::handlers::{Repository, Users},
    errors::{Error, Result},
    views::resource::{ResourceController, not_found},
    views::users::UserController,
};

/// Optional capability: the resource stores a binary image asset.
#[async_trait]
pub trait HasImage: ResourceController {
    /// Relative media path of the stored image, if any.
    async fn image_path(state: &AppState, id: Uuid) -> Result<Option<String>>;
}

#[async_trait]
impl HasImage for UserController {
    async fn image_path(state: &AppState, id: Uuid) -> Result<Option<String>> {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let user = Users::new(&mut conn).get_by_id(id).await?;
        Ok(user.and_then(|u| u.avatar_path))
    }
}

/// GET /media/.../{id}/ - stream the stored image as an attachment.
#[instrument(skip_all, fields(id = %id))]
pub async fn download<C: HasImage>(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response> {
    let relative = C::image_path(&state, id).await?.ok_or_else(|| not_found::<C>(id))?;

    let path = state.config.media_dir.join(&relative);
    let file = tokio::fs::File::open(&path).await.map_err(|_| not_found::<C>(id))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("download")
        .to_string();

    let stream = ReaderStream::new(file);

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\""))
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal {
            operation: format!("build media response: {e}"),
        })
}
