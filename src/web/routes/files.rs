use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::{
    model::{Relation, ResourceTyped, entity::UploadRecord},
    storage::{ALLOWED_TYPES, AllowedType, validate_upload},
    web::{ApiResponse, AppState, RequestContext, WebError, WebResult, error::ErrorResponse},
};

/// Room for the multipart framing around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes<S>(state: AppState) -> Router<S> {
    let body_limit = state.config().uploads().max_file_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/api/files",
            post(files_upload_handler).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/files/allowed-types", get(files_allowed_types_handler))
        .route("/api/files/{public_id}", delete(files_delete_handler))
        .with_state(state)
}

fn upload_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(UploadRecord::get_resource_type(), e)
}

#[utoipa::path(
    post,
    path = "/api/files",
    request_body(content_type = "multipart/form-data", description = "A single part named `file`"),
    description = "Stores a file after checking its extension, MIME type and size",
    responses(
        (status = 201, description = "File stored", body = UploadRecord),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 422, description = "File missing or not allowed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "files"
)]
async fn files_upload_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let limit = state.config().uploads().max_file_size();

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::validation("file", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::validation("file", e.body_text()))?;
        upload = Some((file_name, content_type, bytes));
        break;
    }

    let Some((file_name, content_type, bytes)) = upload else {
        return Err(WebError::validation("file", "No file uploaded."));
    };

    let allowed = validate_upload(&file_name, &content_type, bytes.len(), limit)
        .map_err(WebError::storage_error)?;

    let stored = state
        .storage()
        .put(&file_name, &content_type, &bytes)
        .await
        .map_err(WebError::storage_error)?;

    let size = i64::try_from(stored.size).unwrap_or(i64::MAX);
    let record = match UploadRecord::insert(
        state.pool(),
        &stored.public_id,
        user.user_id(),
        &stored.url,
        &content_type,
        size,
    )
    .await
    {
        Ok(record) => record,
        Err(e) => {
            // keep storage and bookkeeping in step
            if let Err(cleanup) = state.storage().delete(&stored.public_id).await {
                tracing::warn!(public_id = %stored.public_id, error = %cleanup, "orphaned upload");
            }
            return Err(upload_error(e));
        }
    };

    tracing::info!(
        public_id = %record.public_id(),
        category = ?allowed.category,
        size = record.size(),
        "file uploaded"
    );
    Ok(ApiResponse::created(record).with_message("File uploaded successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/files/{public_id}",
    params(("public_id" = String, Path, description = "Id returned by the upload")),
    responses(
        (status = 200, description = "File deleted"),
        (status = 403, description = "Not the uploader", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "files"
)]
async fn files_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let record = UploadRecord::find(state.pool(), &public_id)
        .await
        .map_err(upload_error)?
        .ok_or_else(|| WebError::resource_not_found(UploadRecord::get_resource_type()))?;
    super::guard(user, &record, Relation::Owner)?;

    state
        .storage()
        .delete(record.public_id())
        .await
        .map_err(WebError::storage_error)?;
    UploadRecord::remove(state.pool(), record.public_id())
        .await
        .map_err(upload_error)?;

    tracing::info!(%public_id, "file deleted");
    Ok(ApiResponse::message("File deleted successfully."))
}

#[utoipa::path(
    get,
    path = "/api/files/allowed-types",
    description = "Extensions accepted by the upload endpoint with their MIME types",
    responses(
        (status = 200, description = "Allowlist", body = Vec<AllowedType>),
    ),
    tag = "files"
)]
async fn files_allowed_types_handler() -> impl IntoResponse {
    ApiResponse::ok(ALLOWED_TYPES.to_vec())
}
