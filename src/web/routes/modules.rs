use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, Relation, ResourceTyped,
        entity::{Course, Module},
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{
            ValidatedJson,
            content::{ModuleCreateBody, ModuleUpdateBody, ReorderBody},
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/courses/{id}/modules", get(modules_list_handler))
        .route("/api/modules", post(modules_create_handler))
        .route(
            "/api/modules/{id}",
            get(modules_get_handler)
                .put(modules_update_handler)
                .delete(modules_delete_handler),
        )
        .route("/api/modules/{id}/reorder", post(modules_reorder_handler))
        .with_state(state)
}

fn module_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Module::get_resource_type(), e)
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/modules",
    params(("id" = Uuid, Path, description = "Course id")),
    description = "Modules of a course in display order",
    responses(
        (status = 200, description = "Modules", body = Vec<Module>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "modules"
)]
async fn modules_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = super::fetch::<Course>(&state, course_id).await?;
    super::ensure_visible(&ctx, &course)?;

    let modules = Module::by_course(state.pool(), course_id)
        .await
        .map_err(module_error)?;
    Ok(ApiResponse::ok(modules))
}

#[utoipa::path(
    get,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module found", body = Module),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules"
)]
async fn modules_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = super::fetch::<Module>(&state, id).await?;
    let course = super::fetch::<Course>(&state, module.course_id()).await?;
    super::ensure_visible(&ctx, &course)?;

    Ok(ApiResponse::ok(module))
}

#[utoipa::path(
    post,
    path = "/api/modules",
    request_body = ModuleCreateBody,
    description = "Appends a module, or inserts it at `order_index` shifting later modules down",
    responses(
        (status = 201, description = "Module created", body = Module),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
async fn modules_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ModuleCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, payload.course_id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let module = Module::create(state.pool(), payload.into())
        .await
        .map_err(module_error)?;

    tracing::info!(module_id = %module.id(), course_id = %course.id(), "module created");
    Ok(ApiResponse::created(module).with_message("Module created successfully."))
}

#[utoipa::path(
    put,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = ModuleUpdateBody,
    responses(
        (status = 200, description = "Module updated", body = Module),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
async fn modules_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ModuleUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let module = super::fetch::<Module>(&state, id).await?;
    super::guard(user, &module, Relation::Owner)?;

    let updated = Module::update(state.pool(), id, payload.into())
        .await
        .map_err(module_error)?
        .ok_or_else(|| WebError::resource_not_found(Module::get_resource_type()))?;

    Ok(ApiResponse::ok(updated).with_message("Module updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    description = "Deletes a module with its lessons and closes the ordering gap",
    responses(
        (status = 200, description = "Module deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
async fn modules_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let module = super::fetch::<Module>(&state, id).await?;
    super::guard(user, &module, Relation::Owner)?;

    Module::delete(state.pool(), id).await.map_err(module_error)?;

    tracing::info!(module_id = %id, "module deleted");
    Ok(ApiResponse::message("Module deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/modules/{id}/reorder",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = ReorderBody,
    description = "Moves the module to a new position within its course",
    responses(
        (status = 200, description = "Module moved", body = Module),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "modules"
)]
async fn modules_reorder_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReorderBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let module = super::fetch::<Module>(&state, id).await?;
    super::guard(user, &module, Relation::Owner)?;

    let moved = Module::reorder(state.pool(), id, payload.new_order_index)
        .await
        .map_err(module_error)?;

    Ok(ApiResponse::ok(moved).with_message("Module reordered successfully."))
}
