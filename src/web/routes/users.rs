use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    model::{CrudRepository, Page, Relation, ResourceTyped, entity::UserEntity},
    web::{
        ApiResponse, AppState, RequestContext, UserRole, WebError, WebResult,
        dto::{
            PaginationQuery,
            users::{RoleBody, UserListQuery},
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/users", get(users_list_handler))
        .route(
            "/api/users/{id}",
            get(users_get_handler).delete(users_delete_handler),
        )
        .route("/api/users/{id}/role", put(users_role_handler))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListQuery),
    description = "Lists users, optionally of one role",
    responses(
        (status = 200, description = "Requested page", body = Page<UserEntity>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
async fn users_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> WebResult<impl IntoResponse> {
    ctx.admin()?;
    let page = PaginationQuery::new(query.limit, query.offset);

    let db_error = |e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e);
    let users = UserEntity::list(state.pool(), query.role, page.limit(), page.offset())
        .await
        .map_err(db_error)?;
    let total = UserEntity::count(state.pool(), query.role)
        .await
        .map_err(db_error)?;

    Ok(ApiResponse::ok(Page::new(
        users,
        total,
        page.limit(),
        page.offset(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserEntity),
        (status = 403, description = "Only admins or the user themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
async fn users_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = super::fetch::<UserEntity>(&state, id).await?;
    super::guard(user, &found, Relation::Owner)?;

    Ok(ApiResponse::ok(found))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RoleBody,
    description = "Switches a user between student and instructor",
    responses(
        (status = 200, description = "Role changed", body = UserEntity),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Role not assignable", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
async fn users_role_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleBody>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.admin()?;
    if admin.user_id() == id {
        return Err(WebError::validation("role", "You cannot change your own role."));
    }
    if payload.role == UserRole::Admin {
        return Err(WebError::validation(
            "role",
            "Only student and instructor roles can be assigned.",
        ));
    }

    let target = super::fetch::<UserEntity>(&state, id).await?;
    if target.role() == UserRole::Admin {
        return Err(WebError::validation("role", "Administrator roles cannot be changed."));
    }

    let updated = UserEntity::set_role(state.pool(), id, payload.role)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(UserEntity::get_resource_type()))?;

    tracing::info!(user_id = %id, role = %payload.role, "role changed");
    Ok(ApiResponse::ok(updated).with_message("User role updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    description = "Deactivates an account; it can no longer sign in",
    responses(
        (status = 200, description = "User deleted"),
        (status = 403, description = "Only admins or the user themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
async fn users_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = super::fetch::<UserEntity>(&state, id).await?;
    super::guard(user, &found, Relation::Owner)?;

    UserEntity::delete(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    tracing::info!(user_id = %id, by = %user.user_id(), "user deleted");
    Ok(ApiResponse::message("User deleted successfully."))
}
