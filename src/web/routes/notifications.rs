use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    events::DomainEvent,
    model::{ResourceTyped, entity::Notification},
    web::{
        ApiResponse, AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            PaginationQuery, ValidatedJson,
            notifications::{
                AffectedRows, NotificationList, NotificationQuery, SystemNotificationBody,
                UnreadCount,
            },
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/api/notifications",
            get(notifications_list_handler).delete(notifications_clear_handler),
        )
        .route(
            "/api/notifications/unread-count",
            get(notifications_unread_count_handler),
        )
        .route(
            "/api/notifications/read-all",
            put(notifications_read_all_handler),
        )
        .route(
            "/api/notifications/system",
            post(notifications_system_handler),
        )
        .route(
            "/api/notifications/{id}",
            delete(notifications_delete_handler),
        )
        .route(
            "/api/notifications/{id}/read",
            put(notifications_read_handler),
        )
        .with_state(state)
}

fn notification_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Notification::get_resource_type(), e)
}

/// Notifications are private to their recipient, admins included.
async fn own_notification(
    state: &AppState,
    user: &AuthenticatedUser,
    id: Uuid,
) -> WebResult<Notification> {
    let notification = Notification::find_by_id(state.pool(), id)
        .await
        .map_err(notification_error)?
        .ok_or_else(|| WebError::resource_not_found(Notification::get_resource_type()))?;

    if notification.user_id() != user.user_id() {
        return Err(WebError::resource_forbidden(
            Notification::get_resource_type(),
        ));
    }
    Ok(notification)
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    description = "Own notifications, newest first",
    responses(
        (status = 200, description = "Requested page with the unread count", body = NotificationList),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let page = PaginationQuery::new(query.limit, query.offset);

    let notifications = Notification::list(
        state.pool(),
        user.user_id(),
        query.unread_only,
        page.limit(),
        page.offset(),
    )
    .await
    .map_err(notification_error)?;
    let unread_count = Notification::count(state.pool(), user.user_id(), true)
        .await
        .map_err(notification_error)?;

    Ok(ApiResponse::ok(NotificationList {
        notifications,
        unread_count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Number of unread notifications", body = UnreadCount),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_unread_count_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let count = Notification::count(state.pool(), user.user_id(), true)
        .await
        .map_err(notification_error)?;
    Ok(ApiResponse::ok(UnreadCount { count }))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read", body = Notification),
        (status = 403, description = "Not the recipient", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_read_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    own_notification(&state, user, id).await?;

    let notification = Notification::mark_read(state.pool(), id)
        .await
        .map_err(notification_error)?
        .ok_or_else(|| WebError::resource_not_found(Notification::get_resource_type()))?;
    Ok(ApiResponse::ok(notification))
}

#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Number of notifications marked", body = AffectedRows),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_read_all_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let affected = Notification::mark_all_read(state.pool(), user.user_id())
        .await
        .map_err(notification_error)?;
    Ok(ApiResponse::ok(AffectedRows { affected }).with_message("All notifications marked as read."))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 403, description = "Not the recipient", body = ErrorResponse),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    own_notification(&state, user, id).await?;

    Notification::delete(state.pool(), id)
        .await
        .map_err(notification_error)?;
    Ok(ApiResponse::message("Notification deleted successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Number of notifications deleted", body = AffectedRows),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_clear_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let affected = Notification::delete_all(state.pool(), user.user_id())
        .await
        .map_err(notification_error)?;
    Ok(ApiResponse::ok(AffectedRows { affected }).with_message("All notifications deleted."))
}

#[utoipa::path(
    post,
    path = "/api/notifications/system",
    request_body = SystemNotificationBody,
    description = "Broadcasts a system notification to every user, or to one role",
    responses(
        (status = 202, description = "Broadcast queued"),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "notifications"
)]
async fn notifications_system_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SystemNotificationBody>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.admin()?;

    tracing::info!(by = %admin.user_id(), role = ?payload.role, "system announcement queued");
    state.events().publish(DomainEvent::SystemAnnouncement {
        title: payload.title,
        message: payload.message,
        role: payload.role,
    });

    Ok((
        axum::http::StatusCode::ACCEPTED,
        ApiResponse::message("System notification queued."),
    ))
}
