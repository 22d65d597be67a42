use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    events::DomainEvent,
    model::{
        CrudRepository, Relation, ResourceTyped,
        entity::{Enrollment, Lesson, LessonWithStatus, Module},
        progress,
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{
            ValidatedJson,
            content::{LessonCompletionResponse, LessonCreateBody, LessonUpdateBody, ReorderBody},
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/modules/{id}/lessons", get(lessons_list_handler))
        .route("/api/lessons", post(lessons_create_handler))
        .route(
            "/api/lessons/{id}",
            get(lessons_get_handler)
                .put(lessons_update_handler)
                .delete(lessons_delete_handler),
        )
        .route("/api/lessons/{id}/reorder", post(lessons_reorder_handler))
        .route("/api/lessons/{id}/complete", post(lessons_complete_handler))
        .with_state(state)
}

fn lesson_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Lesson::get_resource_type(), e)
}

#[utoipa::path(
    get,
    path = "/api/modules/{id}/lessons",
    params(("id" = Uuid, Path, description = "Module id")),
    description = "Lessons of a module in display order with the requester's completion flag",
    responses(
        (status = 200, description = "Lessons", body = Vec<LessonWithStatus>),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let module = super::fetch::<Module>(&state, module_id).await?;
    super::guard_member(&state, user, &module, module.course_id()).await?;

    let lessons = Lesson::by_module(state.pool(), module_id, user.user_id())
        .await
        .map_err(lesson_error)?;
    Ok(ApiResponse::ok(lessons))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson found", body = Lesson),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, id).await?;
    super::guard_member(&state, user, &lesson, lesson.course_id()).await?;

    Ok(ApiResponse::ok(lesson))
}

#[utoipa::path(
    post,
    path = "/api/lessons",
    request_body = LessonCreateBody,
    description = "Appends a lesson, or inserts it at `order_index` shifting later lessons down",
    responses(
        (status = 201, description = "Lesson created", body = Lesson),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LessonCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if payload.missing_video() {
        return Err(WebError::validation(
            "video_url",
            "Video lessons require a video URL.",
        ));
    }

    let module = super::fetch::<Module>(&state, payload.module_id).await?;
    super::guard(user, &module, Relation::Owner)?;

    let lesson = Lesson::create(state.pool(), payload.into())
        .await
        .map_err(lesson_error)?;

    tracing::info!(lesson_id = %lesson.id(), module_id = %module.id(), "lesson created");
    Ok(ApiResponse::created(lesson).with_message("Lesson created successfully."))
}

#[utoipa::path(
    put,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = LessonUpdateBody,
    responses(
        (status = 200, description = "Lesson updated", body = Lesson),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 422, description = "Video lesson without a video URL", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<LessonUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, id).await?;
    super::guard(user, &lesson, Relation::Owner)?;

    if payload.missing_video(&lesson) {
        return Err(WebError::validation(
            "video_url",
            "Video lessons require a video URL.",
        ));
    }

    let updated = Lesson::update(state.pool(), id, payload.into())
        .await
        .map_err(lesson_error)?
        .ok_or_else(|| WebError::resource_not_found(Lesson::get_resource_type()))?;

    Ok(ApiResponse::ok(updated).with_message("Lesson updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/lessons/{id}",
    params(("id" = Uuid, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, id).await?;
    super::guard(user, &lesson, Relation::Owner)?;

    Lesson::delete(state.pool(), id).await.map_err(lesson_error)?;

    tracing::info!(lesson_id = %id, "lesson deleted");
    Ok(ApiResponse::message("Lesson deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/reorder",
    params(("id" = Uuid, Path, description = "Lesson id")),
    request_body = ReorderBody,
    description = "Moves the lesson to a new position within its module",
    responses(
        (status = 200, description = "Lesson moved", body = Lesson),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_reorder_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReorderBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, id).await?;
    super::guard(user, &lesson, Relation::Owner)?;

    let moved = Lesson::reorder(state.pool(), id, payload.new_order_index)
        .await
        .map_err(lesson_error)?;

    Ok(ApiResponse::ok(moved).with_message("Lesson reordered successfully."))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/complete",
    params(("id" = Uuid, Path, description = "Lesson id")),
    description = "Marks the lesson completed and recomputes course progress. Repeating it is harmless.",
    responses(
        (status = 200, description = "Lesson completed", body = LessonCompletionResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "lessons"
)]
async fn lessons_complete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, id).await?;

    let enrolled = Enrollment::is_enrolled(state.pool(), user.user_id(), lesson.course_id())
        .await
        .map_err(lesson_error)?;
    if !enrolled {
        return Err(WebError::resource_forbidden(Lesson::get_resource_type()));
    }

    let outcome = progress::complete_lesson(state.pool(), user.user_id(), &lesson)
        .await
        .map_err(lesson_error)?;

    if outcome.course_completed {
        publish_course_completed(&state, user.user_id(), outcome.enrollment.as_ref());
    }

    Ok(ApiResponse::ok(LessonCompletionResponse {
        lesson: outcome.lesson,
        course_progress: outcome.progress,
        course_completed: outcome.course_completed,
    }))
}

/// Shared with quiz attempts, which complete their lesson on a pass.
pub(crate) fn publish_course_completed(
    state: &AppState,
    user_id: Uuid,
    enrollment: Option<&Enrollment>,
) {
    let Some(enrollment) = enrollment else {
        return;
    };
    tracing::info!(course_id = %enrollment.course_id(), %user_id, "course completed");
    state.events().publish(DomainEvent::CourseCompleted {
        user_id,
        course_id: enrollment.course_id(),
        course_title: enrollment.course_title().to_string(),
    });
}
