use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    events::DomainEvent,
    model::{
        CrudRepository, Relation, ResourceTyped,
        entity::{
            Assignment, AssignmentStatistics, AssignmentUpdate, Enrollment, Lesson, Submission,
            SubmissionUpsert, SubmissionWithStudent, UpcomingAssignment, UserEntity,
        },
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{
            ValidatedJson,
            assignments::{AssignmentCreateBody, AssignmentUpdateBody, GradeBody, SubmitBody},
        },
        error::ErrorResponse,
    },
};

/// Window of `GET /api/assignments/upcoming`.
const UPCOMING_DAYS: i64 = 7;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/api/lessons/{id}/assignments",
            get(assignments_by_lesson_handler),
        )
        .route("/api/assignments", post(assignments_create_handler))
        .route("/api/assignments/upcoming", get(assignments_upcoming_handler))
        .route(
            "/api/assignments/{id}",
            get(assignments_get_handler)
                .put(assignments_update_handler)
                .delete(assignments_delete_handler),
        )
        .route(
            "/api/assignments/{id}/publish",
            post(assignments_publish_handler),
        )
        .route(
            "/api/assignments/{id}/unpublish",
            post(assignments_unpublish_handler),
        )
        .route(
            "/api/assignments/{id}/submissions",
            get(submissions_list_handler).post(submissions_create_handler),
        )
        .route(
            "/api/assignments/{id}/submissions/mine",
            get(submissions_mine_handler),
        )
        .route(
            "/api/assignments/{id}/statistics",
            get(assignments_statistics_handler),
        )
        .route("/api/submissions/{id}/grade", post(submissions_grade_handler))
        .with_state(state)
}

fn assignment_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Assignment::get_resource_type(), e)
}

fn submission_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Submission::get_resource_type(), e)
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/assignments",
    params(("id" = Uuid, Path, description = "Lesson id")),
    description = "Assignments of a lesson. Students only see published ones.",
    responses(
        (status = 200, description = "Assignments", body = Vec<Assignment>),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_by_lesson_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, lesson_id).await?;
    super::guard_member(&state, user, &lesson, lesson.course_id()).await?;

    let published_only = super::guard(user, &lesson, Relation::Owner).is_err();
    let assignments = Assignment::by_lesson(state.pool(), lesson_id, published_only)
        .await
        .map_err(assignment_error)?;
    Ok(ApiResponse::ok(assignments))
}

#[utoipa::path(
    post,
    path = "/api/assignments",
    request_body = AssignmentCreateBody,
    description = "Creates an unpublished assignment for a lesson",
    responses(
        (status = 201, description = "Assignment created", body = Assignment),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AssignmentCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, payload.lesson_id).await?;
    super::guard(user, &lesson, Relation::Owner)?;

    let assignment = Assignment::create(state.pool(), payload.into())
        .await
        .map_err(assignment_error)?;

    tracing::info!(assignment_id = %assignment.id(), lesson_id = %lesson.id(), "assignment created");
    Ok(ApiResponse::created(assignment).with_message("Assignment created successfully."))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Assignment found", body = Assignment),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;
    super::guard_member(&state, user, &assignment, assignment.course_id()).await?;

    let is_author = super::guard(user, &assignment, Relation::Owner).is_ok();
    if !is_author && !assignment.is_published() {
        return Err(WebError::resource_not_found(
            Assignment::get_resource_type(),
        ));
    }

    Ok(ApiResponse::ok(assignment))
}

async fn update_owned(
    ctx: &RequestContext,
    state: &AppState,
    id: Uuid,
    update: AssignmentUpdate,
) -> WebResult<Assignment> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(state, id).await?;
    super::guard(user, &assignment, Relation::Owner)?;

    Assignment::update(state.pool(), id, update)
        .await
        .map_err(assignment_error)?
        .ok_or_else(|| WebError::resource_not_found(Assignment::get_resource_type()))
}

#[utoipa::path(
    put,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = AssignmentUpdateBody,
    responses(
        (status = 200, description = "Assignment updated", body = Assignment),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AssignmentUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let assignment = update_owned(&ctx, &state, id, payload.into()).await?;
    Ok(ApiResponse::ok(assignment).with_message("Assignment updated successfully."))
}

#[utoipa::path(
    post,
    path = "/api/assignments/{id}/publish",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Assignment published", body = Assignment),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let update = AssignmentUpdate {
        is_published: Some(true),
        ..Default::default()
    };
    let assignment = update_owned(&ctx, &state, id, update).await?;
    Ok(ApiResponse::ok(assignment).with_message("Assignment published successfully."))
}

#[utoipa::path(
    post,
    path = "/api/assignments/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Assignment unpublished", body = Assignment),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let update = AssignmentUpdate {
        is_published: Some(false),
        ..Default::default()
    };
    let assignment = update_owned(&ctx, &state, id, update).await?;
    Ok(ApiResponse::ok(assignment).with_message("Assignment unpublished successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    description = "Deletes the assignment with all submissions",
    responses(
        (status = 200, description = "Assignment deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;
    super::guard(user, &assignment, Relation::Owner)?;

    Assignment::delete(state.pool(), id)
        .await
        .map_err(assignment_error)?;

    tracing::info!(assignment_id = %id, "assignment deleted");
    Ok(ApiResponse::message("Assignment deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = SubmitBody,
    description = "Submits or resubmits work. A resubmission replaces the previous one and clears its grade.",
    responses(
        (status = 201, description = "Submission stored", body = Submission),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Assignment not found or unpublished", body = ErrorResponse),
        (status = 422, description = "Required field missing", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn submissions_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<SubmitBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;

    let enrolled = Enrollment::is_enrolled(state.pool(), user.user_id(), assignment.course_id())
        .await
        .map_err(assignment_error)?;
    if !enrolled {
        return Err(WebError::resource_forbidden(
            Assignment::get_resource_type(),
        ));
    }
    if !assignment.is_published() {
        return Err(WebError::resource_not_found(
            Assignment::get_resource_type(),
        ));
    }
    if let Some(field) = payload.missing_field(assignment.submission_type()) {
        return Err(WebError::validation(
            field,
            format!("This assignment requires a {} submission.", assignment.submission_type().as_str()),
        ));
    }

    let is_late = assignment.is_late_at(Utc::now());
    let (submission, inserted) = Submission::upsert(
        state.pool(),
        SubmissionUpsert {
            assignment_id: assignment.id(),
            user_id: user.user_id(),
            content: payload.content,
            file_url: payload.file_url,
            is_late,
        },
    )
    .await
    .map_err(submission_error)?;

    tracing::info!(
        assignment_id = %assignment.id(),
        user_id = %user.user_id(),
        is_late,
        resubmission = !inserted,
        "submission stored"
    );

    if inserted {
        let student = super::fetch::<UserEntity>(&state, user.user_id()).await?;
        state.events().publish(DomainEvent::AssignmentSubmitted {
            instructor_id: assignment.instructor_id(),
            assignment_id: assignment.id(),
            assignment_title: assignment.title().to_string(),
            student_name: student.name().to_string(),
        });
    }

    let message = if is_late {
        "Submission received after the due date."
    } else {
        "Submission received."
    };
    Ok(ApiResponse::created(submission).with_message(message))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "All submissions", body = Vec<SubmissionWithStudent>),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn submissions_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;
    super::guard(user, &assignment, Relation::Owner)?;

    let submissions = Submission::by_assignment(state.pool(), id)
        .await
        .map_err(submission_error)?;
    Ok(ApiResponse::ok(submissions))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{id}/submissions/mine",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Own submission, or null", body = Option<Submission>),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn submissions_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;

    let submission = Submission::find_for(state.pool(), assignment.id(), user.user_id())
        .await
        .map_err(submission_error)?;
    Ok(ApiResponse::ok(submission))
}

#[utoipa::path(
    post,
    path = "/api/submissions/{id}/grade",
    params(("id" = Uuid, Path, description = "Submission id")),
    request_body = GradeBody,
    responses(
        (status = 200, description = "Submission graded", body = Submission),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
        (status = 422, description = "Score out of range", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn submissions_grade_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<GradeBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let submission = Submission::find_by_id(state.pool(), id)
        .await
        .map_err(submission_error)?
        .ok_or_else(|| WebError::resource_not_found(Submission::get_resource_type()))?;
    let assignment = super::fetch::<Assignment>(&state, submission.assignment_id()).await?;
    super::guard(user, &assignment, Relation::Owner)?;

    if !assignment.accepts_score(payload.score) {
        return Err(WebError::validation(
            "score",
            format!("Score must be between 0 and {}.", assignment.max_score()),
        ));
    }

    let feedback = payload.feedback.filter(|f| !f.trim().is_empty());
    let graded = Submission::grade(
        state.pool(),
        id,
        payload.score,
        feedback.as_deref(),
        user.user_id(),
    )
    .await
    .map_err(submission_error)?
    .ok_or_else(|| WebError::resource_not_found(Submission::get_resource_type()))?;

    tracing::info!(submission_id = %id, score = payload.score, "submission graded");
    state.events().publish(DomainEvent::SubmissionGraded {
        user_id: graded.user_id(),
        submission_id: graded.id(),
        assignment_title: assignment.title().to_string(),
        score: payload.score,
        max_score: assignment.max_score(),
    });

    Ok(ApiResponse::ok(graded).with_message("Submission graded successfully."))
}

#[utoipa::path(
    get,
    path = "/api/assignments/{id}/statistics",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Submission statistics", body = AssignmentStatistics),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_statistics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignment = super::fetch::<Assignment>(&state, id).await?;
    super::guard(user, &assignment, Relation::Owner)?;

    let statistics = Assignment::statistics(state.pool(), id)
        .await
        .map_err(assignment_error)?;
    Ok(ApiResponse::ok(statistics))
}

#[utoipa::path(
    get,
    path = "/api/assignments/upcoming",
    description = "Published assignments due within the next week in the requester's courses",
    responses(
        (status = 200, description = "Upcoming assignments, soonest first", body = Vec<UpcomingAssignment>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "assignments"
)]
async fn assignments_upcoming_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assignments = Assignment::upcoming_for(state.pool(), user.user_id(), UPCOMING_DAYS)
        .await
        .map_err(assignment_error)?;
    Ok(ApiResponse::ok(assignments))
}
