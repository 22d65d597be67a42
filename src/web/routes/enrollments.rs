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
        CrudRepository, Relation, ResourceTyped, check_access,
        entity::{Course, Enrollment, EnrollmentCreate, EnrollmentWithStudent},
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{ValidatedJson, courses::EnrollBody},
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/enrollments", post(enrollments_create_handler))
        .route("/api/enrollments/mine", get(enrollments_mine_handler))
        .route(
            "/api/enrollments/{id}",
            get(enrollments_get_handler).delete(enrollments_delete_handler),
        )
        .route(
            "/api/courses/{id}/enrollments",
            get(enrollments_by_course_handler),
        )
        .with_state(state)
}

fn enrollment_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Enrollment::get_resource_type(), e)
}

#[utoipa::path(
    post,
    path = "/api/enrollments",
    request_body = EnrollBody,
    description = "Enrolls the requester into an approved, published course",
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Course is not open for enrollment", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "enrollments"
)]
async fn enrollments_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EnrollBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, payload.course_id).await?;
    if !course.is_enrollable() {
        return Err(WebError::resource_bad_request(
            Course::get_resource_type(),
            "Course is not available for enrollment.",
        ));
    }

    let enrollment = Enrollment::create(
        state.pool(),
        EnrollmentCreate {
            user_id: user.user_id(),
            course_id: course.id(),
        },
    )
    .await
    .map_err(enrollment_error)?;

    tracing::info!(course_id = %course.id(), user_id = %user.user_id(), "enrolled");
    state.events().publish(DomainEvent::Enrolled {
        user_id: user.user_id(),
        course_id: course.id(),
        course_title: course.title().to_string(),
    });

    Ok(ApiResponse::created(enrollment).with_message("Enrolled successfully."))
}

#[utoipa::path(
    get,
    path = "/api/enrollments/mine",
    responses(
        (status = 200, description = "Own enrollments", body = Vec<Enrollment>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "enrollments"
)]
async fn enrollments_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollments = Enrollment::by_user(state.pool(), user.user_id())
        .await
        .map_err(enrollment_error)?;
    Ok(ApiResponse::ok(enrollments))
}

#[utoipa::path(
    get,
    path = "/api/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment found", body = Enrollment),
        (status = 403, description = "Not the student, instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "enrollments"
)]
async fn enrollments_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = super::fetch::<Enrollment>(&state, id).await?;
    super::guard(
        user,
        &enrollment,
        Relation::OwnerOrSubject(enrollment.user_id()),
    )?;

    Ok(ApiResponse::ok(enrollment))
}

#[utoipa::path(
    delete,
    path = "/api/enrollments/{id}",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    description = "Leaves a course. Lesson progress is kept.",
    responses(
        (status = 200, description = "Unenrolled"),
        (status = 403, description = "Not the student or an admin", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "enrollments"
)]
async fn enrollments_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = super::fetch::<Enrollment>(&state, id).await?;

    // the instructor owns the record but may not remove students
    if !check_access(user, enrollment.user_id(), Relation::Owner).is_allowed() {
        return Err(WebError::resource_forbidden(
            Enrollment::get_resource_type(),
        ));
    }

    Enrollment::delete(state.pool(), id)
        .await
        .map_err(enrollment_error)?;

    tracing::info!(enrollment_id = %id, "unenrolled");
    Ok(ApiResponse::message("Unenrolled successfully."))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/enrollments",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Students of the course", body = Vec<EnrollmentWithStudent>),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "enrollments"
)]
async fn enrollments_by_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, id).await?;
    super::guard(user, &course, Relation::Owner)?;

    let enrollments = Enrollment::by_course(state.pool(), id)
        .await
        .map_err(enrollment_error)?;
    Ok(ApiResponse::ok(enrollments))
}
