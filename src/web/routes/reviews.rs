use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, Relation, ResourceTyped,
        entity::{Course, CourseReviews, Enrollment, Review, ReviewCreate},
    },
    web::{
        ApiResponse, AppState, RequestContext, WebError, WebResult,
        dto::{
            PaginationQuery, ValidatedJson,
            reviews::{CanReviewResponse, HelpfulResponse, ReviewBody, ReviewUpdateBody},
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/api/courses/{id}/reviews",
            get(reviews_list_handler).post(reviews_create_handler),
        )
        .route(
            "/api/courses/{id}/reviews/can-review",
            get(reviews_can_review_handler),
        )
        .route(
            "/api/reviews/{id}",
            put(reviews_update_handler).delete(reviews_delete_handler),
        )
        .route("/api/reviews/{id}/helpful", post(reviews_helpful_handler))
        .with_state(state)
}

fn review_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Review::get_resource_type(), e)
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/reviews",
    params(("id" = Uuid, Path, description = "Course id"), PaginationQuery),
    description = "Reviews of a course, most helpful first, with the average rating",
    responses(
        (status = 200, description = "Requested page", body = CourseReviews),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "reviews"
)]
async fn reviews_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Query(page): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let course = super::fetch::<Course>(&state, course_id).await?;
    super::ensure_visible(&ctx, &course)?;

    let reviews = Review::by_course(state.pool(), course_id, page.limit(), page.offset())
        .await
        .map_err(review_error)?;
    Ok(ApiResponse::ok(reviews))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}/reviews/can-review",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Whether the requester may review", body = CanReviewResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
async fn reviews_can_review_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, course_id).await?;

    let is_enrolled = Enrollment::is_enrolled(state.pool(), user.user_id(), course.id())
        .await
        .map_err(review_error)?;
    let has_review = Review::find_live(state.pool(), user.user_id(), course.id())
        .await
        .map_err(review_error)?
        .is_some();

    Ok(ApiResponse::ok(CanReviewResponse::new(is_enrolled, has_review)))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/reviews",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = ReviewBody,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Already reviewed", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
async fn reviews_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReviewBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = super::fetch::<Course>(&state, course_id).await?;

    let is_enrolled = Enrollment::is_enrolled(state.pool(), user.user_id(), course.id())
        .await
        .map_err(review_error)?;
    if !is_enrolled {
        return Err(WebError::resource_forbidden(Review::get_resource_type()));
    }

    let review = Review::create(
        state.pool(),
        ReviewCreate {
            user_id: user.user_id(),
            course_id: course.id(),
            rating: payload.rating,
            review_text: payload.review_text.trim().to_string(),
        },
    )
    .await
    .map_err(review_error)?;

    tracing::info!(course_id = %course.id(), rating = review.rating(), "review created");
    Ok(ApiResponse::created(review).with_message("Review submitted successfully."))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = ReviewUpdateBody,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
async fn reviews_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReviewUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let review = super::fetch::<Review>(&state, id).await?;
    super::guard(user, &review, Relation::Owner)?;

    let updated = Review::update(state.pool(), id, payload.into())
        .await
        .map_err(review_error)?
        .ok_or_else(|| WebError::resource_not_found(Review::get_resource_type()))?;
    Ok(ApiResponse::ok(updated).with_message("Review updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review id")),
    description = "Hides the review; the author may write a new one afterwards",
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
async fn reviews_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let review = super::fetch::<Review>(&state, id).await?;
    super::guard(user, &review, Relation::Owner)?;

    Review::delete(state.pool(), id).await.map_err(review_error)?;
    tracing::info!(review_id = %id, course_id = %review.course_id(), "review deleted");
    Ok(ApiResponse::message("Review deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/reviews/{id}/helpful",
    params(("id" = Uuid, Path, description = "Review id")),
    description = "Marks the review as helpful, or removes an earlier mark",
    responses(
        (status = 200, description = "Mark toggled", body = HelpfulResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
async fn reviews_helpful_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let (review, action) = Review::toggle_helpful(state.pool(), id, user.user_id())
        .await
        .map_err(review_error)?;
    Ok(ApiResponse::ok(HelpfulResponse { review, action }))
}
