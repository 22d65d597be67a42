use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    events::DomainEvent,
    model::{
        CrudRepository, Relation, ResourceTyped,
        entity::{
            Enrollment, Lesson, Quiz, QuizAttempt, QuizAttemptWithStudent, QuizQuestion,
            QuizStatistics, QuizUpdate, QuizView, validate_options,
        },
        grading, progress,
    },
    web::{
        ApiResponse, AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        dto::{
            ValidatedJson,
            quizzes::{
                AttemptBody, AttemptResponse, QuestionCreateBody, QuestionUpdateBody,
                QuizCreateBody, QuizUpdateBody,
            },
        },
        error::ErrorResponse,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/api/lessons/{id}/quizzes", get(quizzes_by_lesson_handler))
        .route("/api/quizzes", post(quizzes_create_handler))
        .route(
            "/api/quizzes/{id}",
            get(quizzes_get_handler)
                .put(quizzes_update_handler)
                .delete(quizzes_delete_handler),
        )
        .route("/api/quizzes/{id}/publish", post(quizzes_publish_handler))
        .route("/api/quizzes/{id}/unpublish", post(quizzes_unpublish_handler))
        .route("/api/quizzes/{id}/questions", post(questions_create_handler))
        .route(
            "/api/questions/{id}",
            put(questions_update_handler).delete(questions_delete_handler),
        )
        .route(
            "/api/quizzes/{id}/attempts",
            get(attempts_list_handler).post(attempts_submit_handler),
        )
        .route("/api/quizzes/{id}/attempts/mine", get(attempts_mine_handler))
        .route("/api/quizzes/{id}/statistics", get(quizzes_statistics_handler))
        .with_state(state)
}

fn quiz_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(Quiz::get_resource_type(), e)
}

fn question_error(e: crate::model::DatabaseError) -> WebError {
    WebError::resource_fetch_error(QuizQuestion::get_resource_type(), e)
}

fn is_author(user: &AuthenticatedUser, quiz: &Quiz) -> bool {
    super::guard(user, quiz, Relation::Owner).is_ok()
}

/// Students reach a quiz only through an enrollment and only once it is published.
async fn ensure_takeable(state: &AppState, user: &AuthenticatedUser, quiz: &Quiz) -> WebResult<()> {
    let enrolled = Enrollment::is_enrolled(state.pool(), user.user_id(), quiz.course_id())
        .await
        .map_err(quiz_error)?;
    if !enrolled {
        return Err(WebError::resource_forbidden(Quiz::get_resource_type()));
    }
    if !quiz.is_published() {
        return Err(WebError::resource_not_found(Quiz::get_resource_type()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/quizzes",
    params(("id" = Uuid, Path, description = "Lesson id")),
    description = "Quizzes of a lesson. Students only see published ones.",
    responses(
        (status = 200, description = "Quizzes", body = Vec<Quiz>),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_by_lesson_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, lesson_id).await?;
    super::guard_member(&state, user, &lesson, lesson.course_id()).await?;

    let published_only = super::guard(user, &lesson, Relation::Owner).is_err();
    let quizzes = Quiz::by_lesson(state.pool(), lesson_id, published_only)
        .await
        .map_err(quiz_error)?;
    Ok(ApiResponse::ok(quizzes))
}

#[utoipa::path(
    post,
    path = "/api/quizzes",
    request_body = QuizCreateBody,
    description = "Creates an unpublished quiz for a lesson",
    responses(
        (status = 201, description = "Quiz created", body = Quiz),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Lesson not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<QuizCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let lesson = super::fetch::<Lesson>(&state, payload.lesson_id).await?;
    super::guard(user, &lesson, Relation::Owner)?;

    let quiz = Quiz::create(state.pool(), payload.into())
        .await
        .map_err(quiz_error)?;

    tracing::info!(quiz_id = %quiz.id(), lesson_id = %lesson.id(), "quiz created");
    Ok(ApiResponse::created(quiz).with_message("Quiz created successfully."))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    description = "Quiz with its questions. Correct options are only revealed to the instructor and admins.",
    responses(
        (status = 200, description = "Quiz found", body = QuizView),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;

    let reveal_answers = is_author(user, &quiz);
    if !reveal_answers {
        ensure_takeable(&state, user, &quiz).await?;
    }

    let view = quiz
        .view(state.pool(), reveal_answers)
        .await
        .map_err(quiz_error)?;
    Ok(ApiResponse::ok(view))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = QuizUpdateBody,
    responses(
        (status = 200, description = "Quiz updated", body = Quiz),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuizUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let quiz = update_owned(&ctx, &state, id, payload.into()).await?;
    Ok(ApiResponse::ok(quiz).with_message("Quiz updated successfully."))
}

async fn update_owned(
    ctx: &RequestContext,
    state: &AppState,
    id: Uuid,
    update: QuizUpdate,
) -> WebResult<Quiz> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(state, id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    Quiz::update(state.pool(), id, update)
        .await
        .map_err(quiz_error)?
        .ok_or_else(|| WebError::resource_not_found(Quiz::get_resource_type()))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/publish",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Quiz published", body = Quiz),
        (status = 400, description = "Quiz has no questions", body = ErrorResponse),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    let questions = Quiz::question_count(state.pool(), quiz.id())
        .await
        .map_err(quiz_error)?;
    if questions == 0 {
        return Err(WebError::resource_bad_request(
            Quiz::get_resource_type(),
            "Cannot publish a quiz with no questions.",
        ));
    }

    let update = QuizUpdate {
        is_published: Some(true),
        ..Default::default()
    };
    let quiz = Quiz::update(state.pool(), id, update)
        .await
        .map_err(quiz_error)?
        .ok_or_else(|| WebError::resource_not_found(Quiz::get_resource_type()))?;

    tracing::info!(quiz_id = %quiz.id(), questions, "quiz published");
    Ok(ApiResponse::ok(quiz).with_message("Quiz published successfully."))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Quiz unpublished", body = Quiz),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let update = QuizUpdate {
        is_published: Some(false),
        ..Default::default()
    };
    let quiz = update_owned(&ctx, &state, id, update).await?;
    Ok(ApiResponse::ok(quiz).with_message("Quiz unpublished successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "Quiz id")),
    description = "Deletes the quiz with its questions and attempts",
    responses(
        (status = 200, description = "Quiz deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    Quiz::delete(state.pool(), id).await.map_err(quiz_error)?;

    tracing::info!(quiz_id = %id, "quiz deleted");
    Ok(ApiResponse::message("Quiz deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/questions",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = QuestionCreateBody,
    responses(
        (status = 201, description = "Question added", body = QuizQuestion),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 422, description = "Invalid question or option set", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn questions_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuestionCreateBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, quiz_id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    validate_options(payload.question_type, &payload.options)
        .map_err(|reason| WebError::validation("options", reason))?;

    let question = Quiz::add_question(state.pool(), quiz_id, payload.into())
        .await
        .map_err(question_error)?;
    Ok(ApiResponse::created(question).with_message("Question added successfully."))
}

/// Loads a question together with its quiz and checks authorship.
async fn owned_question(
    ctx: &RequestContext,
    state: &AppState,
    id: Uuid,
) -> WebResult<(Quiz, QuizQuestion)> {
    let user = ctx.user()?;
    let question = Quiz::find_question(state.pool(), id)
        .await
        .map_err(question_error)?
        .ok_or_else(|| WebError::resource_not_found(QuizQuestion::get_resource_type()))?;
    let quiz = super::fetch::<Quiz>(state, question.quiz_id()).await?;
    super::guard(user, &quiz, Relation::Owner)?;
    Ok((quiz, question))
}

#[utoipa::path(
    put,
    path = "/api/questions/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    request_body = QuestionUpdateBody,
    description = "Updates a question. A new option list replaces the old one.",
    responses(
        (status = 200, description = "Question updated", body = QuizQuestion),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
        (status = 422, description = "Invalid question or option set", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn questions_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuestionUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let (_, question) = owned_question(&ctx, &state, id).await?;

    if let Some(options) = &payload.options {
        let question_type = match payload.question_type {
            Some(t) => t,
            None => question
                .question_type()
                .map_err(|reason| WebError::validation("question_type", reason))?,
        };
        validate_options(question_type, options)
            .map_err(|reason| WebError::validation("options", reason))?;
    }

    let updated = Quiz::update_question(state.pool(), &question, payload.into())
        .await
        .map_err(question_error)?;
    Ok(ApiResponse::ok(updated).with_message("Question updated successfully."))
}

#[utoipa::path(
    delete,
    path = "/api/questions/{id}",
    params(("id" = Uuid, Path, description = "Question id")),
    description = "Deletes a question. Removing the last question unpublishes the quiz.",
    responses(
        (status = 200, description = "Question deleted"),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn questions_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let (_, question) = owned_question(&ctx, &state, id).await?;

    let removal = Quiz::delete_question(state.pool(), &question)
        .await
        .map_err(question_error)?;
    if removal.quiz_unpublished {
        tracing::info!(quiz_id = %question.quiz_id(), "last question removed, quiz unpublished");
        return Ok(ApiResponse::message(
            "Question deleted successfully. The quiz has no questions left and was unpublished.",
        ));
    }
    Ok(ApiResponse::message("Question deleted successfully."))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz id")),
    request_body = AttemptBody,
    description = "Grades and records an attempt. A passing attempt completes the quiz lesson.",
    responses(
        (status = 201, description = "Attempt graded", body = AttemptResponse),
        (status = 400, description = "Quiz has no questions", body = ErrorResponse),
        (status = 403, description = "Not enrolled", body = ErrorResponse),
        (status = 404, description = "Quiz not found or unpublished", body = ErrorResponse),
        (status = 422, description = "Malformed answers", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn attempts_submit_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AttemptBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;
    ensure_takeable(&state, user, &quiz).await?;

    let questions = quiz
        .gradable_questions(state.pool())
        .await
        .map_err(quiz_error)?;
    if questions.is_empty() {
        return Err(WebError::resource_bad_request(
            Quiz::get_resource_type(),
            "Quiz has no questions.",
        ));
    }

    let report = grading::grade(&questions, &payload.answers, quiz.passing_score());
    let attempt = QuizAttempt::record(
        state.pool(),
        quiz.id(),
        user.user_id(),
        &report,
        &payload.answers,
    )
    .await
    .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;

    tracing::info!(
        quiz_id = %quiz.id(),
        user_id = %user.user_id(),
        score = report.percentage,
        passed = report.passed,
        "quiz attempt graded"
    );

    if report.passed {
        let lesson = super::fetch::<Lesson>(&state, quiz.lesson_id()).await?;
        let outcome = progress::complete_lesson(state.pool(), user.user_id(), &lesson)
            .await
            .map_err(quiz_error)?;

        state.events().publish(DomainEvent::QuizPassed {
            user_id: user.user_id(),
            quiz_id: quiz.id(),
            quiz_title: quiz.title().to_string(),
            score: report.percentage,
        });
        if outcome.course_completed {
            super::lessons::publish_course_completed(
                &state,
                user.user_id(),
                outcome.enrollment.as_ref(),
            );
        }
    }

    let message = if report.passed {
        "Quiz passed."
    } else {
        "Quiz not passed."
    };
    Ok(ApiResponse::created(AttemptResponse {
        attempt,
        report,
        passing_score: quiz.passing_score(),
    })
    .with_message(message))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/attempts/mine",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Own attempts, newest first", body = Vec<QuizAttempt>),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn attempts_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;

    let attempts = QuizAttempt::by_user(state.pool(), quiz.id(), user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;
    Ok(ApiResponse::ok(attempts))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "All attempts", body = Vec<QuizAttemptWithStudent>),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn attempts_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    let attempts = QuizAttempt::by_quiz(state.pool(), quiz.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(QuizAttempt::get_resource_type(), e))?;
    Ok(ApiResponse::ok(attempts))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}/statistics",
    params(("id" = Uuid, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Attempt statistics", body = QuizStatistics),
        (status = 403, description = "Not the course owner", body = ErrorResponse),
        (status = 404, description = "Quiz not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "quizzes"
)]
async fn quizzes_statistics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = super::fetch::<Quiz>(&state, id).await?;
    super::guard(user, &quiz, Relation::Owner)?;

    let statistics = QuizAttempt::statistics(state.pool(), quiz.id())
        .await
        .map_err(quiz_error)?;
    Ok(ApiResponse::ok(statistics))
}
