use std::any::Any;

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::{
    Config,
    model::{
        CrudRepository, HasOwner, Relation, ResourceTyped, authorize,
        entity::{Course, Enrollment},
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult, doc::ApiDoc,
        error::ErrorResponse, middlewares,
    },
};

pub mod assignments;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod files;
pub mod health;
pub mod lessons;
pub mod modules;
pub mod notifications;
pub mod quizzes;
pub mod reviews;
pub mod users;

pub fn build_app<S: Send + Sync + Clone + 'static>(state: AppState) -> Router<S> {
    let config = state.config();

    let api = Router::new()
        .merge(auth::routes(state.clone()))
        .merge(users::routes(state.clone()))
        .merge(courses::routes(state.clone()))
        .merge(modules::routes(state.clone()))
        .merge(lessons::routes(state.clone()))
        .merge(quizzes::routes(state.clone()))
        .merge(assignments::routes(state.clone()))
        .merge(enrollments::routes(state.clone()))
        .merge(notifications::routes(state.clone()))
        .merge(reviews::routes(state.clone()))
        .merge(files::routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::rate_limit_fn,
        ));

    let mut router = Router::new()
        .merge(api)
        .merge(health::routes(state.clone()))
        .nest_service(
            config.uploads().public_path(),
            ServeDir::new(config.uploads().dir()),
        );

    if config.app().docs() {
        router = router.merge(
            SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()),
        );
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .layer(CookieManagerLayer::default())
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .app()
        .cors_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    tracing::error!(%detail, "request handler panicked");

    let body = ErrorResponse {
        success: false,
        message: Some(String::from("Internal server error.")),
        errors: None,
        error: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Loads a row by id, answering 404 when it does not exist.
pub(crate) async fn fetch<T>(state: &AppState, id: Uuid) -> WebResult<T>
where
    T: CrudRepository<Id = Uuid>,
{
    T::find_by_id(state.pool(), id)
        .await
        .map_err(|e| WebError::resource_fetch_error(T::get_resource_type(), e))?
        .ok_or_else(|| WebError::resource_not_found(T::get_resource_type()))
}

/// Applies the access policy to a loaded resource, answering 403 on denial.
pub(crate) fn guard<T>(user: &AuthenticatedUser, resource: &T, relation: Relation) -> WebResult<()>
where
    T: HasOwner + ResourceTyped,
{
    authorize(user, resource, relation)
        .map_err(|e| WebError::resource_fetch_error(T::get_resource_type(), e))
}

/// Owner, admin or a student enrolled in `course_id`.
pub(crate) async fn guard_member<T>(
    state: &AppState,
    user: &AuthenticatedUser,
    resource: &T,
    course_id: Uuid,
) -> WebResult<()>
where
    T: HasOwner + ResourceTyped,
{
    let is_member = if user.is_admin() || user.user_id() == resource.owner_id() {
        true
    } else {
        Enrollment::is_enrolled(state.pool(), user.user_id(), course_id)
            .await
            .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?
    };
    guard(user, resource, Relation::OwnerOrMember { is_member })
}

/// Unpublished courses and their content exist only for the instructor and admins.
pub(crate) fn ensure_visible(ctx: &RequestContext, course: &Course) -> WebResult<()> {
    if course.is_published() {
        return Ok(());
    }
    match ctx.maybe_user() {
        Some(user) if guard(user, course, Relation::Owner).is_ok() => Ok(()),
        _ => Err(WebError::resource_not_found(Course::get_resource_type())),
    }
}
