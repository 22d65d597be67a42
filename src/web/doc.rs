use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::routes::{
    assignments, auth, courses, enrollments, files, health, lessons, modules, notifications,
    quizzes, reviews, users,
};

/// Access tokens travel as `Authorization: Bearer`, browsers may use the `SID` cookie instead.
pub struct SecurityModifier;

impl Modify for SecurityModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from login, register or refresh"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "SID",
                    "Access token set on login",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Academy API", description = "Courses, lessons, quizzes and assignments"),
    paths(
        health::health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::profile_handler,
        auth::password_handler,
        auth::google_redirect_handler,
        auth::google_callback_handler,
        users::users_list_handler,
        users::users_get_handler,
        users::users_role_handler,
        users::users_delete_handler,
        courses::courses_catalogue_handler,
        courses::courses_get_handler,
        courses::courses_create_handler,
        courses::courses_update_handler,
        courses::courses_delete_handler,
        courses::courses_submit_handler,
        courses::courses_approve_handler,
        courses::courses_reject_handler,
        courses::courses_publish_handler,
        courses::courses_unpublish_handler,
        courses::courses_pending_handler,
        courses::courses_mine_handler,
        courses::courses_enrolled_handler,
        courses::courses_analytics_handler,
        courses::courses_announcement_handler,
        courses::courses_progress_handler,
        modules::modules_list_handler,
        modules::modules_get_handler,
        modules::modules_create_handler,
        modules::modules_update_handler,
        modules::modules_delete_handler,
        modules::modules_reorder_handler,
        lessons::lessons_list_handler,
        lessons::lessons_get_handler,
        lessons::lessons_create_handler,
        lessons::lessons_update_handler,
        lessons::lessons_delete_handler,
        lessons::lessons_reorder_handler,
        lessons::lessons_complete_handler,
        quizzes::quizzes_by_lesson_handler,
        quizzes::quizzes_create_handler,
        quizzes::quizzes_get_handler,
        quizzes::quizzes_update_handler,
        quizzes::quizzes_publish_handler,
        quizzes::quizzes_unpublish_handler,
        quizzes::quizzes_delete_handler,
        quizzes::questions_create_handler,
        quizzes::questions_update_handler,
        quizzes::questions_delete_handler,
        quizzes::attempts_submit_handler,
        quizzes::attempts_mine_handler,
        quizzes::attempts_list_handler,
        quizzes::quizzes_statistics_handler,
        assignments::assignments_by_lesson_handler,
        assignments::assignments_create_handler,
        assignments::assignments_get_handler,
        assignments::assignments_update_handler,
        assignments::assignments_publish_handler,
        assignments::assignments_unpublish_handler,
        assignments::assignments_delete_handler,
        assignments::submissions_create_handler,
        assignments::submissions_list_handler,
        assignments::submissions_mine_handler,
        assignments::submissions_grade_handler,
        assignments::assignments_statistics_handler,
        assignments::assignments_upcoming_handler,
        enrollments::enrollments_create_handler,
        enrollments::enrollments_mine_handler,
        enrollments::enrollments_get_handler,
        enrollments::enrollments_delete_handler,
        enrollments::enrollments_by_course_handler,
        notifications::notifications_list_handler,
        notifications::notifications_unread_count_handler,
        notifications::notifications_read_handler,
        notifications::notifications_read_all_handler,
        notifications::notifications_delete_handler,
        notifications::notifications_clear_handler,
        notifications::notifications_system_handler,
        reviews::reviews_list_handler,
        reviews::reviews_can_review_handler,
        reviews::reviews_create_handler,
        reviews::reviews_update_handler,
        reviews::reviews_delete_handler,
        reviews::reviews_helpful_handler,
        files::files_upload_handler,
        files::files_delete_handler,
        files::files_allowed_types_handler,
    ),
    components(schemas(crate::web::error::ErrorResponse, crate::web::UserRole)),
    modifiers(&SecurityModifier),
    tags(
        (name = "auth", description = "Sign up, sign in and sessions"),
        (name = "courses", description = "Course catalogue, authoring and review workflow"),
        (name = "quizzes", description = "Quizzes, questions and graded attempts"),
        (name = "assignments", description = "Assignments, submissions and grading"),
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/auth/login",
            "/api/courses/{id}/submit",
            "/api/lessons/{id}/complete",
            "/api/quizzes/{id}/attempts",
            "/api/submissions/{id}/grade",
            "/api/files",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
