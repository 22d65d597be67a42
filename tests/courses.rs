mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{data, id_of, setup_app};

#[tokio::test]
async fn course_review_workflow() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    // students do not author courses
    app.post(
        &student,
        "/api/courses",
        json!({
            "title": "Nope",
            "description": "Students cannot author.",
            "category": "design",
            "level": "all",
        }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .post(
            &instructor,
            "/api/courses",
            json!({
                "title": "Async Rust",
                "description": "Futures and executors.",
                "category": "programming",
                "level": "advanced",
                "price": 19.5,
            }),
        )
        .await;
    resp.assert_status(StatusCode::CREATED);
    let course = data(&resp);
    assert_eq!(course["status"], "draft");
    assert_eq!(course["is_published"], false);
    let course_id = id_of(&course);

    // drafts stay out of the catalogue and hidden from others
    let catalogue = data(&app.server.get("/api/courses").await);
    assert_eq!(catalogue["total"], 0);
    app.get(&student, &format!("/api/courses/{course_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.get(&instructor, &format!("/api/courses/{course_id}"))
        .await
        .assert_status_ok();

    // approval needs a pending course
    app.post(&admin, &format!("/api/courses/{course_id}/approve"), json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.post(&instructor, &format!("/api/courses/{course_id}/submit"), json!({}))
        .await
        .assert_status_ok();
    let pending = data(&app.get(&admin, "/api/courses/pending").await);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    app.post(&instructor, &format!("/api/courses/{course_id}/approve"), json!({}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let approved = data(
        &app.post(&admin, &format!("/api/courses/{course_id}/approve"), json!({}))
            .await,
    );
    assert_eq!(approved["status"], "approved");
    assert_eq!(approved["is_published"], true);

    let catalogue = data(&app.server.get("/api/courses").await);
    assert_eq!(catalogue["total"], 1);
    assert_eq!(catalogue["items"][0]["instructor_name"], "Ivy");
}

#[tokio::test]
async fn rejected_course_keeps_the_reason() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;

    let resp = app
        .post(
            &instructor,
            "/api/courses",
            json!({
                "title": "Half Done",
                "description": "Not quite ready yet.",
                "category": "other",
                "level": "all",
            }),
        )
        .await;
    let course_id = id_of(&data(&resp));
    app.post(&instructor, &format!("/api/courses/{course_id}/submit"), json!({}))
        .await
        .assert_status_ok();

    let rejected = data(
        &app.post(
            &admin,
            &format!("/api/courses/{course_id}/reject"),
            json!({ "reason": "Needs more lessons" }),
        )
        .await,
    );
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["rejection_reason"], "Needs more lessons");

    // publishing without approval fails
    app.post(&instructor, &format!("/api/courses/{course_id}/publish"), json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_owner_cannot_add_modules() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let owner = app.register("Ivy", "instructor").await;
    let other = app.register("Oscar", "instructor").await;
    let course_id = app.published_course(&owner, &admin).await;

    app.post(
        &other,
        "/api/modules",
        json!({ "course_id": course_id, "title": "Sneaky" }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    let modules = data(
        &app.server
            .get(&format!("/api/courses/{course_id}/modules"))
            .await,
    );
    assert_eq!(modules.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn modules_are_ordered_and_reorderable() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let owner = app.register("Ivy", "instructor").await;
    let course_id = app.published_course(&owner, &admin).await;

    let first = app.module(&owner, course_id, "Basics").await;
    let second = app.module(&owner, course_id, "Traits").await;
    let third = app.module(&owner, course_id, "Async").await;

    app.post(
        &owner,
        &format!("/api/modules/{third}/reorder"),
        json!({ "new_order_index": 0 }),
    )
    .await
    .assert_status_ok();

    let modules = data(
        &app.server
            .get(&format!("/api/courses/{course_id}/modules"))
            .await,
    );
    let order: Vec<(String, i64)> = modules
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["id"].as_str().unwrap().to_string(), m["order_index"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![
            (third.to_string(), 0),
            (first.to_string(), 1),
            (second.to_string(), 2),
        ]
    );
}

#[tokio::test]
async fn video_lessons_keep_their_url() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let owner = app.register("Ivy", "instructor").await;
    let course_id = app.published_course(&owner, &admin).await;
    let module_id = app.module(&owner, course_id, "Basics").await;
    let lesson_id = app.lesson(&owner, module_id, "Ownership").await;
    let path = format!("/api/lessons/{lesson_id}");

    let resp = app.put(&owner, &path, json!({ "content_type": "video" })).await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json::<Value>()["errors"]["video_url"].is_array());
    let lesson = data(&app.get(&owner, &path).await);
    assert_eq!(lesson["content_type"], "text");

    let lesson = data(
        &app.put(
            &owner,
            &path,
            json!({ "content_type": "video", "video_url": "https://videos.example.com/ownership" }),
        )
        .await,
    );
    assert_eq!(lesson["content_type"], "video");

    // the stored url satisfies later edits
    app.put(&owner, &path, json!({ "title": "Ownership in depth" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn enrollment_rules() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let owner = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;
    let course_id = app.published_course(&owner, &admin).await;

    let enrollment = app.enroll(&student, course_id).await;
    assert_eq!(enrollment["status"], "active");
    assert_eq!(enrollment["progress"], 0);

    app.post(&student, "/api/enrollments", json!({ "course_id": course_id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let mine = data(&app.get(&student, "/api/enrollments/mine").await);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    // the instructor sees the roster but cannot unenroll students
    let roster = data(
        &app.get(&owner, &format!("/api/courses/{course_id}/enrollments"))
            .await,
    );
    assert_eq!(roster.as_array().unwrap().len(), 1);
    let enrollment_id = id_of(&enrollment);
    app.server
        .delete(&format!("/api/enrollments/{enrollment_id}"))
        .authorization_bearer(&owner.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .delete(&format!("/api/enrollments/{enrollment_id}"))
        .authorization_bearer(&student.token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn draft_courses_cannot_be_joined() {
    let app = setup_app().await;
    let owner = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let resp = app
        .post(
            &owner,
            "/api/courses",
            json!({
                "title": "Draft",
                "description": "Still being written.",
                "category": "other",
                "level": "all",
            }),
        )
        .await;
    let course_id = id_of(&data(&resp));

    let resp = app
        .post(&student, "/api/enrollments", json!({ "course_id": course_id }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["success"], false);
}
