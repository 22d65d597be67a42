mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{data, id_of, setup_app};

#[tokio::test]
async fn one_live_review_per_student_and_course() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;
    let course_id = app.published_course(&instructor, &admin).await;
    let reviews_path = format!("/api/courses/{course_id}/reviews");
    let can_review_path = format!("/api/courses/{course_id}/reviews/can-review");

    let check = data(&app.get(&student, &can_review_path).await);
    assert_eq!(check["can_review"], false);
    assert_eq!(check["reason"], "not_enrolled");
    app.post(&student, &reviews_path, json!({ "rating": 4, "review_text": "Nice." }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.enroll(&student, course_id).await;
    let check = data(&app.get(&student, &can_review_path).await);
    assert_eq!(check["can_review"], true);
    assert_eq!(check["reason"], Value::Null);

    app.post(&student, &reviews_path, json!({ "rating": 6 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .post(&student, &reviews_path, json!({ "rating": 5, "review_text": "Great course." }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let first_id = id_of(&data(&resp));

    app.post(&student, &reviews_path, json!({ "rating": 1 }))
        .await
        .assert_status(StatusCode::CONFLICT);
    let check = data(&app.get(&student, &can_review_path).await);
    assert_eq!(check["can_review"], false);
    assert_eq!(check["reason"], "already_reviewed");

    let list = data(&app.get(&student, &reviews_path).await);
    assert_eq!(list["reviews"]["total"], 1);
    assert_eq!(list["reviews"]["items"][0]["author_name"], "Sam");
    assert_eq!(list["average_rating"], 5.0);

    // only the author edits or deletes
    app.put(&instructor, &format!("/api/reviews/{first_id}"), json!({ "rating": 1 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let updated = data(
        &app.put(&student, &format!("/api/reviews/{first_id}"), json!({ "rating": 3 }))
            .await,
    );
    assert_eq!(updated["rating"], 3);

    app.delete(&instructor, &format!("/api/reviews/{first_id}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.delete(&student, &format!("/api/reviews/{first_id}"))
        .await
        .assert_status_ok();

    let list = data(&app.get(&student, &reviews_path).await);
    assert_eq!(list["reviews"]["total"], 0);
    assert_eq!(list["average_rating"], Value::Null);

    // a deleted review frees the slot for a new one
    let check = data(&app.get(&student, &can_review_path).await);
    assert_eq!(check["can_review"], true);
    let resp = app
        .post(&student, &reviews_path, json!({ "rating": 4, "review_text": "Second look." }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    assert_ne!(id_of(&data(&resp)), first_id);
}

#[tokio::test]
async fn helpful_mark_toggles() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;
    let reader = app.register("Rita", "student").await;
    let course_id = app.published_course(&instructor, &admin).await;
    app.enroll(&student, course_id).await;

    let resp = app
        .post(
            &student,
            &format!("/api/courses/{course_id}/reviews"),
            json!({ "rating": 5, "review_text": "Clear explanations." }),
        )
        .await;
    let review_id = id_of(&data(&resp));
    let helpful_path = format!("/api/reviews/{review_id}/helpful");

    let marked = data(&app.post(&reader, &helpful_path, json!({})).await);
    assert_eq!(marked["action"], "marked");
    assert_eq!(marked["review"]["helpful_count"], 1);

    let marked = data(&app.post(&instructor, &helpful_path, json!({})).await);
    assert_eq!(marked["review"]["helpful_count"], 2);

    let unmarked = data(&app.post(&reader, &helpful_path, json!({})).await);
    assert_eq!(unmarked["action"], "unmarked");
    assert_eq!(unmarked["review"]["helpful_count"], 1);

    app.delete(&student, &format!("/api/reviews/{review_id}"))
        .await
        .assert_status_ok();
    app.post(&reader, &helpful_path, json!({}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
