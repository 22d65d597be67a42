mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{Session, TestApp, data, id_of, setup_app};

/// Notifications are written by the event worker, so poll until they show up.
async fn wait_for_notifications(app: &TestApp, user: &Session, expected: usize) -> Value {
    for _ in 0..50 {
        let list = data(&app.get(user, "/api/notifications").await);
        if list["notifications"]["items"].as_array().unwrap().len() >= expected {
            return list;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {expected} notifications for {}", user.id);
}

#[tokio::test]
async fn enrollment_notifies_the_student() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;
    let course_id = app.published_course(&instructor, &admin).await;

    app.enroll(&student, course_id).await;

    let list = wait_for_notifications(&app, &student, 1).await;
    let enrollment = list["notifications"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["type"] == "enrollment")
        .cloned()
        .unwrap();
    assert_eq!(enrollment["is_read"], false);
    assert!(list["unread_count"].as_i64().unwrap() >= 1);

    let id = id_of(&enrollment);

    // private to the recipient
    app.put(&instructor, &format!("/api/notifications/{id}/read"), json!({}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let read = data(
        &app.put(&student, &format!("/api/notifications/{id}/read"), json!({}))
            .await,
    );
    assert_eq!(read["is_read"], true);

    app.put(&student, "/api/notifications/read-all", json!({}))
        .await
        .assert_status_ok();
    let count = data(&app.get(&student, "/api/notifications/unread-count").await);
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn system_announcement_reaches_the_selected_role() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    app.post(
        &instructor,
        "/api/notifications/system",
        json!({ "title": "Hello all", "message": "Instructors cannot broadcast." }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    app.post(
        &admin,
        "/api/notifications/system",
        json!({ "title": "Maintenance", "message": "Back soon.", "role": "instructor" }),
    )
    .await
    .assert_status(StatusCode::ACCEPTED);

    let list = wait_for_notifications(&app, &instructor, 1).await;
    assert_eq!(list["notifications"]["items"][0]["title"], "Maintenance");

    let student_list = data(&app.get(&student, "/api/notifications").await);
    assert!(
        student_list["notifications"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|n| n["title"] != "Maintenance")
    );
}
