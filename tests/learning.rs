mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::common::{Session, TestApp, data, id_of, setup_app};

/// A published quiz with two five point questions. Returns the quiz id and,
/// per question, `(question_id, correct_option, wrong_option)`.
async fn two_question_quiz(
    app: &TestApp,
    instructor: &Session,
    lesson_id: Uuid,
) -> (Uuid, Vec<(Uuid, Uuid, Uuid)>) {
    let resp = app
        .post(
            instructor,
            "/api/quizzes",
            json!({ "lesson_id": lesson_id, "title": "Checkpoint", "passing_score": 70 }),
        )
        .await;
    resp.assert_status(StatusCode::CREATED);
    let quiz_id = id_of(&data(&resp));

    for text in ["Is Rust memory safe?", "Does Rust have a GC?"] {
        app.post(
            instructor,
            &format!("/api/quizzes/{quiz_id}/questions"),
            json!({
                "question_text": text,
                "question_type": "true_false",
                "points": 5,
                "options": [
                    { "option_text": "Yes", "is_correct": text.starts_with("Is") },
                    { "option_text": "No", "is_correct": !text.starts_with("Is") },
                ],
            }),
        )
        .await
        .assert_status(StatusCode::CREATED);
    }

    app.post(instructor, &format!("/api/quizzes/{quiz_id}/publish"), json!({}))
        .await
        .assert_status_ok();

    // authors see which options are correct
    let view = data(&app.get(instructor, &format!("/api/quizzes/{quiz_id}")).await);
    let questions = view["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            let options = q["options"].as_array().unwrap();
            let pick = |correct: bool| {
                options
                    .iter()
                    .find(|o| o["is_correct"] == correct)
                    .map(id_of)
                    .unwrap()
            };
            (id_of(q), pick(true), pick(false))
        })
        .collect();
    (quiz_id, questions)
}

fn answers(picks: &[(Uuid, Uuid)]) -> Value {
    json!({
        "answers": picks
            .iter()
            .map(|(q, o)| json!({ "question_id": q, "selected_options": [o] }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn quiz_attempts_are_graded_and_passing_completes_the_lesson() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;
    let outsider = app.register("Olga", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let lesson_id = app.lesson(&instructor, module_id, "Ownership").await;
    let (quiz_id, questions) = two_question_quiz(&app, &instructor, lesson_id).await;
    app.enroll(&student, course_id).await;

    // students never see the answer key
    let view = data(&app.get(&student, &format!("/api/quizzes/{quiz_id}")).await);
    assert!(view["questions"][0]["options"][0].get("is_correct").is_none());

    let half = answers(&[
        (questions[0].0, questions[0].1),
        (questions[1].0, questions[1].2),
    ]);
    app.post(&outsider, &format!("/api/quizzes/{quiz_id}/attempts"), half.clone())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let resp = app
        .post(&student, &format!("/api/quizzes/{quiz_id}/attempts"), half)
        .await;
    resp.assert_status(StatusCode::CREATED);
    let report = data(&resp)["report"].clone();
    assert_eq!(report["total_points"], 10);
    assert_eq!(report["earned_points"], 5);
    assert_eq!(report["percentage"], 50.0);
    assert_eq!(report["passed"], false);

    let progress = data(
        &app.get(&student, &format!("/api/courses/{course_id}/progress"))
            .await,
    );
    assert_eq!(progress["completed_lesson_ids"].as_array().unwrap().len(), 0);

    let full = answers(&[
        (questions[0].0, questions[0].1),
        (questions[1].0, questions[1].1),
    ]);
    let resp = app
        .post(&student, &format!("/api/quizzes/{quiz_id}/attempts"), full)
        .await;
    resp.assert_status(StatusCode::CREATED);
    let report = data(&resp)["report"].clone();
    assert_eq!(report["percentage"], 100.0);
    assert_eq!(report["passed"], true);

    // the only lesson is done, so is the course
    let progress = data(
        &app.get(&student, &format!("/api/courses/{course_id}/progress"))
            .await,
    );
    assert_eq!(progress["completed_lesson_ids"][0], lesson_id.to_string());
    assert_eq!(progress["enrollment"]["progress"], 100);
    assert_eq!(progress["enrollment"]["status"], "completed");

    let mine = data(
        &app.get(&student, &format!("/api/quizzes/{quiz_id}/attempts/mine"))
            .await,
    );
    assert_eq!(mine.as_array().unwrap().len(), 2);

    let stats = data(
        &app.get(&instructor, &format!("/api/quizzes/{quiz_id}/statistics"))
            .await,
    );
    assert_eq!(stats["total_attempts"], 2);
    assert_eq!(stats["unique_users"], 1);
}

#[tokio::test]
async fn unpublished_quiz_is_hidden_from_students() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let lesson_id = app.lesson(&instructor, module_id, "Ownership").await;
    app.enroll(&student, course_id).await;

    let resp = app
        .post(
            &instructor,
            "/api/quizzes",
            json!({ "lesson_id": lesson_id, "title": "Draft quiz" }),
        )
        .await;
    let quiz_id = id_of(&data(&resp));

    app.post(
        &student,
        &format!("/api/quizzes/{quiz_id}/attempts"),
        json!({ "answers": [{ "question_id": Uuid::new_v4(), "selected_options": [] }] }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attempt_without_answers_scores_zero() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let lesson_id = app.lesson(&instructor, module_id, "Ownership").await;
    let (quiz_id, _) = two_question_quiz(&app, &instructor, lesson_id).await;
    app.enroll(&student, course_id).await;

    let resp = app
        .post(
            &student,
            &format!("/api/quizzes/{quiz_id}/attempts"),
            json!({ "answers": [] }),
        )
        .await;
    resp.assert_status(StatusCode::CREATED);
    let body = data(&resp);
    assert_eq!(body["report"]["total_points"], 10);
    assert_eq!(body["report"]["earned_points"], 0);
    assert_eq!(body["report"]["percentage"], 0.0);
    assert_eq!(body["report"]["passed"], false);

    let mine = data(
        &app.get(&student, &format!("/api/quizzes/{quiz_id}/attempts/mine"))
            .await,
    );
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["score"], 0.0);
    assert_eq!(mine[0]["passed"], false);
}

#[tokio::test]
async fn quiz_needs_questions_to_be_published() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let lesson_id = app.lesson(&instructor, module_id, "Ownership").await;
    app.enroll(&student, course_id).await;

    let resp = app
        .post(
            &instructor,
            "/api/quizzes",
            json!({ "lesson_id": lesson_id, "title": "Empty quiz" }),
        )
        .await;
    let empty_id = id_of(&data(&resp));
    app.post(&instructor, &format!("/api/quizzes/{empty_id}/publish"), json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let quiz = data(&app.get(&instructor, &format!("/api/quizzes/{empty_id}")).await);
    assert_eq!(quiz["is_published"], false);

    // removing every question takes a published quiz offline again
    let (quiz_id, questions) = two_question_quiz(&app, &instructor, lesson_id).await;
    app.delete(&instructor, &format!("/api/questions/{}", questions[0].0))
        .await
        .assert_status_ok();
    let quiz = data(&app.get(&instructor, &format!("/api/quizzes/{quiz_id}")).await);
    assert_eq!(quiz["is_published"], true);

    app.delete(&instructor, &format!("/api/questions/{}", questions[1].0))
        .await
        .assert_status_ok();
    let quiz = data(&app.get(&instructor, &format!("/api/quizzes/{quiz_id}")).await);
    assert_eq!(quiz["is_published"], false);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 0);

    app.get(&student, &format!("/api/quizzes/{quiz_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lesson_completion_tracks_course_progress() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let mut lessons = Vec::new();
    for title in ["One", "Two", "Three"] {
        lessons.push(app.lesson(&instructor, module_id, title).await);
    }

    // not enrolled yet
    app.post(&student, &format!("/api/lessons/{}/complete", lessons[0]), json!({}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let enrollment = app.enroll(&student, course_id).await;
    let enrollment_id = id_of(&enrollment);

    let resp = app
        .post(&student, &format!("/api/lessons/{}/complete", lessons[0]), json!({}))
        .await;
    resp.assert_status_ok();
    let body = data(&resp);
    assert_eq!(body["course_progress"]["completed_lessons"], 1);
    assert_eq!(body["course_progress"]["total_lessons"], 3);
    assert_eq!(body["course_progress"]["percentage"], 33);
    assert_eq!(body["course_completed"], false);

    // completing twice changes nothing
    let again = data(
        &app.post(&student, &format!("/api/lessons/{}/complete", lessons[0]), json!({}))
            .await,
    );
    assert_eq!(again["course_progress"]["completed_lessons"], 1);
    assert_eq!(
        again["lesson"]["completed_at"],
        body["lesson"]["completed_at"]
    );

    app.post(&student, &format!("/api/lessons/{}/complete", lessons[1]), json!({}))
        .await
        .assert_status_ok();
    let last = data(
        &app.post(&student, &format!("/api/lessons/{}/complete", lessons[2]), json!({}))
            .await,
    );
    assert_eq!(last["course_progress"]["percentage"], 100);
    assert_eq!(last["course_completed"], true);

    let enrollment = data(
        &app.get(&student, &format!("/api/enrollments/{enrollment_id}"))
            .await,
    );
    assert_eq!(enrollment["progress"], 100);
    assert_eq!(enrollment["status"], "completed");
    assert!(enrollment["completed_at"].is_string());
}

#[tokio::test]
async fn assignment_submissions_and_grading() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let instructor = app.register("Ivy", "instructor").await;
    let student = app.register("Sam", "student").await;

    let course_id = app.published_course(&instructor, &admin).await;
    let module_id = app.module(&instructor, course_id, "Basics").await;
    let lesson_id = app.lesson(&instructor, module_id, "Ownership").await;
    app.enroll(&student, course_id).await;

    let create = |title: &'static str, due: chrono::DateTime<Utc>| {
        json!({
            "lesson_id": lesson_id,
            "title": title,
            "instructions": "Explain the borrow checker.",
            "due_date": due,
            "max_score": 50,
        })
    };

    let mut ids = Vec::new();
    for (title, due) in [
        ("Overdue essay", Utc::now() - Duration::days(1)),
        ("Future essay", Utc::now() + Duration::days(3)),
    ] {
        let resp = app.post(&instructor, "/api/assignments", create(title, due)).await;
        resp.assert_status(StatusCode::CREATED);
        let id = id_of(&data(&resp));
        app.post(&instructor, &format!("/api/assignments/{id}/publish"), json!({}))
            .await
            .assert_status_ok();
        ids.push(id);
    }
    let (overdue, future) = (ids[0], ids[1]);

    // text assignments need content
    app.post(
        &student,
        &format!("/api/assignments/{future}/submissions"),
        json!({ "file_url": "https://example.com/essay.pdf" }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let late = data(
        &app.post(
            &student,
            &format!("/api/assignments/{overdue}/submissions"),
            json!({ "content": "It tracks lifetimes." }),
        )
        .await,
    );
    assert_eq!(late["is_late"], true);

    let on_time = data(
        &app.post(
            &student,
            &format!("/api/assignments/{future}/submissions"),
            json!({ "content": "It tracks lifetimes." }),
        )
        .await,
    );
    assert_eq!(on_time["is_late"], false);
    assert_eq!(on_time["status"], "submitted");

    // resubmitting replaces the earlier submission
    let replaced = data(
        &app.post(
            &student,
            &format!("/api/assignments/{future}/submissions"),
            json!({ "content": "It tracks lifetimes and aliasing." }),
        )
        .await,
    );
    assert_eq!(replaced["id"], on_time["id"]);
    let submission_id = id_of(&replaced);

    let upcoming = data(&app.get(&student, "/api/assignments/upcoming").await);
    let upcoming: Vec<Uuid> = upcoming.as_array().unwrap().iter().map(id_of).collect();
    assert_eq!(upcoming, vec![future]);

    app.post(
        &student,
        &format!("/api/submissions/{submission_id}/grade"),
        json!({ "score": 40 }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

    app.post(
        &instructor,
        &format!("/api/submissions/{submission_id}/grade"),
        json!({ "score": 51 }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let graded = data(
        &app.post(
            &instructor,
            &format!("/api/submissions/{submission_id}/grade"),
            json!({ "score": 45, "feedback": "Solid." }),
        )
        .await,
    );
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["score"], 45);
    assert_eq!(graded["feedback"], "Solid.");
}
