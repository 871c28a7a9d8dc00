mod test_support;

use assert_matches::assert_matches;
use gradebookd::db::{self, NewAssessment, NewItem};
use gradebookd::model::{AssessmentItem, Score};
use gradebookd::GradeError;
use test_support::{score, seeded_store};

fn quiz_item(conn: &rusqlite::Connection, class_id: &str, name: &str) -> AssessmentItem {
    let quizzes = db::create_assessment(
        conn,
        &NewAssessment {
            class_id: class_id.into(),
            term: "Prelim".into(),
            name: format!("{name} set"),
            weight_percent: 20.0,
        },
    )
    .expect("assessment");
    db::create_item(
        conn,
        &NewItem {
            assessment_id: quizzes.id,
            name: name.into(),
            max_score: 20.0,
        },
    )
    .expect("item")
}

#[test]
fn same_natural_key_keeps_one_row_with_the_latest_values() {
    let conn = seeded_store();
    let q1 = quiz_item(&conn, "c-math", "Q1");

    let first = db::upsert_scores(&conn, &[score("s1", &q1.id, "sc1", 12.0)]).expect("first");
    assert_eq!((first.created, first.updated), (1, 0));
    let second = db::upsert_scores(
        &conn,
        &[Score {
            remarks: Some("rechecked".into()),
            ..score("s1", &q1.id, "sc1", 17.0)
        }],
    )
    .expect("second");
    assert_eq!((second.created, second.updated), (0, 1));

    let stored = db::load_scores(&conn, "sc1").expect("load");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].points, 17.0);
    assert_eq!(stored[0].remarks.as_deref(), Some("rechecked"));
}

#[test]
fn failing_record_rolls_back_the_whole_batch() {
    let conn = seeded_store();
    let q1 = quiz_item(&conn, "c-math", "Q1");

    let result = db::upsert_scores(
        &conn,
        &[
            score("s1", &q1.id, "sc1", 10.0),
            score("s2", &q1.id, "sc3", 11.0),
            score("ghost", &q1.id, "sc1", 9.0),
        ],
    );
    assert_matches!(result, Err(GradeError::StudentNotFound(ref id)) if id == "ghost");
    assert_eq!(db::count_scores(&conn, "sc1").expect("count"), 0);
    assert_eq!(db::count_scores(&conn, "sc3").expect("count"), 0);
}

#[test]
fn references_are_checked_before_writing() {
    let conn = seeded_store();
    let math = quiz_item(&conn, "c-math", "Q1");
    let physics = quiz_item(&conn, "c-sci", "Lab 1");

    assert_matches!(
        db::upsert_scores(&conn, &[score("s1", "item-none", "sc1", 1.0)]),
        Err(GradeError::RecordNotFound { entity: "assessment item", .. })
    );
    assert_matches!(
        db::upsert_scores(&conn, &[score("s1", &math.id, "sc-none", 1.0)]),
        Err(GradeError::RecordNotFound { entity: "enrollment", .. })
    );
    // sc3 belongs to s2
    assert_matches!(
        db::upsert_scores(&conn, &[score("s1", &math.id, "sc3", 1.0)]),
        Err(GradeError::Validation(_))
    );
    // physics item scored under the math enrollment
    assert_matches!(
        db::upsert_scores(&conn, &[score("s1", &physics.id, "sc1", 1.0)]),
        Err(GradeError::Validation(_))
    );
    assert_matches!(
        db::upsert_scores(&conn, &[score("s1", &math.id, "sc1", -1.0)]),
        Err(GradeError::Validation(_))
    );
    assert_eq!(db::count_scores(&conn, "sc1").expect("count"), 0);
}

#[test]
fn latest_remark_follows_the_most_recent_write() {
    let conn = seeded_store();
    let q1 = quiz_item(&conn, "c-math", "Q1");
    let q2 = quiz_item(&conn, "c-math", "Q2");

    assert_eq!(db::latest_score_remark(&conn, "sc1").expect("none yet"), None);

    db::upsert_scores(
        &conn,
        &[Score {
            remarks: Some("Good start".into()),
            ..score("s1", &q1.id, "sc1", 15.0)
        }],
    )
    .expect("q1");
    db::upsert_scores(
        &conn,
        &[Score {
            remarks: Some("Needs review".into()),
            ..score("s1", &q2.id, "sc1", 8.0)
        }],
    )
    .expect("q2");
    assert_eq!(
        db::latest_score_remark(&conn, "sc1").expect("remark").as_deref(),
        Some("Needs review")
    );

    db::upsert_scores(
        &conn,
        &[Score {
            remarks: Some("Improved".into()),
            ..score("s1", &q1.id, "sc1", 19.0)
        }],
    )
    .expect("q1 again");
    assert_eq!(
        db::latest_score_remark(&conn, "sc1").expect("remark").as_deref(),
        Some("Improved")
    );
}

#[test]
fn roster_sync_is_repeatable_and_checks_references() {
    let conn = seeded_store();
    let again = db::roster_sync(&conn, &test_support::roster()).expect("resync");
    assert_eq!(again.enrollments, 4);
    assert_eq!(db::class_enrollments(&conn, "c-math").expect("math").len(), 2);

    let mut bad = test_support::roster();
    bad.enrollments[0].student_id = "ghost".into();
    bad.enrollments[0].student_class_id = "sc-ghost".into();
    assert_matches!(db::roster_sync(&conn, &bad), Err(GradeError::StudentNotFound(_)));
}
