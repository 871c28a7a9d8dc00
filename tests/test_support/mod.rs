#![allow(dead_code)]

use gradebookd::db::{self, ClassRow, RosterSync, StudentRow};
use gradebookd::model::{Enrollment, Score};
use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .env_remove("GRADEBOOKD_PASSING_GRADE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the `error` object of a response that must have failed.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error object")
}

/// Three classes over two terms; `s1` takes all three, `s2` only math.
pub fn roster() -> RosterSync {
    let class = |id: &str, name: &str, term: &str| ClassRow {
        id: id.to_string(),
        name: name.to_string(),
        term: Some(term.to_string()),
    };
    let student = |id: &str, name: &str| StudentRow {
        id: id.to_string(),
        name: name.to_string(),
    };
    let enroll = |sc: &str, s: &str, c: &str| Enrollment {
        student_class_id: sc.to_string(),
        student_id: s.to_string(),
        class_id: c.to_string(),
    };
    RosterSync {
        classes: vec![
            class("c-math", "Mathematics", "1st Semester"),
            class("c-sci", "Physics", "1st Semester"),
            class("c-hist", "History", "2nd Semester"),
        ],
        students: vec![student("s1", "Dela Cruz, Juan"), student("s2", "Santos, Maria")],
        enrollments: vec![
            enroll("sc1", "s1", "c-math"),
            enroll("sc2", "s1", "c-sci"),
            enroll("sc3", "s2", "c-math"),
            enroll("sc4", "s1", "c-hist"),
        ],
    }
}

pub fn roster_json() -> serde_json::Value {
    json!({
        "classes": [
            { "id": "c-math", "name": "Mathematics", "term": "1st Semester" },
            { "id": "c-sci", "name": "Physics", "term": "1st Semester" },
            { "id": "c-hist", "name": "History", "term": "2nd Semester" }
        ],
        "students": [
            { "id": "s1", "name": "Dela Cruz, Juan" },
            { "id": "s2", "name": "Santos, Maria" }
        ],
        "enrollments": [
            { "studentClassId": "sc1", "studentId": "s1", "classId": "c-math" },
            { "studentClassId": "sc2", "studentId": "s1", "classId": "c-sci" },
            { "studentClassId": "sc3", "studentId": "s2", "classId": "c-math" },
            { "studentClassId": "sc4", "studentId": "s1", "classId": "c-hist" }
        ]
    })
}

pub fn seeded_store() -> Connection {
    let conn = db::open_in_memory().expect("open in-memory db");
    db::roster_sync(&conn, &roster()).expect("sync roster");
    conn
}

pub fn score(student_id: &str, item_id: &str, student_class_id: &str, points: f64) -> Score {
    Score {
        student_id: student_id.to_string(),
        assessment_item_id: item_id.to_string(),
        student_class_id: student_class_id.to_string(),
        points,
        total_score: None,
        remarks: None,
    }
}
