use crate::gradebook;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, require_db, respond, to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};

fn handle_grades_resolve(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let class_id = get_required_str(&req.params, "classId")?;
    let resolved =
        gradebook::resolve_student_class(conn, &student_id, &class_id, state.passing_grade)?;
    to_json(&resolved)
}

fn handle_grades_class(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let class_id = get_required_str(&req.params, "classId")?;
    let grades = gradebook::class_grades(conn, &class_id, state.passing_grade)?;
    to_json(&grades)
}

fn handle_grades_gwa(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let term = get_optional_str(&req.params, "term");
    let report = gradebook::student_gwa(conn, &student_id, term.as_deref(), state.passing_grade)?;
    to_json(&report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.resolve" => handle_grades_resolve(state, req),
        "grades.class" => handle_grades_class(state, req),
        "grades.gwa" => handle_grades_gwa(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
