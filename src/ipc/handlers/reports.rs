use crate::gradebook;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, require_db, respond, to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};

fn handle_student_card(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let term = get_optional_str(&req.params, "term");
    let card = gradebook::student_card(conn, &student_id, term.as_deref(), state.passing_grade)?;
    to_json(&card)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.studentCard" => handle_student_card(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
