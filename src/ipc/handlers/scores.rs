use crate::db;
use crate::ipc::helpers::{parse_params, require_db, respond, to_json, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{FinalGrade, Score};

fn required_array<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, HandlerErr> {
    params
        .get(key)
        .filter(|v| v.is_array())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {} array", key)))
}

fn handle_scores_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let scores: Vec<Score> = parse_params(required_array(&req.params, "scores")?, "scores")?;
    let report = db::upsert_scores(conn, &scores)?;
    to_json(&report)
}

fn handle_final_grades_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let grades: Vec<FinalGrade> =
        parse_params(required_array(&req.params, "finalGrades")?, "finalGrades")?;
    let report = db::upsert_final_grades(conn, &grades)?;
    to_json(&report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "scores.upsert" => handle_scores_upsert(state, req),
        "finalGrades.upsert" => handle_final_grades_upsert(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
