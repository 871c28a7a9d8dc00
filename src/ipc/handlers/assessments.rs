use crate::db::{self, NewAssessment, NewItem};
use crate::error::GradeError;
use crate::ipc::helpers::{
    get_required_str, parse_params, require_db, respond, to_json, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, AssessmentItem};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentView<'a> {
    #[serde(flatten)]
    assessment: &'a Assessment,
    total_points: f64,
    items: Vec<&'a AssessmentItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TermWeight<'a> {
    term: &'a str,
    total_weight: f64,
}

fn handle_assessments_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let class_id = get_required_str(&req.params, "classId")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(GradeError::not_found("class", &class_id).into());
    }
    let assessments = db::load_class_assessments(conn, &class_id)?;
    let items = db::load_class_items(conn, &class_id)?;

    let mut weights: BTreeMap<&str, f64> = BTreeMap::new();
    let views: Vec<AssessmentView<'_>> = assessments
        .iter()
        .map(|a| {
            *weights.entry(a.term.as_str()).or_default() += a.weight_percent;
            let own: Vec<&AssessmentItem> =
                items.iter().filter(|i| i.assessment_id == a.id).collect();
            AssessmentView {
                assessment: a,
                total_points: own.iter().map(|i| i.max_score).sum(),
                items: own,
            }
        })
        .collect();
    let term_weights: Vec<TermWeight<'_>> = weights
        .into_iter()
        .map(|(term, total_weight)| TermWeight { term, total_weight })
        .collect();

    Ok(json!({
        "classId": class_id,
        "assessments": to_json(&views)?,
        "termWeights": to_json(&term_weights)?,
    }))
}

fn handle_assessments_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: NewAssessment = parse_params(&req.params, "assessment")?;
    let created = db::create_assessment(conn, &input)?;
    to_json(&created)
}

fn handle_assessments_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let assessment_id = get_required_str(&req.params, "assessmentId")?;
    let input: NewAssessment = parse_params(&req.params, "assessment")?;
    let updated = db::update_assessment(conn, &assessment_id, &input)?;
    to_json(&updated)
}

fn handle_assessments_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let assessment_id = get_required_str(&req.params, "assessmentId")?;
    db::delete_assessment(conn, &assessment_id)?;
    Ok(json!({ "assessmentId": assessment_id, "deleted": true }))
}

fn handle_items_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: NewItem = parse_params(&req.params, "item")?;
    let item = db::create_item(conn, &input)?;
    to_json(&item)
}

fn handle_items_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let item_id = get_required_str(&req.params, "itemId")?;
    db::delete_item(conn, &item_id)?;
    Ok(json!({ "itemId": item_id, "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assessments.list" => handle_assessments_list(state, req),
        "assessments.create" => handle_assessments_create(state, req),
        "assessments.update" => handle_assessments_update(state, req),
        "assessments.delete" => handle_assessments_delete(state, req),
        "items.create" => handle_items_create(state, req),
        "items.delete" => handle_items_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
