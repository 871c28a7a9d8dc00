use crate::calc::attendance::{monthly_trend, records_in_month, AttendanceFilter};
use crate::db::{self, RollCall};
use crate::error::GradeError;
use crate::gradebook;
use crate::ipc::helpers::{
    get_required_str, parse_params, require_db, respond, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceRecord;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterParams {
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    class_id: Option<String>,
    #[serde(default)]
    from: Option<NaiveDate>,
    #[serde(default)]
    to: Option<NaiveDate>,
}

impl FilterParams {
    fn into_filter(self) -> Result<AttendanceFilter, HandlerErr> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(HandlerErr::bad_params("from must not be after to"));
            }
        }
        Ok(AttendanceFilter {
            student_id: self.student_id,
            class_id: self.class_id,
            from: self.from,
            to: self.to,
        })
    }
}

fn student_filter(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<AttendanceFilter, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !db::student_exists(conn, &student_id)? {
        return Err(GradeError::StudentNotFound(student_id).into());
    }
    let mut filter = parse_params::<FilterParams>(params, "filter")?.into_filter()?;
    filter.student_id = Some(student_id);
    Ok(filter)
}

fn parse_month_key(month: &str) -> Result<(i32, u32), HandlerErr> {
    let Some((y, m)) = month.trim().split_once('-') else {
        return Err(HandlerErr::bad_params("month must be YYYY-MM"));
    };
    let year = y
        .parse::<i32>()
        .map_err(|_| HandlerErr::bad_params("month year must be numeric"))?;
    let month_num = m
        .parse::<u32>()
        .map_err(|_| HandlerErr::bad_params("month must be YYYY-MM"))?;
    if !(1..=12).contains(&month_num) {
        return Err(HandlerErr::bad_params("month must be between 01 and 12"));
    }
    Ok((year, month_num))
}

fn handle_attendance_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let record: AttendanceRecord = parse_params(&req.params, "attendance record")?;
    let outcome = db::upsert_attendance(conn, &record)?;
    Ok(json!({ "outcome": to_json(&outcome)? }))
}

fn handle_attendance_bulk_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let roll: RollCall = parse_params(&req.params, "roll call")?;
    let report = db::bulk_upsert_attendance(conn, &roll)?;
    to_json(&report)
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let filter = student_filter(conn, &req.params)?;
    let student_id = filter.student_id.clone().unwrap_or_default();
    // Every enrolled class gets an entry, even with no records yet.
    let class_ids: Vec<String> = db::enrollments_for_student(conn, &student_id)?
        .into_iter()
        .map(|e| e.class.id)
        .filter(|id| filter.class_id.as_deref().map_or(true, |c| c == id))
        .collect();
    let breakdown = gradebook::student_attendance(conn, &filter, &class_ids)?;
    to_json(&breakdown)
}

fn handle_attendance_class_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let class_id = get_required_str(&req.params, "classId")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(GradeError::not_found("class", &class_id).into());
    }
    let mut filter = parse_params::<FilterParams>(&req.params, "filter")?.into_filter()?;
    filter.class_id = Some(class_id.clone());
    filter.student_id = None;
    let summary = gradebook::class_attendance(conn, &filter)?;
    Ok(json!({
        "classId": class_id,
        "counts": to_json(&summary.counts)?,
        "rates": to_json(&summary.rates)?,
    }))
}

fn handle_attendance_trend(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let filter = student_filter(conn, &req.params)?;
    let records = db::load_attendance(conn, &filter)?;
    let months = monthly_trend(&records, &filter);
    Ok(json!({ "months": to_json(&months)? }))
}

fn handle_attendance_month(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let (year, month) = parse_month_key(&get_required_str(&req.params, "month")?)?;
    let filter = student_filter(conn, &req.params)?;
    let records = db::load_attendance(conn, &filter)?;
    let listed = records_in_month(&records, &filter, year, month);
    Ok(json!({
        "year": year,
        "month": month,
        "records": to_json(&listed)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.upsert" => handle_attendance_upsert(state, req),
        "attendance.bulkUpsert" => handle_attendance_bulk_upsert(state, req),
        "attendance.summary" => handle_attendance_summary(state, req),
        "attendance.classSummary" => handle_attendance_class_summary(state, req),
        "attendance.trend" => handle_attendance_trend(state, req),
        "attendance.month" => handle_attendance_month(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
