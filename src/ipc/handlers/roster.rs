use crate::db::{self, RosterSync};
use crate::ipc::helpers::{parse_params, require_db, respond, to_json, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_roster_sync(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let roster: RosterSync = parse_params(&req.params, "roster")?;
    let report = db::roster_sync(conn, &roster)?;
    to_json(&report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roster.sync" => handle_roster_sync(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
