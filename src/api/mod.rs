use rocket::{
    http::Status,
    serde::json::{serde_json::json, Value},
    Catcher, Request, Route,
};

pub mod auth;
pub mod campaign;
mod common;
pub mod event;
pub mod institution;
pub mod payment;
pub mod survey;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(institution::routes());
    routes.extend(campaign::routes());
    routes.extend(event::routes());
    routes.extend(survey::routes());
    routes.extend(payment::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render guard failures and unmatched routes as the same JSON message shape
/// the handlers use.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> (Status, Value) {
    (status, json!({ "message": status.reason_lossy() }))
}
