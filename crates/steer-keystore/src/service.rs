//! HTTP routes of the key-lookup backend
//!
//! | Method | Path                    | Response                         |
//! |--------|-------------------------|----------------------------------|
//! | GET    | `/backend/fetchkey/*uri`| `{"rule": ...}` or 404           |
//! | GET    | `/backend/fetchallkeys` | `{"rules": [...]}`               |
//! | GET    | `/jwks.json`            | the static key set               |

use crate::jwks::{static_jwks, Jwks};
use crate::rules::RuleSet;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use steer_core::{AccessLog, Method, Request, Response, Result, ServerState, StatusCode};

#[derive(Serialize)]
struct RuleEnvelope<'a> {
    rule: &'a Value,
}

#[derive(Serialize)]
struct RulesEnvelope<'a> {
    rules: &'a [Value],
}

fn not_found() -> Response {
    Response::json_error(StatusCode::NOT_FOUND, "Not found")
}

/// Look up a single rule by the remainder of the path
pub fn fetch_key(rules: &RuleSet, req: &Request) -> Response {
    let Some(uri) = req.param_decoded("uri") else {
        return not_found();
    };

    match rules.find(&uri) {
        Some(rule) => Response::json_value(StatusCode::OK, &RuleEnvelope { rule }),
        None => {
            tracing::debug!(uri = %uri, "no rule for uri");
            not_found()
        }
    }
}

pub fn fetch_all_keys(rules: &RuleSet) -> Response {
    Response::json_value(StatusCode::OK, &RulesEnvelope { rules: rules.all() })
}

/// Build the route table over a loaded rule set
pub fn build_state(rules: Arc<RuleSet>) -> Result<ServerState> {
    let mut state = ServerState::new();
    state.add_middleware(AccessLog::default());
    state.set_not_found(not_found());

    let lookup = Arc::clone(&rules);
    state.route(Method::Get, "/backend/fetchkey/*uri", move |req| {
        let rules = Arc::clone(&lookup);
        async move { fetch_key(&rules, &req) }
    })?;

    let listing = Arc::clone(&rules);
    state.route(Method::Get, "/backend/fetchallkeys", move |_req| {
        let rules = Arc::clone(&listing);
        async move { fetch_all_keys(&rules) }
    })?;

    let jwks: Arc<Jwks> = Arc::new(static_jwks());
    state.route(Method::Get, "/jwks.json", move |_req| {
        let jwks = Arc::clone(&jwks);
        async move { Response::json_value(StatusCode::OK, jwks.as_ref()) }
    })?;

    Ok(state)
}
