use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::solver::{ChallengeAction, ChallengeRequest, Solver};

const API_VERSION: &str = "v1alpha1";

pub struct AppState {
    pub group_name: String,
    pub solver: Arc<dyn Solver>,
}

/// Envelope cert-manager uses in both directions.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengePayload {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<ChallengeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<ChallengeResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChallengeResponse {
    uid: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<FailureStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FailureStatus {
    status: String,
    reason: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

pub fn create_router(group_name: String, solver: Arc<dyn Solver>) -> Router {
    let state = Arc::new(AppState { group_name, solver });

    Router::new()
        .route("/apis/{group}/{version}", get(discover_resources))
        .route("/apis/{group}/{version}/{solver}", post(solve_challenge))
        .route("/healthz", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// Resource list the API aggregator checks before routing challenges here.
async fn discover_resources(
    State(state): State<Arc<AppState>>,
    Path((group, version)): Path<(String, String)>,
) -> Response {
    if group != state.group_name || version != API_VERSION {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                success: false,
                error: format!("API group version not found: {}/{}", group, version),
            }),
        )
            .into_response();
    }

    let name = state.solver.name().to_string();
    Json(APIResourceList {
        group_version: format!("{}/{}", group, API_VERSION),
        resources: vec![APIResource {
            name: name.clone(),
            singular_name: name,
            namespaced: false,
            kind: "ChallengePayload".to_string(),
            verbs: vec!["create".to_string()],
            ..Default::default()
        }],
    })
    .into_response()
}

async fn solve_challenge(
    State(state): State<Arc<AppState>>,
    Path((group, version, solver_name)): Path<(String, String, String)>,
    Json(payload): Json<ChallengePayload>,
) -> Response {
    if group != state.group_name || version != API_VERSION || solver_name != state.solver.name() {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                success: false,
                error: format!("Solver not found: {}/{}/{}", group, version, solver_name),
            }),
        )
            .into_response();
    }

    let Some(request) = payload.request else {
        warn!("Challenge payload without request");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: "Challenge payload has no request".to_string(),
            }),
        )
            .into_response();
    };

    let result = match request.action {
        ChallengeAction::Present => state.solver.present(&request).await,
        ChallengeAction::CleanUp => state.solver.clean_up(&request).await,
    };

    // Failures travel inside the payload, the HTTP exchange itself succeeded.
    let response = match result {
        Ok(()) => ChallengeResponse {
            uid: request.uid,
            success: true,
            status: None,
        },
        Err(e) => {
            error!("{:?} of challenge {} failed: {}", request.action, request.uid, e);
            ChallengeResponse {
                uid: request.uid,
                success: false,
                status: Some(FailureStatus {
                    status: "Failure".to_string(),
                    reason: "InternalError".to_string(),
                    message: e.to_string(),
                }),
            }
        }
    };

    (
        StatusCode::OK,
        Json(ChallengePayload {
            api_version: if payload.api_version.is_empty() {
                format!("{}/{}", group, API_VERSION)
            } else {
                payload.api_version
            },
            kind: "ChallengePayload".to_string(),
            request: None,
            response: Some(response),
        }),
    )
        .into_response()
}
