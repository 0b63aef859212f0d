//! HTTP front end for [`SignalVerifier`].
//!
//! `POST /signals` takes a [`SignalSubmission`]; `GET /roots` lists the
//! roots currently accepted. Verification runs on the blocking pool.

use crate::error::Rejection;
use crate::types::SignalSubmission;
use crate::utils::field_to_hex;
use crate::verifier::SignalVerifier;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    verifier: Arc<SignalVerifier>,
    max_proof_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub status: String,
    pub scope: String,
    pub merkle_root: String,
    pub nullifier_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub retriable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsResponse {
    pub roots: Vec<String>,
}

impl Rejection {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StaleOrUnknownRoot => StatusCode::PRECONDITION_FAILED,
            Self::InvalidProof => StatusCode::BAD_REQUEST,
            Self::DuplicateNullifier => StatusCode::CONFLICT,
            Self::ScopeNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::MalformedSubmission(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Registry(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            retriable: self.is_retriable(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Builds the router. Proofs above `max_proof_size` bytes are refused
/// before verification.
pub fn router(verifier: Arc<SignalVerifier>, max_proof_size: usize) -> Router {
    Router::new()
        .route("/signals", post(submit_signal))
        .route("/roots", get(list_roots))
        .with_state(AppState {
            verifier,
            max_proof_size,
        })
}

async fn submit_signal(
    State(state): State<AppState>,
    payload: Result<Json<SignalSubmission>, JsonRejection>,
) -> Result<Json<AcceptedResponse>, Rejection> {
    let Json(payload) =
        payload.map_err(|e| Rejection::MalformedSubmission(e.body_text()))?;
    let submission = payload.decode(state.max_proof_size)?;

    let verifier = Arc::clone(&state.verifier);
    let accepted = tokio::task::spawn_blocking(move || verifier.submit(&submission))
        .await
        .map_err(|e| Rejection::Internal(format!("verification task failed: {e}")))??;

    Ok(Json(AcceptedResponse {
        status: "accepted".to_string(),
        scope: accepted.scope,
        merkle_root: field_to_hex(accepted.root),
        nullifier_hash: field_to_hex(accepted.nullifier_hash),
    }))
}

async fn list_roots(State(state): State<AppState>) -> Json<RootsResponse> {
    Json(RootsResponse {
        roots: state
            .verifier
            .accepted_roots()
            .into_iter()
            .map(field_to_hex)
            .collect(),
    })
}

/// Serves `router` on `listener` until `shutdown` is cancelled.
///
/// # Errors
/// Returns the underlying I/O error if the server fails.
pub async fn serve(
    listener: TcpListener,
    verifier: Arc<SignalVerifier>,
    max_proof_size: usize,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Signal server listening on {addr}");
    }

    axum::serve(listener, router(verifier, max_proof_size))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_rejection_kind() {
        assert_eq!(
            Rejection::StaleOrUnknownRoot.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(Rejection::InvalidProof.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Rejection::DuplicateNullifier.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Rejection::ScopeNotAllowed("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Rejection::MalformedSubmission("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Rejection::Registry("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Rejection::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
