//! Scheduler API handlers.

use axum::{extract::State, Json};
use ingestor_core::DispatcherStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Get dispatcher status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DispatcherStatus> {
    Json(state.dispatcher().status())
}

/// Start the dispatch loop
pub async fn start(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let dispatcher = state.dispatcher();
    let message = if dispatcher.is_running() {
        "Dispatcher already running"
    } else {
        dispatcher.start().await;
        "Dispatcher started"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

/// Stop the dispatch loop after the in-flight batch
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    let dispatcher = state.dispatcher();
    let message = if dispatcher.is_running() {
        dispatcher.stop().await;
        "Dispatcher stopped"
    } else {
        "Dispatcher not running"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}
