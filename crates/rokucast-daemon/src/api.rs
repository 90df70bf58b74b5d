//! REST API handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rokucast_core::{ExtractResponse, LocalAddress, MessageCode, UserMessage};
use rokucast_discovery::HostInterface;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::{AppState, ServiceError};

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// A status-line message: catalog key plus English text
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: MessageCode,
    pub text: &'static str,
}

impl From<MessageCode> for StatusMessage {
    fn from(message: MessageCode) -> Self {
        Self {
            message,
            text: message.text(),
        }
    }
}

/// A cast notification
#[derive(Debug, Serialize)]
pub struct Notification {
    pub title: MessageCode,
    pub message: MessageCode,
    pub title_text: &'static str,
    pub message_text: &'static str,
}

impl From<UserMessage> for Notification {
    fn from(msg: UserMessage) -> Self {
        Self {
            title: msg.title,
            message: msg.message,
            title_text: msg.title.text(),
            message_text: msg.message.text(),
        }
    }
}

/// List the devices found by the latest scan
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.discovery.devices().await)
}

/// Start a scan of every local prefix
pub async fn trigger_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Manual scan triggered");

    match state.discovery.start_scan().await {
        Ok(ticket) => (StatusCode::ACCEPTED, Json(ticket)).into_response(),
        Err(e @ ServiceError::ScanInProgress) => {
            (StatusCode::CONFLICT, Json(ApiError::new(e.to_string()))).into_response()
        }
    }
}

/// Cancel the running scan
pub async fn cancel_scan(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cancelled = state.discovery.cancel_scan().await;
    Json(serde_json::json!({ "cancelled": cancelled }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub busy: bool,
    pub message: Option<StatusMessage>,
    pub session: Option<uuid::Uuid>,
    pub prefixes: Vec<String>,
    pub devices_found: usize,
}

/// Busy indicator and status line
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.discovery.status().await;
    let devices_found = state.discovery.devices().await.len();

    Json(StatusResponse {
        busy: status.busy,
        message: status.message.map(StatusMessage::from),
        session: status.session,
        prefixes: status.prefixes.iter().map(|p| p.to_string()).collect(),
        devices_found,
    })
}

/// Saved device selection
pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.saved_settings() {
        Ok(settings) => Json(settings).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to read settings: {}", e))),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub ip: String,
    /// Channel variant to save alongside the device
    #[serde(default)]
    pub app_id: Option<String>,
}

async fn save_app_id(state: &AppState, app_id: Option<&str>) -> Result<(), MessageCode> {
    match app_id {
        Some(app_id) => state.set_app_id(app_id).await.map(|_| ()),
        None => Ok(()),
    }
}

/// Save a device from the discovered list
pub async fn select_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    let saved = match state.select_device(&req.ip).await {
        Ok(settings) => match req.app_id.as_deref() {
            Some(app_id) => state.set_app_id(app_id).await,
            None => Ok(settings),
        },
        Err(code) => Err(code),
    };

    match saved {
        Ok(settings) => Json(serde_json::json!({
            "status": StatusMessage::from(MessageCode::SetIp),
            "settings": settings,
        }))
        .into_response(),
        Err(code) => (StatusCode::BAD_REQUEST, Json(StatusMessage::from(code))).into_response(),
    }
}

#[derive(Deserialize)]
pub struct DeviceRequest {
    #[serde(default)]
    pub address: String,
    /// Channel variant to save alongside the device
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Save a user-typed address once a device answers there
pub async fn set_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeviceRequest>,
) -> impl IntoResponse {
    info!(address = %req.address, "Manual device address submitted");

    let saved = match state.set_device(&req.address).await {
        Ok(info) => save_app_id(&state, req.app_id.as_deref())
            .await
            .map(|()| info),
        Err(code) => Err(code),
    };

    match saved {
        Ok(info) => Json(serde_json::json!({
            "status": StatusMessage::from(MessageCode::SetIp),
            "device": info,
        }))
        .into_response(),
        Err(code) => (StatusCode::BAD_REQUEST, Json(StatusMessage::from(code))).into_response(),
    }
}

/// Cast what a page extraction reported to the saved device
pub async fn cast(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractResponse>,
) -> impl IntoResponse {
    match state.cast_extracted(req).await {
        Ok(msg) => Json(Notification::from(msg)).into_response(),
        Err(msg) => {
            warn!(notification = %msg, "Cast failed");
            let status = match msg.message {
                MessageCode::RokuConnectFail => StatusCode::BAD_GATEWAY,
                MessageCode::IpNotSet => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(Notification::from(msg))).into_response()
        }
    }
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

#[derive(Serialize)]
pub struct AddressesResponse {
    pub addresses: Vec<LocalAddress>,
    pub interfaces: Vec<HostInterface>,
}

/// Local addresses of the latest scan and the interfaces they come from
pub async fn get_addresses(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let interfaces = match state.discovery.interfaces() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(format!("Failed to list interfaces: {}", e))),
            )
                .into_response()
        }
    };

    Json(AddressesResponse {
        addresses: state.discovery.addresses().await,
        interfaces,
    })
    .into_response()
}
