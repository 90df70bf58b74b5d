//! Localized status and notification message codes

use serde::{Deserialize, Serialize};

/// Message codes shown in the status line and in cast notifications.
///
/// The serialized form is the catalog key, so front ends can look the
/// code up in their own translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageCode {
    #[serde(rename = "message_searching")]
    Searching,
    #[serde(rename = "message_search_complete")]
    SearchComplete,
    #[serde(rename = "message_setting_ip")]
    SettingIp,
    #[serde(rename = "message_set_ip")]
    SetIp,
    #[serde(rename = "message_failed_set_ip")]
    FailedSetIp,
    #[serde(rename = "message_ip_not_set")]
    IpNotSet,
    #[serde(rename = "message_roku_connect_fail")]
    RokuConnectFail,
    #[serde(rename = "message_find_stream_fail")]
    FindStreamFail,
    #[serde(rename = "message_cast_success")]
    CastSuccess,
    #[serde(rename = "message_cast_in_progress")]
    CastInProgress,
    #[serde(rename = "title_cast_success")]
    TitleCastSuccess,
    #[serde(rename = "title_cast_fail")]
    TitleCastFail,
    #[serde(rename = "title_cast_in_progress")]
    TitleCastInProgress,
}

impl MessageCode {
    pub const ALL: [MessageCode; 13] = [
        Self::Searching,
        Self::SearchComplete,
        Self::SettingIp,
        Self::SetIp,
        Self::FailedSetIp,
        Self::IpNotSet,
        Self::RokuConnectFail,
        Self::FindStreamFail,
        Self::CastSuccess,
        Self::CastInProgress,
        Self::TitleCastSuccess,
        Self::TitleCastFail,
        Self::TitleCastInProgress,
    ];

    /// Catalog key for this code
    pub fn key(&self) -> &'static str {
        match self {
            Self::Searching => "message_searching",
            Self::SearchComplete => "message_search_complete",
            Self::SettingIp => "message_setting_ip",
            Self::SetIp => "message_set_ip",
            Self::FailedSetIp => "message_failed_set_ip",
            Self::IpNotSet => "message_ip_not_set",
            Self::RokuConnectFail => "message_roku_connect_fail",
            Self::FindStreamFail => "message_find_stream_fail",
            Self::CastSuccess => "message_cast_success",
            Self::CastInProgress => "message_cast_in_progress",
            Self::TitleCastSuccess => "title_cast_success",
            Self::TitleCastFail => "title_cast_fail",
            Self::TitleCastInProgress => "title_cast_in_progress",
        }
    }

    /// Look a catalog key back up
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.key() == key)
    }

    /// English catalog text
    pub fn text(&self) -> &'static str {
        match self {
            Self::Searching => "Searching for devices on your network...",
            Self::SearchComplete => "Search complete.",
            Self::SettingIp => "Saving device address...",
            Self::SetIp => "Device address saved.",
            Self::FailedSetIp => "Could not find a Roku at that address.",
            Self::IpNotSet => "No Roku has been selected. Choose one in the options.",
            Self::RokuConnectFail => "Could not connect to the Roku.",
            Self::FindStreamFail => "Could not find a stream on this page.",
            Self::CastSuccess => "The stream is starting on your Roku.",
            Self::CastInProgress => "Sending the stream to your Roku...",
            Self::TitleCastSuccess => "Cast started",
            Self::TitleCastFail => "Cast failed",
            Self::TitleCastInProgress => "Casting",
        }
    }
}

impl std::fmt::Display for MessageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// A `{title, message}` pair for a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub title: MessageCode,
    pub message: MessageCode,
}

impl UserMessage {
    pub const fn new(title: MessageCode, message: MessageCode) -> Self {
        Self { title, message }
    }

    pub const fn cast_failed(message: MessageCode) -> Self {
        Self::new(MessageCode::TitleCastFail, message)
    }

    pub const fn cast_succeeded() -> Self {
        Self::new(MessageCode::TitleCastSuccess, MessageCode::CastSuccess)
    }

    pub const fn cast_in_progress() -> Self {
        Self::new(MessageCode::TitleCastInProgress, MessageCode::CastInProgress)
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title.text(), self.message.text())
    }
}
