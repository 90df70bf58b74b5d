//! Page-extraction message protocol
//!
//! The content side of the extension answers an `extract` command with the
//! streamer/video identity of the current page, or an error code.

use serde::{Deserialize, Serialize};

use crate::message::MessageCode;

/// `{"command": "extract"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub command: String,
}

impl ExtractRequest {
    pub const COMMAND: &'static str = "extract";

    pub fn extract() -> Self {
        Self {
            command: Self::COMMAND.to_string(),
        }
    }

    pub fn is_extract(&self) -> bool {
        self.command == Self::COMMAND
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Streamer {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub id: Option<String>,
    /// Playback position in seconds
    #[serde(default)]
    pub time: u64,
}

/// Reply to an [`ExtractRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractResponse {
    Failed { error: String },
    Found { streamer: Streamer, video: Video },
}

impl ExtractResponse {
    /// The error as a known message code; unknown codes read as "stream not found"
    pub fn error_code(&self) -> Option<MessageCode> {
        match self {
            Self::Failed { error } => {
                Some(MessageCode::from_key(error).unwrap_or(MessageCode::FindStreamFail))
            }
            Self::Found { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_found_response() {
        let json = r#"{"streamer":{"login":"somestreamer","displayName":"SomeStreamer"},"video":{"id":null,"time":0}}"#;
        let response: ExtractResponse = serde_json::from_str(json).unwrap();
        match response {
            ExtractResponse::Found { streamer, video } => {
                assert_eq!(streamer.login.as_deref(), Some("somestreamer"));
                assert_eq!(streamer.display_name.as_deref(), Some("SomeStreamer"));
                assert!(video.id.is_none());
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_parse_video_response_with_missing_fields() {
        let json = r#"{"streamer":{},"video":{"id":"123456789","time":3725}}"#;
        let response: ExtractResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response,
            ExtractResponse::Found {
                streamer: Streamer::default(),
                video: Video {
                    id: Some("123456789".to_string()),
                    time: 3725
                },
            }
        );
    }

    #[test]
    fn test_parse_error_response() {
        let response: ExtractResponse =
            serde_json::from_str(r#"{"error":"message_find_stream_fail"}"#).unwrap();
        assert_eq!(response.error_code(), Some(MessageCode::FindStreamFail));

        let unknown: ExtractResponse = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(unknown.error_code(), Some(MessageCode::FindStreamFail));
    }

    #[test]
    fn test_request() {
        let json = serde_json::to_string(&ExtractRequest::extract()).unwrap();
        assert_eq!(json, r#"{"command":"extract"}"#);
        assert!(ExtractRequest::extract().is_extract());
    }
}
