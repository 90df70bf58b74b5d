//! Deep-link casting

use rokucast_core::{MessageCode, Settings, UserMessage};
use tracing::{info, warn};

use crate::client::EcpClient;

/// Channel id of the primary channel
pub const APP_ID_TWITCHED: &str = "206723";
/// Channel id of the alternate channel
pub const APP_ID_TWITCHED_ZERO: &str = "223126";

/// Which installed channel receives the deep link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppChannel {
    Twitched,
    TwitchedZero,
}

impl AppChannel {
    /// Map the persisted `rokuAppId` value: `"0"` is the primary channel,
    /// anything else the alternate one
    pub fn from_setting(app_id: &str) -> Self {
        if app_id == "0" {
            Self::Twitched
        } else {
            Self::TwitchedZero
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Twitched => APP_ID_TWITCHED,
            Self::TwitchedZero => APP_ID_TWITCHED_ZERO,
        }
    }
}

/// What to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastTarget {
    /// A streamer's live broadcast
    Live { login: String },
    /// A recorded video
    Video { id: String },
}

impl CastTarget {
    /// Pick a target from extracted page data; a login wins over a video id
    pub fn from_parts(login: Option<&str>, video_id: Option<&str>) -> Option<Self> {
        let non_empty = |s: &&str| !s.trim().is_empty();
        if let Some(login) = login.filter(non_empty) {
            return Some(Self::Live {
                login: login.trim().to_string(),
            });
        }
        video_id.filter(non_empty).map(|id| Self::Video {
            id: id.trim().to_string(),
        })
    }
}

/// A deep link: target plus start position in seconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    pub target: CastTarget,
    pub time: Option<u64>,
}

impl DeepLink {
    pub fn new(target: CastTarget, time: Option<u64>) -> Self {
        Self { target, time }
    }

    pub fn content_id(&self) -> String {
        match &self.target {
            CastTarget::Live { login } => format!("twitch_stream_{}", login),
            CastTarget::Video { id } => format!("twitch_video_{}", id),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self.target {
            CastTarget::Live { .. } => "live",
            CastTarget::Video { .. } => "special",
        }
    }

    pub fn time(&self) -> u64 {
        self.time.unwrap_or(0)
    }
}

/// Cast to the device saved in `settings`.
///
/// Fails with a displayable `{title, message}` pair: `message_ip_not_set`
/// when no device (or channel variant) has been configured, and
/// `message_roku_connect_fail` when the device can't be reached or doesn't
/// answer 200.
pub async fn cast_to(
    client: &EcpClient,
    settings: &Settings,
    target: CastTarget,
    time: Option<u64>,
) -> Result<(), UserMessage> {
    let (Some(ip), Some(app_id)) = (settings.roku_ip.as_deref(), settings.roku_app_id.as_deref())
    else {
        warn!("Cast requested but no device is configured");
        return Err(UserMessage::cast_failed(MessageCode::IpNotSet));
    };

    let link = DeepLink::new(target, time);
    let app = AppChannel::from_setting(app_id);

    match client.launch(ip, app, &link).await {
        Ok(()) => {
            info!(ip = %ip, content = %link.content_id(), "Cast succeeded");
            Ok(())
        }
        Err(e) => {
            warn!(ip = %ip, error = %e, "Cast failed");
            Err(e.user_message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_app_channel_from_setting() {
        assert_eq!(AppChannel::from_setting("0"), AppChannel::Twitched);
        assert_eq!(AppChannel::from_setting("1"), AppChannel::TwitchedZero);
        assert_eq!(AppChannel::Twitched.id(), "206723");
        assert_eq!(AppChannel::TwitchedZero.id(), "223126");
    }

    #[test]
    fn test_target_from_parts() {
        assert_eq!(
            CastTarget::from_parts(Some("streamer"), Some("99")),
            Some(CastTarget::Live {
                login: "streamer".into()
            })
        );
        assert_eq!(
            CastTarget::from_parts(None, Some("99")),
            Some(CastTarget::Video { id: "99".into() })
        );
        assert_eq!(
            CastTarget::from_parts(Some(""), Some("99")),
            Some(CastTarget::Video { id: "99".into() })
        );
        assert_eq!(CastTarget::from_parts(None, None), None);
    }

    #[test]
    fn test_deep_link_fields() {
        let live = DeepLink::new(
            CastTarget::Live {
                login: "abc".into(),
            },
            None,
        );
        assert_eq!(live.content_id(), "twitch_stream_abc");
        assert_eq!(live.media_type(), "live");
        assert_eq!(live.time(), 0);

        let video = DeepLink::new(CastTarget::Video { id: "7".into() }, Some(3725));
        assert_eq!(video.content_id(), "twitch_video_7");
        assert_eq!(video.media_type(), "special");
        assert_eq!(video.time(), 3725);
    }

    #[tokio::test]
    async fn test_cast_without_device() {
        let client = EcpClient::new().unwrap();
        let settings = Settings {
            roku_ip: None,
            roku_app_id: Some("0".into()),
        };
        let err = cast_to(&client, &settings, CastTarget::Video { id: "1".into() }, None)
            .await
            .unwrap_err();
        assert_eq!(err, UserMessage::cast_failed(MessageCode::IpNotSet));
    }

    #[tokio::test]
    async fn test_cast_without_app_id() {
        let client = EcpClient::new().unwrap();
        let settings = Settings {
            roku_ip: Some("10.0.0.2".into()),
            roku_app_id: None,
        };
        let err = cast_to(&client, &settings, CastTarget::Video { id: "1".into() }, None)
            .await
            .unwrap_err();
        assert_eq!(err.message, MessageCode::IpNotSet);
    }

    #[tokio::test]
    async fn test_cast_to_saved_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/launch/206723"))
            .and(query_param("contentId", "twitch_video_555"))
            .and(query_param("time", "120"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = EcpClient::new()
            .unwrap()
            .with_port(server.address().port());
        let settings = Settings {
            roku_ip: Some("127.0.0.1".into()),
            roku_app_id: Some("0".into()),
        };
        cast_to(
            &client,
            &settings,
            CastTarget::Video { id: "555".into() },
            Some(120),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_cast_to_unreachable_device() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = EcpClient::new()
            .unwrap()
            .with_port(server.address().port());
        let settings = Settings {
            roku_ip: Some("127.0.0.1".into()),
            roku_app_id: Some("1".into()),
        };
        let err = cast_to(
            &client,
            &settings,
            CastTarget::Live {
                login: "x".into(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err, UserMessage::cast_failed(MessageCode::RokuConnectFail));
    }
}
