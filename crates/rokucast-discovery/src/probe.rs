//! Device-info probing of single hosts

use rokucast_ecp::{EcpClient, EcpError};
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::trace;

/// What came back from one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// An HTTP response of any status
    Response { status: u16, body: String },
    /// No response within the probe timeout
    TimedOut,
    /// Refused, unreachable, reset or otherwise broken
    Failed(String),
}

impl ProbeOutcome {
    /// Body of a 200 response
    pub fn ok_body(&self) -> Option<&str> {
        match self {
            Self::Response { status: 200, body } => Some(body),
            _ => None,
        }
    }
}

/// A settled probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub target: Ipv4Addr,
    pub outcome: ProbeOutcome,
}

/// One device-info request against one host. Implementations must settle:
/// every call resolves to exactly one outcome.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, target: Ipv4Addr) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probe over HTTP with the device control client
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: EcpClient,
}

impl HttpProbe {
    pub fn new(client: EcpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &EcpClient {
        &self.client
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, target: Ipv4Addr) -> ProbeOutcome {
        match self.client.fetch_device_info_at(target).await {
            Ok(response) => ProbeOutcome::Response {
                status: response.status,
                body: response.body,
            },
            Err(EcpError::Timeout(_)) => {
                trace!(ip = %target, "Probe timed out");
                ProbeOutcome::TimedOut
            }
            Err(e) => {
                trace!(ip = %target, error = %e, "Probe failed");
                ProbeOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe_for(server: &MockServer) -> HttpProbe {
        HttpProbe::new(
            EcpClient::new()
                .unwrap()
                .with_port(server.address().port())
                .with_probe_timeout(Duration::from_millis(300)),
        )
    }

    #[tokio::test]
    async fn test_probe_returns_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query/device-info"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let outcome = probe_for(&server).probe(Ipv4Addr::LOCALHOST).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Response {
                status: 404,
                body: "nope".into()
            }
        );
        assert_eq!(outcome.ok_body(), None);
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let outcome = probe_for(&server).probe(Ipv4Addr::LOCALHOST).await;
        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }

    #[test]
    fn test_ok_body_only_for_200() {
        let ok = ProbeOutcome::Response {
            status: 200,
            body: "<device-info/>".into(),
        };
        assert_eq!(ok.ok_body(), Some("<device-info/>"));
        assert_eq!(ProbeOutcome::TimedOut.ok_body(), None);
        assert_eq!(ProbeOutcome::Failed("refused".into()).ok_body(), None);
    }
}
