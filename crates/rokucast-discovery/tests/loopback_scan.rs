//! End-to-end scan of the loopback /24 against a mock device

use rokucast_core::SubnetPrefix;
use rokucast_discovery::{DiscoveryEvent, HttpProbe, ScanOutcome, SubnetScanner};
use rokucast_ecp::EcpClient;
use std::net::Ipv4Addr;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<device-info>
	<vendor-name>Roku</vendor-name>
	<model-name>Roku Express</model-name>
	<user-device-name>Bedroom</user-device-name>
</device-info>
"#;

async fn mock_device() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query/device-info"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DEVICE_INFO))
        .mount(&server)
        .await;
    server
}

fn scanner_for(server: &MockServer) -> SubnetScanner<HttpProbe> {
    let client = EcpClient::new()
        .unwrap()
        .with_port(server.address().port())
        .with_probe_timeout(Duration::from_millis(500));
    SubnetScanner::new(HttpProbe::new(client))
}

#[tokio::test]
async fn test_scan_finds_mock_device_on_loopback() {
    let server = mock_device().await;
    let scanner = scanner_for(&server);

    let mut session = scanner.scan([SubnetPrefix::new(127, 0, 0)]);
    let mut found = Vec::new();
    let mut completed = 0;
    while let Some(event) = session.next_event().await {
        match event {
            DiscoveryEvent::DeviceFound { device, .. } => found.push(device),
            DiscoveryEvent::ScanCompleted(_) => completed += 1,
            _ => {}
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].ip, Ipv4Addr::new(127, 0, 0, 1));
    assert_eq!(found[0].label(), "Bedroom - 127.0.0.1");

    let ScanOutcome::Completed(summary) = session.wait().await else {
        panic!("scan should complete");
    };
    assert_eq!(summary.probes, 255);
}

#[tokio::test]
async fn test_other_vendor_on_loopback_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query/device-info"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<device-info><vendor-name>Sonos</vendor-name></device-info>",
        ))
        .mount(&server)
        .await;

    let outcome = scanner_for(&server)
        .scan([SubnetPrefix::new(127, 0, 0)])
        .wait()
        .await;
    assert!(outcome.is_completed());
    assert!(outcome.devices().is_empty());
}
