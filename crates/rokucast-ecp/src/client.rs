//! HTTP client for the device control protocol

use reqwest::Url;
use rokucast_core::{DeviceInfo, MessageCode, UserMessage};
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::device_info::{parse_device_info, DeviceInfoError};
use crate::launch::{AppChannel, DeepLink};

/// Device control protocol port
pub const ECP_PORT: u16 = 8060;

/// Path of the identity document
pub const DEVICE_INFO_PATH: &str = "/query/device-info";

/// Vendor name that identifies a supported device, compared uppercased
pub const ROKU_VENDOR: &str = rokucast_core::device::EXPECTED_VENDOR;

/// Timeout for a single device-info request
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Timeout for a launch (cast) request
pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum EcpError {
    #[error("Invalid device address: {0:?}")]
    InvalidAddress(String),
    #[error("Request to {0} timed out")]
    Timeout(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Invalid device-info: {0}")]
    DeviceInfo(#[from] DeviceInfoError),
    #[error("Not a Roku device (vendor {0:?})")]
    VendorMismatch(String),
}

impl EcpError {
    /// Notification shown when a cast fails with this error
    pub fn user_message(&self) -> UserMessage {
        UserMessage::cast_failed(MessageCode::RokuConnectFail)
    }
}

/// Status and body of a device-info request, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Client for one or more devices on the local network
#[derive(Debug, Clone)]
pub struct EcpClient {
    client: reqwest::Client,
    port: u16,
    probe_timeout: Duration,
    launch_timeout: Duration,
}

impl EcpClient {
    /// Create a client with the standard port and timeouts
    pub fn new() -> Result<Self, EcpError> {
        let client = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self {
            client,
            port: ECP_PORT,
            probe_timeout: PROBE_TIMEOUT,
            launch_timeout: LAUNCH_TIMEOUT,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Base URL for a device, `http://{host}:{port}/`
    ///
    /// `host` is whatever the user or the scanner supplied: an IPv4 address
    /// or a host name. Anything that would change the URL's structure is
    /// rejected before a request is built.
    pub fn base_url(&self, host: &str) -> Result<Url, EcpError> {
        let host = host.trim();
        if host.is_empty() || host.contains(['/', '?', '#', '@', ' ']) {
            return Err(EcpError::InvalidAddress(host.to_string()));
        }

        let url = Url::parse(&format!("http://{}:{}/", host, self.port))
            .map_err(|_| EcpError::InvalidAddress(host.to_string()))?;

        if url.host_str().is_none() {
            return Err(EcpError::InvalidAddress(host.to_string()));
        }
        Ok(url)
    }

    /// `http://{host}:{port}/query/device-info`
    pub fn device_info_url(&self, host: &str) -> Result<Url, EcpError> {
        self.base_url(host)?
            .join(DEVICE_INFO_PATH)
            .map_err(|_| EcpError::InvalidAddress(host.to_string()))
    }

    /// Single device-info GET with the probe timeout, no retry.
    ///
    /// Any HTTP status is returned as-is; only transport failures and
    /// timeouts are errors.
    pub async fn fetch_device_info(&self, host: &str) -> Result<RawResponse, EcpError> {
        let url = self.device_info_url(host)?;

        let response = self
            .client
            .get(url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| classify(e, &url))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(e, &url))?;

        trace!(url = %url, status = status, len = body.len(), "device-info response");
        Ok(RawResponse { status, body })
    }

    /// Fetch and parse the device-info document; requires HTTP 200
    pub async fn query_device_info(&self, host: &str) -> Result<DeviceInfo, EcpError> {
        let response = self.fetch_device_info(host).await?;
        if !response.is_ok() {
            return Err(EcpError::Status {
                status: response.status,
                url: self.device_info_url(host)?.to_string(),
            });
        }
        Ok(parse_device_info(&response.body)?)
    }

    /// Confirm the device at `host` is a Roku and return its info
    pub async fn confirm_device(&self, host: &str) -> Result<DeviceInfo, EcpError> {
        let info = self.query_device_info(host).await?;
        if !info.is_roku() {
            debug!(host = %host, vendor = %info.vendor_name, "Vendor mismatch");
            return Err(EcpError::VendorMismatch(info.vendor_name));
        }
        info!(host = %host, name = ?info.user_device_name, "Confirmed device");
        Ok(info)
    }

    /// Convenience for scanner probes
    pub async fn fetch_device_info_at(&self, ip: Ipv4Addr) -> Result<RawResponse, EcpError> {
        self.fetch_device_info(&ip.to_string()).await
    }

    /// `http://{host}:{port}/launch/{app}?contentId=..&mediaType=..&time=..`
    pub fn launch_url(
        &self,
        host: &str,
        app: AppChannel,
        link: &DeepLink,
    ) -> Result<Url, EcpError> {
        let mut url = self
            .base_url(host)?
            .join(&format!("launch/{}", app.id()))
            .map_err(|_| EcpError::InvalidAddress(host.to_string()))?;

        url.query_pairs_mut()
            .append_pair("contentId", &link.content_id())
            .append_pair("mediaType", link.media_type())
            .append_pair("time", &link.time().to_string());
        Ok(url)
    }

    /// Send a deep link; succeeds only on HTTP 200
    pub async fn launch(
        &self,
        host: &str,
        app: AppChannel,
        link: &DeepLink,
    ) -> Result<(), EcpError> {
        let url = self.launch_url(host, app, link)?;
        info!(url = %url, "Sending deep link");

        let response = self
            .client
            .post(url.clone())
            .timeout(self.launch_timeout)
            .body("")
            .send()
            .await
            .map_err(|e| classify(e, &url))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(EcpError::Status {
                status,
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

fn classify(error: reqwest::Error, url: &Url) -> EcpError {
    if error.is_timeout() {
        EcpError::Timeout(url.to_string())
    } else {
        EcpError::Http(error)
    }
}
