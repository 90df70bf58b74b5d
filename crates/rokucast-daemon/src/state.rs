//! Application state management

use anyhow::Result;
use rokucast_core::{
    DeviceInfo, DiscoveredDevice, ExtractResponse, LocalAddress, MessageCode, Settings,
    SettingsStore, SubnetPrefix, UserMessage,
};
use rokucast_discovery::{
    prefixes_for, DiscoveryEvent, HostInterface, HttpProbe, InterfaceGatherer,
    LocalAddressResolver, ResolveError, ScanCanceller, ScanSession, SubnetScanner,
};
use rokucast_ecp::{cast_to, CastTarget, EcpClient};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("A scan is already in progress")]
    ScanInProgress,
}

/// What the options page shows: busy indicator and status line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStatus {
    pub busy: bool,
    pub message: Option<MessageCode>,
    pub session: Option<Uuid>,
    pub prefixes: Vec<SubnetPrefix>,
}

/// A started scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanTicket {
    pub session: Uuid,
    pub prefixes: Vec<SubnetPrefix>,
}

/// Where the current session is
enum ScanPhase {
    Idle,
    Resolving,
    Scanning(ScanCanceller),
}

/// Runs resolve-then-scan sessions and keeps the latest device list
pub struct DiscoveryService {
    scanner: SubnetScanner<HttpProbe>,
    gatherer: InterfaceGatherer,
    gather_timeout: Duration,
    devices: RwLock<Vec<DiscoveredDevice>>,
    addresses: RwLock<Vec<LocalAddress>>,
    status: RwLock<DiscoveryStatus>,
    current: Mutex<ScanPhase>,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl DiscoveryService {
    pub fn new(
        scanner: SubnetScanner<HttpProbe>,
        gatherer: InterfaceGatherer,
        gather_timeout: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(512);
        Arc::new(Self {
            scanner,
            gatherer,
            gather_timeout,
            devices: RwLock::new(Vec::new()),
            addresses: RwLock::new(Vec::new()),
            status: RwLock::new(DiscoveryStatus::default()),
            current: Mutex::new(ScanPhase::Idle),
            events,
        })
    }

    /// Subscribe to events of every session
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    /// Devices found by the current (or last) session
    pub async fn devices(&self) -> Vec<DiscoveredDevice> {
        self.devices.read().await.clone()
    }

    /// Local addresses resolved for the current (or last) session
    pub async fn addresses(&self) -> Vec<LocalAddress> {
        self.addresses.read().await.clone()
    }

    pub async fn status(&self) -> DiscoveryStatus {
        self.status.read().await.clone()
    }

    pub async fn set_message(&self, message: MessageCode) {
        self.status.write().await.message = Some(message);
    }

    /// Interfaces local addresses are gathered from
    pub fn interfaces(&self) -> Result<Vec<HostInterface>, ResolveError> {
        self.gatherer.interfaces()
    }

    /// Run one local address resolution session
    pub async fn resolve_addresses(&self) -> Vec<LocalAddress> {
        let addresses = LocalAddressResolver::new(self.gatherer.clone())
            .with_timeout(Some(self.gather_timeout))
            .resolve()
            .await;
        *self.addresses.write().await = addresses.clone();
        addresses
    }

    /// Resolve local addresses and scan every distinct prefix.
    ///
    /// Returns once probes are launched; progress arrives as events.
    pub async fn start_scan(self: &Arc<Self>) -> Result<ScanTicket, ServiceError> {
        self.begin().await?;
        let addresses = self.resolve_addresses().await;
        Ok(self.launch(&addresses).await)
    }

    /// Mark the service busy before resolution starts
    async fn begin(&self) -> Result<(), ServiceError> {
        {
            let mut status = self.status.write().await;
            if status.busy {
                return Err(ServiceError::ScanInProgress);
            }
            *status = DiscoveryStatus {
                busy: true,
                message: Some(MessageCode::Searching),
                session: None,
                prefixes: Vec::new(),
            };
        }
        *self.current.lock().await = ScanPhase::Resolving;
        self.devices.write().await.clear();
        Ok(())
    }

    /// Scan the prefixes of the resolved addresses, unless cancelled meanwhile
    async fn launch(self: &Arc<Self>, addresses: &[LocalAddress]) -> ScanTicket {
        let prefixes = prefixes_for(addresses);
        info!(
            addresses = addresses.len(),
            prefixes = prefixes.len(),
            "Resolved local addresses"
        );

        let mut current = self.current.lock().await;
        if !matches!(*current, ScanPhase::Resolving) {
            drop(current);
            let session = Uuid::new_v4();
            info!(session = %session, "Scan cancelled during address resolution");
            self.finish().await;
            let _ = self.events.send(DiscoveryEvent::ScanCancelled { session });
            return ScanTicket {
                session,
                prefixes: Vec::new(),
            };
        }

        let session = self.scanner.scan(prefixes);
        let ticket = ScanTicket {
            session: session.id(),
            prefixes: session.prefixes().to_vec(),
        };
        *current = ScanPhase::Scanning(session.canceller());
        drop(current);

        {
            let mut status = self.status.write().await;
            status.session = Some(ticket.session);
            status.prefixes = ticket.prefixes.clone();
        }

        tokio::spawn(self.clone().follow(session));
        ticket
    }

    /// Cancel the running scan, if any
    pub async fn cancel_scan(&self) -> bool {
        let mut current = self.current.lock().await;
        match std::mem::replace(&mut *current, ScanPhase::Idle) {
            ScanPhase::Scanning(canceller) => {
                info!("Cancelling scan");
                canceller.cancel();
                true
            }
            ScanPhase::Resolving => {
                info!("Cancelling scan before probing starts");
                true
            }
            ScanPhase::Idle => false,
        }
    }

    async fn follow(self: Arc<Self>, mut session: ScanSession) {
        while let Some(event) = session.next_event().await {
            match &event {
                DiscoveryEvent::DeviceFound { device, .. } => {
                    self.devices.write().await.push(device.clone());
                }
                DiscoveryEvent::ScanCompleted(_) | DiscoveryEvent::ScanCancelled { .. } => {
                    self.finish().await;
                }
                _ => {}
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }

        let outcome = session.wait().await;
        debug!(
            completed = outcome.is_completed(),
            devices = outcome.devices().len(),
            "Scan session finished"
        );
    }

    async fn finish(&self) {
        *self.current.lock().await = ScanPhase::Idle;
        let mut status = self.status.write().await;
        status.busy = false;
        status.message = Some(MessageCode::SearchComplete);
    }
}

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Persisted device selection
    pub settings: SettingsStore,
    /// Device control client
    pub client: EcpClient,
    /// Discovery sessions and results
    pub discovery: Arc<DiscoveryService>,
}

impl AppState {
    /// Create application state gathering from the system's interfaces
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let client = config.ecp_client()?;
        let gatherer = InterfaceGatherer::system(config.discovery.exclude_interfaces.as_slice());
        Ok(Self::with_parts(config, client, gatherer))
    }

    pub fn with_parts(config: Config, client: EcpClient, gatherer: InterfaceGatherer) -> Arc<Self> {
        let scanner = SubnetScanner::with_config(HttpProbe::new(client.clone()), config.scan_config());
        let discovery = DiscoveryService::new(scanner, gatherer, config.gather_timeout());
        let settings = SettingsStore::new(config.storage.path.clone());

        Arc::new(Self {
            config,
            settings,
            client,
            discovery,
        })
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.discovery.subscribe()
    }

    /// Start-up flow: report the saved device, then scan for devices
    pub async fn setup(&self) -> Result<ScanTicket> {
        match self.settings.device_ip() {
            Ok(Some(ip)) => info!(ip = %ip, "Saved device"),
            Ok(None) => info!("No device saved yet"),
            Err(e) => warn!(error = %e, "Failed to read settings"),
        }
        Ok(self.discovery.start_scan().await?)
    }

    pub fn saved_settings(&self) -> Result<Settings> {
        Ok(self.settings.load()?)
    }

    /// Save a device picked from the discovered list
    pub async fn select_device(&self, ip: &str) -> Result<Settings, MessageCode> {
        let ip = ip.trim();
        if ip.parse::<Ipv4Addr>().is_err() {
            warn!(ip = %ip, "Selected entry has no usable address");
            self.discovery.set_message(MessageCode::FailedSetIp).await;
            return Err(MessageCode::FailedSetIp);
        }

        self.discovery.set_message(MessageCode::SettingIp).await;
        self.persist_device(ip).await
    }

    /// Save a user-typed address after confirming a device answers there
    pub async fn set_device(&self, address: &str) -> Result<DeviceInfo, MessageCode> {
        self.discovery.set_message(MessageCode::SettingIp).await;
        let address = address.trim();

        let info = match self.client.confirm_device(address).await {
            Ok(info) => info,
            Err(e) => {
                warn!(address = %address, error = %e, "Device check failed");
                self.discovery.set_message(MessageCode::FailedSetIp).await;
                return Err(MessageCode::FailedSetIp);
            }
        };

        self.persist_device(address).await?;
        Ok(info)
    }

    /// Save the channel variant that receives deep links
    pub async fn set_app_id(&self, app_id: &str) -> Result<Settings, MessageCode> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(MessageCode::FailedSetIp);
        }
        self.settings.set_app_id(app_id).map_err(|e| {
            warn!(error = %e, "Failed to save channel variant");
            MessageCode::FailedSetIp
        })
    }

    async fn persist_device(&self, address: &str) -> Result<Settings, MessageCode> {
        match self.settings.set_device_ip(address) {
            Ok(settings) => {
                self.discovery.set_message(MessageCode::SetIp).await;
                Ok(settings)
            }
            Err(e) => {
                warn!(error = %e, "Failed to save selected device");
                self.discovery.set_message(MessageCode::FailedSetIp).await;
                Err(MessageCode::FailedSetIp)
            }
        }
    }

    /// Cast to the saved device
    pub async fn cast(
        &self,
        target: CastTarget,
        time: Option<u64>,
    ) -> Result<UserMessage, UserMessage> {
        let mut settings = self.settings.load().map_err(|e| {
            warn!(error = %e, "Failed to read settings");
            UserMessage::cast_failed(MessageCode::IpNotSet)
        })?;
        if settings.roku_app_id.is_none() {
            debug!(app_id = %self.config.cast.app_id, "No channel saved, using configured one");
            settings.roku_app_id = Some(self.config.cast.app_id.clone());
        }

        cast_to(&self.client, &settings, target, time).await?;
        Ok(UserMessage::cast_succeeded())
    }

    /// Cast whatever a page extraction reported
    pub async fn cast_extracted(
        &self,
        response: ExtractResponse,
    ) -> Result<UserMessage, UserMessage> {
        match response {
            ExtractResponse::Failed { .. } => {
                let code = response.error_code().unwrap_or(MessageCode::FindStreamFail);
                Err(UserMessage::cast_failed(code))
            }
            ExtractResponse::Found { streamer, video } => {
                let target =
                    CastTarget::from_parts(streamer.login.as_deref(), video.id.as_deref())
                        .ok_or(UserMessage::cast_failed(MessageCode::FindStreamFail))?;
                let time = (video.time > 0).then_some(video.time);
                self.cast(target, time).await
            }
        }
    }
}
