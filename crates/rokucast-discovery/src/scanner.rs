//! Subnet scanner: probes every host of each /24 and reports devices

use futures_util::FutureExt;
use rokucast_core::{DiscoveredDevice, LocalAddress, SubnetPrefix, HOSTS_PER_PREFIX};
use rokucast_ecp::parse_device_info;
use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{self, JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::probe::{Probe, ProbeOutcome, ProbeResult};

/// Scanner configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanConfig {
    /// Upper bound on probes in flight at once; `None` launches them all
    pub max_in_flight: Option<usize>,
}

/// Progress of one prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanState {
    pub prefix: SubnetPrefix,
    /// Probes that have settled, 0..=255
    pub settled: usize,
    /// Devices confirmed in this prefix
    pub found: usize,
}

impl ScanState {
    pub fn new(prefix: SubnetPrefix) -> Self {
        Self {
            prefix,
            settled: 0,
            found: 0,
        }
    }

    /// Count one settled probe. Returns true only on the transition to done.
    pub fn settle(&mut self) -> bool {
        if self.is_done() {
            return false;
        }
        self.settled += 1;
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.settled >= HOSTS_PER_PREFIX
    }
}

/// Totals of a completed scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub session: Uuid,
    pub prefixes: Vec<SubnetPrefix>,
    pub devices: Vec<DiscoveredDevice>,
    /// Probes that settled
    pub probes: usize,
}

/// Discovery event for real-time updates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    /// Probes launched for these prefixes
    ScanStarted {
        session: Uuid,
        prefixes: Vec<SubnetPrefix>,
    },
    /// A probe confirmed a device
    DeviceFound {
        session: Uuid,
        device: DiscoveredDevice,
    },
    /// All 255 probes of a prefix settled
    PrefixCompleted {
        session: Uuid,
        prefix: SubnetPrefix,
        found: usize,
    },
    /// Every prefix settled; emitted once per session
    ScanCompleted(ScanSummary),
    /// The session was cancelled before completing
    ScanCancelled { session: Uuid },
}

/// How a scan session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed(ScanSummary),
    Cancelled { devices: Vec<DiscoveredDevice> },
}

impl ScanOutcome {
    pub fn devices(&self) -> &[DiscoveredDevice] {
        match self {
            Self::Completed(summary) => &summary.devices,
            Self::Cancelled { devices } => devices,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Handle that cancels a running session from anywhere
#[derive(Debug, Clone)]
pub struct ScanCanceller(Arc<watch::Sender<bool>>);

impl ScanCanceller {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// One running scan
pub struct ScanSession {
    id: Uuid,
    prefixes: Vec<SubnetPrefix>,
    events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    canceller: ScanCanceller,
    handle: JoinHandle<ScanOutcome>,
}

impl ScanSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prefixes(&self) -> &[SubnetPrefix] {
        &self.prefixes
    }

    /// Stop the scan: pending probes are aborted and later results ignored
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> ScanCanceller {
        self.canceller.clone()
    }

    /// Next event, or `None` once the session has finished
    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        self.events.recv().await
    }

    /// Wait for the session to finish
    pub async fn wait(self) -> ScanOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Scan task failed");
                ScanOutcome::Cancelled {
                    devices: Vec::new(),
                }
            }
        }
    }
}

/// Subnet scanner over a probe implementation
pub struct SubnetScanner<P: Probe> {
    probe: Arc<P>,
    config: ScanConfig,
}

impl<P: Probe> Clone for SubnetScanner<P> {
    fn clone(&self) -> Self {
        Self {
            probe: self.probe.clone(),
            config: self.config.clone(),
        }
    }
}

impl<P: Probe> SubnetScanner<P> {
    pub fn new(probe: P) -> Self {
        Self::with_config(probe, ScanConfig::default())
    }

    pub fn with_config(probe: P, config: ScanConfig) -> Self {
        Self {
            probe: Arc::new(probe),
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start scanning the given prefixes. Duplicates are scanned once.
    pub fn scan(&self, prefixes: impl IntoIterator<Item = SubnetPrefix>) -> ScanSession {
        let mut unique = Vec::new();
        for prefix in prefixes {
            if !unique.contains(&prefix) {
                unique.push(prefix);
            }
        }

        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(run_scan(
            self.probe.clone(),
            self.config.clone(),
            id,
            unique.clone(),
            event_tx,
            cancel_rx,
        ));

        ScanSession {
            id,
            prefixes: unique,
            events: event_rx,
            canceller: ScanCanceller(Arc::new(cancel_tx)),
            handle,
        }
    }

    /// Scan with callbacks: `on_device_found` for each confirmed device,
    /// `on_scan_complete` once when every prefix has settled
    pub async fn scan_with<F, C>(
        &self,
        prefixes: impl IntoIterator<Item = SubnetPrefix>,
        mut on_device_found: F,
        on_scan_complete: C,
    ) -> ScanOutcome
    where
        F: FnMut(&DiscoveredDevice),
        C: FnOnce(&ScanSummary),
    {
        let mut session = self.scan(prefixes);
        let mut on_scan_complete = Some(on_scan_complete);

        while let Some(event) = session.next_event().await {
            match event {
                DiscoveryEvent::DeviceFound { device, .. } => on_device_found(&device),
                DiscoveryEvent::ScanCompleted(summary) => {
                    if let Some(callback) = on_scan_complete.take() {
                        callback(&summary);
                    }
                }
                _ => {}
            }
        }

        session.wait().await
    }
}

/// Distinct prefixes of the IPv4 local addresses, in first-seen order
pub fn prefixes_for(addresses: &[LocalAddress]) -> Vec<SubnetPrefix> {
    let mut prefixes = Vec::new();
    for address in addresses {
        match SubnetPrefix::from_local_address(address) {
            Some(prefix) if !prefixes.contains(&prefix) => prefixes.push(prefix),
            Some(_) => {}
            None => debug!(address = %address, "Skipping non-IPv4 local address"),
        }
    }
    prefixes
}

/// Confirm a settled probe as a device
fn identify(result: &ProbeResult) -> Option<DiscoveredDevice> {
    let body = match &result.outcome {
        ProbeOutcome::Response { status: 200, body } => body,
        ProbeOutcome::Response { status, .. } => {
            trace!(ip = %result.target, status = status, "Non-200 device-info response");
            return None;
        }
        ProbeOutcome::TimedOut | ProbeOutcome::Failed(_) => return None,
    };

    match parse_device_info(body) {
        Ok(info) if info.is_roku() => {
            if info.user_device_name.is_none() {
                debug!(ip = %result.target, "Ignoring device without user-device-name");
                return None;
            }
            Some(DiscoveredDevice::from_info(result.target, &info))
        }
        Ok(info) => {
            debug!(ip = %result.target, vendor = %info.vendor_name, "Ignoring other vendor");
            None
        }
        Err(e) => {
            trace!(ip = %result.target, error = %e, "Unparseable device-info");
            None
        }
    }
}

async fn probe_one<P: Probe>(
    probe: Arc<P>,
    limiter: Option<Arc<Semaphore>>,
    target: Ipv4Addr,
) -> ProbeResult {
    let _permit = match limiter {
        Some(limiter) => limiter.acquire_owned().await.ok(),
        None => None,
    };

    let outcome = AssertUnwindSafe(probe.probe(target))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| ProbeOutcome::Failed("probe panicked".to_string()));

    ProbeResult { target, outcome }
}

async fn run_scan<P: Probe>(
    probe: Arc<P>,
    config: ScanConfig,
    session: Uuid,
    prefixes: Vec<SubnetPrefix>,
    events: mpsc::UnboundedSender<DiscoveryEvent>,
    mut cancel: watch::Receiver<bool>,
) -> ScanOutcome {
    let _ = events.send(DiscoveryEvent::ScanStarted {
        session,
        prefixes: prefixes.clone(),
    });

    let mut devices: Vec<DiscoveredDevice> = Vec::new();

    if *cancel.borrow_and_update() {
        info!(session = %session, "Scan cancelled before start");
        let _ = events.send(DiscoveryEvent::ScanCancelled { session });
        return ScanOutcome::Cancelled { devices };
    }

    info!(
        session = %session,
        prefixes = prefixes.len(),
        "Starting subnet scan"
    );

    let mut states: HashMap<SubnetPrefix, ScanState> = prefixes
        .iter()
        .map(|prefix| (*prefix, ScanState::new(*prefix)))
        .collect();

    let limiter = config
        .max_in_flight
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    let mut tasks = JoinSet::new();
    let mut targets: HashMap<task::Id, Ipv4Addr> = HashMap::new();
    for prefix in &prefixes {
        for target in prefix.hosts() {
            let handle = tasks.spawn(probe_one(probe.clone(), limiter.clone(), target));
            targets.insert(handle.id(), target);
        }
    }

    let mut probes = 0usize;
    let mut cancel_open = true;

    loop {
        tokio::select! {
            biased;

            changed = cancel.changed(), if cancel_open => {
                match changed {
                    Ok(()) if *cancel.borrow_and_update() => {
                        tasks.abort_all();
                        info!(session = %session, settled = probes, "Scan cancelled");
                        let _ = events.send(DiscoveryEvent::ScanCancelled { session });
                        return ScanOutcome::Cancelled { devices };
                    }
                    Ok(()) => {}
                    Err(_) => cancel_open = false,
                }
            }

            joined = tasks.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        let Some(target) = targets.get(&e.id()).copied() else {
                            warn!(session = %session, error = %e, "Unknown probe task failed");
                            continue;
                        };
                        warn!(session = %session, ip = %target, error = %e, "Probe task failed");
                        ProbeResult {
                            target,
                            outcome: ProbeOutcome::Failed(e.to_string()),
                        }
                    }
                };
                probes += 1;

                let prefix = SubnetPrefix::from(result.target);
                let Some(state) = states.get_mut(&prefix) else {
                    continue;
                };

                if let Some(device) = identify(&result) {
                    info!(ip = %device.ip, name = %device.name, "Found device");
                    state.found += 1;
                    devices.push(device.clone());
                    let _ = events.send(DiscoveryEvent::DeviceFound { session, device });
                }

                if state.settle() {
                    debug!(prefix = %prefix, found = state.found, "Prefix scan complete");
                    let _ = events.send(DiscoveryEvent::PrefixCompleted {
                        session,
                        prefix,
                        found: state.found,
                    });
                }

                if states.values().all(ScanState::is_done) {
                    break;
                }
            }
        }
    }

    let summary = ScanSummary {
        session,
        prefixes,
        devices,
        probes,
    };
    info!(
        session = %session,
        found = summary.devices.len(),
        probes = summary.probes,
        "Subnet scan complete"
    );
    let _ = events.send(DiscoveryEvent::ScanCompleted(summary.clone()));
    ScanOutcome::Completed(summary)
}
