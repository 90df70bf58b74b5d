//! Host candidate gathering from the system's network interfaces

use serde::Serialize;
use std::net::Ipv4Addr;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::resolver::{CandidateGatherer, GatheringEvent, ResolveError, SessionConfig};

/// Interface name prefixes skipped by default
pub const DEFAULT_EXCLUDED_INTERFACES: &[&str] = &["lo", "docker", "br-", "veth"];

/// First port handed out to udp host candidates
const BASE_UDP_PORT: u16 = 50000;

/// An IPv4 address bound to a named interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInterface {
    pub name: String,
    pub ip: Ipv4Addr,
}

impl HostInterface {
    pub fn new(name: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    System,
    Fixed(Vec<HostInterface>),
}

/// Produces host candidates for every usable local IPv4 address.
///
/// Each address yields a udp and a tcp candidate, the same pair a browser
/// reports, so consumers have to deduplicate.
#[derive(Debug, Clone)]
pub struct InterfaceGatherer {
    source: Source,
    exclude: Vec<String>,
    closed: bool,
}

impl InterfaceGatherer {
    /// Gather from the interfaces the OS reports when the offer is created
    pub fn system<S: AsRef<str>>(exclude: &[S]) -> Self {
        Self {
            source: Source::System,
            exclude: exclude.iter().map(|s| s.as_ref().to_string()).collect(),
            closed: false,
        }
    }

    /// Gather from a fixed interface list
    pub fn from_interfaces(interfaces: Vec<HostInterface>) -> Self {
        Self {
            source: Source::Fixed(interfaces),
            exclude: Vec::new(),
            closed: false,
        }
    }

    /// Usable interfaces after filtering
    pub fn interfaces(&self) -> Result<Vec<HostInterface>, ResolveError> {
        let all = match &self.source {
            Source::System => system_interfaces()?,
            Source::Fixed(list) => list.clone(),
        };

        Ok(all
            .into_iter()
            .filter(|iface| {
                let excluded = self
                    .exclude
                    .iter()
                    .any(|prefix| iface.name.starts_with(prefix.as_str()));
                if excluded {
                    trace!(name = %iface.name, "Skipping excluded interface");
                }
                !excluded && !iface.ip.is_loopback() && !iface.ip.is_unspecified()
            })
            .collect())
    }
}

fn system_interfaces() -> Result<Vec<HostInterface>, ResolveError> {
    use network_interface::{NetworkInterface as NI, NetworkInterfaceConfig};

    let interfaces = NI::show().map_err(|e| ResolveError::Gathering(e.to_string()))?;

    Ok(interfaces
        .into_iter()
        .flat_map(|iface| {
            let name = iface.name.clone();
            iface.addr.into_iter().filter_map(move |addr| match addr {
                network_interface::Addr::V4(v4) => Some(HostInterface::new(name.clone(), v4.ip)),
                _ => None,
            })
        })
        .collect())
}

/// Candidate priority as browsers compute it for host candidates
fn priority(component: u32, local_preference: u32) -> u32 {
    (126 << 24) + (local_preference << 8) + (256 - component)
}

/// The udp/tcp candidate pair for one address
fn candidate_lines(index: usize, iface: &HostInterface) -> [String; 2] {
    let foundation = index * 2 + 1;
    let local_preference = 65535u32.saturating_sub(index as u32);
    let udp_port = BASE_UDP_PORT.wrapping_add(index as u16);

    [
        format!(
            "candidate:{} 1 udp {} {} {} typ host generation 0 network-id {}",
            foundation,
            priority(1, local_preference),
            iface.ip,
            udp_port,
            index + 1
        ),
        format!(
            "candidate:{} 1 tcp {} {} 9 typ host tcptype active generation 0 network-id {}",
            foundation + 1,
            priority(1, local_preference) - (1 << 24) * 40,
            iface.ip,
            index + 1
        ),
    ]
}

impl CandidateGatherer for InterfaceGatherer {
    fn start(
        &mut self,
        config: &SessionConfig,
    ) -> Result<mpsc::UnboundedReceiver<GatheringEvent>, ResolveError> {
        if self.closed {
            return Err(ResolveError::Closed);
        }
        if !config.ice_servers.is_empty() {
            debug!(servers = ?config.ice_servers, "Ignoring servers, only host candidates are gathered");
        }

        let interfaces = self.interfaces()?;
        if interfaces.is_empty() {
            warn!("No usable IPv4 interfaces found");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (index, iface) in interfaces.iter().enumerate() {
            debug!(name = %iface.name, ip = %iface.ip, "Host candidate");
            for line in candidate_lines(index, iface) {
                let _ = tx.send(GatheringEvent::Candidate(line));
            }
        }
        let _ = tx.send(GatheringEvent::Complete);
        Ok(rx)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{parse_candidate_address, LocalAddressResolver};
    use rokucast_core::LocalAddress;

    #[test]
    fn test_candidate_lines_parse_back() {
        let iface = HostInterface::new("eth0", Ipv4Addr::new(192, 168, 1, 42));
        for line in candidate_lines(0, &iface) {
            assert_eq!(
                parse_candidate_address(&line),
                Some(LocalAddress::new("192.168.1.42"))
            );
        }
    }

    #[test]
    fn test_filters_loopback_and_excluded() {
        let mut gatherer = InterfaceGatherer::from_interfaces(vec![
            HostInterface::new("lo", Ipv4Addr::LOCALHOST),
            HostInterface::new("docker0", Ipv4Addr::new(172, 17, 0, 1)),
            HostInterface::new("wlan0", Ipv4Addr::new(192, 168, 1, 42)),
            HostInterface::new("any", Ipv4Addr::UNSPECIFIED),
        ]);
        gatherer.exclude = vec!["docker".to_string()];

        let names: Vec<String> = gatherer
            .interfaces()
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["wlan0".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_over_fixed_interfaces() {
        let gatherer = InterfaceGatherer::from_interfaces(vec![
            HostInterface::new("eth0", Ipv4Addr::new(192, 168, 1, 42)),
            HostInterface::new("wg0", Ipv4Addr::new(10, 8, 0, 2)),
        ]);

        let addresses = LocalAddressResolver::new(gatherer).resolve().await;
        assert_eq!(
            addresses,
            vec![LocalAddress::new("192.168.1.42"), LocalAddress::new("10.8.0.2")]
        );
    }

    #[tokio::test]
    async fn test_no_interfaces_completes_empty() {
        let gatherer = InterfaceGatherer::from_interfaces(Vec::new());
        let addresses = LocalAddressResolver::new(gatherer).resolve().await;
        assert!(addresses.is_empty());
    }

    #[test]
    fn test_closed_gatherer_refuses_to_start() {
        let mut gatherer = InterfaceGatherer::from_interfaces(Vec::new());
        gatherer.close();
        assert!(matches!(
            gatherer.start(&SessionConfig::default()),
            Err(ResolveError::Closed)
        ));
    }
}
