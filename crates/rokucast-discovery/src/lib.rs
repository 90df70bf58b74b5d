//! rokucast Discovery - Finding players on the local network
//!
//! Discovery runs in two stages:
//! - Local address resolution: a candidate-gathering session enumerates the
//!   host's local IPv4 addresses
//! - Subnet scanning: every host of each address's /24 is probed for a
//!   device-info document, and confirmed devices are reported as they arrive

pub mod gatherer;
pub mod probe;
pub mod resolver;
pub mod scanner;

pub use gatherer::{HostInterface, InterfaceGatherer, DEFAULT_EXCLUDED_INTERFACES};
pub use probe::{HttpProbe, Probe, ProbeOutcome, ProbeResult};
pub use resolver::{
    parse_candidate_address, CandidateGatherer, GatheringEvent, GatheringSession,
    LocalAddressResolver, Resolution, ResolveError, SessionConfig,
};
pub use scanner::{
    prefixes_for, DiscoveryEvent, ScanCanceller, ScanConfig, ScanOutcome, ScanSession, ScanState,
    ScanSummary, SubnetScanner,
};
