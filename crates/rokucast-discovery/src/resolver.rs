//! Local address resolution through candidate gathering
//!
//! A peer-connection style negotiation session is opened with no relay or
//! reflexive servers configured, so only host candidates are ever produced.
//! Nothing is negotiated with a remote peer: the session is opened, a data
//! channel is added (without one there is nothing to gather for), an offer is
//! created to kick off gathering, and the address token of every candidate is
//! collected until the gatherer reports completion. The session is then
//! closed and abandoned.

use rokucast_core::LocalAddress;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

/// Default bound on a whole gathering session
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Offer already created for this session")]
    AlreadyStarted,
    #[error("Session is closed")]
    Closed,
    #[error("Candidate gathering failed: {0}")]
    Gathering(String),
}

/// Events delivered while a session gathers candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatheringEvent {
    /// One candidate line, e.g.
    /// `candidate:1 1 udp 2122260223 192.168.1.42 54321 typ host generation 0`
    Candidate(String),
    /// No more candidates will follow
    Complete,
}

/// Negotiation parameters handed to the gatherer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Relay/reflexive servers. Left empty so public addresses never surface.
    pub ice_servers: Vec<String>,
    /// Labels of the data channels added before the offer
    pub data_channels: Vec<String>,
}

/// Platform side of a gathering session
pub trait CandidateGatherer: Send {
    /// Start gathering for an offer. Candidates arrive on the returned
    /// channel and the last event is [`GatheringEvent::Complete`]; a closed
    /// channel means the same thing.
    fn start(
        &mut self,
        config: &SessionConfig,
    ) -> Result<mpsc::UnboundedReceiver<GatheringEvent>, ResolveError>;

    /// Release everything the session holds
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    New,
    Gathering,
    Closed,
}

/// One negotiation session. Offers can't be re-created; a new resolution
/// needs a new session.
pub struct GatheringSession<G: CandidateGatherer> {
    gatherer: G,
    config: SessionConfig,
    state: SessionState,
}

impl<G: CandidateGatherer> GatheringSession<G> {
    /// Open a session with an empty server list
    pub fn new(gatherer: G) -> Self {
        Self {
            gatherer,
            config: SessionConfig::default(),
            state: SessionState::New,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn create_data_channel(&mut self, label: &str) {
        self.config.data_channels.push(label.to_string());
    }

    /// Create the offer, which starts candidate gathering
    pub fn create_offer(
        &mut self,
    ) -> Result<mpsc::UnboundedReceiver<GatheringEvent>, ResolveError> {
        match self.state {
            SessionState::Gathering => return Err(ResolveError::AlreadyStarted),
            SessionState::Closed => return Err(ResolveError::Closed),
            SessionState::New => {}
        }
        self.state = SessionState::Gathering;

        if self.config.data_channels.is_empty() {
            // Nothing to negotiate, so the platform never gathers
            debug!("Offer created without a data channel, no candidates will be gathered");
            let (tx, rx) = mpsc::unbounded_channel();
            let _ = tx.send(GatheringEvent::Complete);
            return Ok(rx);
        }

        self.gatherer.start(&self.config)
    }

    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.gatherer.close();
            self.state = SessionState::Closed;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }
}

impl<G: CandidateGatherer> Drop for GatheringSession<G> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Extract the address token from a candidate line.
///
/// The token is the field just before the port that precedes `typ`; when
/// a line somehow holds several such runs the last one counts. Lines that
/// don't start with `candidate:` yield nothing.
pub fn parse_candidate_address(line: &str) -> Option<LocalAddress> {
    let rest = line.trim().strip_prefix("candidate:")?;
    let tokens: Vec<&str> = rest.split(' ').collect();

    (3..tokens.len()).rev().find_map(|i| {
        let typ = tokens[i];
        let port = tokens[i - 1];
        let address = tokens[i - 2];
        // At least one character of foundation/component/etc before the address
        let has_lead = i >= 4 || !tokens[0].is_empty();

        let matches = typ.starts_with("typ")
            && !port.is_empty()
            && port.bytes().all(|b| b.is_ascii_digit())
            && !address.is_empty()
            && !address.contains(char::is_whitespace)
            && has_lead;

        matches.then(|| LocalAddress::new(address))
    })
}

/// Lazy, one-shot sequence of the local addresses found by one session
pub struct Resolution<G: CandidateGatherer> {
    session: GatheringSession<G>,
    events: mpsc::UnboundedReceiver<GatheringEvent>,
    found: Vec<LocalAddress>,
    deadline: Option<Instant>,
    done: bool,
}

impl<G: CandidateGatherer> Resolution<G> {
    /// Next address not seen before, or `None` once gathering completed
    pub async fn next(&mut self) -> Option<LocalAddress> {
        while !self.done {
            let event = match self.deadline {
                Some(deadline) => match timeout_at(deadline, self.events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        warn!(
                            found = self.found.len(),
                            "Candidate gathering timed out"
                        );
                        self.finish();
                        return None;
                    }
                },
                None => self.events.recv().await,
            };

            match event {
                Some(GatheringEvent::Candidate(line)) => match parse_candidate_address(&line) {
                    Some(address) if self.found.contains(&address) => {
                        trace!(address = %address, "Duplicate candidate address");
                    }
                    Some(address) => {
                        debug!(address = %address, "Found local address");
                        self.found.push(address.clone());
                        return Some(address);
                    }
                    None => {
                        debug!(candidate = %line, "Unparseable candidate line");
                    }
                },
                Some(GatheringEvent::Complete) | None => self.finish(),
            }
        }
        None
    }

    /// Drain the session and hand back the deduplicated address list
    pub async fn collect(mut self) -> Vec<LocalAddress> {
        while self.next().await.is_some() {}
        info!(count = self.found.len(), "Local address resolution complete");
        std::mem::take(&mut self.found)
    }

    /// Addresses yielded so far
    pub fn found(&self) -> &[LocalAddress] {
        &self.found
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) {
        self.done = true;
        self.session.close();
    }
}

/// Runs one resolution session over a gatherer
pub struct LocalAddressResolver<G: CandidateGatherer> {
    gatherer: G,
    timeout: Option<Duration>,
}

impl<G: CandidateGatherer> LocalAddressResolver<G> {
    pub fn new(gatherer: G) -> Self {
        Self {
            gatherer,
            timeout: Some(DEFAULT_GATHER_TIMEOUT),
        }
    }

    /// Bound the whole session; `None` waits for the gatherer indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open the session and start gathering
    pub fn start(self) -> Result<Resolution<G>, ResolveError> {
        let mut session = GatheringSession::new(self.gatherer);
        session.create_data_channel("");
        let events = session.create_offer()?;

        Ok(Resolution {
            session,
            events,
            found: Vec::new(),
            deadline: self.timeout.map(|t| Instant::now() + t),
            done: false,
        })
    }

    /// Resolve the host's local addresses. A failed or empty session yields
    /// an empty list rather than an error.
    pub async fn resolve(self) -> Vec<LocalAddress> {
        match self.start() {
            Ok(resolution) => resolution.collect().await,
            Err(e) => {
                warn!(error = %e, "Could not start candidate gathering");
                Vec::new()
            }
        }
    }
}
