//! Latest-wins sequencing for overlapping async requests.

use tokio_util::sync::CancellationToken;

/// Handle of one issued request.
#[derive(Debug, Clone)]
pub struct Ticket {
    id: u64,
    token: CancellationToken,
}

impl Ticket {
    /// Sequence number, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancelled as soon as a newer ticket is issued.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Issues monotonically numbered tickets; only the newest one is current.
///
/// Issuing a ticket cancels the previous one, so in-flight work tied to it
/// can abort early. Callers that share a `LatestWins` across tasks keep it
/// behind the same lock they use to apply results.
#[derive(Debug, Default)]
pub struct LatestWins {
    seq: u64,
    current: Option<CancellationToken>,
}

impl LatestWins {
    /// Sequencer with no ticket issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next ticket and cancels the previous one.
    pub fn begin(&mut self) -> Ticket {
        self.cancel();
        self.seq += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        Ticket {
            id: self.seq,
            token,
        }
    }

    /// Whether `ticket` is the newest one and was not cancelled.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.id == self.seq && !ticket.token.is_cancelled()
    }

    /// Cancels the outstanding ticket without issuing a new one.
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}
