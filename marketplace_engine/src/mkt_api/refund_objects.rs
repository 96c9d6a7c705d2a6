use serde::{Deserialize, Serialize};

use crate::db_types::{
    RefundMessage,
    RefundParty,
    RefundRequest,
    RefundRound,
    Resolution,
    RoundStateType,
    TransactionRecord,
};

/// A refund request with its full audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundCase {
    pub request: RefundRequest,
    /// Ordered by round number
    pub rounds: Vec<RefundRound>,
    pub messages: Vec<RefundMessage>,
}

impl RefundCase {
    pub fn current_round(&self) -> Option<&RefundRound> {
        self.rounds.last()
    }

    pub fn is_closed(&self) -> bool {
        self.current_round().map(|r| r.is_closed()).unwrap_or(false)
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.current_round().and_then(|r| r.resolution)
    }

    pub fn buyer_rejections(&self) -> usize {
        self.rounds.iter().filter(|r| r.state == RoundStateType::Rejected).count()
    }
}

/// The result of a party's decision on the current round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub request: RefundRequest,
    /// The round the decision was made on, as it is after the decision
    pub round: RefundRound,
    /// Set when the buyer's rejection opened a new round
    pub new_round: Option<RefundRound>,
    /// Set when the decision closed the case
    pub resolution: Option<Resolution>,
    /// The parent transaction, after any terminal status change caused by the closure
    pub transaction: TransactionRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefundMessage {
    pub party: RefundParty,
    pub body: String,
    pub image_url: Option<String>,
}

impl NewRefundMessage {
    pub fn new<S: Into<String>>(party: RefundParty, body: S) -> Self {
        Self { party, body: body.into(), image_url: None }
    }

    pub fn with_image<S: Into<String>>(mut self, image_url: S) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}
