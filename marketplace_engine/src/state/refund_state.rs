//! The refund negotiation protocol.
//!
//! A refund request is a sequence of rounds. Each round starts with the seller, escalates to the admin if the seller
//! rejects, and then hands the admin's ruling to the buyer. The buyer either accepts the ruling, which closes the case,
//! or rejects it, which supersedes the round and opens a new one. The buyer may reject at most
//! [`MAX_BUYER_REJECTIONS`] times; after that, a rejection closes the case in the merchant's favour.
//!
//! | round state      | seller                           | admin                                   | buyer                                |
//! |------------------|----------------------------------|-----------------------------------------|--------------------------------------|
//! | awaiting seller  | accept: close, buyer refunded    | out of turn                             | cancel: close, merchant paid         |
//! |                  | reject: escalate to admin        |                                         |                                      |
//! | awaiting admin   | already decided                  | accept: rule for buyer                  | cancel: close, merchant paid         |
//! |                  |                                  | reject: rule for merchant, or close     |                                      |
//! |                  |                                  | once the buyer is out of rejections     |                                      |
//! | awaiting buyer   | already decided                  | already decided                         | accept: close following the ruling   |
//! |                  |                                  |                                         | reject: new round, or close          |
//! | closed           | closed                           | closed                                  | closed                               |
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{
    Actor,
    InvoiceCode,
    RefundDecision,
    RefundParty,
    RefundRound,
    Resolution,
    RoundStateType,
    Ruling,
};

pub const MAX_BUYER_REJECTIONS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefundError {
    #[error("Transaction {0} already has a refund request")]
    RefundAlreadyRequested(InvoiceCode),
    #[error("Refund request #{0} does not exist")]
    RefundRequestNotFound(i64),
    #[error("Refund request #{0} is closed")]
    RefundRequestClosed(i64),
    #[error("It is not the {party}'s turn. The current round is {state}")]
    OutOfTurn { party: RefundParty, state: RoundStateType },
    #[error("The {0} has already decided this round")]
    AlreadyDecided(RefundParty),
    #[error("The admin has already ruled, so the request can no longer be canceled")]
    AdminAlreadyRuled,
    #[error("The {party} cannot {decision} a refund request")]
    UnsupportedDecision { party: RefundParty, decision: RefundDecision },
    #[error("The buyer has already rejected the admin's ruling {MAX_BUYER_REJECTIONS} times. The case is closed")]
    AlreadyRejectedThreeTimes,
    #[error("{actor} cannot act as the {party} of refund request #{request_id}")]
    NotAParty { actor: Actor, party: RefundParty, request_id: i64 },
    #[error("Refund request #{0} was changed by someone else. Fetch the current state and try again")]
    ConcurrentDecision(i64),
    #[error("Refund round #{round_id} is inconsistent: {reason}")]
    InconsistentRound { round_id: i64, reason: String },
}

/// The tagged state of a refund round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    AwaitingSeller,
    AwaitingAdmin,
    AwaitingBuyer { ruling: Ruling },
    /// Superseded by a buyer rejection. Only ever seen on earlier rounds.
    Rejected,
    Closed { resolution: Resolution },
}

impl RoundState {
    pub fn from_round(round: &RefundRound) -> Result<Self, RefundError> {
        let inconsistent = |reason: &str| RefundError::InconsistentRound { round_id: round.id, reason: reason.into() };
        match round.state {
            RoundStateType::AwaitingSeller => Ok(Self::AwaitingSeller),
            RoundStateType::AwaitingAdmin => Ok(Self::AwaitingAdmin),
            RoundStateType::AwaitingBuyer => round
                .admin_ruling
                .map(|ruling| Self::AwaitingBuyer { ruling })
                .ok_or_else(|| inconsistent("awaiting the buyer without an admin ruling")),
            RoundStateType::Rejected => Ok(Self::Rejected),
            RoundStateType::Closed => round
                .resolution
                .map(|resolution| Self::Closed { resolution })
                .ok_or_else(|| inconsistent("closed without a resolution")),
        }
    }

    pub fn state_type(&self) -> RoundStateType {
        match self {
            Self::AwaitingSeller => RoundStateType::AwaitingSeller,
            Self::AwaitingAdmin => RoundStateType::AwaitingAdmin,
            Self::AwaitingBuyer { .. } => RoundStateType::AwaitingBuyer,
            Self::Rejected => RoundStateType::Rejected,
            Self::Closed { .. } => RoundStateType::Closed,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            Self::Closed { resolution } => Some(*resolution),
            _ => None,
        }
    }
}

/// The party timestamp a decision writes. Each maps to exactly one column of the round record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStamp {
    BuyerAccepted,
    BuyerRejected,
    BuyerCanceled,
    SellerAccepted,
    SellerRejected,
    AdminAccepted,
    AdminRejected,
}

impl DecisionStamp {
    pub fn column(&self) -> &'static str {
        match self {
            Self::BuyerAccepted => "buyer_accepted_at",
            Self::BuyerRejected => "buyer_rejected_at",
            Self::BuyerCanceled => "buyer_canceled_at",
            Self::SellerAccepted => "seller_accepted_at",
            Self::SellerRejected => "seller_rejected_at",
            Self::AdminAccepted => "admin_accepted_at",
            Self::AdminRejected => "admin_rejected_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTransition {
    /// The current round stays open in a new state.
    Advance(RoundState),
    /// The current round, and with it the whole request, closes.
    Close(Resolution),
    /// The buyer rejected the ruling. The current round is superseded and a fresh round awaits the seller.
    NewRound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStep {
    pub stamp: DecisionStamp,
    pub transition: RoundTransition,
}

impl RoundStep {
    fn new(stamp: DecisionStamp, transition: RoundTransition) -> Self {
        Self { stamp, transition }
    }

    /// The state the current round is left in.
    pub fn round_state(&self) -> RoundState {
        match self.transition {
            RoundTransition::Advance(state) => state,
            RoundTransition::Close(resolution) => RoundState::Closed { resolution },
            RoundTransition::NewRound => RoundState::Rejected,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        match self.transition {
            RoundTransition::Close(resolution) => Some(resolution),
            _ => None,
        }
    }
}

/// Works out what `decision` by `party` does to the current round of refund request `request_id`.
///
/// `prior_rejections` is the number of earlier rounds the buyer has rejected.
pub fn advance_round(
    request_id: i64,
    state: &RoundState,
    party: RefundParty,
    decision: RefundDecision,
    prior_rejections: i64,
) -> Result<RoundStep, RefundError> {
    use DecisionStamp as S;
    use RefundDecision::*;
    use RefundParty::*;
    use RoundTransition::*;

    if let RoundState::Closed { .. } = state {
        return Err(RefundError::RefundRequestClosed(request_id));
    }
    if matches!((party, decision), (Seller, Cancel) | (Admin, Cancel)) {
        return Err(RefundError::UnsupportedDecision { party, decision });
    }
    let out_of_turn = || RefundError::OutOfTurn { party, state: state.state_type() };
    let rejections_left = prior_rejections < MAX_BUYER_REJECTIONS;
    let step = match (state, party, decision) {
        (RoundState::Rejected, ..) => {
            return Err(RefundError::InconsistentRound {
                round_id: request_id,
                reason: "the latest round of the request was superseded".into(),
            })
        },
        (RoundState::Closed { .. }, ..) => return Err(RefundError::RefundRequestClosed(request_id)),
        // Buyer may withdraw any time before the admin has ruled
        (RoundState::AwaitingSeller | RoundState::AwaitingAdmin, Buyer, Cancel) => {
            RoundStep::new(S::BuyerCanceled, Close(Resolution::BuyerCanceled))
        },
        (RoundState::AwaitingSeller | RoundState::AwaitingAdmin, Buyer, _) => return Err(out_of_turn()),
        (RoundState::AwaitingSeller, Seller, Accept) => {
            RoundStep::new(S::SellerAccepted, Close(Resolution::SellerAccepted))
        },
        (RoundState::AwaitingSeller, Seller, _) => RoundStep::new(S::SellerRejected, Advance(RoundState::AwaitingAdmin)),
        (RoundState::AwaitingSeller, Admin, _) => return Err(out_of_turn()),
        (RoundState::AwaitingAdmin, Seller, _) => return Err(RefundError::AlreadyDecided(Seller)),
        (RoundState::AwaitingAdmin, Admin, Accept) => {
            RoundStep::new(S::AdminAccepted, Advance(RoundState::AwaitingBuyer { ruling: Ruling::Accepted }))
        },
        (RoundState::AwaitingAdmin, Admin, _) if rejections_left => {
            RoundStep::new(S::AdminRejected, Advance(RoundState::AwaitingBuyer { ruling: Ruling::Rejected }))
        },
        (RoundState::AwaitingAdmin, Admin, _) => RoundStep::new(S::AdminRejected, Close(Resolution::AdminRejectedFinal)),
        (RoundState::AwaitingBuyer { .. }, Seller, _) => return Err(RefundError::AlreadyDecided(Seller)),
        (RoundState::AwaitingBuyer { .. }, Admin, _) => return Err(RefundError::AlreadyDecided(Admin)),
        (RoundState::AwaitingBuyer { .. }, Buyer, Cancel) => return Err(RefundError::AdminAlreadyRuled),
        (RoundState::AwaitingBuyer { ruling: Ruling::Accepted }, Buyer, Accept) => {
            RoundStep::new(S::BuyerAccepted, Close(Resolution::BuyerAcceptedRefund))
        },
        (RoundState::AwaitingBuyer { ruling: Ruling::Rejected }, Buyer, Accept) => {
            RoundStep::new(S::BuyerAccepted, Close(Resolution::BuyerAcceptedRejection))
        },
        (RoundState::AwaitingBuyer { .. }, Buyer, Reject) if rejections_left => RoundStep::new(S::BuyerRejected, NewRound),
        (RoundState::AwaitingBuyer { .. }, Buyer, Reject) => {
            RoundStep::new(S::BuyerRejected, Close(Resolution::RejectionLimitReached))
        },
    };
    Ok(step)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{Beneficiary, RefundDecision::*, RefundParty::*};

    fn step(state: RoundState, party: RefundParty, decision: RefundDecision) -> Result<RoundStep, RefundError> {
        advance_round(1, &state, party, decision, 0)
    }

    #[test]
    fn seller_concession_closes_for_the_buyer() {
        let s = step(RoundState::AwaitingSeller, Seller, Accept).unwrap();
        assert_eq!(s.stamp, DecisionStamp::SellerAccepted);
        assert_eq!(s.resolution().map(|r| r.beneficiary()), Some(Beneficiary::Buyer));
    }

    #[test]
    fn merchant_rejects_admin_accepts_buyer_accepts() {
        let s = step(RoundState::AwaitingSeller, Seller, Reject).unwrap();
        assert_eq!(s.round_state(), RoundState::AwaitingAdmin);
        let s = step(s.round_state(), Admin, Accept).unwrap();
        assert_eq!(s.round_state(), RoundState::AwaitingBuyer { ruling: Ruling::Accepted });
        let s = step(s.round_state(), Buyer, Accept).unwrap();
        assert_eq!(s.resolution(), Some(Resolution::BuyerAcceptedRefund));
        assert_eq!(s.stamp.column(), "buyer_accepted_at");
    }

    #[test]
    fn buyer_accepting_a_rejection_pays_the_merchant() {
        let s = step(RoundState::AwaitingAdmin, Admin, Reject).unwrap();
        let s = step(s.round_state(), Buyer, Accept).unwrap();
        assert_eq!(s.resolution(), Some(Resolution::BuyerAcceptedRejection));
        assert_eq!(Resolution::BuyerAcceptedRejection.beneficiary(), Beneficiary::Merchant);
    }

    #[test]
    fn buyer_can_only_cancel_before_the_ruling() {
        for state in [RoundState::AwaitingSeller, RoundState::AwaitingAdmin] {
            let s = step(state, Buyer, Cancel).unwrap();
            assert_eq!(s.resolution(), Some(Resolution::BuyerCanceled));
        }
        let ruled = RoundState::AwaitingBuyer { ruling: Ruling::Accepted };
        assert_eq!(step(ruled, Buyer, Cancel), Err(RefundError::AdminAlreadyRuled));
    }

    #[test]
    fn out_of_turn_and_repeated_decisions() {
        assert_eq!(
            step(RoundState::AwaitingSeller, Admin, Accept),
            Err(RefundError::OutOfTurn { party: Admin, state: RoundStateType::AwaitingSeller })
        );
        assert!(matches!(step(RoundState::AwaitingSeller, Buyer, Accept), Err(RefundError::OutOfTurn { .. })));
        assert!(matches!(step(RoundState::AwaitingAdmin, Buyer, Reject), Err(RefundError::OutOfTurn { .. })));
        assert_eq!(step(RoundState::AwaitingAdmin, Seller, Accept), Err(RefundError::AlreadyDecided(Seller)));
        let ruled = RoundState::AwaitingBuyer { ruling: Ruling::Rejected };
        assert_eq!(step(ruled, Admin, Accept), Err(RefundError::AlreadyDecided(Admin)));
        assert_eq!(step(ruled, Seller, Reject), Err(RefundError::AlreadyDecided(Seller)));
    }

    #[test]
    fn only_the_buyer_can_cancel() {
        assert_eq!(
            step(RoundState::AwaitingSeller, Seller, Cancel),
            Err(RefundError::UnsupportedDecision { party: Seller, decision: Cancel })
        );
        assert!(matches!(step(RoundState::AwaitingAdmin, Admin, Cancel), Err(RefundError::UnsupportedDecision { .. })));
    }

    #[test]
    fn closed_rounds_reject_everything() {
        let closed = RoundState::Closed { resolution: Resolution::SellerAccepted };
        for party in [Buyer, Seller, Admin] {
            for decision in [Accept, Reject, Cancel] {
                assert_eq!(advance_round(9, &closed, party, decision, 0), Err(RefundError::RefundRequestClosed(9)));
            }
        }
    }

    #[test]
    fn rejection_cap() {
        let ruled = RoundState::AwaitingBuyer { ruling: Ruling::Rejected };
        for prior in 0..MAX_BUYER_REJECTIONS {
            let s = advance_round(1, &ruled, Buyer, Reject, prior).unwrap();
            assert_eq!(s.transition, RoundTransition::NewRound);
            assert_eq!(s.round_state(), RoundState::Rejected);
        }
        let s = advance_round(1, &ruled, Buyer, Reject, MAX_BUYER_REJECTIONS).unwrap();
        assert_eq!(s.resolution(), Some(Resolution::RejectionLimitReached));
        assert_eq!(Resolution::RejectionLimitReached.beneficiary(), Beneficiary::Merchant);
    }

    #[test]
    fn admin_rejection_after_the_cap_closes_the_case() {
        let s = advance_round(1, &RoundState::AwaitingAdmin, Admin, Reject, 2).unwrap();
        assert_eq!(s.round_state(), RoundState::AwaitingBuyer { ruling: Ruling::Rejected });
        let s = advance_round(1, &RoundState::AwaitingAdmin, Admin, Reject, 3).unwrap();
        assert_eq!(s.resolution(), Some(Resolution::AdminRejectedFinal));
    }
}
