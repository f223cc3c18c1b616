use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order.
///
/// `Deactivated` is never held by an order inside the registry: it is the
/// persisted marker of an order whose cloud-side teardown finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Open,
    Spawning,
    Fulfilled,
    Failed,
    Closed,
    Deactivated,
}

impl OrderState {
    /// States that own a bucket in the registry, in processing order.
    pub const BUCKET_STATES: [OrderState; 5] =
        [OrderState::Open, OrderState::Spawning, OrderState::Fulfilled, OrderState::Failed, OrderState::Closed];

    pub fn is_bucket_state(&self) -> bool {
        !matches!(self, OrderState::Deactivated)
    }

    /// Whether the state machine allows a move from `self` to `next` through
    /// an ordinary transition. Leaving `Closed` only happens via deactivation.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        use OrderState::*;

        match (self, next) {
            (Open, Spawning | Failed | Closed) => true,
            (Spawning, Fulfilled | Failed | Closed) => true,
            (Fulfilled, Fulfilled | Failed | Closed) => true,
            (Failed, Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderState::Open => "OPEN",
            OrderState::Spawning => "SPAWNING",
            OrderState::Fulfilled => "FULFILLED",
            OrderState::Failed => "FAILED",
            OrderState::Closed => "CLOSED",
            OrderState::Deactivated => "DEACTIVATED",
        };
        write!(f, "{}", name)
    }
}
