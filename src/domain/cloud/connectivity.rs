use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;

/// Reachability check run on compute instances the cloud reports ready.
pub trait ConnectivityChecker: Send + Sync {
    fn is_reachable(&self, order: &Order, instance: &OrderInstance) -> bool;
}

/// Trusts the cloud's READY report.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReachable;

impl ConnectivityChecker for AlwaysReachable {
    fn is_reachable(&self, _order: &Order, _instance: &OrderInstance) -> bool {
        true
    }
}
