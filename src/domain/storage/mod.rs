pub mod in_memory;
pub mod json_file;

use crate::domain::order::order::Order;
use crate::error::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable record of orders. Called synchronously from inside the state
/// transitioner's critical section; a call only returns `Ok` once the write
/// is durable.
pub trait OrderStorage: Send + Sync {
    /// Records a brand new order.
    fn save(&self, order: &Order) -> StorageResult<()>;

    /// Overwrites the stored copy of an order saved earlier.
    fn update(&self, order: &Order) -> StorageResult<()>;

    /// Every stored order that has not been deactivated, oldest first.
    fn load_active(&self) -> StorageResult<Vec<Order>>;
}
