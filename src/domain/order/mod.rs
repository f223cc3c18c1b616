pub mod identity;
pub mod instance;
pub mod order;
pub mod order_state;
pub mod resource;
