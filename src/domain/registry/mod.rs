pub mod order_list;
pub mod order_registry;
pub mod transitioner;
