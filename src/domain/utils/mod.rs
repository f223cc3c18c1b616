pub mod id;
pub mod lock;
