pub mod client;
pub mod codec;
pub mod protocol;
pub mod remote_facade;
pub mod server;
