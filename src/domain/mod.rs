pub mod broker;
pub mod cloud;
pub mod config;
pub mod connector;
pub mod federation;
pub mod order;
pub mod processor;
pub mod registry;
pub mod storage;
pub mod utils;
