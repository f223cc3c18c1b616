use std::path::Path;

use crate::api::broker_dto::BrokerConfigDto;
use crate::domain::broker::OrderBroker;
use crate::domain::config::BrokerConfig;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Reads a broker configuration file and builds the broker it describes,
/// recovering whatever orders its storage still holds.
pub fn load_broker(config_path: impl AsRef<Path>) -> Result<OrderBroker> {
    let config_path = config_path.as_ref();

    let dto: BrokerConfigDto = parse_json_file(config_path)?;
    log::info!("Configuration file '{}' parsed successfully.", config_path.display());

    let config = BrokerConfig::from_dto(dto)?;
    OrderBroker::new(config)
}
