pub mod broker_dto;
pub mod order_dto;
