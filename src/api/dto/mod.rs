//! Data Transfer Objects for REST request/response serialization.

pub mod connection_dto;
pub mod notification_dto;

pub use connection_dto::*;
pub use notification_dto::*;
