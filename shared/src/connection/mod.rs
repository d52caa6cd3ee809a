pub mod connection_config;
pub mod error;
pub mod frame;
pub mod message_kind;
pub mod reassembly;
pub mod session;
