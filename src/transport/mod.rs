pub mod client;
pub mod messages;

pub use client::{NatsTransport, Transport};
pub use messages::{ClientEvent, ServerEvent};
