mod client;
mod messages;

pub use client::WsTransport;
pub use messages::{ack_outcome, MessageEvent, WsMessage};
