/*
[INPUT]:  WebSocket configuration, API token and request payloads
[OUTPUT]: Authorized session, correlated replies and stream messages
[POS]:    WebSocket layer - persistent connection to the trading API
[UPDATE]: When adding new calls or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{ClientConfig, DerivClient};
pub use message::StreamMessage;
