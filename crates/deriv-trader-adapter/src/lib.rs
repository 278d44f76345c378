/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Deriv adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod error;
pub mod session;
pub mod types;
pub mod ws;

pub use error::{DerivError, Result};

pub use session::{MockTradingSession, OrderCall, TradingSession};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{ClientConfig, DerivClient, StreamMessage};
