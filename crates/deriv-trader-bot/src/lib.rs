/*
[INPUT]:  Public API exports for deriv-trader-bot crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod stats;
pub mod trader;

// Re-export main types for convenience
pub use config::BotConfig;
pub use stats::TradeStatsSnapshot;
pub use trader::{TradeOutcome, Trader, TraderSettings};
