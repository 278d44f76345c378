/*
[INPUT]:  Trade loop results (orders opened, failures, balances)
[OUTPUT]: Snapshot-friendly trading statistics for the run summary
[POS]:    Runtime statistics owned by the trade loop
[UPDATE]: When adding/removing trade-level runtime signals
*/

use std::time::Instant;

use deriv_trader_adapter::ContractId;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStatsSnapshot {
    pub attempted: u32,
    pub opened: u32,
    pub failed: u32,
    pub last_balance: Option<Decimal>,
    pub last_contract_id: Option<ContractId>,
    pub last_update: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct TradeStats {
    attempted: u32,
    opened: u32,
    failed: u32,
    last_balance: Option<Decimal>,
    last_contract_id: Option<ContractId>,
    last_update: Option<Instant>,
}

impl TradeStats {
    pub fn snapshot(&self) -> TradeStatsSnapshot {
        TradeStatsSnapshot {
            attempted: self.attempted,
            opened: self.opened,
            failed: self.failed,
            last_balance: self.last_balance,
            last_contract_id: self.last_contract_id.clone(),
            last_update: self.last_update,
        }
    }

    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    pub fn record_attempt(&mut self) {
        self.attempted += 1;
        self.last_update = Some(Instant::now());
    }

    pub fn record_opened(&mut self, contract_id: ContractId) {
        self.opened += 1;
        self.last_contract_id = Some(contract_id);
        self.last_update = Some(Instant::now());
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.last_update = Some(Instant::now());
    }

    pub fn record_balance(&mut self, balance: Decimal) {
        self.last_balance = Some(balance);
        self.last_update = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_counts() {
        let mut stats = TradeStats::default();
        stats.record_attempt();
        stats.record_opened(ContractId::from("C1"));
        stats.record_attempt();
        stats.record_failed();
        stats.record_balance(Decimal::from(90));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempted, 2);
        assert_eq!(snapshot.opened, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.last_balance, Some(Decimal::from(90)));
        assert_eq!(snapshot.last_contract_id, Some(ContractId::from("C1")));
        assert!(snapshot.last_update.is_some());
    }
}
