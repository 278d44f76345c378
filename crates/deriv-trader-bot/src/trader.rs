/*
[INPUT]:  TraderSettings + TradingSession, CancellationToken
[OUTPUT]: Periodic randomized orders, balance updates, run statistics
[POS]:    Trading layer - interval-driven order loop
[UPDATE]: When changing trade cadence, direction choice or failure handling
*/

use std::sync::Arc;
use std::time::Duration;

use deriv_trader_adapter::{ContractId, ContractType, TradingSession};
use rand::Rng;
use rust_decimal::Decimal;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::stats::{TradeStats, TradeStatsSnapshot};

/// What to trade and how often
#[derive(Debug, Clone, PartialEq)]
pub struct TraderSettings {
    pub symbol: String,
    pub amount: Decimal,
    pub interval: Duration,
    pub max_trades: Option<u32>,
}

/// Result of one successful order
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub contract_type: ContractType,
    pub contract_id: ContractId,
    /// Balance after the order; `None` if the follow-up query failed
    pub balance: Option<Decimal>,
}

/// CALL or PUT with equal probability
pub fn pick_direction<R: Rng + ?Sized>(rng: &mut R) -> ContractType {
    if rng.gen_bool(0.5) {
        ContractType::Call
    } else {
        ContractType::Put
    }
}

fn random_direction() -> ContractType {
    pick_direction(&mut rand::thread_rng())
}

pub struct Trader<S: TradingSession> {
    session: Arc<S>,
    settings: TraderSettings,
    stats: TradeStats,
}

impl<S: TradingSession> Trader<S> {
    pub fn new(session: Arc<S>, settings: TraderSettings) -> Self {
        Self {
            session,
            settings,
            stats: TradeStats::default(),
        }
    }

    pub fn settings(&self) -> &TraderSettings {
        &self.settings
    }

    pub fn stats(&self) -> TradeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Query and record the balance
    pub async fn refresh_balance(&mut self) -> deriv_trader_adapter::Result<Decimal> {
        let balance = self.session.balance().await?;
        self.stats.record_balance(balance);
        Ok(balance)
    }

    /// Place one order, then refresh the balance
    pub async fn trade_once(
        &mut self,
        contract_type: ContractType,
    ) -> deriv_trader_adapter::Result<TradeOutcome> {
        self.stats.record_attempt();
        info!(
            symbol = %self.settings.symbol,
            contract_type = %contract_type,
            amount = %self.settings.amount,
            "attempting to open trade"
        );

        let confirmation = match self
            .session
            .open_order(&self.settings.symbol, self.settings.amount, contract_type)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(err) => {
                self.stats.record_failed();
                return Err(err);
            }
        };
        self.stats.record_opened(confirmation.contract_id.clone());

        let balance = match self.refresh_balance().await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(error = %err, "balance refresh after trade failed");
                None
            }
        };

        Ok(TradeOutcome {
            contract_type,
            contract_id: confirmation.contract_id,
            balance,
        })
    }

    /// Trade every `interval` until `shutdown` fires or `max_trades` is reached
    ///
    /// The first order goes out one interval after start. Failed attempts are
    /// logged and the loop waits for the next tick. Shutdown also abandons an
    /// order that is still waiting for its confirmation.
    pub async fn run(&mut self, shutdown: CancellationToken) -> TradeStatsSnapshot {
        info!(
            symbol = %self.settings.symbol,
            amount = %self.settings.amount,
            interval_secs = self.settings.interval.as_secs(),
            max_trades = ?self.settings.max_trades,
            "starting automated trading"
        );

        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(max_trades) = self.settings.max_trades
                && self.stats.attempted() >= max_trades
            {
                info!(max_trades, "trade limit reached");
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("automated trading stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let contract_type = random_direction();
                    let result = tokio::select! {
                        _ = shutdown.cancelled() => {
                            warn!(contract_type = %contract_type, "shutdown with order in flight");
                            break;
                        }
                        result = self.trade_once(contract_type) => result,
                    };
                    match result {
                        Ok(outcome) => info!(
                            contract_id = %outcome.contract_id,
                            contract_type = %outcome.contract_type,
                            balance = ?outcome.balance,
                            "trade opened"
                        ),
                        Err(err) => warn!(error = %err, "trade failed"),
                    }
                }
            }
        }

        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deriv_trader_adapter::MockTradingSession;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;
    use tokio_test::assert_ok;

    fn settings(max_trades: Option<u32>) -> TraderSettings {
        TraderSettings {
            symbol: "R_100".to_string(),
            amount: Decimal::from(10),
            interval: Duration::from_secs(60),
            max_trades,
        }
    }

    #[test]
    fn test_pick_direction_yields_both_sides() {
        let mut rng = StdRng::seed_from_u64(7);
        let picks: Vec<ContractType> = (0..64).map(|_| pick_direction(&mut rng)).collect();
        assert!(picks.contains(&ContractType::Call));
        assert!(picks.contains(&ContractType::Put));
    }

    #[rstest]
    #[case(ContractType::Call)]
    #[case(ContractType::Put)]
    #[tokio::test]
    async fn test_trade_once_records_outcome(#[case] contract_type: ContractType) {
        let session = Arc::new(MockTradingSession::new(Decimal::from(100)));
        let mut trader = Trader::new(session.clone(), settings(None));

        let outcome = assert_ok!(trader.trade_once(contract_type).await);
        assert_eq!(outcome.contract_type, contract_type);
        assert_eq!(outcome.balance, Some(Decimal::from(90)));

        let orders = session.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].contract_type, contract_type);
        assert_eq!(orders[0].symbol, "R_100");

        let stats = trader.stats();
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.last_contract_id, Some(outcome.contract_id));
    }

    #[tokio::test]
    async fn test_trade_once_failure_is_counted() {
        let session = Arc::new(MockTradingSession::new(Decimal::from(100)));
        session.fail_next_orders(1);
        let mut trader = Trader::new(session, settings(None));

        assert!(trader.trade_once(ContractType::Call).await.is_err());
        let stats = trader.stats();
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.opened, 0);
        assert!(stats.last_balance.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_trade_limit_and_survives_failures() {
        let session = Arc::new(MockTradingSession::new(Decimal::from(100)));
        session.fail_next_orders(1);
        let mut trader = Trader::new(session.clone(), settings(Some(3)));

        let stats = trader.run(CancellationToken::new()).await;
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.last_balance, Some(Decimal::from(80)));
        assert_eq!(session.orders().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown_before_first_tick() {
        let session = Arc::new(MockTradingSession::new(Decimal::from(100)));
        let mut trader = Trader::new(session.clone(), settings(None));
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            trigger.cancel();
        });

        let stats = trader.run(shutdown).await;
        assert_eq!(stats.attempted, 0);
        assert!(session.orders().is_empty());
    }
}
