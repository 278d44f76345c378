/*
[INPUT]:  Order parameters from a trading loop
[OUTPUT]: Balance queries and order confirmations
[POS]:    Session layer - trading abstraction over the socket client
[UPDATE]: When the trading loop needs new venue operations
*/

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::error::{DerivError, Result};
use crate::types::{BuyConfirmation, ContractId, ContractType};
use crate::ws::DerivClient;

/// Operations a trading loop needs from an authorized venue session
#[async_trait]
pub trait TradingSession: Send + Sync {
    /// Current account balance
    async fn balance(&self) -> Result<Decimal>;

    /// Place one fixed-duration stake order
    async fn open_order(
        &self,
        symbol: &str,
        amount: Decimal,
        contract_type: ContractType,
    ) -> Result<BuyConfirmation>;
}

#[async_trait]
impl TradingSession for DerivClient {
    async fn balance(&self) -> Result<Decimal> {
        self.get_balance().await
    }

    async fn open_order(
        &self,
        symbol: &str,
        amount: Decimal,
        contract_type: ContractType,
    ) -> Result<BuyConfirmation> {
        DerivClient::open_order(self, symbol, amount, contract_type).await
    }
}

/// Order recorded by [`MockTradingSession`]
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCall {
    pub symbol: String,
    pub amount: Decimal,
    pub contract_type: ContractType,
}

#[derive(Debug)]
struct MockState {
    balance: Decimal,
    failures_left: usize,
    connected: bool,
    order_latency: Duration,
    orders: Vec<OrderCall>,
}

/// In-memory session for testing trading loops
///
/// Each accepted order deducts its stake from the balance.
#[derive(Debug)]
pub struct MockTradingSession {
    state: Mutex<MockState>,
}

impl MockTradingSession {
    pub fn new(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(MockState {
                balance,
                failures_left: 0,
                connected: true,
                order_latency: Duration::ZERO,
                orders: Vec::new(),
            }),
        }
    }

    /// Reject the next `count` orders with a remote error
    pub fn fail_next_orders(&self, count: usize) {
        self.lock().failures_left = count;
    }

    /// Make every call fail as if the socket had closed
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Delay every order by `latency` before it is recorded
    pub fn set_order_latency(&self, latency: Duration) {
        self.lock().order_latency = latency;
    }

    /// Orders accepted or rejected so far, in call order
    pub fn orders(&self) -> Vec<OrderCall> {
        self.lock().orders.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TradingSession for MockTradingSession {
    async fn balance(&self) -> Result<Decimal> {
        let state = self.lock();
        if !state.connected {
            return Err(DerivError::NotConnected);
        }
        Ok(state.balance)
    }

    async fn open_order(
        &self,
        symbol: &str,
        amount: Decimal,
        contract_type: ContractType,
    ) -> Result<BuyConfirmation> {
        let latency = self.lock().order_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if !state.connected {
            return Err(DerivError::NotConnected);
        }

        state.orders.push(OrderCall {
            symbol: symbol.to_string(),
            amount,
            contract_type,
        });

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(DerivError::remote_error(
                "ContractBuyValidationError",
                "Trading is not offered for this asset.",
            ));
        }
        if amount > state.balance {
            return Err(DerivError::remote_error(
                "InsufficientBalance",
                "Your account balance is insufficient to buy this contract.",
            ));
        }

        state.balance -= amount;
        let contract_id = ContractId::Text(format!("MOCK-{}", state.orders.len()));
        let mut confirmation = BuyConfirmation::new(contract_id);
        confirmation
            .fields
            .insert("buy_price".to_string(), Value::from(amount.to_f64()));
        confirmation
            .fields
            .insert("balance_after".to_string(), Value::from(state.balance.to_f64()));
        Ok(confirmation)
    }
}
