/*
[INPUT]:  Caller-supplied order parameters and credentials
[OUTPUT]: Outbound envelope structs ready for serialization
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{Basis, ContractType, DurationUnit};

/// Contracts placed by this client always run for a fixed minute
pub const ORDER_DURATION_SECS: u32 = 60;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub authorize: String,
}

impl AuthorizeRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            authorize: token.into(),
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for AuthorizeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizeRequest")
            .field("authorize", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRequest {
    pub balance: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<u8>,
}

impl BalanceRequest {
    pub fn new(subscribe: bool) -> Self {
        Self {
            balance: 1,
            subscribe: subscribe.then_some(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyParameters {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub basis: Basis,
    pub contract_type: ContractType,
    pub currency: String,
    pub symbol: String,
    pub duration: u32,
    pub duration_unit: DurationUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyRequest {
    pub buy: u8,
    /// Maximum price the caller accepts; equal to the stake for stake-basis orders
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub parameters: BuyParameters,
}

impl BuyRequest {
    /// Stake-basis order with the fixed 60 second duration
    pub fn stake(symbol: &str, amount: Decimal, contract_type: ContractType, currency: &str) -> Self {
        Self {
            buy: 1,
            price: amount,
            parameters: BuyParameters {
                amount,
                basis: Basis::Stake,
                contract_type,
                currency: currency.to_string(),
                symbol: symbol.to_string(),
                duration: ORDER_DURATION_SECS,
                duration_unit: DurationUnit::Seconds,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingRequest {
    pub ping: u8,
}

impl Default for PingRequest {
    fn default() -> Self {
        Self { ping: 1 }
    }
}
