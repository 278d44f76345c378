/*
[INPUT]:  Inbound envelope payloads from the Deriv API
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a successful `authorize` reply
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub loginid: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub balance: Option<Decimal>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub is_virtual: u8,
}

/// Payload of a `balance` reply or subscription push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub balance: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loginid: Option<String>,
    /// Subscription id, present while the balance stream is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Contract identifier; the live service sends integers, some tools send strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContractId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractId::Numeric(id) => write!(f, "{id}"),
            ContractId::Text(id) => f.write_str(id),
        }
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        ContractId::Text(value.to_string())
    }
}

impl From<u64> for ContractId {
    fn from(value: u64) -> Self {
        ContractId::Numeric(value)
    }
}

/// Payload of a successful `buy` reply
///
/// Everything besides `contract_id` is kept as sent, so serializing a
/// confirmation reproduces the service's object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyConfirmation {
    pub contract_id: ContractId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BuyConfirmation {
    pub fn new(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            fields: Map::new(),
        }
    }

    pub fn transaction_id(&self) -> Option<u64> {
        self.fields.get("transaction_id").and_then(Value::as_u64)
    }

    pub fn buy_price(&self) -> Option<Decimal> {
        self.decimal("buy_price")
    }

    pub fn payout(&self) -> Option<Decimal> {
        self.decimal("payout")
    }

    pub fn balance_after(&self) -> Option<Decimal> {
        self.decimal("balance_after")
    }

    pub fn longcode(&self) -> Option<&str> {
        self.fields.get("longcode").and_then(Value::as_str)
    }

    fn decimal(&self, key: &str) -> Option<Decimal> {
        match self.fields.get(key)? {
            Value::Number(number) => Decimal::from_str(&number.to_string())
                .ok()
                .or_else(|| number.as_f64().and_then(Decimal::from_f64)),
            Value::String(text) => Decimal::from_str(text).ok(),
            _ => None,
        }
    }
}

/// Body of an error envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
