/*
[INPUT]:  Deriv API enum values and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a rise/fall contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    /// Pays out if the exit spot is above the entry spot
    #[serde(rename = "CALL")]
    Call,
    /// Pays out if the exit spot is below the entry spot
    #[serde(rename = "PUT")]
    Put,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::Call => "CALL",
            ContractType::Put => "PUT",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    Stake,
    Payout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "t")]
    Ticks,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ContractType::Call, "\"CALL\"")]
    #[case(ContractType::Put, "\"PUT\"")]
    fn test_contract_type_wire_name(#[case] contract_type: ContractType, #[case] expected: &str) {
        let encoded = serde_json::to_string(&contract_type).unwrap();
        assert_eq!(encoded, expected);
        assert_eq!(format!("\"{contract_type}\""), expected);
    }

    #[test]
    fn test_duration_unit_wire_name() {
        assert_eq!(serde_json::to_string(&DurationUnit::Seconds).unwrap(), "\"s\"");
        assert_eq!(serde_json::to_string(&Basis::Stake).unwrap(), "\"stake\"");
    }
}
