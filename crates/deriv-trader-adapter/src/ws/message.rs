/*
[INPUT]:  Raw inbound JSON envelopes
[OUTPUT]: Correlation ids, remote errors, typed payloads, stream messages
[POS]:    WebSocket layer - envelope parsing and validation
[UPDATE]: When adding new message types or changing envelope format
*/

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{DerivError, Result};
use crate::types::{BalanceInfo, ErrorBody};

/// Field the service echoes back so replies can be matched to requests
pub const REQ_ID_FIELD: &str = "req_id";

/// Envelope that matched no in-flight request
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Balance subscription push
    Balance(BalanceInfo),
    /// Anything else, kept whole
    Other {
        msg_type: Option<String>,
        envelope: Value,
    },
}

impl StreamMessage {
    pub fn from_envelope(envelope: Value) -> Self {
        if msg_type(&envelope) == Some("balance") {
            if let Some(Ok(info)) = envelope
                .get("balance")
                .map(|payload| serde_json::from_value::<BalanceInfo>(payload.clone()))
            {
                return StreamMessage::Balance(info);
            }
        }

        StreamMessage::Other {
            msg_type: msg_type(&envelope).map(str::to_string),
            envelope,
        }
    }
}

pub fn correlation_id(envelope: &Value) -> Option<u64> {
    envelope.get(REQ_ID_FIELD).and_then(Value::as_u64)
}

pub fn msg_type(envelope: &Value) -> Option<&str> {
    envelope.get("msg_type").and_then(Value::as_str)
}

/// Error carried by an envelope, if any
pub fn remote_error(envelope: &Value) -> Option<DerivError> {
    let error = envelope.get("error")?;
    if error.is_null() {
        return None;
    }

    let body = match error {
        Value::String(message) => ErrorBody {
            code: String::new(),
            message: message.clone(),
        },
        other => serde_json::from_value::<ErrorBody>(other.clone()).unwrap_or_default(),
    };
    Some(DerivError::remote_error(body.code, body.message))
}

/// Turn a correlated reply into the caller's result, dropping our own `req_id`
pub fn into_reply(mut envelope: Value) -> Result<Value> {
    if let Some(err) = remote_error(&envelope) {
        return Err(err);
    }
    if let Value::Object(map) = &mut envelope {
        map.remove(REQ_ID_FIELD);
    }
    Ok(envelope)
}

/// Deserialize the sub-object stored under `field`
pub fn extract<T: DeserializeOwned>(envelope: Value, field: &str) -> Result<T> {
    let Value::Object(mut map) = envelope else {
        return Err(DerivError::InvalidResponse(format!(
            "expected object envelope carrying `{field}`"
        )));
    };
    let payload = map
        .remove(field)
        .ok_or_else(|| DerivError::InvalidResponse(format!("missing `{field}` in reply")))?;
    Ok(serde_json::from_value(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_into_reply_strips_req_id() {
        let reply = into_reply(json!({"result": "ok", "req_id": 7})).unwrap();
        assert_eq!(reply, json!({"result": "ok"}));
    }

    #[test]
    fn test_into_reply_surfaces_error_message() {
        let err = into_reply(json!({"error": {"message": "x"}, "req_id": 3})).unwrap_err();
        match err {
            DerivError::Remote { code, message } => {
                assert!(code.is_empty());
                assert_eq!(message, "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_remote_error_with_code() {
        let envelope = json!({
            "error": {"code": "InvalidToken", "message": "The token is invalid."},
            "msg_type": "authorize"
        });
        let err = remote_error(&envelope).unwrap();
        assert_eq!(err.to_string(), "Remote error (InvalidToken): The token is invalid.");
        assert!(remote_error(&json!({"error": null})).is_none());
    }

    #[test]
    fn test_extract_missing_field() {
        let err = extract::<BalanceInfo>(json!({"ping": "pong"}), "balance").unwrap_err();
        assert!(matches!(err, DerivError::InvalidResponse(_)));
    }

    #[test]
    fn test_stream_message_balance_push() {
        let message = StreamMessage::from_envelope(json!({
            "msg_type": "balance",
            "balance": {"balance": 95.5, "currency": "USD", "id": "sub-1"},
            "req_id": 2,
            "subscription": {"id": "sub-1"}
        }));
        match message {
            StreamMessage::Balance(info) => {
                assert_eq!(info.balance, Decimal::new(955, 1));
                assert_eq!(info.id.as_deref(), Some("sub-1"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_stream_message_other() {
        let message = StreamMessage::from_envelope(json!({"msg_type": "tick", "tick": {}}));
        assert!(matches!(message, StreamMessage::Other { msg_type: Some(ref t), .. } if t == "tick"));
    }
}
