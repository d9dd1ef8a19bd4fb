//! Response envelope returned by every router command.
//!
//! The firmware encodes numbers as strings and omits fields for radios or
//! sessions that don't exist. Each numeric field is kept as a [`WireNumber`]
//! so that "absent" and "present but garbage" stay distinguishable for
//! display, while [`WireNumber::value`] folds both into `None` for decisions.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// A numeric field as it arrived on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WireNumber {
    /// Field missing or `null`.
    #[default]
    Absent,
    /// Field present and parseable as an integer.
    Numeric(i64),
    /// Field present but not an integer (e.g. `"-"`, `""`, `"N/A"`).
    Invalid(String),
}

impl WireNumber {
    /// The integer value, or `None` when absent or unparseable.
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Absent | Self::Invalid(_) => None,
        }
    }

    /// Non-negative value, for counters and uptime.
    pub fn unsigned(&self) -> Option<u64> {
        self.value().and_then(|v| u64::try_from(v).ok())
    }

    pub fn is_present(&self) -> bool {
        self.value().is_some()
    }

    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(v) => Self::Numeric(v),
                Err(_) => Self::Invalid(s),
            },
            Value::Number(n) => match n.as_i64() {
                Some(v) => Self::Numeric(v),
                None => Self::Invalid(n.to_string()),
            },
            other => Self::Invalid(other.to_string()),
        }
    }
}

impl fmt::Display for WireNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Absent | Self::Invalid(_) => f.write_str("NA"),
        }
    }
}

impl<'de> Deserialize<'de> for WireNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_json(Value::deserialize(deserializer)?))
    }
}

/// The fields of a router reply that the watchdog consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    #[serde(deserialize_with = "lenient_bool")]
    pub success: bool,
    #[serde(rename = "sessionId", deserialize_with = "lenient_session")]
    pub session_id: Option<String>,
    pub uptime: WireNumber,
    pub wan_rx_bytes: WireNumber,
    pub wan_tx_bytes: WireNumber,
    /// Primary (LTE) radio frequency.
    #[serde(rename = "FREQ")]
    pub freq: WireNumber,
    /// Secondary (5G) radio frequency.
    #[serde(rename = "FREQ_5G")]
    pub freq_5g: WireNumber,
    #[serde(rename = "RSRQ")]
    pub rsrq: WireNumber,
    #[serde(rename = "RSRQ_5G")]
    pub rsrq_5g: WireNumber,
}

impl ResponseEnvelope {
    /// Stand-in for a reboot reply the router never finished writing:
    /// success, secondary radio unknown, uptime reset.
    pub fn reboot_ack() -> Self {
        Self {
            success: true,
            freq_5g: WireNumber::Invalid("-".to_string()),
            uptime: WireNumber::Numeric(0),
            ..Default::default()
        }
    }
}

/// Decode a reply body. Anything that isn't a JSON object is malformed.
pub fn parse_envelope(body: &[u8]) -> GatewayResult<ResponseEnvelope> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(GatewayError::Malformed(format!(
            "expected a JSON object, got {}",
            json_type(&value)
        )));
    }
    serde_json::from_value(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

fn lenient_session<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
