use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Pin value
//
// `GET /get?token=..&pin=Vn` answers with the pin's current value in one of
// several shapes, depending on the pin's data type and the API version:
//
//   23.5          bare number
//   "23.5"        quoted string
//   ["23.5"]      single-element array (multi-value pins report all values)
//   on            plain text that is not valid JSON
//
// Everything is normalised to `PinValue`.
// ---------------------------------------------------------------------------

/// A single virtual-pin value as reported by the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PinValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PinPayload {
    List(Vec<PinValue>),
    Single(PinValue),
}

impl PinValue {
    /// Numeric view. Text values are parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PinValue::Number(v) => Some(*v).filter(|v| v.is_finite()),
            PinValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Switch view: any non-zero number is on.
    pub fn as_switch(&self) -> Option<bool> {
        self.as_f64().map(|v| v != 0.0)
    }

    /// Parse a raw relay response body.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<PinPayload>(bytes) {
            Ok(PinPayload::Single(value)) => Ok(value),
            Ok(PinPayload::List(values)) => values
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("relay returned an empty value list")),
            Err(_) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| anyhow!("relay returned a non-UTF-8 body"))?
                    .trim();
                if text.is_empty() {
                    bail!("relay returned an empty body");
                }
                Ok(PinValue::Text(text.to_owned()))
            }
        }
    }
}

/// Encode a pump switch state for the relay (`1` = on, `0` = off).
pub fn encode_switch(on: bool) -> i64 {
    on as i64
}
