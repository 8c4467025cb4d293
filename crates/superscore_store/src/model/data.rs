//! Defines `EpicsValue`, the data captured from a PV.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar value read from (or to be written to) a PV.
///
/// Serialized as the bare JSON scalar, so `5`, `5.0`, `"Off"` and `true`
/// each round-trip to the matching variant.
///
/// JSON has no non-finite numbers: a NaN or infinite `Float` is written as
/// `null` by the file backends and reads back as an unread value (`None`).
///
/// # Examples
///
/// ```
/// use superscore_store::EpicsValue;
///
/// let v: EpicsValue = serde_json::from_str("5").unwrap();
/// assert_eq!(v, EpicsValue::Int(5));
///
/// let v: EpicsValue = "Off".into();
/// assert_eq!(v.as_str(), Some("Off"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpicsValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl EpicsValue {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for EpicsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for EpicsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for EpicsValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for EpicsValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for EpicsValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for EpicsValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for EpicsValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_decoding_picks_narrowest_variant() {
        assert_eq!(serde_json::from_str::<EpicsValue>("true").unwrap(), EpicsValue::Bool(true));
        assert_eq!(serde_json::from_str::<EpicsValue>("-10").unwrap(), EpicsValue::Int(-10));
        assert_eq!(serde_json::from_str::<EpicsValue>("2.5").unwrap(), EpicsValue::Float(2.5));
        assert_eq!(
            serde_json::from_str::<EpicsValue>("\"Ion Pump\"").unwrap(),
            EpicsValue::from("Ion Pump")
        );
    }

    #[test]
    fn test_non_finite_float_is_stored_as_unread() {
        for x in [f64::NAN, f64::INFINITY] {
            let text = serde_json::to_string(&Some(EpicsValue::Float(x))).unwrap();
            assert_eq!(text, "null");
            assert_eq!(serde_json::from_str::<Option<EpicsValue>>(&text).unwrap(), None);
        }
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(EpicsValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(EpicsValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(EpicsValue::Bool(true).as_f64(), None);
    }
}
