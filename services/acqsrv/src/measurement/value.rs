//! Sample values held by a measurement

use std::fmt;

use edgelink_codec::TypedValue;
use errors::AcqError;
use serde::{Serialize, Serializer};

/// Value of one sample: a number, a run of numbers, or text
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Scalar(f64),
    /// Multi-channel reads, coil runs and register dumps
    List(Vec<f64>),
    /// STRING registers
    Text(String),
}

impl SampleValue {
    /// Distance used by the dead-band check
    ///
    /// Lists compare element-wise and take the largest difference; lists of
    /// different length, unequal text and mixed shapes are infinitely apart.
    pub fn distance(&self, other: &SampleValue) -> f64 {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => (a - b).abs(),
            (Self::List(a), Self::List(b)) if a.len() == b.len() => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            (Self::Text(a), Self::Text(b)) if a == b => 0.0,
            _ => f64::INFINITY,
        }
    }

    /// Lists and text skip the NaN check; scalars must be finite
    pub fn is_emittable(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::List(_) | Self::Text(_) => true,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// `value * scale + offset`, element-wise for lists; text is untouched
    pub fn scaled(&self, scale: f64, offset: f64) -> SampleValue {
        match self {
            Self::Scalar(v) => Self::Scalar(v * scale + offset),
            Self::List(items) => Self::List(items.iter().map(|v| v * scale + offset).collect()),
            Self::Text(text) => Self::Text(text.clone()),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<f64>> for SampleValue {
    fn from(v: Vec<f64>) -> Self {
        Self::List(v)
    }
}

impl TryFrom<TypedValue> for SampleValue {
    type Error = AcqError;

    fn try_from(value: TypedValue) -> Result<Self, Self::Error> {
        match value {
            TypedValue::Text(text) => Ok(Self::Text(text)),
            TypedValue::List(items) => items
                .iter()
                .map(|item| {
                    item.as_f64().ok_or_else(|| {
                        AcqError::invalid_value(format!("non-numeric list element {}", item))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            scalar => scalar
                .as_f64()
                .map(Self::Scalar)
                .ok_or_else(|| AcqError::invalid_value(format!("non-numeric value {}", scalar))),
        }
    }
}

impl Serialize for SampleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(v) => serializer.serialize_f64(*v),
            Self::List(items) => items.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{}", v),
            Self::List(items) => write!(f, "{:?}", items),
            Self::Text(text) => write!(f, "{:?}", text),
        }
    }
}
