// Copyright (c) 2022-2023 The FIO Protocol Developers

//! Values dictionaries supplying field values to templates
//!
//! Values are keyed by field header, loop values by `iterations#<loop id>`
//! (holding `allowed_iter_hashes` and one dictionary per iteration name),
//! and counted section lengths by `expected_length#<section id>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ledger_fio_apdu::hash::IterHash;

/// Key holding the allowed iteration hashes in a loop dictionary
pub const ALLOWED_ITER_HASHES: &str = "allowed_iter_hashes";

/// Values lookup errors
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum ValueError {
    #[error("missing value for '{0}'")]
    Missing(String),

    #[error("invalid value for '{0}'")]
    Invalid(String),
}

/// Single value
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(u64),
    Text(String),
    List(Vec<Value>),
    Map(Values),
}

impl Value {
    /// Fetch a scalar value as text
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v)
    }
}

/// Values dictionary
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, Value>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the updated dictionary
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Fetch a raw value
    pub fn get(&self, key: &str) -> Result<&Value, ValueError> {
        self.0
            .get(key)
            .ok_or_else(|| ValueError::Missing(key.to_string()))
    }

    /// Fetch a scalar value as text
    pub fn text(&self, key: &str) -> Result<String, ValueError> {
        self.get(key)?
            .as_text()
            .ok_or_else(|| ValueError::Invalid(key.to_string()))
    }

    /// Fetch a nested dictionary
    pub fn map(&self, key: &str) -> Result<&Values, ValueError> {
        match self.get(key)? {
            Value::Map(m) => Ok(m),
            _ => Err(ValueError::Invalid(key.to_string())),
        }
    }

    /// Fetch the dictionary for a loop
    pub fn iterations(&self, loop_id: &str) -> Result<&Values, ValueError> {
        self.map(&format!("iterations#{loop_id}"))
    }

    /// Fetch the expected length of a counted section
    pub fn expected_length(&self, section_id: &str) -> Result<u64, ValueError> {
        let key = format!("expected_length#{section_id}");
        let v = self.text(&key)?;
        v.trim().parse().map_err(|_| ValueError::Invalid(key))
    }

    /// Fetch allowed iteration hashes from a loop dictionary, `None` if unset
    pub fn allowed_iter_hashes(&self) -> Result<Option<Vec<IterHash>>, ValueError> {
        let l = match self.0.get(ALLOWED_ITER_HASHES) {
            Some(Value::List(l)) => l,
            Some(_) => return Err(ValueError::Invalid(ALLOWED_ITER_HASHES.to_string())),
            None => return Ok(None),
        };

        let mut hashes = Vec::with_capacity(l.len());
        for v in l {
            let mut h = IterHash::default();
            match v {
                Value::Text(s) if hex::decode_to_slice(s, &mut h).is_ok() => hashes.push(h),
                _ => return Err(ValueError::Invalid(ALLOWED_ITER_HASHES.to_string())),
            }
        }

        Ok(Some(hashes))
    }
}
