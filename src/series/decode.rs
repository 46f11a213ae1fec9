// Copyright 2021 Datafuse Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{sql::QueryError, time::parse_datetime_millis};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
}

/// A single cell after numeric coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(value) => Some(*value),
            Scalar::Text(_) => None,
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(number) => number.as_f64().map(Scalar::Number),
            Value::String(text) => Some(coerce(text)),
            Value::Bool(flag) => Some(Scalar::Text(flag.to_string())),
            other => Some(Scalar::Text(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(text) => Value::String(text.clone()),
        }
    }
}

fn coerce(text: &str) -> Scalar {
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Scalar::Number(number),
        _ => Scalar::Text(text.to_string()),
    }
}

/// A result cell, classified before pivoting.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Scalar(Scalar),
    /// `[[label, value], …]` as produced by `groupArray((key, value))`. A
    /// `None` value marks a null inside the pair.
    LabeledPairs(Vec<(String, Option<Scalar>)>),
}

impl ColumnValue {
    pub fn decode(value: &Value) -> Self {
        match value {
            Value::Null => ColumnValue::Null,
            Value::Array(items) => match labeled_pairs(items) {
                Some(pairs) => ColumnValue::LabeledPairs(pairs),
                None => ColumnValue::Scalar(Scalar::Text(value.to_string())),
            },
            other => Scalar::from_json(other)
                .map(ColumnValue::Scalar)
                .unwrap_or(ColumnValue::Null),
        }
    }
}

fn labeled_pairs(items: &[Value]) -> Option<Vec<(String, Option<Scalar>)>> {
    items
        .iter()
        .map(|item| match item.as_array()?.as_slice() {
            [label, value] => Some((label_text(label)?, Scalar::from_json(value))),
            _ => None,
        })
        .collect()
}

fn label_text(label: &Value) -> Option<String> {
    match label {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Epoch milliseconds from a timestamp cell: a number, a numeric string or
/// a datetime string.
pub fn timestamp_millis(value: &Value) -> Result<i64, QueryError> {
    let parsed = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|ms| ms.round() as i64)),
        Value::String(text) => text
            .parse::<i64>()
            .ok()
            .or_else(|| parse_datetime_millis(text)),
        _ => None,
    };
    parsed.ok_or_else(|| QueryError::InvalidResponse(format!("unreadable timestamp {value}")))
}
