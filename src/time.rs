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

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sql::parse_interval_literal;

/// Dashboard time range in unix seconds. `is_open_ended` is set when the
/// upper bound was requested as "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub from_seconds: i64,
    pub to_seconds: i64,
    pub is_open_ended: bool,
}

/// A range bound as sent by clients: epoch milliseconds or an expression
/// such as `now-6h` or an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeBound {
    EpochMillis(i64),
    Expression(String),
}

impl From<&str> for RangeBound {
    fn from(value: &str) -> Self {
        RangeBound::Expression(value.to_string())
    }
}

impl RangeBound {
    fn is_now(&self) -> bool {
        matches!(self, RangeBound::Expression(expr) if expr.trim().eq_ignore_ascii_case("now"))
    }

    fn resolve_millis(&self, now: DateTime<Utc>) -> Result<i64, String> {
        match self {
            RangeBound::EpochMillis(ms) => Ok(*ms),
            RangeBound::Expression(expr) => parse_expression(expr.trim(), now),
        }
    }
}

impl TimeRange {
    pub fn resolve(from: &RangeBound, to: &RangeBound, now: DateTime<Utc>) -> Result<Self, String> {
        let from_ms = from.resolve_millis(now)?;
        let to_ms = to.resolve_millis(now)?;
        if from_ms > to_ms {
            return Err(format!(
                "time range start {from_ms} is after its end {to_ms}"
            ));
        }
        Ok(Self {
            from_seconds: from_ms.div_euclid(1000),
            to_seconds: to_ms.div_euclid(1000),
            is_open_ended: to.is_now(),
        })
    }
}

fn parse_expression(expr: &str, now: DateTime<Utc>) -> Result<i64, String> {
    if let Some(offset) = expr
        .get(..3)
        .filter(|head| head.eq_ignore_ascii_case("now"))
        .map(|_| expr[3..].trim())
    {
        let now_ms = now.timestamp_millis();
        if offset.is_empty() {
            return Ok(now_ms);
        }
        let (sign, amount) = if let Some(amount) = offset.strip_prefix('-') {
            (-1.0, amount)
        } else if let Some(amount) = offset.strip_prefix('+') {
            (1.0, amount)
        } else {
            return Err(format!("invalid relative time `{expr}`"));
        };
        let offset_ms = (sign * parse_interval_literal(amount)? * 1000.0).round();
        if !offset_ms.is_finite() || offset_ms.abs() >= i64::MAX as f64 {
            return Err(format!("invalid relative time `{expr}`: offset out of range"));
        }
        return now_ms
            .checked_add(offset_ms as i64)
            .ok_or_else(|| format!("invalid relative time `{expr}`: offset out of range"));
    }
    if let Ok(ms) = expr.parse::<i64>() {
        return Ok(ms);
    }
    parse_datetime_millis(expr).ok_or_else(|| format!("invalid time `{expr}`"))
}

/// Parses RFC 3339 or `YYYY-MM-DD hh:mm:ss[.fff]` (taken as UTC) into epoch
/// milliseconds.
pub fn parse_datetime_millis(value: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Bucket width in whole seconds: the interval scaled by `factor`, rounded
/// up and never below one second.
pub fn interval_seconds(raw: &str, factor: u32) -> Result<u64, String> {
    let seconds = (parse_interval_literal(raw)? * f64::from(factor.max(1))).ceil();
    if !seconds.is_finite() || seconds >= u64::MAX as f64 {
        return Err(format!("invalid interval `{raw}`: out of range"));
    }
    Ok(seconds.max(1.0) as u64)
}
