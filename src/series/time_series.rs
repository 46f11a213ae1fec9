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

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{
    Row,
    decode::{ColumnMeta, ColumnValue, Scalar, timestamp_millis},
    extrapolate::extrapolate,
};
use crate::{sql::QueryError, time::TimeRange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub target: String,
    pub datapoints: Vec<Datapoint>,
}

/// `[value, timestamp_ms]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint(pub Scalar, pub i64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesOptions {
    pub range: TimeRange,
    pub extrapolate: bool,
}

/// Per-metric samples keyed by timestamp. `None` records an explicit null.
#[derive(Default)]
struct Metrics {
    order: Vec<String>,
    samples: HashMap<String, HashMap<i64, Option<Scalar>>>,
}

impl Metrics {
    fn record(&mut self, name: &str, timestamp: i64, value: Option<Scalar>) {
        if !self.samples.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.samples
            .entry(name.to_string())
            .or_default()
            .insert(timestamp, value);
    }
}

/// Pivots result rows into one series per metric. The first column holds
/// the timestamp; array-of-pairs columns fan out into one metric per label.
pub fn to_time_series(
    meta: &[ColumnMeta],
    rows: &[Row],
    options: &SeriesOptions,
) -> Result<Vec<TimeSeries>, QueryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let Some((time_column, value_columns)) = meta.split_first() else {
        return Err(QueryError::InvalidResponse(
            "result has rows but no columns".to_string(),
        ));
    };

    let mut intervals = Vec::with_capacity(rows.len());
    let mut seen = HashSet::with_capacity(rows.len());
    let mut metrics = Metrics::default();
    for (idx, row) in rows.iter().enumerate() {
        let raw = row.get(&time_column.name).ok_or_else(|| {
            QueryError::InvalidResponse(format!(
                "row {idx} has no `{}` column",
                time_column.name
            ))
        })?;
        let timestamp = timestamp_millis(raw)?;
        if seen.insert(timestamp) {
            intervals.push(timestamp);
        }

        for column in value_columns {
            let Some(value) = row.get(&column.name) else {
                continue;
            };
            match ColumnValue::decode(value) {
                ColumnValue::Null => metrics.record(&column.name, timestamp, None),
                ColumnValue::Scalar(scalar) => {
                    metrics.record(&column.name, timestamp, Some(scalar))
                }
                ColumnValue::LabeledPairs(pairs) => {
                    for (label, value) in pairs {
                        metrics.record(&label, timestamp, value);
                    }
                }
            }
        }
    }

    let Metrics { order, mut samples } = metrics;
    let mut series = Vec::with_capacity(order.len());
    for target in order {
        let points = samples.remove(&target).unwrap_or_default();
        let mut datapoints: Vec<Datapoint> = intervals
            .iter()
            .filter_map(|timestamp| match points.get(timestamp) {
                Some(Some(value)) => Some(Datapoint(value.clone(), *timestamp)),
                Some(None) => None,
                None => Some(Datapoint(Scalar::Number(0.0), *timestamp)),
            })
            .collect();
        if options.extrapolate {
            extrapolate(&mut datapoints, &options.range);
        }
        series.push(TimeSeries { target, datapoints });
    }
    log::debug!(
        "assembled {} series over {} intervals",
        series.len(),
        intervals.len()
    );
    Ok(series)
}
