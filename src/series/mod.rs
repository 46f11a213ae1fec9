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

//! Reshapes ClickHouse `FORMAT JSON` results into dashboard time series and
//! tables.

mod decode;
mod extrapolate;
mod table;
mod time_series;

pub use decode::{ColumnMeta, ColumnValue, Scalar, timestamp_millis};
pub use table::{SemanticType, Table, TableColumn, to_table};
pub use time_series::{Datapoint, SeriesOptions, TimeSeries, to_time_series};

use serde::Deserialize;

/// One result record keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The `meta`/`data` part of a ClickHouse JSON response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub meta: Vec<ColumnMeta>,
    #[serde(default)]
    pub data: Vec<Row>,
}
