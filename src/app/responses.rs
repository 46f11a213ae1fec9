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

use serde::Serialize;

use crate::{series::Table, time::TimeRange};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenderResponse {
    pub(crate) sql: String,
    pub(crate) range: TimeRange,
    pub(crate) interval_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    table: Table,
}

impl TableResponse {
    pub(crate) fn new(table: Table) -> Self {
        Self {
            kind: "table",
            table,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

impl HealthResponse {
    pub(crate) fn ok() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
