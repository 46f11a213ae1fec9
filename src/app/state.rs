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

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;

use crate::{
    error::AppError,
    sql::{Ast, ColumnConfig, DateTimeType, RenderContext, Scanner, TemplateVariable},
    time::{RangeBound, TimeRange, interval_seconds},
};

pub(crate) const DEFAULT_FROM: &str = "now-6h";
pub(crate) const DEFAULT_TO: &str = "now";

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    parser: Scanner,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        info!(
            "render defaults: table={} datetime_column={} ({:?}) interval={} x{} extrapolate={}",
            config.columns.qualified_table(),
            config.columns.date_time_column,
            config.columns.date_time_type,
            config.interval,
            config.interval_factor,
            config.extrapolate
        );
        Self {
            config: Arc::new(config),
            parser: Scanner,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn parse(&self, query: &str) -> Result<Ast, AppError> {
        self.parser.parse(query).map_err(AppError::from)
    }

    /// Builds the render context for one request. Request options take
    /// precedence over the configured defaults.
    pub fn render_context(
        &self,
        options: &RenderOptions,
        now: DateTime<Utc>,
    ) -> Result<RenderContext, AppError> {
        let range = resolve_range(&options.from, &options.to, now)?;
        let interval = options.interval.as_deref().unwrap_or(&self.config.interval);
        let factor = options
            .interval_factor
            .unwrap_or(self.config.interval_factor);
        let interval_seconds = interval_seconds(interval, factor).map_err(AppError::BadRequest)?;

        let mut columns = self.config.columns.clone();
        if let Some(database) = &options.database {
            columns.database = database.clone();
        }
        if let Some(table) = &options.table {
            columns.table = table.clone();
        }
        if let Some(date_column) = &options.date_column {
            columns.date_column = (!date_column.is_empty()).then(|| date_column.clone());
        }
        if let Some(date_time_column) = &options.date_time_column {
            columns.date_time_column = date_time_column.clone();
        }
        if let Some(date_time_type) = options.date_time_type {
            columns.date_time_type = date_time_type;
        }

        Ok(RenderContext {
            range,
            interval_seconds,
            columns,
            variables: options.variables.clone(),
        })
    }
}

pub(crate) fn resolve_range(
    from: &RangeBound,
    to: &RangeBound,
    now: DateTime<Utc>,
) -> Result<TimeRange, AppError> {
    TimeRange::resolve(from, to, now).map_err(AppError::BadRequest)
}

pub struct AppConfig {
    pub columns: ColumnConfig,
    pub interval: String,
    pub interval_factor: u32,
    pub extrapolate: bool,
}

/// Per-request render settings. Unset fields fall back to [`AppConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    #[serde(default = "default_from")]
    pub from: RangeBound,
    #[serde(default = "default_to")]
    pub to: RangeBound,
    pub interval: Option<String>,
    pub interval_factor: Option<u32>,
    pub database: Option<String>,
    pub table: Option<String>,
    pub date_column: Option<String>,
    pub date_time_column: Option<String>,
    pub date_time_type: Option<DateTimeType>,
    #[serde(default)]
    pub variables: BTreeMap<String, TemplateVariable>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            from: default_from(),
            to: default_to(),
            interval: None,
            interval_factor: None,
            database: None,
            table: None,
            date_column: None,
            date_time_column: None,
            date_time_type: None,
            variables: BTreeMap::new(),
        }
    }
}

pub(crate) fn default_from() -> RangeBound {
    RangeBound::from(DEFAULT_FROM)
}

pub(crate) fn default_to() -> RangeBound {
    RangeBound::from(DEFAULT_TO)
}
