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

use std::time::Instant;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    error::AppError,
    series::{QueryResult, SeriesOptions, TimeSeries, to_table, to_time_series},
    sql::{self, Ast},
    time::RangeBound,
};

use super::{
    responses::{HealthResponse, RenderResponse, TableResponse},
    state::{AppState, RenderOptions, default_from, default_to, resolve_range},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ast", post(parse_query))
        .route("/api/render", post(render_query))
        .route("/api/series", post(time_series))
        .route("/api/table", post(table))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

#[derive(Debug, Deserialize)]
struct AstRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct RenderRequest {
    query: String,
    #[serde(flatten)]
    options: RenderOptions,
}

#[derive(Debug, Deserialize)]
struct SeriesRequest {
    #[serde(flatten)]
    result: QueryResult,
    #[serde(default = "default_from")]
    from: RangeBound,
    #[serde(default = "default_to")]
    to: RangeBound,
    extrapolate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TableRequest {
    #[serde(flatten)]
    result: QueryResult,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn parse_query(
    State(state): State<AppState>,
    Json(request): Json<AstRequest>,
) -> Result<Json<Ast>, AppError> {
    log::debug!("ast request received: query=`{}`", request.query);
    Ok(Json(state.parse(&request.query)?))
}

async fn render_query(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>, AppError> {
    log::debug!(
        "render request received: query=`{}` from={:?} to={:?} interval={:?}",
        request.query,
        request.options.from,
        request.options.to,
        request.options.interval
    );
    let context = state.render_context(&request.options, Utc::now())?;
    let sql = sql::render(&request.query, &context)?;
    Ok(Json(RenderResponse {
        sql,
        range: context.range,
        interval_seconds: context.interval_seconds,
    }))
}

async fn time_series(
    State(state): State<AppState>,
    Json(request): Json<SeriesRequest>,
) -> Result<Json<Vec<TimeSeries>>, AppError> {
    let options = SeriesOptions {
        range: resolve_range(&request.from, &request.to, Utc::now())?,
        extrapolate: request
            .extrapolate
            .unwrap_or(state.config().extrapolate),
    };
    log::debug!(
        "series request received: columns={} rows={} extrapolate={}",
        request.result.meta.len(),
        request.result.data.len(),
        options.extrapolate
    );
    let series = to_time_series(&request.result.meta, &request.result.data, &options)?;
    Ok(Json(series))
}

async fn table(Json(request): Json<TableRequest>) -> Json<TableResponse> {
    log::debug!(
        "table request received: columns={} rows={}",
        request.result.meta.len(),
        request.result.data.len()
    );
    Json(TableResponse::new(to_table(
        &request.result.meta,
        &request.result.data,
    )))
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    let elapsed = start.elapsed();
    log::info!(
        "method={} path={} status={} duration_ms={:.3}",
        method,
        uri.path(),
        status.as_u16(),
        elapsed.as_secs_f64() * 1000.0
    );
    response
}

#[cfg(test)]
mod tests {
    use super::{RenderRequest, SeriesRequest};
    use crate::{sql::DateTimeType, time::RangeBound};

    #[test]
    fn render_request_accepts_camel_case_overrides() {
        let request: RenderRequest = serde_json::from_value(serde_json::json!({
            "query": "SELECT 1",
            "from": 1714543200000_i64,
            "to": "now",
            "intervalFactor": 2,
            "dateTimeColumn": "ts",
            "dateTimeType": "TIMESTAMP",
            "variables": {"host": {"value": ["a", "b"], "multi": true}}
        }))
        .unwrap();
        assert_eq!(request.options.from, RangeBound::EpochMillis(1_714_543_200_000));
        assert_eq!(request.options.interval_factor, Some(2));
        assert_eq!(request.options.date_time_column.as_deref(), Some("ts"));
        assert_eq!(request.options.date_time_type, Some(DateTimeType::Timestamp));
        assert!(request.options.variables["host"].multi);
    }

    #[test]
    fn render_request_defaults_to_last_six_hours() {
        let request: RenderRequest =
            serde_json::from_value(serde_json::json!({"query": "SELECT 1"})).unwrap();
        assert_eq!(request.options.from, RangeBound::from("now-6h"));
        assert_eq!(request.options.to, RangeBound::from("now"));
    }

    #[test]
    fn series_request_reads_clickhouse_json_shape() {
        let request: SeriesRequest = serde_json::from_value(serde_json::json!({
            "meta": [{"name": "t", "type": "UInt64"}, {"name": "c", "type": "UInt64"}],
            "data": [{"t": 1000, "c": "3"}],
            "rows": 1,
            "statistics": {"elapsed": 0.001}
        }))
        .unwrap();
        assert_eq!(request.result.meta.len(), 2);
        assert_eq!(request.result.data.len(), 1);
        assert_eq!(request.extrapolate, None);
    }
}
