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

use std::{io::Read, net::SocketAddr};

use chrono::Utc;
use clap::{Parser, Subcommand};
use clickhouse_macro_adapter::{
    app::{AppConfig, AppState, RenderOptions, router},
    error::AppError,
    sql::{ColumnConfig, DateTimeType, render},
    time::RangeBound,
};
use log::{LevelFilter, info};

#[derive(Debug, Parser)]
#[command(author, version, about, disable_help_subcommand = true)]
struct Args {
    /// HTTP bind address for the adapter server
    #[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0:3100")]
    bind: SocketAddr,
    /// Database prefixed to `$table`
    #[arg(long, env = "CLICKHOUSE_DATABASE", default_value = "default")]
    database: String,
    /// Table substituted for `$table`
    #[arg(long, env = "CLICKHOUSE_TABLE", default_value = "")]
    table: String,
    /// Coarse date column used for partition pruning in `$timeFilter`
    #[arg(long = "date-column", env = "DATE_COLUMN")]
    date_column: Option<String>,
    /// Column bucketed by `$timeSeries` and filtered by `$timeFilter`
    #[arg(long = "datetime-column", env = "DATETIME_COLUMN", default_value = "EventTime")]
    date_time_column: String,
    /// Storage type of the datetime column
    #[arg(
        long = "datetime-type",
        env = "DATETIME_TYPE",
        value_enum,
        default_value = "datetime"
    )]
    date_time_type: DateTimeType,
    /// Bucket width used when a request does not carry one, e.g. 30s or 1m
    #[arg(long, env = "DEFAULT_INTERVAL", default_value = "30s")]
    interval: String,
    /// Multiplier applied to the bucket width
    #[arg(long = "interval-factor", env = "INTERVAL_FACTOR", default_value_t = 1)]
    interval_factor: u32,
    /// Disable boundary extrapolation of time series
    #[arg(long = "no-extrapolate", env = "NO_EXTRAPOLATE")]
    no_extrapolate: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Expand a macro query and print the SQL; reads stdin when no query is given
    Render {
        query: Option<String>,
        #[arg(long, default_value = "now-6h")]
        from: String,
        #[arg(long, default_value = "now")]
        to: String,
        #[arg(long)]
        interval: Option<String>,
    },
    /// Print the scanned AST as JSON; reads stdin when no query is given
    Ast { query: Option<String> },
}

impl Args {
    fn config(&self) -> AppConfig {
        AppConfig {
            columns: ColumnConfig {
                database: self.database.clone(),
                table: self.table.clone(),
                date_column: self.date_column.clone().filter(|c| !c.is_empty()),
                date_time_column: self.date_time_column.clone(),
                date_time_type: self.date_time_type,
            },
            interval: self.interval.clone(),
            interval_factor: self.interval_factor,
            extrapolate: !self.no_extrapolate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let args = Args::parse();
    let state = AppState::new(args.config());
    match args.command {
        None | Some(Command::Serve) => serve(state, args.bind).await,
        Some(Command::Render {
            query,
            from,
            to,
            interval,
        }) => {
            let query = read_query(query)?;
            let options = RenderOptions {
                from: RangeBound::from(from.as_str()),
                to: RangeBound::from(to.as_str()),
                interval,
                ..RenderOptions::default()
            };
            let context = state.render_context(&options, Utc::now())?;
            println!("{}", render(&query, &context)?);
            Ok(())
        }
        Some(Command::Ast { query }) => {
            let ast = state.parse(&read_query(query)?)?;
            let json = serde_json::to_string_pretty(&ast)
                .map_err(|err| AppError::Internal(format!("failed to encode ast: {err}")))?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn serve(state: AppState, bind: SocketAddr) -> Result<(), AppError> {
    let app = router(state);
    info!("binding TCP listener on {bind}");
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind listener: {err}")))?;
    info!("clickhouse-macro-adapter listening on {bind}");
    axum::serve(listener, app)
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;
    Ok(())
}

fn read_query(query: Option<String>) -> Result<String, AppError> {
    if let Some(query) = query {
        return Ok(query);
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|err| AppError::Internal(format!("failed to read query from stdin: {err}")))?;
    Ok(buffer)
}

fn init_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::Builder::from_default_env().init();
    } else {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Warn)
            .filter_module("clickhouse_macro_adapter", LevelFilter::Info)
            .init();
    }
}
