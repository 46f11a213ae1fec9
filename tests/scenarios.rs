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

use std::collections::BTreeMap;

use clickhouse_macro_adapter::{
    series::{ColumnMeta, Datapoint, Row, Scalar, SeriesOptions, to_time_series},
    sql::{
        Clause, ColumnConfig, DateTimeType, FromClause, MacroExpander, MacroKind, QueryError,
        RenderContext, Scanner, escape, split_top_level,
    },
    time::TimeRange,
};
use serde_json::json;

fn context() -> RenderContext {
    RenderContext {
        range: TimeRange {
            from_seconds: 1_714_543_200,
            to_seconds: 1_714_564_800,
            is_open_ended: true,
        },
        interval_seconds: 30,
        columns: ColumnConfig {
            database: "default".into(),
            table: "table_all".into(),
            date_column: Some("EventDate".into()),
            date_time_column: "EventTime".into(),
            date_time_type: DateTimeType::DateTime,
        },
        variables: BTreeMap::new(),
    }
}

fn rows(value: serde_json::Value) -> Vec<Row> {
    serde_json::from_value(value).unwrap()
}

fn meta(names: &[&str]) -> Vec<ColumnMeta> {
    names
        .iter()
        .map(|name| ColumnMeta {
            name: name.to_string(),
            data_type: String::new(),
        })
        .collect()
}

fn series_options() -> SeriesOptions {
    SeriesOptions {
        range: context().range,
        extrapolate: true,
    }
}

#[test]
fn union_all_scenario() {
    let ast = Scanner::new()
        .parse("SELECT a, b FROM table1 UNION ALL select c, d from table2")
        .unwrap();
    assert_eq!(
        serde_json::to_value(&ast).unwrap(),
        json!({
            "root": [],
            "select": ["a", "b"],
            "from": ["table1"],
            "union all": [{"root": [], "select": ["c", "d"], "from": ["table2"]}]
        })
    );
}

#[test]
fn rate_columns_scenario() {
    let query = "$rateColumns((AppType = '' ? 'undefined' : AppType) type, sum(Hits) hits) \
                 FROM table_all WHERE Event = 'request' HAVING hits > $interval";
    let ast = Scanner::new().parse(query).unwrap();
    assert_eq!(
        ast.macro_args(MacroKind::RateColumns).unwrap(),
        ["(AppType = '' ? 'undefined' : AppType) type", "sum(Hits) hits"]
    );

    let context = context();
    let sql = MacroExpander::new(&context).expand(query, &ast).unwrap();
    let inner = "GROUP BY t, type HAVING hits > 30 ORDER BY t";
    assert!(sql.contains(inner), "{sql}");
    assert!(!sql.ends_with("hits > 30"));
}

#[test]
fn columns_argument_count_scenario() {
    let query = "$columns(key) FROM t";
    let ast = Scanner::new().parse(query).unwrap();
    let context = context();
    let err = MacroExpander::new(&context).expand(query, &ast).unwrap_err();
    assert_eq!(
        err,
        QueryError::MacroArgument {
            message: "Amount of arguments must equal 2 for $columns func".into(),
            args: vec!["key".into()],
        }
    );
}

#[test]
fn pivot_scenario() {
    let series = to_time_series(
        &meta(&["t", "good", "bad"]),
        &rows(json!([
            {"t": 1_714_543_200_000_i64, "good": 10, "bad": 1},
            {"t": 1_714_543_230_000_i64, "good": 20, "bad": 2}
        ])),
        &series_options(),
    )
    .unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].target, "good");
    assert_eq!(
        series[0].datapoints,
        vec![
            Datapoint(Scalar::Number(10.0), 1_714_543_200_000),
            Datapoint(Scalar::Number(20.0), 1_714_543_230_000)
        ]
    );
    assert_eq!(series[1].datapoints.len(), 2);
}

#[test]
fn null_suppression_scenario() {
    let series = to_time_series(
        &meta(&["t", "good", "bad"]),
        &rows(json!([
            {"t": 1_714_543_200_000_i64, "good": 10, "bad": 1},
            {"t": 1_714_543_230_000_i64, "good": null, "bad": 2}
        ])),
        &series_options(),
    )
    .unwrap();
    assert_eq!(series[0].datapoints.len(), 1);
    assert_eq!(series[0].datapoints[0].1, 1_714_543_200_000);
    assert_eq!(series[1].datapoints.len(), 2);
}

#[test]
fn escape_scenario() {
    assert_eq!(escape("5"), "5");
    assert_eq!(escape("a'b"), "'a\\'b'");
}

#[test]
fn queries_without_macros_keep_their_clauses() {
    let query = "SELECT Host, count() c FROM $table WHERE $timeFilter AND Code IN (200, 201) \
                 GROUP BY Host ORDER BY c DESC LIMIT 10";
    let scanner = Scanner::new();
    let ast = scanner.parse(query).unwrap();
    let context = context();
    let sql = MacroExpander::new(&context).expand(query, &ast).unwrap();
    let expanded = scanner.parse(&sql).unwrap();
    for clause in [Clause::Select, Clause::GroupBy, Clause::OrderBy, Clause::Limit] {
        assert_eq!(ast.clause(clause), expanded.clause(clause));
    }
    assert_eq!(expanded.table(), Some("default.table_all"));
}

#[test]
fn nested_from_is_a_full_statement() {
    let ast = Scanner::new()
        .parse("SELECT * FROM (SELECT a, b FROM (SELECT 1 a, 2 b FROM system.one) GROUP BY a, b)")
        .unwrap();
    let Some(FromClause::Subquery { ast: inner, .. }) = &ast.from else {
        panic!("expected subquery");
    };
    assert_eq!(inner.select().unwrap(), ["a", "b"]);
    assert_eq!(inner.clause(Clause::GroupBy).unwrap(), ["a", "b"]);
    assert_eq!(inner.subquery().unwrap().table(), Some("system.one"));
    assert!(inner.root.is_empty());
}

#[test]
fn split_and_join_round_trip() {
    let body = "a, f(b, c), arr[1, 2], 'x, y', CASE WHEN a THEN 1 ELSE 2 END";
    let parts = split_top_level(body).unwrap();
    assert_eq!(parts.len(), 5);
    assert_eq!(parts.join(", "), body);
}
