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

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{
    QueryError, Scanner, TemplateVariable,
    ast::Ast,
    keywords::variable_name,
    lexer::strip_comments,
    macros::expand_call,
};
use crate::time::TimeRange;

/// Storage type of the datetime column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum DateTimeType {
    /// ClickHouse `DateTime`.
    #[default]
    #[value(name = "datetime")]
    DateTime,
    /// Unix seconds stored in an integer column.
    #[value(name = "timestamp")]
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub date_column: Option<String>,
    pub date_time_column: String,
    #[serde(default)]
    pub date_time_type: DateTimeType,
}

impl ColumnConfig {
    /// `database.table`, or the bare table name when no database is set.
    pub fn qualified_table(&self) -> String {
        if self.database.is_empty() {
            self.table.clone()
        } else {
            format!("{}.{}", self.database, self.table)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub range: TimeRange,
    pub interval_seconds: u64,
    pub columns: ColumnConfig,
    pub variables: BTreeMap<String, TemplateVariable>,
}

/// Produces executable SQL from a scanned query: the leading macro, if any,
/// is rewritten and then every `$name` the context knows is substituted.
pub struct MacroExpander<'a> {
    context: &'a RenderContext,
}

impl<'a> MacroExpander<'a> {
    pub fn new(context: &'a RenderContext) -> Self {
        Self { context }
    }

    pub fn expand(&self, raw: &str, ast: &Ast) -> Result<String, QueryError> {
        let text = match &ast.macro_call {
            Some(call) => expand_call(call)?,
            None => strip_comments(raw)?,
        };
        let sql = self.substitute(&text);
        Ok(sql.replace("\r\n", " ").replace(['\r', '\n'], " "))
    }

    /// Replaces `$name` references in one pass; replacement text is not
    /// scanned again. Unknown names are left as they are.
    fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            let Some(name) = variable_name(rest) else {
                out.push('$');
                rest = &rest[1..];
                continue;
            };
            match self.lookup(name) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[..=name.len()]),
            }
            rest = &rest[1 + name.len()..];
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<String> {
        let range = &self.context.range;
        let columns = &self.context.columns;
        match name {
            "timeSeries" => Some(self.time_series()),
            "timeFilter" => Some(self.time_filter()),
            "table" => Some(columns.qualified_table()),
            "from" => Some(range.from_seconds.to_string()),
            "to" => Some(range.to_seconds.to_string()),
            "dateCol" => columns.date_column.clone(),
            "dateTimeCol" => Some(columns.date_time_column.clone()),
            "interval" => Some(self.context.interval_seconds.to_string()),
            _ => self
                .context
                .variables
                .get(name)
                .map(TemplateVariable::interpolated),
        }
    }

    fn time_series(&self) -> String {
        let column = &self.context.columns.date_time_column;
        let n = self.context.interval_seconds;
        match self.context.columns.date_time_type {
            DateTimeType::DateTime => format!("(intDiv(toUInt32({column}), {n}) * {n}) * 1000"),
            DateTimeType::Timestamp => format!("(intDiv({column}, {n}) * {n}) * 1000"),
        }
    }

    fn time_filter(&self) -> String {
        let TimeRange {
            from_seconds: from,
            to_seconds: to,
            is_open_ended,
        } = self.context.range;
        let columns = &self.context.columns;
        let column = &columns.date_time_column;

        let mut predicates = Vec::with_capacity(2);
        if let Some(date) = columns.date_column.as_deref().filter(|c| !c.is_empty()) {
            predicates.push(if is_open_ended {
                format!("{date} >= toDate({from})")
            } else {
                format!("{date} BETWEEN toDate({from}) AND toDate({to})")
            });
        }
        predicates.push(match (columns.date_time_type, is_open_ended) {
            (DateTimeType::DateTime, true) => format!("{column} >= toDateTime({from})"),
            (DateTimeType::DateTime, false) => {
                format!("{column} BETWEEN toDateTime({from}) AND toDateTime({to})")
            }
            (DateTimeType::Timestamp, true) => format!("{column} >= {from}"),
            (DateTimeType::Timestamp, false) => format!("{column} BETWEEN {from} AND {to}"),
        });
        predicates.join(" AND ")
    }
}

/// Scans and expands `query` in one call.
pub fn render(query: &str, context: &RenderContext) -> Result<String, QueryError> {
    let ast = Scanner.parse(query)?;
    let sql = MacroExpander::new(context).expand(query, &ast)?;
    log::debug!("rendered sql: {sql}");
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::VariableValue;

    fn context(is_open_ended: bool) -> RenderContext {
        RenderContext {
            range: TimeRange {
                from_seconds: 1_714_543_200,
                to_seconds: 1_714_564_800,
                is_open_ended,
            },
            interval_seconds: 60,
            columns: ColumnConfig {
                database: "default".to_string(),
                table: "requests".to_string(),
                date_column: Some("EventDate".to_string()),
                date_time_column: "EventTime".to_string(),
                date_time_type: DateTimeType::DateTime,
            },
            variables: BTreeMap::new(),
        }
    }

    #[test]
    fn rate_columns_render_end_to_end() {
        let sql = render(
            "$rateColumns((AppType = '' ? 'undefined' : AppType) type, sum(Hits) hits)\n\
             FROM $table\nWHERE Event = 'request'\nHAVING hits > $interval",
            &context(true),
        )
        .unwrap();
        assert!(sql.starts_with("SELECT t, arrayMap(a -> (a.1, a.2/runningDifference( t/1000 )), groupArr)"));
        assert!(sql.contains("SELECT (intDiv(toUInt32(EventTime), 60) * 60) * 1000 AS t,"));
        assert!(sql.contains(
            "FROM default.requests WHERE EventDate >= toDate(1714543200) \
             AND EventTime >= toDateTime(1714543200) AND Event = 'request' \
             GROUP BY t, type HAVING hits > 60 ORDER BY t"
        ));
        assert!(!sql.contains('\n'));
    }

    #[test]
    fn plain_queries_only_get_literal_substitution() {
        let query = "SELECT $timeSeries AS t, count() FROM $table\nWHERE $timeFilter GROUP BY t ORDER BY t";
        let ctx = context(false);
        let sql = render(query, &ctx).unwrap();
        assert_eq!(
            sql,
            "SELECT (intDiv(toUInt32(EventTime), 60) * 60) * 1000 AS t, count() FROM default.requests \
             WHERE EventDate BETWEEN toDate(1714543200) AND toDate(1714564800) \
             AND EventTime BETWEEN toDateTime(1714543200) AND toDateTime(1714564800) \
             GROUP BY t ORDER BY t"
        );

        let before = Scanner.parse(query).unwrap();
        let after = Scanner.parse(&sql).unwrap();
        assert_eq!(before.clause(crate::sql::Clause::GroupBy), after.clause(crate::sql::Clause::GroupBy));
        assert_eq!(before.select().map(<[String]>::len), after.select().map(<[String]>::len));
    }

    #[test]
    fn timestamp_columns_skip_conversion_and_date_part() {
        let mut ctx = context(true);
        ctx.columns.date_time_type = DateTimeType::Timestamp;
        ctx.columns.date_column = None;
        let sql = render("SELECT $timeSeries t FROM x WHERE $timeFilter", &ctx).unwrap();
        assert_eq!(
            sql,
            "SELECT (intDiv(EventTime, 60) * 60) * 1000 t FROM x WHERE EventTime >= 1714543200"
        );
    }

    #[test]
    fn unknown_names_are_kept_and_variables_interpolated() {
        let mut ctx = context(true);
        ctx.variables.insert(
            "hosts".to_string(),
            TemplateVariable {
                value: VariableValue::Multi(vec!["a".into(), "b".into()]),
                multi: true,
                include_all: false,
            },
        );
        let sql = render(
            "SELECT $unknown, '$5' FROM t WHERE host IN ($hosts) AND $from < $to",
            &ctx,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT $unknown, '$5' FROM t WHERE host IN ('a','b') AND 1714543200 < 1714564800"
        );
    }

    #[test]
    fn macro_errors_surface_without_sql() {
        let err = render("$columns(key) FROM t", &context(true)).unwrap_err();
        assert!(matches!(err, QueryError::MacroArgument { .. }));
    }
}
