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

//! Rewrites a leading macro call into plain SQL. The output still carries
//! the `$timeSeries` and `$timeFilter` placeholders; they are substituted
//! afterwards together with the other literal macros.

use super::{
    QueryError,
    ast::MacroCall,
    keywords::MacroKind,
    lexer::find_keyword,
};

pub(crate) fn expand_call(call: &MacroCall) -> Result<String, QueryError> {
    let sql = match call.kind {
        MacroKind::Columns => {
            let (key, value) = pair(call)?;
            columns(key, value, &call.remainder, &call.args)?
        }
        MacroKind::RateColumns => {
            let (key, value) = pair(call)?;
            let inner = columns(key, value, &call.remainder, &call.args)?;
            format!(
                "SELECT t, arrayMap(a -> (a.1, a.2/runningDifference( t/1000 )), groupArr) FROM ({inner})"
            )
        }
        MacroKind::Rate => rate(&call.args, &call.remainder)?,
        MacroKind::PerSecond => per_second(&call.args, &call.remainder)?,
        MacroKind::PerSecondColumns => {
            let (key, value) = pair(call)?;
            per_second_columns(key, value, &call.remainder, &call.args)?
        }
    };
    log::debug!("expanded {} macro", call.kind.key());
    Ok(format!("{}{sql}", call.prefix))
}

fn pair(call: &MacroCall) -> Result<(&str, &str), QueryError> {
    match call.args.as_slice() {
        [key, value] => Ok((key.as_str(), value.as_str())),
        args => Err(QueryError::macro_argument(
            format!(
                "Amount of arguments must equal 2 for {} func",
                call.kind.key()
            ),
            args,
        )),
    }
}

/// The trailing alias token of an aliased expression. An expression that
/// ends in `)` has no alias.
fn alias(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    if arg.ends_with(')') {
        return None;
    }
    arg.split_whitespace().next_back()
}

/// Splits `HAVING …` off the end of the remainder.
fn split_having(remainder: &str) -> Result<(&str, Option<&str>), QueryError> {
    Ok(match find_keyword(remainder, &["HAVING"])? {
        Some((start, _)) => (
            remainder[..start].trim_end(),
            Some(remainder[start..].trim()),
        ),
        None => (remainder.trim_end(), None),
    })
}

/// Adds `$timeFilter` to the top-level `WHERE`, or introduces one.
pub(crate) fn apply_time_filter(query: &str) -> Result<String, QueryError> {
    if let Some((start, end)) = find_keyword(query, &["WHERE"])? {
        return Ok(format!(
            "{}WHERE $timeFilter AND{}",
            &query[..start],
            &query[end..]
        ));
    }
    let mut insert_at = None;
    for words in [&["GROUP", "BY"][..], &["ORDER", "BY"][..], &["LIMIT"][..]] {
        if let Some((start, _)) = find_keyword(query, words)? {
            insert_at = Some(insert_at.map_or(start, |at: usize| at.min(start)));
        }
    }
    Ok(match insert_at {
        Some(at) => format!(
            "{} WHERE $timeFilter {}",
            query[..at].trim_end(),
            &query[at..]
        ),
        None => format!("{} WHERE $timeFilter", query.trim_end()),
    })
}

fn columns(key: &str, value: &str, remainder: &str, args: &[String]) -> Result<String, QueryError> {
    let (Some(key_alias), Some(value_alias)) = (alias(key), alias(value)) else {
        return Err(QueryError::macro_argument(
            "Some of passed arguments are without aliases",
            args,
        ));
    };
    let (from, having) = split_having(remainder)?;
    let from = apply_time_filter(from)?;
    let having = having.map(|h| format!(" {h}")).unwrap_or_default();
    Ok(format!(
        "SELECT t, groupArray(({key_alias}, {value_alias})) AS groupArr FROM ( \
         SELECT $timeSeries AS t, {key}, {value} {from} \
         GROUP BY t, {key_alias}{having} ORDER BY t) \
         GROUP BY t ORDER BY t"
    ))
}

fn rate(args: &[String], remainder: &str) -> Result<String, QueryError> {
    if args.is_empty() {
        return Err(QueryError::macro_argument(
            "Amount of arguments must be more than 0 for $rate func",
            args,
        ));
    }
    let mut rates = Vec::with_capacity(args.len());
    for arg in args {
        let Some(name) = alias(arg) else {
            return Err(QueryError::macro_argument(
                format!("Argument `{arg}` can't be used without alias"),
                args,
            ));
        };
        rates.push(format!("{name}/runningDifference(t/1000) {name}Rate"));
    }
    let from = apply_time_filter(remainder.trim_end())?;
    Ok(format!(
        "SELECT t, {} FROM ( SELECT $timeSeries AS t, {} {from} GROUP BY t ORDER BY t)",
        rates.join(", "),
        args.join(", ")
    ))
}

fn per_second(args: &[String], remainder: &str) -> Result<String, QueryError> {
    if args.is_empty() {
        return Err(QueryError::macro_argument(
            "Amount of arguments must be more than 0 for $perSecond func",
            args,
        ));
    }
    let inner: Vec<String> = args
        .iter()
        .enumerate()
        .map(|(idx, arg)| format!("max({arg}) AS max_{idx}"))
        .collect();
    let outer: Vec<String> = (0..args.len())
        .map(|idx| {
            format!(
                "if(runningDifference(max_{idx}) < 0, nan, \
                 runningDifference(max_{idx}) / runningDifference(t/1000)) AS max_{idx}_PerSecond"
            )
        })
        .collect();
    let from = apply_time_filter(remainder.trim_end())?;
    Ok(format!(
        "SELECT t, {} FROM ( SELECT $timeSeries AS t, {} {from} GROUP BY t ORDER BY t)",
        outer.join(", "),
        inner.join(", ")
    ))
}

fn per_second_columns(
    key: &str,
    value: &str,
    remainder: &str,
    args: &[String],
) -> Result<String, QueryError> {
    let Some(key_alias) = alias(key) else {
        return Err(QueryError::macro_argument(
            "Some of passed arguments are without aliases",
            args,
        ));
    };
    let (from, having) = split_having(remainder)?;
    let from = apply_time_filter(from)?;
    let having = having.map(|h| format!(" {h}")).unwrap_or_default();
    Ok(format!(
        "SELECT t, groupArray(({key_alias}, max_0_PerSecond)) AS groupArr FROM ( \
         SELECT t, {key_alias}, if(runningDifference(max_0) < 0 OR \
         neighbor({key_alias}, -1, {key_alias}) != {key_alias}, nan, \
         runningDifference(max_0) / runningDifference(t/1000)) AS max_0_PerSecond FROM ( \
         SELECT $timeSeries AS t, {key}, max({value}) AS max_0 {from} \
         GROUP BY t, {key_alias}{having} ORDER BY {key_alias}, t)) \
         GROUP BY t ORDER BY t"
    ))
}
