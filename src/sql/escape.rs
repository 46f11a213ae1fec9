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

use serde::{Deserialize, Serialize};

use super::keywords::is_numeric_literal;

/// Value of a dashboard template variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Single(String),
    Multi(Vec<String>),
}

/// A template variable together with the flags that decide how it is
/// interpolated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVariable {
    pub value: VariableValue,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub include_all: bool,
}

impl TemplateVariable {
    pub fn interpolated(&self) -> String {
        interpolate(&self.value, self.multi, self.include_all)
    }
}

/// Quotes a value as a ClickHouse string literal unless it already reads as
/// a number.
pub fn escape(value: &str) -> String {
    if is_numeric_literal(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\\' || ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Formats a template variable for inclusion in SQL. A single-select value
/// that does not stand for "All" is trusted and passed through unchanged.
pub fn interpolate(value: &VariableValue, is_multi: bool, include_all: bool) -> String {
    match value {
        VariableValue::Single(raw) if !is_multi && !include_all => raw.clone(),
        VariableValue::Single(raw) => escape(raw),
        VariableValue::Multi(values) => values
            .iter()
            .map(|value| escape(value))
            .collect::<Vec<_>>()
            .join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_pass_through() {
        assert_eq!(escape("5"), "5");
        assert_eq!(escape("-3.25"), "-3.25");
    }

    #[test]
    fn strings_are_quoted_and_escaped() {
        assert_eq!(escape("a'b"), "'a\\'b'");
        assert_eq!(escape(r"c:\tmp"), r"'c:\\tmp'");
        assert_eq!(escape("1e5"), "'1e5'");
        assert_eq!(escape(""), "''");
    }

    #[test]
    fn single_values_are_trusted_unless_multi_or_all() {
        let value = VariableValue::Single("host-1".to_string());
        assert_eq!(interpolate(&value, false, false), "host-1");
        assert_eq!(interpolate(&value, true, false), "'host-1'");
        assert_eq!(interpolate(&value, false, true), "'host-1'");
    }

    #[test]
    fn lists_are_escaped_and_joined() {
        let value = VariableValue::Multi(vec!["a".into(), "10".into(), "o'k".into()]);
        assert_eq!(interpolate(&value, true, false), "'a',10,'o\\'k'");
    }
}
