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
use serde_json::Value;

use super::{
    Row,
    decode::{ColumnMeta, ColumnValue},
};

const INTEGER_TYPES: &[&str] = &[
    "Int8", "Int16", "Int32", "Int64", "UInt8", "UInt16", "UInt32", "UInt64",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Number,
    String,
}

impl SemanticType {
    pub fn from_type_name(name: &str) -> Self {
        if INTEGER_TYPES.contains(&name) {
            SemanticType::Number
        } else {
            SemanticType::String
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    #[serde(rename = "text")]
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<Value>>,
}

pub fn to_table(meta: &[ColumnMeta], rows: &[Row]) -> Table {
    let columns = meta
        .iter()
        .map(|column| TableColumn {
            name: column.name.clone(),
            semantic_type: SemanticType::from_type_name(&column.data_type),
        })
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            meta.iter()
                .map(|column| cell(row.get(&column.name)))
                .collect()
        })
        .collect();
    Table { columns, rows }
}

fn cell(value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    match ColumnValue::decode(value) {
        ColumnValue::Null => Value::Null,
        ColumnValue::Scalar(scalar) => scalar.to_json(),
        ColumnValue::LabeledPairs(_) => value.clone(),
    }
}
