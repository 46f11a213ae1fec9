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

use serde::{Serialize, Serializer, ser::SerializeMap};

use super::keywords::{Clause, MacroKind};

/// One parsed statement. Expression clauses keep their top-level
/// comma-separated pieces in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ast {
    /// Expressions that appeared before the first clause keyword.
    pub root: Vec<String>,
    pub macro_call: Option<MacroCall>,
    pub from: Option<FromClause>,
    pub joins: Vec<JoinClause>,
    pub union_all: Vec<Ast>,
    clauses: BTreeMap<Clause, Vec<String>>,
}

/// A leading pseudo-function call such as `$columns(key, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroCall {
    pub kind: MacroKind,
    pub args: Vec<String>,
    /// Query text from the `FROM` keyword onward.
    pub remainder: String,
    /// Text preceding the macro call.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table(String),
    Subquery {
        ast: Box<Ast>,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: String,
    pub source: FromClause,
    pub using: Vec<String>,
    pub on: Option<String>,
}

impl Ast {
    pub fn clause(&self, clause: Clause) -> Option<&[String]> {
        self.clauses.get(&clause).map(Vec::as_slice)
    }

    pub fn select(&self) -> Option<&[String]> {
        self.clause(Clause::Select)
    }

    pub fn where_clause(&self) -> Option<&[String]> {
        self.clause(Clause::Where)
    }

    pub fn having(&self) -> Option<&[String]> {
        self.clause(Clause::Having)
    }

    pub fn macro_args(&self, kind: MacroKind) -> Option<&[String]> {
        self.macro_call
            .as_ref()
            .filter(|call| call.kind == kind)
            .map(|call| call.args.as_slice())
    }

    pub fn table(&self) -> Option<&str> {
        match &self.from {
            Some(FromClause::Table(name)) => Some(name),
            _ => None,
        }
    }

    pub fn subquery(&self) -> Option<&Ast> {
        match &self.from {
            Some(FromClause::Subquery { ast, .. }) => Some(ast),
            _ => None,
        }
    }

    pub(crate) fn push_expressions(&mut self, clause: Clause, expressions: Vec<String>) {
        if expressions.is_empty() {
            return;
        }
        self.clauses.entry(clause).or_default().extend(expressions);
    }

    /// Number of statement levels, counting this one.
    pub fn depth(&self) -> usize {
        let from = self.subquery().map(Ast::depth).unwrap_or(0);
        let joins = self
            .joins
            .iter()
            .filter_map(|join| match &join.source {
                FromClause::Subquery { ast, .. } => Some(ast.depth()),
                FromClause::Table(_) => None,
            })
            .max()
            .unwrap_or(0);
        let unions = self.union_all.iter().map(Ast::depth).max().unwrap_or(0);
        1 + from.max(joins).max(unions)
    }
}

const EXPRESSION_ORDER: &[Clause] = &[
    Clause::Select,
    Clause::Prewhere,
    Clause::Where,
    Clause::GroupBy,
    Clause::Having,
    Clause::OrderBy,
    Clause::Limit,
    Clause::Format,
];

impl Serialize for Ast {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("root", &self.root)?;
        if let Some(call) = &self.macro_call {
            map.serialize_entry(call.kind.key(), &call.args)?;
        }
        for clause in EXPRESSION_ORDER {
            if *clause == Clause::Prewhere {
                if let Some(from) = &self.from {
                    map.serialize_entry(Clause::From.key(), from)?;
                }
                match self.joins.as_slice() {
                    [] => {}
                    [join] => map.serialize_entry(Clause::Join.key(), join)?,
                    joins => map.serialize_entry(Clause::Join.key(), joins)?,
                }
            }
            if let Some(expressions) = self.clauses.get(clause) {
                map.serialize_entry(clause.key(), expressions)?;
            }
        }
        if !self.union_all.is_empty() {
            map.serialize_entry(Clause::UnionAll.key(), &self.union_all)?;
        }
        map.end()
    }
}

impl Serialize for FromClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FromClause::Table(name) => [name].serialize(serializer),
            FromClause::Subquery { ast, .. } => ast.serialize(serializer),
        }
    }
}

impl Serialize for JoinClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        map.serialize_entry("source", &self.source)?;
        if let FromClause::Subquery {
            alias: Some(alias), ..
        } = &self.source
        {
            map.serialize_entry("alias", alias)?;
        }
        if !self.using.is_empty() {
            map.serialize_entry("using", &self.using)?;
        }
        if let Some(on) = &self.on {
            map.serialize_entry("on", on)?;
        }
        map.end()
    }
}
