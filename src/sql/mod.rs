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

//! Macro SQL front end: scanning dashboard queries into an AST, expanding the
//! leading pseudo-functions and substituting the time/interval macros.

mod ast;
mod escape;
mod keywords;
mod lexer;
mod macros;
mod render;
mod scanner;

pub use ast::{Ast, FromClause, JoinClause, MacroCall};
pub use escape::{TemplateVariable, VariableValue, escape, interpolate};
pub use keywords::{Clause, MacroKind};
pub use lexer::split_top_level;
pub use render::{ColumnConfig, DateTimeType, MacroExpander, RenderContext, render};
pub use scanner::Scanner;

pub(crate) use keywords::parse_interval_literal;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("{message}: `{fragment}`")]
    Parse { message: String, fragment: String },
    #[error("{message}. Parsed arguments are: {}", .args.join(", "))]
    MacroArgument { message: String, args: Vec<String> },
    #[error("invalid query response: {0}")]
    InvalidResponse(String),
}

impl QueryError {
    pub(crate) fn parse(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn macro_argument(message: impl Into<String>, args: &[String]) -> Self {
        Self::MacroArgument {
            message: message.into(),
            args: args.to_vec(),
        }
    }
}
