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

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{opt, recognize},
    error::{Error as NomError, context},
    sequence::{delimited, preceded, terminated},
};

use super::lexer::{is_ident_char, is_keyword_boundary};

type NomResult<'a, T> = IResult<&'a str, T, NomError<&'a str>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Clause {
    Select,
    From,
    Prewhere,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Format,
    UnionAll,
    Join,
}

impl Clause {
    pub fn key(self) -> &'static str {
        match self {
            Clause::Select => "select",
            Clause::From => "from",
            Clause::Prewhere => "prewhere",
            Clause::Where => "where",
            Clause::GroupBy => "group by",
            Clause::Having => "having",
            Clause::OrderBy => "order by",
            Clause::Limit => "limit",
            Clause::Format => "format",
            Clause::UnionAll => "union all",
            Clause::Join => "join",
        }
    }
}

pub(crate) struct ClauseKeyword {
    pub(crate) clause: Clause,
    pub(crate) words: &'static [&'static str],
    /// Also a function name; only a keyword when whitespace or end of input
    /// follows and the next token is not an argument list.
    pub(crate) function_name: bool,
}

/// Clause keywords recognised at nesting depth zero. Joins are matched
/// separately by [`match_join`] since their prefix words vary.
pub(crate) static CLAUSE_KEYWORDS: &[ClauseKeyword] = &[
    ClauseKeyword {
        clause: Clause::UnionAll,
        words: &["UNION", "ALL"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::GroupBy,
        words: &["GROUP", "BY"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::OrderBy,
        words: &["ORDER", "BY"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Select,
        words: &["SELECT"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::From,
        words: &["FROM"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Prewhere,
        words: &["PREWHERE"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Where,
        words: &["WHERE"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Having,
        words: &["HAVING"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Limit,
        words: &["LIMIT"],
        function_name: false,
    },
    ClauseKeyword {
        clause: Clause::Format,
        words: &["FORMAT"],
        function_name: true,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKind {
    Columns,
    RateColumns,
    Rate,
    PerSecond,
    PerSecondColumns,
}

static MACROS: &[(&str, MacroKind)] = &[
    ("columns", MacroKind::Columns),
    ("rateColumns", MacroKind::RateColumns),
    ("rate", MacroKind::Rate),
    ("perSecond", MacroKind::PerSecond),
    ("perSecondColumns", MacroKind::PerSecondColumns),
];

impl MacroKind {
    pub fn from_name(name: &str) -> Option<Self> {
        MACROS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, kind)| *kind)
    }

    /// The AST key, including the leading `$`.
    pub fn key(self) -> &'static str {
        match self {
            MacroKind::Columns => "$columns",
            MacroKind::RateColumns => "$rateColumns",
            MacroKind::Rate => "$rate",
            MacroKind::PerSecond => "$perSecond",
            MacroKind::PerSecondColumns => "$perSecondColumns",
        }
    }
}

/// Matches a (possibly multi-word) keyword at the start of `input`. Words
/// may be separated by any whitespace and the phrase must end at a keyword
/// boundary. Returns the byte length consumed.
pub(crate) fn match_phrase(input: &str, words: &[&str]) -> Option<usize> {
    let mut rest = input;
    for (idx, word) in words.iter().enumerate() {
        if idx > 0 {
            let (next, _) = multispace1::<_, NomError<&str>>(rest).ok()?;
            rest = next;
        }
        let (next, _) = tag_no_case::<_, _, NomError<&str>>(*word)(rest).ok()?;
        rest = next;
    }
    ends_keyword(rest).then_some(input.len() - rest.len())
}

/// Matches the first clause keyword at the start of `input`.
pub(crate) fn match_clause(input: &str) -> Option<(Clause, usize)> {
    CLAUSE_KEYWORDS.iter().find_map(|keyword| {
        let len = match_phrase(input, keyword.words)?;
        if keyword.function_name && looks_like_call(&input[len..]) {
            return None;
        }
        Some((keyword.clause, len))
    })
}

fn looks_like_call(rest: &str) -> bool {
    !rest.chars().next().is_none_or(char::is_whitespace) || rest.trim_start().starts_with('(')
}

fn ends_keyword(rest: &str) -> bool {
    rest.chars().next().is_none_or(is_keyword_boundary)
}

/// Recognises join phrases such as `JOIN`, `LEFT JOIN`, `GLOBAL ANY LEFT
/// JOIN`, `LEFT ANY JOIN` or `ARRAY JOIN`. Returns the normalised phrase and
/// the byte length consumed.
pub(crate) fn match_join(input: &str) -> Option<(String, usize)> {
    let (rest, phrase) = join_phrase(input).ok()?;
    if !ends_keyword(rest) {
        return None;
    }
    let normalized = phrase
        .split_whitespace()
        .map(|word| word.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(" ");
    Some((normalized, input.len() - rest.len()))
}

fn join_phrase(input: &str) -> NomResult<'_, &str> {
    context(
        "join",
        recognize((
            opt(terminated(tag_no_case("GLOBAL"), multispace1)),
            opt(terminated(strictness, multispace1)),
            opt(terminated(join_kind, multispace1)),
            opt(terminated(tag_no_case("OUTER"), multispace1)),
            opt(terminated(strictness, multispace1)),
            opt(terminated(tag_no_case("ARRAY"), multispace1)),
            tag_no_case("JOIN"),
        )),
    )
    .parse(input)
}

fn strictness(input: &str) -> NomResult<'_, &str> {
    alt((
        tag_no_case("ANY"),
        tag_no_case("ALL"),
        tag_no_case("ASOF"),
        tag_no_case("SEMI"),
        tag_no_case("ANTI"),
    ))
    .parse(input)
}

fn join_kind(input: &str) -> NomResult<'_, &str> {
    alt((
        tag_no_case("INNER"),
        tag_no_case("LEFT"),
        tag_no_case("RIGHT"),
        tag_no_case("FULL"),
        tag_no_case("CROSS"),
    ))
    .parse(input)
}

/// Recognises a leading `$name(` macro head. Returns the macro, the offset of
/// the `$` and the offset of the opening parenthesis.
pub(crate) fn match_macro_head(input: &str) -> Option<(MacroKind, usize, usize)> {
    let (_, leading) = multispace0::<_, NomError<&str>>(input).ok()?;
    let dollar = leading.len();
    let (rest, name) = macro_name(&input[dollar..]).ok()?;
    let kind = MacroKind::from_name(name)?;
    let (rest, _) = multispace0::<_, NomError<&str>>(rest).ok()?;
    char::<_, NomError<&str>>('(')(rest).ok()?;
    let open = input.len() - rest.len();
    Some((kind, dollar, open))
}

fn macro_name(input: &str) -> NomResult<'_, &str> {
    context(
        "macro name",
        preceded(char('$'), take_while1(is_ident_char)),
    )
    .parse(input)
}

/// Recognises a `$identifier` reference at the start of `input`, returning
/// the identifier without the `$`.
pub(crate) fn variable_name(input: &str) -> Option<&str> {
    macro_name(input).ok().map(|(_, name)| name)
}

/// `-?digits(.digits)?` spanning the whole input.
pub(crate) fn is_numeric_literal(input: &str) -> bool {
    let parsed: NomResult<'_, &str> = recognize((
        opt(char('-')),
        take_while1(|ch: char| ch.is_ascii_digit()),
        opt((char('.'), take_while1(|ch: char| ch.is_ascii_digit()))),
    ))
    .parse(input);
    matches!(parsed, Ok((rest, _)) if rest.is_empty())
}

/// Parses an interval literal such as `30s`, `5m`, `100ms` or `2`,
/// returning its length in seconds.
pub(crate) fn parse_interval_literal(input: &str) -> Result<f64, String> {
    let parsed: NomResult<'_, (&str, Option<&str>)> = delimited(
        multispace0,
        (
            recognize((
                take_while1(|ch: char| ch.is_ascii_digit()),
                opt((char('.'), take_while1(|ch: char| ch.is_ascii_digit()))),
            )),
            opt(alt((
                tag_no_case("ms"),
                tag_no_case("s"),
                tag_no_case("m"),
                tag_no_case("h"),
                tag_no_case("d"),
                tag_no_case("w"),
                tag_no_case("y"),
            ))),
        ),
        multispace0,
    )
    .parse(input);
    let (rest, (amount, unit)) =
        parsed.map_err(|err| format!("invalid interval `{input}`: {err}"))?;
    if !rest.is_empty() {
        return Err(format!("invalid interval `{input}`: unexpected `{rest}`"));
    }
    let amount: f64 = amount
        .parse()
        .map_err(|err| format!("invalid interval `{input}`: {err}"))?;
    let multiplier = match unit.map(|unit| unit.to_ascii_lowercase()).as_deref() {
        Some("ms") => return Ok(amount / 1_000.0),
        None | Some("s") => 1.0,
        Some("m") => 60.0,
        Some("h") => 3_600.0,
        Some("d") => 86_400.0,
        Some("w") => 604_800.0,
        Some("y") => 31_536_000.0,
        Some(other) => return Err(format!("invalid interval unit `{other}`")),
    };
    Ok(amount * multiplier)
}
