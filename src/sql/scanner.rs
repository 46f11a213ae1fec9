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

use super::{
    QueryError,
    ast::{Ast, FromClause, JoinClause, MacroCall},
    keywords::{Clause, match_clause, match_join, match_macro_head, match_phrase},
    lexer::{Lexer, at_keyword_start, find_keyword, matching_paren, split_top_level, strip_comments},
};

/// Turns dashboard SQL into an [`Ast`]. Stateless; the keyword and macro
/// tables it consults are static.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner;

impl Scanner {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, input: &str) -> Result<Ast, QueryError> {
        let text = strip_comments(input)?;
        let ast = parse_statement(&text)?;
        log::debug!("scanned query into {} statement level(s)", ast.depth());
        Ok(ast)
    }
}

#[derive(Debug)]
enum Mark {
    Clause(Clause),
    Join(String),
}

#[derive(Debug)]
struct Section {
    mark: Mark,
    start: usize,
    body_start: usize,
}

fn parse_statement(text: &str) -> Result<Ast, QueryError> {
    let mut ast = Ast::default();
    let Some((kind, dollar, open)) = match_macro_head(text) else {
        scan_clauses(text, &mut ast)?;
        return Ok(ast);
    };

    let close = matching_paren(text, open)?;
    let args = split_top_level(&text[open + 1..close])?;
    let after = &text[close + 1..];
    let Some((from, _)) = find_keyword(after, &["FROM"])? else {
        return Err(QueryError::parse(
            format!("missing FROM clause after {} macro", kind.key()),
            text[dollar..].trim(),
        ));
    };
    let remainder = &after[from..];
    scan_clauses(remainder, &mut ast)?;
    ast.macro_call = Some(MacroCall {
        kind,
        args,
        remainder: remainder.to_string(),
        prefix: text[..dollar].to_string(),
    });
    Ok(ast)
}

fn scan_clauses(text: &str, ast: &mut Ast) -> Result<(), QueryError> {
    let mut lexer = Lexer::new(text);
    let mut sections: Vec<Section> = Vec::new();
    let mut union: Option<(usize, usize)> = None;
    let mut skip_until = 0;

    while let Some(step) = lexer.step() {
        if step.offset < skip_until || !step.is_top_level() || !at_keyword_start(text, step.offset)
        {
            continue;
        }
        let rest = &text[step.offset..];
        if let Some((clause, len)) = match_clause(rest) {
            if clause == Clause::UnionAll {
                union = Some((step.offset, step.offset + len));
                break;
            }
            skip_until = step.offset + len;
            sections.push(Section {
                mark: Mark::Clause(clause),
                start: step.offset,
                body_start: skip_until,
            });
        } else if let Some((kind, len)) = match_join(rest) {
            skip_until = step.offset + len;
            sections.push(Section {
                mark: Mark::Join(kind),
                start: step.offset,
                body_start: skip_until,
            });
        }
    }
    lexer.finish()?;

    let end = union.map(|(start, _)| start).unwrap_or(text.len());
    let first = sections.first().map(|section| section.start).unwrap_or(end);
    ast.root = split_top_level(&text[..first])?;

    for (idx, section) in sections.iter().enumerate() {
        let body_end = sections
            .get(idx + 1)
            .map(|next| next.start)
            .unwrap_or(end);
        let body = text[section.body_start..body_end].trim();
        match &section.mark {
            Mark::Clause(Clause::From) => ast.from = Some(parse_source(body, "FROM")?),
            Mark::Join(kind) => ast.joins.push(parse_join(kind, body)?),
            Mark::Clause(clause) => ast.push_expressions(*clause, split_top_level(body)?),
        }
    }

    if let Some((_, union_end)) = union {
        let mut sibling = parse_statement(&text[union_end..])?;
        let nested = std::mem::take(&mut sibling.union_all);
        ast.union_all.push(sibling);
        ast.union_all.extend(nested);
    }
    Ok(())
}

/// A table reference, or a parenthesised subquery with an optional alias.
fn parse_source(body: &str, keyword: &str) -> Result<FromClause, QueryError> {
    if body.is_empty() {
        return Err(QueryError::parse(format!("empty {keyword} source"), keyword));
    }
    if !body.starts_with('(') {
        return Ok(FromClause::Table(body.to_string()));
    }
    let close = matching_paren(body, 0)?;
    let ast = parse_statement(&body[1..close])?;
    let tail = body[close + 1..].trim();
    let alias = match match_phrase(tail, &["AS"]) {
        Some(len) => tail[len..].trim(),
        None => tail,
    };
    Ok(FromClause::Subquery {
        ast: Box::new(ast),
        alias: (!alias.is_empty()).then(|| alias.to_string()),
    })
}

fn parse_join(kind: &str, body: &str) -> Result<JoinClause, QueryError> {
    let using = find_keyword(body, &["USING"])?;
    let on = find_keyword(body, &["ON"])?;
    let condition = match (using, on) {
        (Some(u), Some(o)) if o.0 < u.0 => Some((false, o)),
        (Some(u), _) => Some((true, u)),
        (None, Some(o)) => Some((false, o)),
        (None, None) => None,
    };

    let source_end = condition.map(|(_, (start, _))| start).unwrap_or(body.len());
    let source = parse_source(body[..source_end].trim(), kind)?;
    let mut join = JoinClause {
        kind: kind.to_string(),
        source,
        using: Vec::new(),
        on: None,
    };
    match condition {
        Some((true, (_, end))) => join.using = split_top_level(strip_parens(body[end..].trim())?)?,
        Some((false, (_, end))) => join.on = Some(body[end..].trim().to_string()),
        None => {}
    }
    Ok(join)
}

fn strip_parens(text: &str) -> Result<&str, QueryError> {
    if text.starts_with('(') && matching_paren(text, 0)? == text.len() - 1 {
        return Ok(&text[1..text.len() - 1]);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::MacroKind;

    fn parse(query: &str) -> Ast {
        Scanner.parse(query).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn union_all_branches_are_siblings() {
        let ast = parse("SELECT a, b FROM table1 UNION ALL select c, d from table2");
        assert_eq!(ast.select(), Some(strings(&["a", "b"]).as_slice()));
        assert_eq!(ast.table(), Some("table1"));
        assert_eq!(ast.union_all.len(), 1);
        let branch = &ast.union_all[0];
        assert_eq!(branch.select(), Some(strings(&["c", "d"]).as_slice()));
        assert_eq!(branch.table(), Some("table2"));
        assert!(ast.root.is_empty());
    }

    #[test]
    fn union_all_chains_are_flattened() {
        let ast = parse("SELECT 1 FROM a UNION ALL SELECT 2 FROM b UNION ALL SELECT 3 FROM c");
        let tables: Vec<_> = ast.union_all.iter().map(|b| b.table()).collect();
        assert_eq!(tables, vec![Some("b"), Some("c")]);
        assert!(ast.union_all.iter().all(|b| b.union_all.is_empty()));
    }

    #[test]
    fn leading_macro_arguments_are_kept_verbatim() {
        let ast = parse(
            "$rateColumns((AppType = '' ? 'undefined' : AppType) type, sum(Hits) hits) \
             FROM table_all WHERE Event = 'request' HAVING hits > $interval",
        );
        assert_eq!(
            ast.macro_args(MacroKind::RateColumns),
            Some(strings(&["(AppType = '' ? 'undefined' : AppType) type", "sum(Hits) hits"]).as_slice())
        );
        assert_eq!(ast.table(), Some("table_all"));
        assert_eq!(ast.where_clause(), Some(strings(&["Event = 'request'"]).as_slice()));
        assert_eq!(ast.having(), Some(strings(&["hits > $interval"]).as_slice()));
        let call = ast.macro_call.as_ref().unwrap();
        assert!(call.remainder.starts_with("FROM table_all"));
        assert_eq!(call.prefix, "");
    }

    #[test]
    fn macro_without_from_is_a_parse_error() {
        let err = Scanner.parse("$columns(k key, v value) WHERE x").unwrap_err();
        match err {
            QueryError::Parse { message, fragment } => {
                assert!(message.contains("FROM"));
                assert_eq!(fragment, "$columns(k key, v value) WHERE x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn subquery_in_from_is_a_nested_ast() {
        let ast = parse(
            "SELECT t, count() FROM (SELECT t FROM (SELECT now() t FROM system.one) \
             WHERE t > 0) AS sub GROUP BY t ORDER BY t LIMIT 10",
        );
        assert_eq!(ast.depth(), 3);
        let Some(FromClause::Subquery { ast: inner, alias }) = &ast.from else {
            panic!("expected subquery");
        };
        assert_eq!(alias.as_deref(), Some("sub"));
        assert_eq!(inner.where_clause(), Some(strings(&["t > 0"]).as_slice()));
        assert_eq!(inner.subquery().and_then(Ast::table), Some("system.one"));
        assert_eq!(ast.clause(Clause::GroupBy), Some(strings(&["t"]).as_slice()));
        assert_eq!(ast.clause(Clause::Limit), Some(strings(&["10"]).as_slice()));
    }

    #[test]
    fn keywords_inside_quotes_and_identifiers_do_not_split_clauses() {
        let ast = parse("SELECT `from`, 'where' AS w, from_date FROM t WHERE a = 'x FROM y'");
        assert_eq!(
            ast.select(),
            Some(strings(&["`from`", "'where' AS w", "from_date"]).as_slice())
        );
        assert_eq!(ast.table(), Some("t"));
        assert_eq!(ast.where_clause(), Some(strings(&["a = 'x FROM y'"]).as_slice()));
    }

    #[test]
    fn joins_keep_type_source_and_using() {
        let ast = parse(
            "SELECT a FROM t1 GLOBAL ANY LEFT JOIN (SELECT a, b FROM t2) USING (a, b) \
             INNER JOIN t3 ON t1.a = t3.a WHERE b > 1",
        );
        assert_eq!(ast.joins.len(), 2);
        let first = &ast.joins[0];
        assert_eq!(first.kind, "GLOBAL ANY LEFT JOIN");
        assert_eq!(first.using, strings(&["a", "b"]));
        assert!(matches!(first.source, FromClause::Subquery { .. }));
        let second = &ast.joins[1];
        assert_eq!(second.kind, "INNER JOIN");
        assert_eq!(second.source, FromClause::Table("t3".to_string()));
        assert_eq!(second.on.as_deref(), Some("t1.a = t3.a"));
        assert_eq!(ast.where_clause(), Some(strings(&["b > 1"]).as_slice()));
    }

    #[test]
    fn comments_are_ignored() {
        let ast = parse("SELECT a -- , b\n, c /* FROM x */ FROM t");
        assert_eq!(ast.select(), Some(strings(&["a", "c"]).as_slice()));
        assert_eq!(ast.table(), Some("t"));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(Scanner.parse("SELECT (a FROM t").is_err());
        assert!(Scanner.parse("SELECT a FROM t WHERE b = 'x").is_err());
        assert!(Scanner.parse("SELECT arr[1 FROM t").is_err());
        assert!(Scanner.parse("SELECT a) FROM t").is_err());
    }

    #[test]
    fn prewhere_limit_and_format_clauses() {
        let ast = parse("SELECT a FROM t PREWHERE d = today() WHERE x LIMIT 5 FORMAT JSON");
        assert_eq!(
            serde_json::to_value(&ast).unwrap(),
            serde_json::json!({
                "root": [],
                "select": ["a"],
                "from": ["t"],
                "prewhere": ["d = today()"],
                "where": ["x"],
                "limit": ["5"],
                "format": ["JSON"]
            })
        );
    }

    #[test]
    fn format_function_stays_inside_its_clause() {
        let ast = parse("SELECT format('{} {}', a, b) AS s FROM t");
        assert_eq!(ast.select(), Some(strings(&["format('{} {}', a, b) AS s"]).as_slice()));
        assert_eq!(ast.table(), Some("t"));
        assert_eq!(ast.clause(Clause::Format), None);

        let ast = parse("SELECT a FROM t WHERE format ('{}', a) = 'x' ORDER BY a FORMAT JSON");
        assert_eq!(
            ast.where_clause(),
            Some(strings(&["format ('{}', a) = 'x'"]).as_slice())
        );
        assert_eq!(ast.clause(Clause::OrderBy), Some(strings(&["a"]).as_slice()));
        assert_eq!(ast.clause(Clause::Format), Some(strings(&["JSON"]).as_slice()));
    }

    #[test]
    fn empty_clauses_are_not_recorded() {
        let ast = parse("SELECT a FROM t WHERE");
        assert_eq!(ast.where_clause(), None);
        let value = serde_json::to_value(&ast).unwrap();
        assert!(value.get("where").is_none());
    }

    #[test]
    fn comment_before_macro_leaves_whitespace_prefix() {
        let ast = parse("/* dashboard */ $columns(k key, v value) FROM t");
        let call = ast.macro_call.as_ref().unwrap();
        assert_eq!(call.kind, MacroKind::Columns);
        assert!(call.prefix.trim().is_empty());
    }

    #[test]
    fn serialized_shape_uses_clause_names() {
        let ast = parse("SELECT a, b FROM table1 UNION ALL select c, d from table2");
        let value = serde_json::to_value(&ast).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "root": [],
                "select": ["a", "b"],
                "from": ["table1"],
                "union all": [{"root": [], "select": ["c", "d"], "from": ["table2"]}]
            })
        );
    }
}
