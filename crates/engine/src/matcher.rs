//! Token and pattern matching for the query mini-language
//!
//! Everything here is purely lexical: splitting a query into ternary steps,
//! a statement into operand/operator tokens, a function call into name and
//! arguments, and recognising the DB-query and join shapes. Evaluation
//! lives in `eval`, `path`, and `join`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EngineError, EngineResult};

/// One `statement (: ifTrue)?` fragment of a ternary chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TernaryStep {
    /// The condition, or the final else statement when `if_true` is absent
    pub statement: String,
    /// Evaluated when the condition is truthy and non-empty
    pub if_true: Option<String>,
}

/// Binary and unary operators of the statement grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Not,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    And,
    Or,
}

impl Operator {
    /// Binding strength; higher binds tighter. `Not` is prefix-only.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Not => 6,
            Self::Multiply | Self::Divide | Self::Modulo => 5,
            Self::Add | Self::Subtract => 4,
            Self::Equal
            | Self::NotEqual
            | Self::Greater
            | Self::GreaterOrEqual
            | Self::Less
            | Self::LessOrEqual => 3,
            Self::And => 2,
            Self::Or => 1,
        }
    }
}

/// A lexed piece of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatementToken {
    Operand(String),
    Operator(Operator),
}

/// Output-shape modifier of an array filter step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FilterMode {
    /// First element whose predicate is truthy
    #[default]
    First,
    /// All truthy elements as a plain array (`*`)
    CollectAll,
    /// All truthy elements, with later steps mapping element-wise (`@`)
    DivertAll,
}

/// A decomposed `name[filter]mode` path step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterStep<'a> {
    /// Field to resolve before filtering; empty applies to the current node
    pub name: &'a str,
    pub predicate: Option<&'a str>,
    pub mode: FilterMode,
}

/// Recognised DB-query shape: collection, one-or-many symbol, payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DbQuery<'a> {
    pub collection: &'a str,
    /// `?` for find-one, `[]` for find-many
    pub symbol: &'a str,
    pub payload: &'a str,
}

/// The five join operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinOperator {
    InnerJoinOne,
    LeftJoinOne,
    RightJoinOne,
    LeftJoinMany,
    RightJoinMany,
}

/// One side of a join: a query plus its key list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinSide {
    pub query: String,
    pub keys: Vec<String>,
}

/// A matched `left{keys} op right{keys}` join query
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinQuery {
    pub left: JoinSide,
    pub operator: JoinOperator,
    pub right: JoinSide,
}

// Longer operators first so `<=<<` is not consumed as `<=<`.
static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+?\{[^{}]*\})\s*(<=<<|>>=>|>=<|<=<|>=>)\s*(.+\{[^{}]*\})\s*$")
        .expect("join pattern")
});

static JOIN_SIDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.+)\{([^{}]*)\}$").expect("join side pattern"));

static DB_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*([A-Za-z_][A-Za-z_0-9]*)?\s*(\?|\[\s*\])\s*([\[{].*[\]}])\s*$")
        .expect("db query pattern")
});

/// Tracks quotes and bracket nesting during a linear scan.
///
/// Single-quoted text doubles `''` to escape a quote; double-quoted text
/// (JSON payloads) uses backslash escapes.
#[derive(Debug, Default)]
struct NestScanner {
    depth: u32,
    quote: Option<char>,
    escaped: bool,
}

impl NestScanner {
    /// Feed one character; returns true when the scanner is at depth zero
    /// outside any quote *after* consuming the character.
    fn step(&mut self, c: char, rest: &str) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if q == '"' && c == '\\' {
                self.escaped = true;
            } else if c == q {
                if q == '\'' && rest.starts_with('\'') {
                    // doubled quote stays inside the literal
                    self.escaped = true;
                } else {
                    self.quote = None;
                }
            }
            return false;
        }
        match c {
            '\'' | '"' => {
                self.quote = Some(c);
                false
            }
            '(' | '[' | '{' => {
                self.depth += 1;
                false
            }
            ')' | ']' | '}' => {
                self.depth = self.depth.saturating_sub(1);
                self.depth == 0
            }
            _ => self.depth == 0,
        }
    }
}

/// Split `text` on `separator` occurrences at depth zero outside quotes
fn split_at_depth_zero(text: &str, separator: char) -> Vec<&str> {
    let mut scanner = NestScanner::default();
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        let at_top = scanner.step(c, &text[i + c.len_utf8()..]);
        if at_top && c == separator {
            pieces.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

/// Find the first depth-zero occurrence of `separator`
fn find_at_depth_zero(text: &str, separator: char) -> Option<usize> {
    let mut scanner = NestScanner::default();
    for (i, c) in text.char_indices() {
        let at_top = scanner.step(c, &text[i + c.len_utf8()..]);
        if at_top && c == separator {
            return Some(i);
        }
    }
    None
}

/// Decompose a query into its ternary chain.
///
/// `a ? b : c ? d : e` becomes `[(a, b), (c, d), (e, -)]`; a query without
/// `?` is a single step with no `if_true`.
pub(crate) fn decompose_ternary_steps(query: &str) -> Vec<TernaryStep> {
    let mut steps = Vec::new();
    let mut pending: Option<&str> = None;
    for fragment in split_at_depth_zero(query, '?') {
        match pending.take() {
            None => pending = Some(fragment),
            Some(statement) => {
                if let Some(colon) = find_at_depth_zero(fragment, ':') {
                    steps.push(TernaryStep {
                        statement: statement.trim().to_string(),
                        if_true: Some(fragment[..colon].trim().to_string()),
                    });
                    pending = Some(&fragment[colon + 1..]);
                } else {
                    steps.push(TernaryStep {
                        statement: statement.trim().to_string(),
                        if_true: Some(fragment.trim().to_string()),
                    });
                }
            }
        }
    }
    if let Some(statement) = pending {
        steps.push(TernaryStep {
            statement: statement.trim().to_string(),
            if_true: None,
        });
    }
    steps
}

/// Lex a statement into alternating operand and operator tokens
pub(crate) fn tokenize_statement(statement: &str) -> EngineResult<Vec<StatementToken>> {
    let chars: Vec<(usize, char)> = statement.char_indices().collect();
    let end = statement.len();
    let byte_at = |pos: usize| chars.get(pos).map_or(end, |&(b, _)| b);
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut expect_operand = true;
    while i < chars.len() {
        let c = chars[i].1;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if expect_operand {
            if c == '!' {
                tokens.push(StatementToken::Operator(Operator::Not));
                i += 1;
                continue;
            }
            let start = i;
            let mut scanner = NestScanner::default();
            while i < chars.len() {
                let c = chars[i].1;
                let rest = &statement[byte_at(i + 1)..];
                // A sign is part of the operand only right at its start.
                let is_sign =
                    c == '-' && i == start && rest.starts_with(|d: char| d.is_ascii_digit());
                let at_top = scanner.step(c, rest);
                if at_top && !is_sign && is_operator_char(c) {
                    break;
                }
                i += 1;
            }
            let operand = statement[byte_at(start)..byte_at(i)].trim();
            if operand.is_empty() {
                return Err(EngineError::Syntax(format!(
                    "operand expected in statement '{statement}'"
                )));
            }
            tokens.push(StatementToken::Operand(operand.to_string()));
            expect_operand = false;
        } else {
            let next = chars.get(i + 1).map(|&(_, c)| c);
            let (op, len) = match (c, next) {
                ('!', Some('=')) => (Operator::NotEqual, 2),
                ('>', Some('=')) => (Operator::GreaterOrEqual, 2),
                ('<', Some('=')) => (Operator::LessOrEqual, 2),
                ('*', _) => (Operator::Multiply, 1),
                ('/', _) => (Operator::Divide, 1),
                ('%', _) => (Operator::Modulo, 1),
                ('+', _) => (Operator::Add, 1),
                ('-', _) => (Operator::Subtract, 1),
                ('=', _) => (Operator::Equal, 1),
                ('>', _) => (Operator::Greater, 1),
                ('<', _) => (Operator::Less, 1),
                ('&', _) => (Operator::And, 1),
                ('|', _) => (Operator::Or, 1),
                (other, _) => {
                    return Err(EngineError::Syntax(format!(
                        "unexpected character '{other}' in statement '{statement}'"
                    )));
                }
            };
            tokens.push(StatementToken::Operator(op));
            i += len;
            expect_operand = true;
        }
    }
    Ok(tokens)
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '!' | '*' | '/' | '%' | '+' | '-' | '=' | '>' | '<' | '&' | '|')
}

/// Split `name(args)` into its parts; `None` when the expression is not a
/// well-formed call spanning the whole text.
pub(crate) fn decompose_function(expression: &str) -> Option<(&str, &str)> {
    let expression = expression.trim();
    let open = expression.find('(')?;
    let name = &expression[..open];
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || name.starts_with(|c: char| c.is_ascii_digit())
    {
        return None;
    }
    if !expression.ends_with(')') {
        return None;
    }
    let inner = &expression[open + 1..expression.len() - 1];
    // The closing parenthesis must match the opening one.
    let mut scanner = NestScanner::default();
    for (i, c) in inner.char_indices() {
        if scanner.quote.is_none() && scanner.depth == 0 && c == ')' {
            return None;
        }
        scanner.step(c, &inner[i + c.len_utf8()..]);
    }
    Some((name, inner))
}

/// Comma-split a function argument list at depth zero
pub(crate) fn split_function_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    split_at_depth_zero(args, ',')
        .into_iter()
        .map(str::trim)
        .collect()
}

/// Split a navigation path on depth-zero dots
pub(crate) fn split_path_steps(path: &str) -> Vec<&str> {
    split_at_depth_zero(path, '.')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Decompose a `name[predicate]mode` step
pub(crate) fn parse_filter_step(step: &str) -> EngineResult<FilterStep<'_>> {
    let Some(open) = find_at_depth_zero_bracket(step) else {
        return Ok(FilterStep {
            name: step,
            predicate: None,
            mode: FilterMode::First,
        });
    };
    let name = step[..open].trim();
    let rest = &step[open..];
    let close = matching_bracket(rest).ok_or_else(|| {
        EngineError::Syntax(format!("unbalanced '[' in path step '{step}'"))
    })?;
    let predicate = rest[1..close].trim();
    let mode = match rest[close + 1..].trim() {
        "" => FilterMode::First,
        "*" => FilterMode::CollectAll,
        "@" => FilterMode::DivertAll,
        other => {
            return Err(EngineError::Syntax(format!(
                "unexpected trailing '{other}' in path step '{step}'"
            )));
        }
    };
    Ok(FilterStep {
        name,
        predicate: if predicate.is_empty() {
            None
        } else {
            Some(predicate)
        },
        mode,
    })
}

fn find_at_depth_zero_bracket(step: &str) -> Option<usize> {
    let mut scanner = NestScanner::default();
    for (i, c) in step.char_indices() {
        if scanner.quote.is_none() && scanner.depth == 0 && c == '[' {
            return Some(i);
        }
        scanner.step(c, &step[i + c.len_utf8()..]);
    }
    None
}

/// Index of the `]` matching the `[` the text starts with
fn matching_bracket(text: &str) -> Option<usize> {
    let mut scanner = NestScanner::default();
    for (i, c) in text.char_indices() {
        scanner.step(c, &text[i + c.len_utf8()..]);
        if scanner.quote.is_none() && scanner.depth == 0 && c == ']' {
            return Some(i);
        }
    }
    None
}

/// Leading identifier of an operand, with the remaining path (if any)
pub(crate) fn split_dataset_name(operand: &str) -> (&str, &str) {
    let end = operand
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(operand.len());
    (&operand[..end], &operand[end..])
}

/// Match the DB-query shape `collection symbol payload`
pub(crate) fn match_db_query(query: &str) -> Option<DbQuery<'_>> {
    let captures = DB_QUERY_RE.captures(query)?;
    let symbol = captures.get(2).map_or("?", |m| m.as_str());
    Some(DbQuery {
        collection: captures.get(1).map_or("", |m| m.as_str()),
        symbol: if symbol.starts_with('[') { "[]" } else { "?" },
        payload: captures.get(3).map_or("", |m| m.as_str()),
    })
}

/// Match the join shape `leftQuery{keys} op rightQuery{keys}`
pub(crate) fn match_join(query: &str) -> Option<JoinQuery> {
    let captures = JOIN_RE.captures(query)?;
    let operator = match captures.get(2).map_or("", |m| m.as_str()) {
        ">=<" => JoinOperator::InnerJoinOne,
        "<=<" => JoinOperator::LeftJoinOne,
        ">=>" => JoinOperator::RightJoinOne,
        "<=<<" => JoinOperator::LeftJoinMany,
        ">>=>" => JoinOperator::RightJoinMany,
        _ => return None,
    };
    let left = parse_join_side(captures.get(1)?.as_str())?;
    let right = parse_join_side(captures.get(3)?.as_str())?;
    Some(JoinQuery {
        left,
        operator,
        right,
    })
}

fn parse_join_side(text: &str) -> Option<JoinSide> {
    let captures = JOIN_SIDE_RE.captures(text.trim())?;
    let query = captures.get(1)?.as_str().trim().to_string();
    let keys: Vec<String> = split_at_depth_zero(captures.get(2)?.as_str(), ',')
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if query.is_empty() || keys.is_empty() {
        return None;
    }
    Some(JoinSide { query, keys })
}

/// Partition XML-mode placeholder text into the query residue and the
/// carved-out `<...>` fragments. The residue comes back XML-unescaped.
pub(crate) fn carve_xml_tags(inner: &str) -> (String, Vec<String>) {
    let mut residue = String::with_capacity(inner.len());
    let mut tags = Vec::new();
    let mut rest = inner;
    while let Some(open) = rest.find('<') {
        residue.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                tags.push(rest[open..=open + close].to_string());
                rest = &rest[open + close + 1..];
            }
            None => {
                residue.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    residue.push_str(rest);
    (xml_unescape(&residue), tags)
}

/// Decode the five XML entities plus numeric character references
pub(crate) fn xml_unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let decoded = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        // not an entity; emit the ampersand and rescan
                        out.push('&');
                        rest = &tail[1..];
                        continue;
                    }
                }
            }
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// Encode the five XML entities
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn step(statement: &str, if_true: Option<&str>) -> TernaryStep {
        TernaryStep {
            statement: statement.to_string(),
            if_true: if_true.map(str::to_string),
        }
    }

    #[test]
    fn test_ternary_single_statement() {
        assert_eq!(decompose_ternary_steps("a.b"), vec![step("a.b", None)]);
    }

    #[test]
    fn test_ternary_chain() {
        assert_eq!(
            decompose_ternary_steps("a ? b : c ? d : e"),
            vec![step("a", Some("b")), step("c", Some("d")), step("e", None)]
        );
    }

    #[test]
    fn test_ternary_without_else() {
        assert_eq!(
            decompose_ternary_steps("n>0 ? 'pos'"),
            vec![step("n>0", Some("'pos'"))]
        );
    }

    #[test]
    fn test_ternary_ignores_nested_separators() {
        // '?' inside quotes and ':' inside brackets must not split
        assert_eq!(
            decompose_ternary_steps("a = 'really?' ? b[x:y] : c"),
            vec![step("a = 'really?'", Some("b[x:y]")), step("c", None)]
        );
    }

    #[test]
    fn test_tokenize_relational() {
        let tokens = tokenize_statement("n >= 10").unwrap();
        assert_eq!(
            tokens,
            vec![
                StatementToken::Operand("n".to_string()),
                StatementToken::Operator(Operator::GreaterOrEqual),
                StatementToken::Operand("10".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_negative_number() {
        let tokens = tokenize_statement("-1 + 2").unwrap();
        assert_eq!(
            tokens,
            vec![
                StatementToken::Operand("-1".to_string()),
                StatementToken::Operator(Operator::Add),
                StatementToken::Operand("2".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_unary_not() {
        let tokens = tokenize_statement("!a & b").unwrap();
        assert_eq!(
            tokens,
            vec![
                StatementToken::Operator(Operator::Not),
                StatementToken::Operand("a".to_string()),
                StatementToken::Operator(Operator::And),
                StatementToken::Operand("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_keeps_nested_operators() {
        let tokens = tokenize_statement("items[price>10] & active").unwrap();
        assert_eq!(
            tokens,
            vec![
                StatementToken::Operand("items[price>10]".to_string()),
                StatementToken::Operator(Operator::And),
                StatementToken::Operand("active".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_operators() {
        let tokens = tokenize_statement("'a&b' = x").unwrap();
        assert_eq!(
            tokens,
            vec![
                StatementToken::Operand("'a&b'".to_string()),
                StatementToken::Operator(Operator::Equal),
                StatementToken::Operand("x".to_string()),
            ]
        );
    }

    #[test]
    fn test_decompose_function() {
        assert_eq!(
            decompose_function("concat('a', 'b')"),
            Some(("concat", "'a', 'b'"))
        );
        assert_eq!(decompose_function("uppercase()"), Some(("uppercase", "")));
        assert_eq!(decompose_function("no_parens"), None);
        assert_eq!(decompose_function("(a + b)"), None);
        // two separate call expressions are not one function call
        assert_eq!(decompose_function("f(a)g(b)"), None);
    }

    #[test]
    fn test_split_function_args() {
        assert_eq!(split_function_args("'a,b', c(d, e), 1"), vec![
            "'a,b'",
            "c(d, e)",
            "1"
        ]);
        assert!(split_function_args("  ").is_empty());
    }

    #[test]
    fn test_split_path_steps() {
        assert_eq!(split_path_steps("a.b[x=1].c"), vec!["a", "b[x=1]", "c"]);
        assert_eq!(split_path_steps("round(2.5)"), vec!["round(2.5)"]);
    }

    #[test]
    fn test_parse_filter_step() {
        let parsed = parse_filter_step("items[price > 10]*").unwrap();
        assert_eq!(parsed.name, "items");
        assert_eq!(parsed.predicate, Some("price > 10"));
        assert_eq!(parsed.mode, FilterMode::CollectAll);

        let parsed = parse_filter_step("items[0]").unwrap();
        assert_eq!(parsed.predicate, Some("0"));
        assert_eq!(parsed.mode, FilterMode::First);

        let parsed = parse_filter_step("[fk=1]@").unwrap();
        assert_eq!(parsed.name, "");
        assert_eq!(parsed.mode, FilterMode::DivertAll);

        assert!(parse_filter_step("items[").is_err());
    }

    #[test]
    fn test_split_dataset_name() {
        assert_eq!(split_dataset_name("order.items"), ("order", ".items"));
        assert_eq!(split_dataset_name("order[0].id"), ("order", "[0].id"));
        assert_eq!(split_dataset_name("order"), ("order", ""));
    }

    #[test]
    fn test_match_db_query() {
        let matched = match_db_query("orders ? {\"status\":\"open\"}").unwrap();
        assert_eq!(matched.collection, "orders");
        assert_eq!(matched.symbol, "?");
        assert_eq!(matched.payload, "{\"status\":\"open\"}");

        let matched = match_db_query("[] {\"all\":true}").unwrap();
        assert_eq!(matched.collection, "");
        assert_eq!(matched.symbol, "[]");

        assert!(match_db_query("n>0 ? 'pos' : 'neg'").is_none());
        assert!(match_db_query("a.b.c").is_none());
    }

    #[test]
    fn test_match_join() {
        let join = match_join("L{id} >=< R{id}").unwrap();
        assert_eq!(join.operator, JoinOperator::InnerJoinOne);
        assert_eq!(join.left.query, "L");
        assert_eq!(join.left.keys, vec!["id".to_string()]);
        assert_eq!(join.right.query, "R");

        let join = match_join("L{id} <=<< things{fk}").unwrap();
        assert_eq!(join.operator, JoinOperator::LeftJoinMany);
        assert_eq!(join.right.query, "things");
        assert_eq!(join.right.keys, vec!["fk".to_string()]);

        assert!(match_join("a >= b").is_none());
        assert!(match_join("L{} >=< R{id}").is_none());
    }

    #[test]
    fn test_match_join_multi_keys() {
        let join = match_join("a.b{k1, k2} <=< c{k1, k2}").unwrap();
        assert_eq!(join.operator, JoinOperator::LeftJoinOne);
        assert_eq!(join.left.query, "a.b");
        assert_eq!(join.left.keys, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn test_carve_xml_tags() {
        let (query, tags) = carve_xml_tags("or<b>der.id</b>");
        assert_eq!(query, "order.id");
        assert_eq!(tags, vec!["<b>".to_string(), "</b>".to_string()]);
    }

    #[test]
    fn test_carve_xml_unescapes_residue() {
        let (query, tags) = carve_xml_tags("n &gt; 0 ? &apos;pos&apos; : &apos;neg&apos;");
        assert_eq!(query, "n > 0 ? 'pos' : 'neg'");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_xml_unescape_numeric() {
        assert_eq!(xml_unescape("&#65;&#x42;"), "AB");
        assert_eq!(xml_unescape("&unknown;"), "&unknown;");
        assert_eq!(xml_unescape("dangling &"), "dangling &");
    }

    #[test]
    fn test_xml_escape_round_trip() {
        let text = "a < b & c > 'd' \"e\"";
        assert_eq!(xml_unescape(&xml_escape(text)), text);
    }
}
