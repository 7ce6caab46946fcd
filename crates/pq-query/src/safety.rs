//! Post-generation query validation.
//!
//! Every query text leaving the router, built or model-generated, passes
//! through [`SafetyValidator::validate`]. Only a single bounded SELECT over
//! known tables gets through.

use std::collections::HashMap;

use pq_protocol::MAX_LIMIT;
use tracing::warn;

use crate::error::{SafetyError, SafetyResult};
use crate::schema::SchemaDictionary;

/// Mutating or administrative keywords, rejected anywhere outside literals.
pub const DENYLIST: [&str; 20] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "MERGE", "COPY", "CALL", "EXECUTE", "EXEC", "VACUUM", "ATTACH", "DETACH", "PRAGMA", "INTO",
    "SET",
];

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL", "AS", "ON", "USING",
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "GROUP", "BY",
    "ORDER", "ASC", "DESC", "LIMIT", "OFFSET", "HAVING", "DISTINCT", "BETWEEN", "LIKE", "ILIKE",
    "CASE", "WHEN", "THEN", "ELSE", "END", "EXTRACT", "YEAR", "MONTH", "DAY", "WEEK", "QUARTER",
    "DOW", "TIMESTAMP", "INTERVAL", "TRUE", "FALSE", "WITHIN", "CAST", "NUMERIC",
    "INTEGER", "INT", "BIGINT", "TEXT", "FLOAT", "DOUBLE", "PRECISION", "DECIMAL", "VARCHAR",
    "ALL", "ANY", "SOME", "EXISTS", "UNION", "FILTER", "OVER", "PARTITION", "ROWS", "NULLS",
    "FIRST", "LAST", "WITH", "CURRENT_DATE",
];

/// Keywords that end a FROM/JOIN table reference (so they are not aliases).
const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "ON", "USING",
    "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING", "UNION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Number,
    Str,
    QuotedIdent,
    Space,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: Kind,
    text: &'a str,
}

impl Token<'_> {
    fn is_word(&self, upper: &str) -> bool {
        self.kind == Kind::Word && self.text.eq_ignore_ascii_case(upper)
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == Kind::Punct && self.text.starts_with(c)
    }
}

fn lex(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            Kind::Word
        } else if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            Kind::Number
        } else if c == b'\'' || c == b'"' {
            i += 1;
            while i < bytes.len() {
                if bytes[i] == c {
                    // Doubled quote is an escaped quote.
                    if bytes.get(i + 1) == Some(&c) {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            if c == b'\'' { Kind::Str } else { Kind::QuotedIdent }
        } else if c.is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            Kind::Space
        } else {
            i += sql[i..].chars().next().map_or(1, char::len_utf8);
            Kind::Punct
        };
        tokens.push(Token {
            kind,
            text: &sql[start..i],
        });
    }
    tokens
}

/// Strip code fences, surrounding whitespace and trailing separators.
pub fn sanitize(text: &str) -> String {
    let mut body = text.trim();
    if let Some(start) = body.find("```") {
        let after = &body[start + 3..];
        let after = after
            .strip_prefix("sql")
            .or_else(|| after.strip_prefix("SQL"))
            .unwrap_or(after);
        body = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
    }
    body.trim().trim_end_matches([';', ' ', '\n', '\t', '\r']).trim().to_string()
}

#[derive(Debug, Clone, PartialEq)]
struct TableRef {
    name: String,
    alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SafetyValidator {
    dictionary: SchemaDictionary,
    max_rows: u32,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self::new(SchemaDictionary::builtin(), MAX_LIMIT)
    }
}

impl SafetyValidator {
    pub fn new(dictionary: SchemaDictionary, max_rows: u32) -> Self {
        Self {
            dictionary,
            max_rows,
        }
    }

    pub fn dictionary(&self) -> &SchemaDictionary {
        &self.dictionary
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Validate and normalize `text`, returning the query to hand on.
    pub fn validate(&self, text: &str) -> SafetyResult<String> {
        let result = self.check(text);
        if let Err(e) = &result {
            warn!(error = %e, "query rejected by safety validator");
        }
        result
    }

    fn check(&self, text: &str) -> SafetyResult<String> {
        let sql = sanitize(text);
        if sql.is_empty() {
            return Err(SafetyError::Empty);
        }
        let tokens = lex(&sql);
        // Indices of non-whitespace tokens.
        let sig: Vec<usize> = (0..tokens.len())
            .filter(|&i| tokens[i].kind != Kind::Space)
            .collect();

        let first = &tokens[sig[0]];
        if !first.is_word("SELECT") {
            return Err(SafetyError::NotSelect(first.text.to_string()));
        }

        for (pos, &i) in sig.iter().enumerate() {
            let token = &tokens[i];
            if token.is_punct(';') {
                return Err(SafetyError::MultipleStatements);
            }
            let next = sig.get(pos + 1).map(|&j| &tokens[j]);
            let adjacent = i + 1 < tokens.len() && sig.get(pos + 1) == Some(&(i + 1));
            if adjacent
                && ((token.is_punct('-') && next.is_some_and(|n| n.is_punct('-')))
                    || (token.is_punct('/') && next.is_some_and(|n| n.is_punct('*'))))
            {
                return Err(SafetyError::Comment);
            }
            if token.kind == Kind::Word {
                let upper = token.text.to_ascii_uppercase();
                if DENYLIST.contains(&upper.as_str()) {
                    return Err(SafetyError::ForbiddenKeyword(upper));
                }
                if upper == "CROSS" && next.is_some_and(|n| n.is_word("JOIN")) {
                    return Err(SafetyError::CrossProduct("CROSS JOIN".into()));
                }
            }
        }

        let (tables, comma_join) = referenced_tables(&tokens, &sig);
        let has_where = sig.iter().any(|&i| tokens[i].is_word("WHERE"));
        if comma_join && !has_where {
            return Err(SafetyError::CrossProduct(
                "comma-separated tables without WHERE".into(),
            ));
        }
        let joins = sig.iter().filter(|&&i| tokens[i].is_word("JOIN")).count();
        let conditions = sig
            .iter()
            .filter(|&&i| tokens[i].is_word("ON") || tokens[i].is_word("USING"))
            .count();
        if joins > conditions {
            return Err(SafetyError::UnboundedJoin);
        }

        let mut replacements: HashMap<usize, String> = HashMap::new();
        if tables.len() > 1 && tables.iter().all(|t| t.alias.is_none()) {
            self.qualify_columns(&tokens, &sig, &tables, &mut replacements)?;
        }

        let limit_seen = self.enforce_limit(&tokens, &sig, &mut replacements);

        let mut out = String::with_capacity(sql.len() + 16);
        for (i, token) in tokens.iter().enumerate() {
            match replacements.get(&i) {
                Some(replacement) => out.push_str(replacement),
                None => out.push_str(token.text),
            }
        }
        if !limit_seen {
            out.push_str(&format!(" LIMIT {}", self.max_rows));
        }
        Ok(out)
    }

    /// Qualify columns that exist in several joined tables; reject columns
    /// found in none.
    fn qualify_columns(
        &self,
        tokens: &[Token<'_>],
        sig: &[usize],
        tables: &[TableRef],
        replacements: &mut HashMap<usize, String>,
    ) -> SafetyResult<()> {
        let mut schemas = Vec::with_capacity(tables.len());
        for table in tables {
            let schema = self
                .dictionary
                .table(&table.name)
                .ok_or_else(|| SafetyError::UnknownTable(table.name.clone()))?;
            schemas.push(schema);
        }

        let output_aliases: Vec<&str> = sig
            .windows(2)
            .filter(|w| tokens[w[0]].is_word("AS") && tokens[w[1]].kind == Kind::Word)
            .map(|w| tokens[w[1]].text)
            .collect();

        for (pos, &i) in sig.iter().enumerate() {
            let token = &tokens[i];
            if token.kind != Kind::Word {
                continue;
            }
            let upper = token.text.to_ascii_uppercase();
            if KEYWORDS.contains(&upper.as_str()) {
                continue;
            }
            let prev = pos.checked_sub(1).and_then(|p| sig.get(p)).map(|&j| &tokens[j]);
            let next = sig.get(pos + 1).map(|&j| &tokens[j]);
            let is_function = next.is_some_and(|n| n.is_punct('('));
            let is_qualified_part =
                prev.is_some_and(|p| p.is_punct('.')) || next.is_some_and(|n| n.is_punct('.'));
            let is_table = tables.iter().any(|t| t.name.eq_ignore_ascii_case(token.text));
            let is_alias = output_aliases
                .iter()
                .any(|a| a.eq_ignore_ascii_case(token.text));
            let is_cast_type = prev.is_some_and(|p| p.is_punct(':'));
            let is_date_literal =
                upper == "DATE" && next.is_some_and(|n| n.kind == Kind::Str);
            if is_function
                || is_qualified_part
                || is_table
                || is_alias
                || is_cast_type
                || is_date_literal
            {
                continue;
            }

            let owners: Vec<&str> = schemas
                .iter()
                .filter(|s| s.has_column(token.text))
                .map(|s| s.name.as_str())
                .collect();
            match owners.as_slice() {
                [] => return Err(SafetyError::UnknownColumn(token.text.to_string())),
                [_] => {}
                [first, ..] => {
                    replacements.insert(i, format!("{first}.{}", token.text));
                }
            }
        }
        Ok(())
    }

    /// Clamp an outer LIMIT above the ceiling. Returns whether one exists.
    fn enforce_limit(
        &self,
        tokens: &[Token<'_>],
        sig: &[usize],
        replacements: &mut HashMap<usize, String>,
    ) -> bool {
        let mut depth = 0i32;
        let mut seen = false;
        for (pos, &i) in sig.iter().enumerate() {
            let token = &tokens[i];
            if token.is_punct('(') {
                depth += 1;
            } else if token.is_punct(')') {
                depth -= 1;
            } else if depth == 0 && token.is_word("LIMIT") {
                seen = true;
                if let Some(&j) = sig.get(pos + 1)
                    && tokens[j].kind == Kind::Number
                {
                    let value = tokens[j].text.parse::<u64>().unwrap_or(u64::MAX);
                    if value > u64::from(self.max_rows) {
                        replacements.insert(j, self.max_rows.to_string());
                    }
                }
            }
        }
        seen
    }
}

/// Tables named after FROM/JOIN at the outer level, and whether any FROM
/// list uses commas.
fn referenced_tables(tokens: &[Token<'_>], sig: &[usize]) -> (Vec<TableRef>, bool) {
    let word_at = |pos: usize| sig.get(pos).map(|&i| tokens[i]).filter(|t| t.kind == Kind::Word);
    let is_clause = |t: &Token<'_>| CLAUSE_KEYWORDS.iter().any(|k| t.is_word(k));

    // Parses `name [AS] [alias]` at `pos`, returning the ref and next position.
    let parse_ref = |pos: usize| -> Option<(TableRef, usize)> {
        let name = word_at(pos).filter(|t| !is_clause(t))?;
        let mut next = pos + 1;
        let mut alias = None;
        if let Some(t) = word_at(next) {
            if t.is_word("AS") {
                alias = word_at(next + 1).map(|a| a.text.to_string());
                next += 2;
            } else if !is_clause(&t) {
                alias = Some(t.text.to_string());
                next += 1;
            }
        }
        Some((
            TableRef {
                name: name.text.to_string(),
                alias,
            },
            next,
        ))
    };

    let mut tables = Vec::new();
    let mut comma_join = false;
    let mut depth = 0i32;
    let mut pos = 0;
    while pos < sig.len() {
        let token = tokens[sig[pos]];
        if token.is_punct('(') {
            depth += 1;
        } else if token.is_punct(')') {
            depth -= 1;
        } else if depth == 0 && (token.is_word("FROM") || token.is_word("JOIN")) {
            let from = token.is_word("FROM");
            if let Some((table, mut next)) = parse_ref(pos + 1) {
                tables.push(table);
                while from
                    && sig.get(next).is_some_and(|&i| tokens[i].is_punct(','))
                    && let Some((table, after)) = parse_ref(next + 1)
                {
                    comma_join = true;
                    tables.push(table);
                    next = after;
                }
                pos = next;
                continue;
            }
        }
        pos += 1;
    }
    (tables, comma_join)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(sql: &str) -> SafetyResult<String> {
        SafetyValidator::default().validate(sql)
    }

    // ── sanitation ───────────────────────────────────────────────

    #[test]
    fn strips_fences_and_separators() {
        let out = validate("```sql\nSELECT date FROM production_summary LIMIT 5;\n```").unwrap();
        assert_eq!(out, "SELECT date FROM production_summary LIMIT 5");
    }

    #[test]
    fn appends_row_ceiling() {
        let out = validate("SELECT date, shift FROM production_summary").unwrap();
        assert_eq!(out, "SELECT date, shift FROM production_summary LIMIT 1000");
    }

    #[test]
    fn clamps_large_limit() {
        let out = validate("select * from trip_summary limit 50000").unwrap();
        assert_eq!(out, "select * from trip_summary limit 1000");
    }

    #[test]
    fn inner_limit_does_not_count() {
        let out = validate(
            "SELECT * FROM production_summary WHERE date IN (SELECT date FROM production_summary LIMIT 3)",
        )
        .unwrap();
        assert!(out.ends_with(") LIMIT 1000"));
    }

    // ── rejections ───────────────────────────────────────────────

    #[test]
    fn rejects_non_select() {
        assert_eq!(
            validate("WITH x AS (SELECT 1) SELECT * FROM x").unwrap_err(),
            SafetyError::NotSelect("WITH".into())
        );
        assert_eq!(validate("  ;  ").unwrap_err(), SafetyError::Empty);
    }

    #[test]
    fn rejects_mutating_keywords_in_any_case() {
        for sql in [
            "SELECT 1; DROP TABLE production_summary",
            "SELECT * FROM production_summary WHERE 1=1 OR delete",
            "select * into backup from trip_summary",
            "SELECT\n\tUpDaTe FROM x",
        ] {
            let err = validate(sql).unwrap_err();
            assert!(
                matches!(
                    err,
                    SafetyError::ForbiddenKeyword(_) | SafetyError::MultipleStatements
                ),
                "{sql}: {err:?}"
            );
        }
    }

    #[test]
    fn keywords_inside_literals_are_fine() {
        assert!(validate("SELECT * FROM trip_summary WHERE route_or_face = 'drop zone'").is_ok());
    }

    #[test]
    fn rejects_comments() {
        assert_eq!(
            validate("SELECT * FROM production_summary -- sneaky").unwrap_err(),
            SafetyError::Comment
        );
    }

    #[test]
    fn rejects_cross_products() {
        assert!(matches!(
            validate("SELECT * FROM production_summary CROSS JOIN trip_summary").unwrap_err(),
            SafetyError::CrossProduct(_)
        ));
        assert!(matches!(
            validate("SELECT * FROM production_summary, trip_summary").unwrap_err(),
            SafetyError::CrossProduct(_)
        ));
        assert_eq!(
            validate("SELECT * FROM production_summary JOIN trip_summary").unwrap_err(),
            SafetyError::UnboundedJoin
        );
    }

    // ── join qualification ───────────────────────────────────────

    #[test]
    fn qualifies_ambiguous_columns_without_aliases() {
        let out = validate(
            "SELECT date, shift, tipper_id FROM production_summary JOIN trip_summary \
             ON date = trip_date AND production_summary.shift = trip_summary.shift \
             WHERE shift = 'A'",
        )
        .unwrap();
        assert!(out.starts_with("SELECT date, production_summary.shift, tipper_id"));
        assert!(out.contains("WHERE production_summary.shift = 'A'"));
        assert!(out.contains("production_summary.shift = trip_summary.shift"));
    }

    #[test]
    fn unknown_column_in_join_is_rejected() {
        let err = validate(
            "SELECT fuel_litres FROM production_summary JOIN trip_summary ON date = trip_date",
        )
        .unwrap_err();
        assert_eq!(err, SafetyError::UnknownColumn("fuel_litres".into()));
    }

    #[test]
    fn date_literals_are_not_columns() {
        let out = validate(
            "SELECT tipper_id FROM production_summary JOIN trip_summary ON date = trip_date \
             WHERE trip_date = DATE '2025-01-05'",
        );
        assert!(out.is_ok(), "{out:?}");
    }

    #[test]
    fn aliased_joins_are_left_alone() {
        let sql = "SELECT p.date, t.tipper_id FROM production_summary p \
                   JOIN trip_summary t ON p.date = t.trip_date LIMIT 10";
        assert_eq!(validate(sql).unwrap(), sql);
    }
}
