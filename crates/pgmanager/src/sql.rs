//! Named-placeholder compilation and light SQL text helpers.
//!
//! Callers write `:name` placeholders and pass a [`Params`] map; PostgreSQL wants
//! `$1, $2, ...`. [`compile`] rewrites one into the other:
//!
//! ```ignore
//! let c = compile("SELECT * FROM author WHERE name = :name AND id > :id", &params)?;
//! assert_eq!(c.sql, "SELECT * FROM author WHERE name = $1 AND id > $2");
//! ```
//!
//! String literals, quoted identifiers, comments, dollar-quoted bodies and `::`
//! casts are left alone. A name used twice maps to the same `$n`.

use crate::error::{OrmError, OrmResult};
use crate::record::Params;
use crate::value::Value;

/// SQL ready for the driver: positional placeholders plus values in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Bind keys that are bound as integers when they hold numeric text.
pub(crate) fn is_integer_key(name: &str) -> bool {
    name == "id" || name.ends_with("_id")
}

fn param_key(key: &str) -> &str {
    key.strip_prefix(':').unwrap_or(key)
}

fn lookup<'a>(params: &'a Params, name: &str) -> Option<&'a Value> {
    params
        .iter()
        .find(|(k, _)| param_key(k) == name)
        .map(|(_, v)| v)
}

/// If `bytes[i]` opens a literal, quoted identifier, comment or dollar-quoted
/// body, return the index just past its end.
fn skip_non_code(bytes: &[u8], i: usize) -> Option<usize> {
    let len = bytes.len();
    match bytes[i] {
        q @ (b'\'' | b'"') => {
            // E'...' strings take backslash escapes.
            let escapes = q == b'\''
                && i > 0
                && matches!(bytes[i - 1], b'e' | b'E')
                && (i == 1 || !is_name_char(bytes[i - 2]));
            let mut j = i + 1;
            while j < len {
                if escapes && bytes[j] == b'\\' {
                    j += 2;
                    continue;
                }
                if bytes[j] == q {
                    if j + 1 < len && bytes[j + 1] == q {
                        j += 2;
                        continue;
                    }
                    return Some(j + 1);
                }
                j += 1;
            }
            Some(len)
        }
        b'-' if bytes.get(i + 1) == Some(&b'-') => {
            let end = bytes[i..].iter().position(|&b| b == b'\n').map_or(len, |p| i + p + 1);
            Some(end)
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let end = bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(len, |p| i + 2 + p + 2);
            Some(end)
        }
        b'$' => {
            // $tag$ ... $tag$ (tag may be empty); `$1` is a positional placeholder.
            let mut j = i + 1;
            while j < len && (bytes[j] == b'_' || bytes[j].is_ascii_alphabetic()) {
                j += 1;
            }
            if j < len && bytes[j] == b'$' {
                let tag = &bytes[i..=j];
                let body = j + 1;
                let end = bytes[body..]
                    .windows(tag.len())
                    .position(|w| w == tag)
                    .map_or(len, |p| body + p + tag.len());
                return Some(end);
            }
            None
        }
        _ => None,
    }
}

fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_name_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Rewrite `:name` placeholders to `$n` and collect the bound values in order.
pub fn compile(sql: &str, params: &Params) -> OrmResult<CompiledSql> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<&str> = Vec::new();
    let mut values = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(bytes, i) {
            i = end;
            continue;
        }
        if bytes[i] != b':' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b':') {
            i += 2;
            continue;
        }
        if !bytes.get(i + 1).copied().is_some_and(is_name_start) {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && is_name_char(bytes[end]) {
            end += 1;
        }
        let name = &sql[start..end];

        let idx = match names.iter().position(|n| *n == name) {
            Some(pos) => pos + 1,
            None => {
                let value = lookup(params, name).cloned().ok_or_else(|| {
                    OrmError::validation(format!("No value bound for placeholder :{name}"))
                })?;
                let value = if is_integer_key(name) {
                    value.into_integer_hint()
                } else {
                    value
                };
                names.push(name);
                values.push(value);
                names.len()
            }
        };

        out.push_str(&sql[copied..i]);
        out.push('$');
        out.push_str(&idx.to_string());
        copied = end;
        i = end;
    }
    out.push_str(&sql[copied..]);

    Ok(CompiledSql { sql: out, values })
}

/// Render parameters for diagnostics: `name='x', id=5`.
pub fn render_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", param_key(k), v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip leading whitespace, SQL comments and parentheses to find the first keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            match s.find('\n') {
                Some(pos) => {
                    s = &s[pos + 1..];
                    continue;
                }
                None => return "",
            }
        }
        if s.starts_with("/*") {
            match s.find("*/") {
                Some(pos) => {
                    s = &s[pos + 2..];
                    continue;
                }
                None => return "",
            }
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(keyword)
                && !s[keyword.len()..].bytes().next().is_some_and(is_name_char)
        }
        None => false,
    }
}

/// Byte offset of the last top-level clause spelled by `words` (outside
/// parentheses, literals and comments), if any.
fn find_top_level_clause(sql: &str, words: &[&str]) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth: i32 = 0;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        if let Some(end) = skip_non_code(bytes, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b if depth == 0 && b.is_ascii_alphabetic() => {
                let word_start = i == 0 || !is_name_char(bytes[i - 1]);
                if word_start && clause_at(&sql[i..], words) {
                    found = Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    found
}

/// `s` starts with `words`, separated by whitespace.
fn clause_at(s: &str, words: &[&str]) -> bool {
    let mut rest = s;
    for (n, word) in words.iter().enumerate() {
        if n > 0 {
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                return false;
            }
            rest = trimmed;
        }
        if !starts_with_keyword(rest, word) {
            return false;
        }
        rest = &rest[word.len()..];
    }
    true
}

pub(crate) fn find_top_level_order_by(sql: &str) -> Option<usize> {
    find_top_level_clause(sql, &["ORDER", "BY"])
}

/// Whether the statement already bounds its rows with a top-level
/// `LIMIT`, `OFFSET` or `FETCH`.
pub(crate) fn has_top_level_limit(sql: &str) -> bool {
    [&["LIMIT"][..], &["OFFSET"], &["FETCH"]]
        .iter()
        .any(|words| find_top_level_clause(sql, words).is_some())
}

/// Drop a trailing top-level `ORDER BY ...` clause (used for COUNT subqueries).
pub(crate) fn strip_order_by(sql: &str) -> &str {
    match find_top_level_order_by(sql) {
        Some(pos) => sql[..pos].trim_end(),
        None => sql.trim_end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn compiles_placeholders_in_order() {
        let p = params! { "name" => "Zola", "age" => 3 };
        let c = compile("SELECT * FROM author WHERE name = :name AND age > :age", &p).unwrap();
        assert_eq!(c.sql, "SELECT * FROM author WHERE name = $1 AND age > $2");
        assert_eq!(c.values, vec![Value::from("Zola"), Value::Int(3)]);
    }

    #[test]
    fn repeated_names_share_one_slot() {
        let p = params! { "q" => "x" };
        let c = compile("SELECT 1 WHERE a = :q OR b = :q", &p).unwrap();
        assert_eq!(c.sql, "SELECT 1 WHERE a = $1 OR b = $1");
        assert_eq!(c.values.len(), 1);
    }

    #[test]
    fn accepts_colon_prefixed_keys() {
        let p = params! { ":continent" => "Asia" };
        let c = compile("SELECT * FROM country WHERE continent = :continent", &p).unwrap();
        assert_eq!(c.values, vec![Value::from("Asia")]);
    }

    #[test]
    fn leaves_literals_casts_and_comments_alone() {
        let p = params! { "id" => 1 };
        let sql = "SELECT ':nope', \"a:b\", x::text -- :c\n FROM t /* :d */ WHERE id = :id";
        let c = compile(sql, &p).unwrap();
        assert_eq!(
            c.sql,
            "SELECT ':nope', \"a:b\", x::text -- :c\n FROM t /* :d */ WHERE id = $1"
        );
    }

    #[test]
    fn leaves_dollar_quoted_bodies_alone() {
        let p = params! {};
        let c = compile("SELECT $$ :x $$, $fn$ :y $fn$", &p).unwrap();
        assert_eq!(c.sql, "SELECT $$ :x $$, $fn$ :y $fn$");
    }

    #[test]
    fn escape_strings_keep_backslash_quotes() {
        let p = params! { "y" => 1 };
        let c = compile(r"SELECT E'it\'s :x', e'\\', :y", &p).unwrap();
        assert_eq!(c.sql, r"SELECT E'it\'s :x', e'\\', $1");
        assert_eq!(c.values, vec![Value::Int(1)]);

        // Standard literals treat a backslash as an ordinary character.
        let c = compile(r"SELECT 'C:\', :y", &p).unwrap();
        assert_eq!(c.sql, r"SELECT 'C:\', $1");
    }

    #[test]
    fn missing_value_is_validation_error() {
        let err = compile("SELECT * FROM t WHERE a = :a", &params! {}).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn id_keys_bind_as_integers() {
        let p = params! { "id" => "12", "author_id" => "7", "name" => "42" };
        let c = compile("SELECT :id, :author_id, :name", &p).unwrap();
        assert_eq!(c.values, vec![Value::Int(12), Value::Int(7), Value::from("42")]);
    }

    #[test]
    fn renders_params_for_debug() {
        let p = params! { ":name" => "x", "id" => 5 };
        assert_eq!(render_params(&p), "name='x', id=5");
    }

    #[test]
    fn strips_top_level_order_by_only() {
        assert_eq!(
            strip_order_by("SELECT * FROM t WHERE a = 1\nORDER BY name DESC"),
            "SELECT * FROM t WHERE a = 1"
        );
        assert_eq!(
            strip_order_by("SELECT *, row_number() OVER (ORDER BY x) FROM t"),
            "SELECT *, row_number() OVER (ORDER BY x) FROM t"
        );
        assert_eq!(
            strip_order_by("SELECT 'ORDER BY' FROM t order   by 1"),
            "SELECT 'ORDER BY' FROM t"
        );
        assert_eq!(strip_order_by("SELECT border_by FROM t"), "SELECT border_by FROM t");
    }

    #[test]
    fn detects_top_level_row_limits() {
        assert!(has_top_level_limit("SELECT * FROM t ORDER BY a LIMIT 5"));
        assert!(has_top_level_limit("SELECT * FROM t\nOFFSET 10"));
        assert!(has_top_level_limit("SELECT * FROM t FETCH FIRST 3 ROWS ONLY"));
        assert!(!has_top_level_limit("SELECT * FROM (SELECT * FROM t LIMIT 5) s"));
        assert!(!has_top_level_limit("SELECT 'LIMIT 1', limits FROM t -- limit 2"));
    }

    #[test]
    fn keyword_detection_respects_word_boundaries() {
        assert!(starts_with_keyword("select 1", "SELECT"));
        assert!(!starts_with_keyword("selected", "SELECT"));
        assert_eq!(strip_sql_prefix("  -- c\n (SELECT 1)"), "SELECT 1)");
    }
}
