//! SQL identifier validation.
//!
//! Table and column names are the only caller-supplied text that is ever
//! spliced into generated SQL, so they are parsed into an [`Ident`] first:
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts (`"CamelCase"`) allow anything but NUL; `""` escapes a quote
//! - Parts are joined with `.` (`public.author`)

use crate::error::{OrmError, OrmResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

/// A validated SQL identifier (column, table, or schema-qualified table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') if chars.peek().is_some() => {}
                    Some('.') => return Err(OrmError::validation("Trailing '.' in identifier")),
                    Some(c) => {
                        return Err(OrmError::validation(format!(
                            "Expected '.' between identifier parts in `{s}`, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            name.push('"');
                        }
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err(OrmError::validation("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(OrmError::validation("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(OrmError::validation(format!(
                        "Invalid character '{c}' in identifier `{s}`"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(OrmError::validation(format!(
                    "Empty identifier segment in `{s}`"
                )));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// Last segment, unquoted (`public.author` → `author`).
    pub fn base_name(&self) -> &str {
        match self.parts.last() {
            Some(IdentPart::Unquoted(s) | IdentPart::Quoted(s)) => s,
            None => "",
        }
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match part {
                IdentPart::Unquoted(s) => f.write_str(s)?,
                IdentPart::Quoted(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
            }
        }
        Ok(())
    }
}

/// Validate and render an identifier in one step.
pub(crate) fn quote(name: &str) -> OrmResult<String> {
    Ident::parse(name).map(|i| i.to_sql())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_simple_and_dotted() {
        assert_eq!(quote("author").unwrap(), "author");
        assert_eq!(quote("public.author").unwrap(), "public.author");
    }

    #[test]
    fn renders_quoted_with_escape() {
        assert_eq!(quote(r#""Author""#).unwrap(), r#""Author""#);
        assert_eq!(quote(r#""a""b""#).unwrap(), r#""a""b""#);
        assert_eq!(quote(r#"public."Author".id"#).unwrap(), r#"public."Author".id"#);
    }

    #[test]
    fn base_name_is_last_part() {
        assert_eq!(Ident::parse("public.author").unwrap().base_name(), "author");
        assert_eq!(Ident::parse(r#""Book""#).unwrap().base_name(), "Book");
    }

    #[test]
    fn rejects_injection_attempts() {
        for bad in [
            "",
            "1author",
            "author; DROP TABLE author",
            "a b",
            "a..b",
            "a.",
            r#""open"#,
            r#""""#,
        ] {
            let err = Ident::parse(bad).unwrap_err();
            assert!(err.is_validation(), "{bad}");
        }
    }
}
