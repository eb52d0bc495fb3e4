//! Row selection for table operations.

use crate::record::Params;

/// Which rows an update, delete or lookup applies to.
///
/// ```ignore
/// db.table("author").delete(5).await?;                         // id = 5
/// db.table("author").delete("name = 'Victor Hugo'").await?;    // raw predicate
/// db.table("author")
///     .update(row, Where::with_params("name = :old", params! { "old" => "V. Hugo" }))
///     .await?;
/// ```
///
/// An empty raw predicate selects every row.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// Primary key equals the given integer.
    ById(i64),
    /// A raw SQL predicate.
    Raw(String),
    /// A raw SQL predicate with `:name` placeholders and their values.
    RawWithParams(String, Params),
}

impl Where {
    pub fn raw(predicate: impl Into<String>) -> Self {
        Where::Raw(predicate.into())
    }

    pub fn with_params(predicate: impl Into<String>, params: Params) -> Self {
        Where::RawWithParams(predicate.into(), params)
    }

    /// `true` when no predicate applies.
    pub fn is_all(&self) -> bool {
        match self {
            Where::ById(_) => false,
            Where::Raw(s) | Where::RawWithParams(s, _) => s.trim().is_empty(),
        }
    }

    /// The predicate text, given the quoted primary key column.
    pub(crate) fn predicate(&self, primary_key: &str) -> Option<String> {
        match self {
            Where::ById(id) => Some(format!("{primary_key} = {id}")),
            Where::Raw(s) | Where::RawWithParams(s, _) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
        }
    }

    pub(crate) fn params(&self) -> Option<&Params> {
        match self {
            Where::RawWithParams(_, p) => Some(p),
            _ => None,
        }
    }
}

macro_rules! where_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Where {
                fn from(id: $ty) -> Self {
                    Where::ById(i64::from(id))
                }
            }
        )*
    };
}

where_from_int!(i16, i32, i64, u32);

impl From<&str> for Where {
    fn from(s: &str) -> Self {
        Where::Raw(s.to_string())
    }
}

impl From<String> for Where {
    fn from(s: String) -> Self {
        Where::Raw(s)
    }
}

impl From<(&str, Params)> for Where {
    fn from((s, p): (&str, Params)) -> Self {
        Where::RawWithParams(s.to_string(), p)
    }
}

/// Join predicates with AND, parenthesizing each when there is more than one.
pub(crate) fn and_all(predicates: &[String]) -> Option<String> {
    match predicates {
        [] => None,
        [only] => Some(only.clone()),
        many => Some(
            many.iter()
                .map(|p| format!("({p})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn integer_targets_primary_key() {
        let w = Where::from(5);
        assert_eq!(w.predicate("\"id\"").as_deref(), Some("\"id\" = 5"));
        assert!(!w.is_all());
    }

    #[test]
    fn empty_raw_selects_everything() {
        let w = Where::from("  ");
        assert!(w.is_all());
        assert_eq!(w.predicate("id"), None);
    }

    #[test]
    fn params_travel_with_predicate() {
        let w = Where::from(("name = :name", params! { "name" => "X" }));
        assert_eq!(w.predicate("id").as_deref(), Some("name = :name"));
        assert_eq!(w.params().unwrap().len(), 1);
    }

    #[test]
    fn and_all_parenthesizes_multiple() {
        assert_eq!(and_all(&[]), None);
        assert_eq!(and_all(&["a = 1".into()]).as_deref(), Some("a = 1"));
        assert_eq!(
            and_all(&["deleted = 'NO'".into(), "a = 1 OR b = 2".into()]).as_deref(),
            Some("(deleted = 'NO') AND (a = 1 OR b = 2)")
        );
    }
}
