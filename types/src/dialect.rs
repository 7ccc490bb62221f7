//! Unified database dialect enum
//!
//! Every piece of dialect-dependent rendering (identifier quoting, placeholder
//! syntax, boolean literals) asks this enum instead of matching on strings.

/// SQL dialect for database-specific behavior
///
/// # Examples
///
/// ```
/// use eagerload_types::Dialect;
///
/// let dialect = Dialect::PostgreSQL;
/// assert!(dialect.uses_numbered_placeholders());
/// assert_eq!(dialect.quote_ident("Order"), "\"Order\"");
///
/// let mysql = Dialect::MySQL;
/// assert_eq!(mysql.quote_ident("Order"), "`Order`");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// SQLite - uses `:name` named placeholders
    ///
    /// Compatible with: rusqlite, libsql, turso
    #[default]
    SQLite,

    /// PostgreSQL - uses `$1, $2, ...` numbered placeholders
    PostgreSQL,

    /// MySQL - uses `?` positional placeholders
    MySQL,
}

impl Dialect {
    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Returns `true` if parameters are bound by name rather than by position.
    #[inline]
    #[must_use]
    pub const fn uses_named_placeholders(&self) -> bool {
        matches!(self, Dialect::SQLite)
    }

    /// Parse a dialect from a string (case-insensitive)
    ///
    /// ```
    /// use eagerload_types::Dialect;
    ///
    /// assert_eq!(Dialect::parse("sqlite"), Some(Dialect::SQLite));
    /// assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
    /// assert_eq!(Dialect::parse("unknown"), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite")
            || s.eq_ignore_ascii_case("turso")
            || s.eq_ignore_ascii_case("libsql")
        {
            Some(Dialect::SQLite)
        } else if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else {
            None
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_ident(&self, name: &str) -> String {
        let quote = match self {
            Dialect::SQLite | Dialect::PostgreSQL => '"',
            Dialect::MySQL => '`',
        };
        let mut out = String::with_capacity(name.len() + 2);
        out.push(quote);
        for c in name.chars() {
            if c == quote {
                out.push(quote);
            }
            out.push(c);
        }
        out.push(quote);
        out
    }

    /// Renders the placeholder for a bound parameter.
    ///
    /// `index` is 1-based and only consulted by numbered dialects.
    #[must_use]
    pub fn placeholder(&self, name: &str, index: usize) -> String {
        match self {
            Dialect::SQLite => format!(":{name}"),
            Dialect::PostgreSQL => format!("${index}"),
            Dialect::MySQL => "?".to_string(),
        }
    }

    /// Boolean literal in the form the dialect compares against.
    #[must_use]
    pub const fn bool_literal(&self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::PostgreSQL, true) => "TRUE",
            (Dialect::PostgreSQL, false) => "FALSE",
            (_, true) => "1",
            (_, false) => "0",
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::parse(s).ok_or(DialectParseError)
    }
}

/// Error returned when parsing an unknown dialect string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect")]
pub struct DialectParseError;
