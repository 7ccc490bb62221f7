//! Sensitive-column masking rules and their SQL rendering.

use eagerload_types::Dialect;

/// What replaces the hidden middle of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mask {
    /// One mask character per hidden character.
    Char(char),
    /// A fixed literal regardless of the hidden length.
    Literal(String),
}

/// Keeps `visible_start` leading and `visible_end` trailing characters and
/// masks the rest. Values no longer than `visible_start + visible_end` are
/// masked entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskingRule {
    pub visible_start: usize,
    pub visible_end: usize,
    pub mask: Mask,
}

impl Default for MaskingRule {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl MaskingRule {
    pub const DEFAULT_MASK: char = '*';

    pub fn new(visible_start: usize, visible_end: usize) -> Self {
        Self {
            visible_start,
            visible_end,
            mask: Mask::Char(Self::DEFAULT_MASK),
        }
    }

    pub fn with_char(mut self, mask: char) -> Self {
        self.mask = Mask::Char(mask);
        self
    }

    pub fn with_literal(mut self, literal: impl Into<String>) -> Self {
        self.mask = Mask::Literal(literal.into());
        self
    }

    fn visible(&self) -> usize {
        self.visible_start + self.visible_end
    }

    /// Applies the rule to an in-memory value; matches what [`Self::to_sql`] computes.
    ///
    /// ```
    /// use eagerload_core::metadata::MaskingRule;
    ///
    /// assert_eq!(MaskingRule::new(2, 2).apply("1234567890"), "12******90");
    /// assert_eq!(MaskingRule::new(2, 2).apply("123"), "***");
    /// ```
    pub fn apply(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len();
        if len <= self.visible() {
            return match &self.mask {
                Mask::Char(c) => c.to_string().repeat(len),
                Mask::Literal(lit) => lit.clone(),
            };
        }
        let mut out: String = chars[..self.visible_start].iter().collect();
        match &self.mask {
            Mask::Char(c) => out.extend(core::iter::repeat_n(*c, len - self.visible())),
            Mask::Literal(lit) => out.push_str(lit),
        }
        out.extend(&chars[len - self.visible_end..]);
        out
    }

    /// Wraps a column expression so the engine returns the masked value.
    pub fn to_sql(&self, expr: &str, dialect: Dialect) -> String {
        let (start, end, visible) = (self.visible_start, self.visible_end, self.visible());
        let len = match dialect {
            Dialect::MySQL => format!("CHAR_LENGTH({expr})"),
            Dialect::SQLite => format!("LENGTH({expr})"),
            Dialect::PostgreSQL => format!("LENGTH(CAST({expr} AS TEXT))"),
        };
        let fill = |count: &str| match &self.mask {
            Mask::Char(c) => repeat_char(*c, count, dialect),
            Mask::Literal(lit) => quote(lit),
        };
        let head_tail = |middle: String| match dialect {
            Dialect::SQLite => format!(
                "SUBSTR({expr}, 1, {start}) || {middle} || SUBSTR({expr}, {len} - {end} + 1)"
            ),
            Dialect::PostgreSQL => format!(
                "LEFT(CAST({expr} AS TEXT), {start}) || {middle} || RIGHT(CAST({expr} AS TEXT), {end})"
            ),
            Dialect::MySQL => format!("CONCAT(LEFT({expr}, {start}), {middle}, RIGHT({expr}, {end}))"),
        };
        format!(
            "CASE WHEN {expr} IS NULL THEN NULL WHEN {len} <= {visible} THEN {short} ELSE {long} END",
            short = fill(&len),
            long = head_tail(fill(&format!("{len} - {visible}"))),
        )
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn repeat_char(c: char, count: &str, dialect: Dialect) -> String {
    match dialect {
        // SQLite has no REPEAT; expand a zero blob's hex digits instead.
        Dialect::SQLite => format!("REPLACE(HEX(ZEROBLOB({count})), '00', {})", quote(&c.to_string())),
        Dialect::PostgreSQL | Dialect::MySQL => format!("REPEAT({}, {count})", quote(&c.to_string())),
    }
}
