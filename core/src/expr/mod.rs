//! Predicate and selector expressions.
//!
//! Filters and order selectors are supplied as explicit [`Expr`] values built
//! with [`col`], [`lit`], [`param`] and the combinator methods, so translation
//! never has to recover them from source text.
//!
//! ```
//! use eagerload_core::expr::{col, param};
//!
//! let open_big = col("Status")
//!     .eq("OPEN")
//!     .and(col("Total").gt(param("min_total", 100)))
//!     .and(col("Customer.Name").starts_with("A"));
//! assert_eq!(open_big.navigation_paths().len(), 1);
//! ```

mod builder;
mod path;

pub use builder::{IntoExpr, and, col, lit, not, or, param};
pub use path::PropertyPath;

use core::fmt;

use eagerload_types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub const fn as_sql(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Member-call vocabulary understood by the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Contains,
    StartsWith,
    EndsWith,
    ToLower,
    ToUpper,
    Length,
    /// Zero-based start, optional length.
    Substring,
    Trim,
    TrimStart,
    TrimEnd,
    Replace,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Abs,
    /// Optional digit count.
    Round,
    Ceiling,
    Floor,
}

impl Method {
    pub const fn name(&self) -> &'static str {
        match self {
            Method::Contains => "contains",
            Method::StartsWith => "starts_with",
            Method::EndsWith => "ends_with",
            Method::ToLower => "to_lower",
            Method::ToUpper => "to_upper",
            Method::Length => "length",
            Method::Substring => "substring",
            Method::Trim => "trim",
            Method::TrimStart => "trim_start",
            Method::TrimEnd => "trim_end",
            Method::Replace => "replace",
            Method::Year => "year",
            Method::Month => "month",
            Method::Day => "day",
            Method::Hour => "hour",
            Method::Minute => "minute",
            Method::Second => "second",
            Method::Abs => "abs",
            Method::Round => "round",
            Method::Ceiling => "ceiling",
            Method::Floor => "floor",
        }
    }

    /// Accepted argument counts (inclusive).
    pub const fn arity(&self) -> (usize, usize) {
        match self {
            Method::Contains | Method::StartsWith | Method::EndsWith => (1, 1),
            Method::Substring => (1, 2),
            Method::Replace => (2, 2),
            Method::Round => (0, 1),
            _ => (0, 0),
        }
    }
}

/// A predicate or selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `Status`, `Customer.Name`
    Property(PropertyPath),
    Constant(Value),
    /// A free variable, bound as a named parameter.
    Parameter { name: String, value: Value },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    MethodCall {
        method: Method,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Membership in a literal list.
    In { target: Box<Expr>, values: Vec<Value> },
    /// Some element of a collection navigation matches (or exists).
    Any {
        navigation: PropertyPath,
        predicate: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Navigation prefixes of every property this expression reads, in first-use
    /// order. Properties inside an `any` body are relative to the collection
    /// and are not reported.
    pub fn navigation_paths(&self) -> Vec<PropertyPath> {
        let mut out = Vec::new();
        self.collect_navigation_paths(&mut out);
        out
    }

    fn collect_navigation_paths(&self, out: &mut Vec<PropertyPath>) {
        match self {
            Expr::Property(path) => {
                if let Some(nav) = path.navigation() {
                    if !out.contains(&nav) {
                        out.push(nav);
                    }
                }
            }
            Expr::Constant(_) | Expr::Parameter { .. } | Expr::Any { .. } => {}
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                lhs.collect_navigation_paths(out);
                rhs.collect_navigation_paths(out);
            }
            Expr::Unary { operand, .. } => operand.collect_navigation_paths(out),
            Expr::MethodCall { target, args, .. } => {
                target.collect_navigation_paths(out);
                for arg in args {
                    arg.collect_navigation_paths(out);
                }
            }
            Expr::In { target, .. } => target.collect_navigation_paths(out),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Property(path) => write!(f, "{path}"),
            Expr::Constant(Value::Text(s)) => write!(f, "{s:?}"),
            Expr::Constant(v) => write!(f, "{v}"),
            Expr::Parameter { name, .. } => write!(f, "@{name}"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.as_sql()),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!({operand})"),
                UnaryOp::Negate => write!(f, "-({operand})"),
                UnaryOp::IsNull => write!(f, "({operand} is null)"),
                UnaryOp::IsNotNull => write!(f, "({operand} is not null)"),
            },
            Expr::MethodCall { method, target, args } => {
                write!(f, "{target}.{}(", method.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Logical { op, lhs, rhs } => {
                let op = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "({lhs} {op} {rhs})")
            }
            Expr::In { target, values } => {
                write!(f, "{target} in [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Expr::Any { navigation, predicate } => match predicate {
                Some(p) => write!(f, "{navigation}.any({p})"),
                None => write!(f, "{navigation}.any()"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_paths_are_deduplicated() {
        let expr = col("Customer.Name")
            .eq("x")
            .or(col("Customer.Country.Code").eq("NL"))
            .and(col("Customer.Name").is_not_null())
            .and(col("Lines").any(col("Qty").gt(3)));
        let paths: Vec<String> = expr.navigation_paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["Customer", "Customer.Country"]);
    }

    #[test]
    fn test_display_is_readable() {
        let expr = not(col("Name").contains(param("q", "ab")));
        assert_eq!(expr.to_string(), "!(Name.contains(@q))");
    }
}
