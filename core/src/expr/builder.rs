//! Typed builder API for [`Expr`].

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use eagerload_types::Value;

use super::{BinaryOp, Expr, LogicalOp, Method, PropertyPath, UnaryOp};

/// Conversion into an expression operand. Plain values become constants.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    #[inline]
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for Value {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Constant(self)
    }
}

macro_rules! impl_into_expr_constant {
    ($($ty:ty),*) => { $(
        impl IntoExpr for $ty {
            #[inline]
            fn into_expr(self) -> Expr {
                Expr::Constant(Value::from(self))
            }
        }
    )* }
}

impl_into_expr_constant!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    bool,
    &str,
    String,
    NaiveDate,
    NaiveDateTime,
    NaiveTime
);

impl<T: Into<Value>> IntoExpr for Option<T> {
    #[inline]
    fn into_expr(self) -> Expr {
        Expr::Constant(self.map_or(Value::Null, Into::into))
    }
}

/// A property of the queried entity, optionally navigation-qualified.
pub fn col(path: &str) -> Expr {
    Expr::Property(PropertyPath::parse(path))
}

/// An inline literal.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// A free variable bound as a named parameter.
pub fn param(name: impl Into<String>, value: impl Into<Value>) -> Expr {
    Expr::Parameter {
        name: name.into(),
        value: value.into(),
    }
}

pub fn and(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    logical(LogicalOp::And, lhs.into_expr(), rhs.into_expr())
}

pub fn or(lhs: impl IntoExpr, rhs: impl IntoExpr) -> Expr {
    logical(LogicalOp::Or, lhs.into_expr(), rhs.into_expr())
}

pub fn not(operand: impl IntoExpr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand.into_expr()),
    }
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Logical {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

macro_rules! binary_methods {
    ($($(#[$doc:meta])* $name:ident => $op:ident),* $(,)?) => { $(
        $(#[$doc])*
        pub fn $name(self, rhs: impl IntoExpr) -> Expr {
            Expr::Binary {
                op: BinaryOp::$op,
                lhs: Box::new(self),
                rhs: Box::new(rhs.into_expr()),
            }
        }
    )* }
}

macro_rules! nullary_methods {
    ($($name:ident => $method:ident),* $(,)?) => { $(
        pub fn $name(self) -> Expr {
            self.call(Method::$method, Vec::new())
        }
    )* }
}

impl Expr {
    binary_methods! {
        eq => Eq,
        ne => Ne,
        lt => Lt,
        le => Le,
        gt => Gt,
        ge => Ge,
        add => Add,
        sub => Sub,
        mul => Mul,
        div => Div,
        /// Remainder (`%`).
        rem => Mod,
    }

    nullary_methods! {
        to_lower => ToLower,
        to_upper => ToUpper,
        length => Length,
        trim => Trim,
        trim_start => TrimStart,
        trim_end => TrimEnd,
        year => Year,
        month => Month,
        day => Day,
        hour => Hour,
        minute => Minute,
        second => Second,
        abs => Abs,
        ceiling => Ceiling,
        floor => Floor,
    }

    pub fn and(self, rhs: impl IntoExpr) -> Expr {
        logical(LogicalOp::And, self, rhs.into_expr())
    }

    pub fn or(self, rhs: impl IntoExpr) -> Expr {
        logical(LogicalOp::Or, self, rhs.into_expr())
    }

    pub fn negate(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::IsNull,
            operand: Box::new(self),
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::IsNotNull,
            operand: Box::new(self),
        }
    }

    pub fn contains(self, needle: impl IntoExpr) -> Expr {
        self.call(Method::Contains, vec![needle.into_expr()])
    }

    pub fn starts_with(self, prefix: impl IntoExpr) -> Expr {
        self.call(Method::StartsWith, vec![prefix.into_expr()])
    }

    pub fn ends_with(self, suffix: impl IntoExpr) -> Expr {
        self.call(Method::EndsWith, vec![suffix.into_expr()])
    }

    /// Zero-based `start`; runs to the end of the string without `len`.
    pub fn substring(self, start: impl IntoExpr, len: Option<i64>) -> Expr {
        let mut args = vec![start.into_expr()];
        if let Some(len) = len {
            args.push(Expr::Constant(Value::Integer(len)));
        }
        self.call(Method::Substring, args)
    }

    pub fn replace(self, from: impl IntoExpr, to: impl IntoExpr) -> Expr {
        self.call(Method::Replace, vec![from.into_expr(), to.into_expr()])
    }

    pub fn round(self, digits: Option<i64>) -> Expr {
        let args = digits
            .map(|d| vec![Expr::Constant(Value::Integer(d))])
            .unwrap_or_default();
        self.call(Method::Round, args)
    }

    pub fn in_list<I, V>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Expr::In {
            target: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Some element of this collection navigation satisfies `predicate`, whose
    /// properties are relative to the collection's entity.
    pub fn any(self, predicate: impl IntoExpr) -> Expr {
        self.any_with(Some(predicate.into_expr()))
    }

    /// The collection navigation has at least one element.
    pub fn exists(self) -> Expr {
        self.any_with(None)
    }

    fn any_with(self, predicate: Option<Expr>) -> Expr {
        let navigation = match self {
            Expr::Property(path) => path,
            other => PropertyPath::parse(&other.to_string()),
        };
        Expr::Any {
            navigation,
            predicate: predicate.map(Box::new),
        }
    }

    fn call(self, method: Method, args: Vec<Expr>) -> Expr {
        Expr::MethodCall {
            method,
            target: Box::new(self),
            args,
        }
    }
}
