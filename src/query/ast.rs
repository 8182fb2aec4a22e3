// ============================================================================
// Predicate AST
// ============================================================================
//
// Callers write predicates against Rust field names:
//
//   field("message_count").gt(3).and(field("public_message").starts_with("x"))
//
// Operands are field references, literals, or arithmetic over operands.
// Nothing here knows about storage names or field kinds; the converter
// resolves both when the predicate is handed to a query.
//
// ============================================================================

use std::ops::{Add, Div, Mul, Sub};

use chrono::{DateTime, Utc};

use super::CompareOp;
use crate::core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Value(Value),
    Binary {
        left: Box<Operand>,
        op: ArithmeticOp,
        right: Box<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Contains {
        operand: Operand,
        pattern: Operand,
    },
    StartsWith {
        operand: Operand,
        prefix: Operand,
    },
    In {
        operand: Operand,
        values: Vec<Operand>,
    },
    IsNull(Operand),
    IsNotNull(Operand),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// Refers to an item field by its Rust name.
pub fn field(name: impl Into<String>) -> Operand {
    Operand::Field(name.into())
}

pub fn value(value: impl Into<Value>) -> Operand {
    Operand::Value(value.into())
}

impl Operand {
    fn compare(self, op: CompareOp, other: impl Into<Operand>) -> Predicate {
        Predicate::Compare {
            left: self,
            op,
            right: other.into(),
        }
    }

    pub fn eq(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Ge, other)
    }

    pub fn contains(self, pattern: impl Into<Operand>) -> Predicate {
        Predicate::Contains {
            operand: self,
            pattern: pattern.into(),
        }
    }

    pub fn starts_with(self, prefix: impl Into<Operand>) -> Predicate {
        Predicate::StartsWith {
            operand: self,
            prefix: prefix.into(),
        }
    }

    pub fn is_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        Predicate::In {
            operand: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(self)
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self)
    }

    fn binary(self, op: ArithmeticOp, right: Operand) -> Operand {
        Operand::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

macro_rules! impl_operand_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_operand_from!(i64, i32, f64, bool, String, &str, DateTime<Utc>);

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        Operand::Value(value.map_or(Value::Null, Into::into))
    }
}

macro_rules! impl_operand_arithmetic {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<R: Into<Operand>> $trait<R> for Operand {
                type Output = Operand;

                fn $method(self, right: R) -> Operand {
                    self.binary(ArithmeticOp::$op, right.into())
                }
            }
        )*
    };
}

impl_operand_arithmetic!(
    Add::add => Add,
    Sub::sub => Subtract,
    Mul::mul => Multiply,
    Div::div => Divide,
);
