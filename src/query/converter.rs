// ============================================================================
// Expression Converter
// ============================================================================
//
// Turns a caller-side [`Predicate`] into a storage-side [`Filter`]:
//
//   * field names          -> external (stored) names
//   * literal arithmetic   -> folded to one value
//   * `value op field`     -> `field op' value`
//   * `field == null`      -> NotExists(field), `!= null` -> Exists(field)
//   * constant comparisons -> Filter::Constant
//
// Anything a backend could not translate (arithmetic over fields, field to
// field comparisons, ordering against null, substring tests on non-text
// fields) is rejected here, when the predicate is added to a query, never at
// execution time.
//
// ============================================================================

use std::marker::PhantomData;

use super::ast::{ArithmeticOp, Operand, Predicate};
use super::{CompareOp, Filter};
use crate::core::{DataError, Result, Value, ValueKind};
use crate::item::{FieldDescriptor, Item};

/// An operand after folding: either a resolved field or a literal.
enum Folded {
    Field(&'static FieldDescriptor),
    Value(Value),
}

pub struct ExpressionConverter<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T: Item> ExpressionConverter<T> {
    pub fn new() -> Self {
        Self { _item: PhantomData }
    }

    /// Resolves a Rust field name of `T` (base or domain).
    pub fn resolve_field(&self, name: &str) -> Result<&'static FieldDescriptor> {
        T::descriptor(name).ok_or_else(|| DataError::FieldNotFound(name.to_string(), T::TYPE_NAME))
    }

    pub fn convert(&self, predicate: &Predicate) -> Result<Filter> {
        match predicate {
            Predicate::Compare { left, op, right } => {
                self.convert_compare(self.fold(left)?, *op, self.fold(right)?)
            }
            Predicate::Contains { operand, pattern } => {
                self.convert_text_test(operand, pattern, "contains", |attribute, value| {
                    Filter::Contains { attribute, value }
                })
            }
            Predicate::StartsWith { operand, prefix } => {
                self.convert_text_test(operand, prefix, "starts_with", |attribute, prefix| {
                    Filter::BeginsWith { attribute, prefix }
                })
            }
            Predicate::In { operand, values } => self.convert_in(operand, values),
            Predicate::IsNull(operand) => match self.fold(operand)? {
                Folded::Field(field) => Ok(Filter::NotExists(field.external_name.to_string())),
                Folded::Value(value) => Ok(Filter::Constant(value.is_null())),
            },
            Predicate::IsNotNull(operand) => match self.fold(operand)? {
                Folded::Field(field) => Ok(Filter::Exists(field.external_name.to_string())),
                Folded::Value(value) => Ok(Filter::Constant(!value.is_null())),
            },
            Predicate::And(left, right) => {
                let left = self.convert(left)?;
                let right = self.convert(right)?;
                Ok(match (left, right) {
                    (Filter::Constant(false), _) | (_, Filter::Constant(false)) => {
                        Filter::Constant(false)
                    }
                    (Filter::Constant(true), other) | (other, Filter::Constant(true)) => other,
                    (left, right) => left.and(right),
                })
            }
            Predicate::Or(left, right) => {
                let left = self.convert(left)?;
                let right = self.convert(right)?;
                Ok(match (left, right) {
                    (Filter::Constant(true), _) | (_, Filter::Constant(true)) => {
                        Filter::Constant(true)
                    }
                    (Filter::Constant(false), other) | (other, Filter::Constant(false)) => other,
                    (Filter::Or(mut operands), Filter::Or(more)) => {
                        operands.extend(more);
                        Filter::Or(operands)
                    }
                    (Filter::Or(mut operands), single) => {
                        operands.push(single);
                        Filter::Or(operands)
                    }
                    (single, Filter::Or(more)) => {
                        let mut operands = vec![single];
                        operands.extend(more);
                        Filter::Or(operands)
                    }
                    (left, right) => Filter::Or(vec![left, right]),
                })
            }
            Predicate::Not(inner) => Ok(match self.convert(inner)? {
                Filter::Constant(value) => Filter::Constant(!value),
                Filter::Not(inner) => *inner,
                other => Filter::Not(Box::new(other)),
            }),
        }
    }

    fn fold(&self, operand: &Operand) -> Result<Folded> {
        match operand {
            Operand::Field(name) => self.resolve_field(name).map(Folded::Field),
            Operand::Value(value) => Ok(Folded::Value(value.clone())),
            Operand::Binary { left, op, right } => {
                match (self.fold(left)?, self.fold(right)?) {
                    (Folded::Value(left), Folded::Value(right)) => {
                        apply_arithmetic(left, *op, right).map(Folded::Value)
                    }
                    (Folded::Field(field), _) | (_, Folded::Field(field)) => {
                        Err(DataError::UnsupportedExpression(format!(
                            "arithmetic over field '{}' cannot be translated",
                            field.name
                        )))
                    }
                }
            }
        }
    }

    fn convert_compare(&self, left: Folded, op: CompareOp, right: Folded) -> Result<Filter> {
        match (left, right) {
            (Folded::Field(left), Folded::Field(right)) => Err(DataError::UnsupportedExpression(
                format!("comparison between fields '{}' and '{}'", left.name, right.name),
            )),
            (Folded::Value(left), Folded::Value(right)) => compare_constants(&left, op, &right),
            (Folded::Value(value), Folded::Field(field)) => {
                self.field_compare(field, op.flip(), value)
            }
            (Folded::Field(field), Folded::Value(value)) => self.field_compare(field, op, value),
        }
    }

    fn field_compare(
        &self,
        field: &'static FieldDescriptor,
        op: CompareOp,
        value: Value,
    ) -> Result<Filter> {
        let attribute = field.external_name.to_string();

        if value.is_null() {
            return match op {
                CompareOp::Eq => Ok(Filter::NotExists(attribute)),
                CompareOp::Ne => Ok(Filter::Exists(attribute)),
                _ => Err(DataError::UnsupportedExpression(format!(
                    "ordering comparison of '{}' against null",
                    field.name
                ))),
            };
        }

        check_kind(field, &value)?;
        if op.is_ordering() && !field.kind.is_ordered() {
            return Err(DataError::UnsupportedExpression(format!(
                "ordering comparison on {} field '{}'",
                field.kind, field.name
            )));
        }

        Ok(Filter::Compare {
            attribute,
            op,
            value,
        })
    }

    fn convert_text_test(
        &self,
        operand: &Operand,
        argument: &Operand,
        method: &str,
        build: impl FnOnce(String, String) -> Filter,
    ) -> Result<Filter> {
        let argument = match self.fold(argument)? {
            Folded::Value(Value::Text(text)) => text,
            Folded::Value(other) => {
                return Err(DataError::TypeMismatch(format!(
                    "{}() expects TEXT, got {}",
                    method,
                    other.type_name()
                )));
            }
            Folded::Field(field) => {
                return Err(DataError::UnsupportedExpression(format!(
                    "{}() with field '{}' as argument",
                    method, field.name
                )));
            }
        };

        match self.fold(operand)? {
            Folded::Field(field) if field.kind == ValueKind::Text => {
                Ok(build(field.external_name.to_string(), argument))
            }
            Folded::Field(field) => Err(DataError::UnsupportedExpression(format!(
                "{}() on {} field '{}'",
                method, field.kind, field.name
            ))),
            Folded::Value(Value::Text(text)) => Ok(Filter::Constant(match method {
                "contains" => text.contains(&argument),
                _ => text.starts_with(&argument),
            })),
            Folded::Value(other) => Err(DataError::TypeMismatch(format!(
                "{}() on {}",
                method,
                other.type_name()
            ))),
        }
    }

    fn convert_in(&self, operand: &Operand, values: &[Operand]) -> Result<Filter> {
        let mut literals = Vec::with_capacity(values.len());
        for value in values {
            match self.fold(value)? {
                Folded::Value(value) => literals.push(value),
                Folded::Field(field) => {
                    return Err(DataError::UnsupportedExpression(format!(
                        "field '{}' inside an IN list",
                        field.name
                    )));
                }
            }
        }

        match self.fold(operand)? {
            Folded::Field(field) => {
                if literals.is_empty() {
                    return Ok(Filter::Constant(false));
                }
                for literal in &literals {
                    check_kind(field, literal)?;
                }
                Ok(Filter::In {
                    attribute: field.external_name.to_string(),
                    values: literals,
                })
            }
            Folded::Value(value) => Ok(Filter::Constant(literals.contains(&value))),
        }
    }
}

impl<T: Item> Default for ExpressionConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_kind(field: &FieldDescriptor, value: &Value) -> Result<()> {
    if field.kind.is_compatible(value) {
        Ok(())
    } else {
        Err(DataError::TypeMismatch(format!(
            "field '{}' is {}, got {}",
            field.name,
            field.kind,
            value.type_name()
        )))
    }
}

fn compare_constants(left: &Value, op: CompareOp, right: &Value) -> Result<Filter> {
    if left.is_null() || right.is_null() {
        return match op {
            CompareOp::Eq => Ok(Filter::Constant(left.is_null() && right.is_null())),
            CompareOp::Ne => Ok(Filter::Constant(left.is_null() != right.is_null())),
            _ => Err(DataError::UnsupportedExpression(
                "ordering comparison against null".to_string(),
            )),
        };
    }
    Ok(Filter::Constant(op.matches(left.compare(right)?)))
}

fn apply_arithmetic(left: Value, op: ArithmeticOp, right: Value) -> Result<Value> {
    let overflow = || DataError::UnsupportedExpression(format!("integer overflow in {:?}", op));

    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => match op {
            ArithmeticOp::Add => a.checked_add(b).map(Value::Integer).ok_or_else(overflow),
            ArithmeticOp::Subtract => a.checked_sub(b).map(Value::Integer).ok_or_else(overflow),
            ArithmeticOp::Multiply => a.checked_mul(b).map(Value::Integer).ok_or_else(overflow),
            ArithmeticOp::Divide if b == 0 => Err(DataError::UnsupportedExpression(
                "division by zero".to_string(),
            )),
            ArithmeticOp::Divide => a.checked_div(b).map(Value::Integer).ok_or_else(overflow),
        },
        (Value::Text(a), Value::Text(b)) if op == ArithmeticOp::Add => {
            Ok(Value::Text(format!("{}{}", a, b)))
        }
        (left, right) if left.is_numeric() && right.is_numeric() => {
            let a = as_float(&left);
            let b = as_float(&right);
            Ok(Value::Float(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => a / b,
            }))
        }
        (left, right) => Err(DataError::TypeMismatch(format!(
            "cannot apply {:?} to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}
