use std::cmp::Ordering;
use std::fmt;

use crate::core::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator with operands swapped: `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// Storage-level condition. Attributes are external (stored) names and every
/// value is a literal; a backend translates this directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        attribute: String,
        op: CompareOp,
        value: Value,
    },
    Exists(String),
    NotExists(String),
    Contains {
        attribute: String,
        value: String,
    },
    BeginsWith {
        attribute: String,
        prefix: String,
    },
    In {
        attribute: String,
        values: Vec<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// A condition that folded to a constant during conversion.
    Constant(bool),
}

impl Filter {
    pub fn compare(attribute: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    /// Conjunction that flattens nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        let mut operands = match self {
            Self::And(operands) => operands,
            single => vec![single],
        };
        match other {
            Self::And(more) => operands.extend(more),
            single => operands.push(single),
        }
        Self::And(operands)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => write!(f, "{} {} {}", attribute, op, value),
            Self::Exists(attribute) => write!(f, "attribute_exists({})", attribute),
            Self::NotExists(attribute) => write!(f, "attribute_not_exists({})", attribute),
            Self::Contains { attribute, value } => write!(f, "contains({}, '{}')", attribute, value),
            Self::BeginsWith { attribute, prefix } => {
                write!(f, "begins_with({}, '{}')", attribute, prefix)
            }
            Self::In { attribute, values } => {
                let listed = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{} IN ({})", attribute, listed)
            }
            Self::And(operands) => write_joined(f, operands, " AND "),
            Self::Or(operands) => write_joined(f, operands, " OR "),
            Self::Not(inner) => write!(f, "NOT ({})", inner),
            Self::Constant(value) => write!(f, "{}", value),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Filter], separator: &str) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        match operand {
            Filter::And(_) | Filter::Or(_) => write!(f, "({})", operand)?,
            _ => write!(f, "{}", operand)?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    Where(Filter),
    OrderBy { attribute: String, order: Order },
    Skip(usize),
    Take(usize),
}

/// Ordered pipeline of query operations, as recorded by a query command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    operations: Vec<QueryOperation>,
}

impl ItemQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> &[QueryOperation] {
        &self.operations
    }

    /// Appends a filter; directly consecutive filters merge into one `And`.
    pub fn push_where(&mut self, filter: Filter) {
        if let Some(QueryOperation::Where(previous)) = self.operations.last_mut() {
            let merged = std::mem::replace(previous, Filter::Constant(true)).and(filter);
            *previous = merged;
        } else {
            self.operations.push(QueryOperation::Where(filter));
        }
    }

    pub fn push_order_by(&mut self, attribute: impl Into<String>, order: Order) {
        self.operations.push(QueryOperation::OrderBy {
            attribute: attribute.into(),
            order,
        });
    }

    pub fn push_skip(&mut self, count: usize) {
        self.operations.push(QueryOperation::Skip(count));
    }

    pub fn push_take(&mut self, count: usize) {
        self.operations.push(QueryOperation::Take(count));
    }
}

impl fmt::Display for ItemQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, operation) in self.operations.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            match operation {
                QueryOperation::Where(filter) => write!(f, "WHERE {}", filter)?,
                QueryOperation::OrderBy { attribute, order } => match order {
                    Order::Ascending => write!(f, "ORDER BY {}", attribute)?,
                    Order::Descending => write!(f, "ORDER BY {} DESC", attribute)?,
                },
                QueryOperation::Skip(count) => write!(f, "SKIP {}", count)?,
                QueryOperation::Take(count) => write!(f, "TAKE {}", count)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_wheres_merge() {
        let mut query = ItemQuery::new();
        query.push_where(Filter::compare("typeName", CompareOp::Eq, "test-item"));
        query.push_where(Filter::compare("isDeleted", CompareOp::Eq, false));
        query.push_where(Filter::Exists("publicMessage".into()));

        assert_eq!(query.operations().len(), 1);
        match &query.operations()[0] {
            QueryOperation::Where(Filter::And(operands)) => assert_eq!(operands.len(), 3),
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_where_after_skip_stays_separate() {
        let mut query = ItemQuery::new();
        query.push_where(Filter::Constant(true));
        query.push_skip(2);
        query.push_where(Filter::Constant(false));
        assert_eq!(query.operations().len(), 3);
    }

    #[test]
    fn test_display() {
        let mut query = ItemQuery::new();
        query.push_where(
            Filter::compare("typeName", CompareOp::Eq, "test-item")
                .and(Filter::NotExists("_etag".into())),
        );
        query.push_order_by("messageCount", Order::Descending);
        query.push_take(5);

        assert_eq!(
            query.to_string(),
            "WHERE typeName = 'test-item' AND attribute_not_exists(_etag) | ORDER BY messageCount DESC | TAKE 5"
        );
    }

    #[test]
    fn test_flip() {
        assert_eq!(CompareOp::Lt.flip(), CompareOp::Gt);
        assert_eq!(CompareOp::Ge.flip(), CompareOp::Le);
        assert_eq!(CompareOp::Eq.flip(), CompareOp::Eq);
        assert!(CompareOp::Le.matches(Ordering::Equal));
    }
}
