//! In-memory execution of an [`ItemQuery`].
//!
//! Stores without a native translator run queries through here. Semantics
//! follow what a document store would do with the same filter: a comparison
//! against a missing (null) attribute is false except for `<>`, and sorting
//! is stable with nulls after every value.

use std::cmp::Ordering;

use super::{CompareOp, Filter, ItemQuery, Order, QueryOperation};
use crate::core::{Result, Value};
use crate::item::Item;

pub fn matches<T: Item>(filter: &Filter, item: &T) -> Result<bool> {
    match filter {
        Filter::Compare {
            attribute,
            op,
            value,
        } => {
            let current = item.get_field_by_external_name(attribute)?;
            if current.is_null() || value.is_null() {
                return Ok(match op {
                    CompareOp::Eq => current.is_null() && value.is_null(),
                    CompareOp::Ne => current.is_null() != value.is_null(),
                    _ => false,
                });
            }
            Ok(op.matches(current.compare(value)?))
        }
        Filter::Exists(attribute) => Ok(!item.get_field_by_external_name(attribute)?.is_null()),
        Filter::NotExists(attribute) => Ok(item.get_field_by_external_name(attribute)?.is_null()),
        Filter::Contains { attribute, value } => Ok(text_of(item, attribute)?
            .is_some_and(|text| text.contains(value.as_str()))),
        Filter::BeginsWith { attribute, prefix } => Ok(text_of(item, attribute)?
            .is_some_and(|text| text.starts_with(prefix.as_str()))),
        Filter::In { attribute, values } => {
            let current = item.get_field_by_external_name(attribute)?;
            Ok(values.contains(&current))
        }
        Filter::And(operands) => {
            for operand in operands {
                if !matches(operand, item)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Or(operands) => {
            for operand in operands {
                if matches(operand, item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Filter::Not(inner) => Ok(!matches(inner, item)?),
        Filter::Constant(value) => Ok(*value),
    }
}

fn text_of<T: Item>(item: &T, attribute: &str) -> Result<Option<String>> {
    Ok(match item.get_field_by_external_name(attribute)? {
        Value::Text(text) => Some(text),
        _ => None,
    })
}

/// Applies every operation in order and returns the surviving items.
pub fn apply<T: Item>(query: &ItemQuery, mut items: Vec<T>) -> Result<Vec<T>> {
    for operation in query.operations() {
        items = match operation {
            QueryOperation::Where(filter) => {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if matches(filter, &item)? {
                        kept.push(item);
                    }
                }
                kept
            }
            QueryOperation::OrderBy { attribute, order } => sort(items, attribute, *order)?,
            QueryOperation::Skip(count) => items.into_iter().skip(*count).collect(),
            QueryOperation::Take(count) => items.into_iter().take(*count).collect(),
        };
    }
    Ok(items)
}

fn sort<T: Item>(items: Vec<T>, attribute: &str, order: Order) -> Result<Vec<T>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        keyed.push((item.get_field_by_external_name(attribute)?, item));
    }

    // sort_by cannot fail, so the first comparison error is kept aside
    let mut failure = None;
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = match (a.is_null(), b.is_null()) {
            (true, true) => Ok(Ordering::Equal),
            (true, false) => Ok(Ordering::Greater),
            (false, true) => Ok(Ordering::Less),
            (false, false) => match order {
                Order::Ascending => a.compare(b),
                Order::Descending => b.compare(a),
            },
        };
        ordering.unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(keyed.into_iter().map(|(_, item)| item).collect()),
    }
}
