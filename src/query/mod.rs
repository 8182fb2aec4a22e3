//! Query model.
//!
//! Callers build [`Predicate`]s against Rust field names; the
//! [`ExpressionConverter`] turns them into storage-level [`Filter`]s over
//! external names, and a [`QueryCommand`] records the resulting pipeline as an
//! [`ItemQuery`] for a store to execute.

pub mod ast;
pub mod converter;
pub mod evaluate;
pub mod filter;
pub mod query_command;

pub use ast::{ArithmeticOp, Operand, Predicate, field, value};
pub use converter::ExpressionConverter;
pub use filter::{CompareOp, Filter, ItemQuery, Order, QueryOperation};
pub use query_command::QueryCommand;
