use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, event, info_span};

use super::ast::Predicate;
use super::{ExpressionConverter, Filter, ItemQuery, Order};
use crate::command::QueryResult;
use crate::command::factory::CommandFactory;
use crate::core::{DataError, Result};
use crate::item::Item;
use crate::store::ItemStore;

/// Deferred query over one item type.
///
/// Builder calls only record operations; nothing reaches the store until
/// [`QueryCommand::execute`] is polled. Predicates are converted as they are
/// added, so an untranslatable predicate fails at `where_`.
pub struct QueryCommand<T: Item> {
    query: ItemQuery,
    converter: ExpressionConverter<T>,
    factory: Arc<CommandFactory<T>>,
}

enum Cursor<T: Item> {
    Start {
        store: Arc<dyn ItemStore<T>>,
        query: ItemQuery,
    },
    Streaming(BoxStream<'static, Result<T>>),
    Done,
}

impl<T: Item> QueryCommand<T> {
    pub(crate) fn new(factory: Arc<CommandFactory<T>>) -> Self {
        Self {
            query: ItemQuery::new(),
            converter: ExpressionConverter::new(),
            factory,
        }
    }

    /// Adds an already-converted filter.
    pub(crate) fn with_filter(mut self, filter: Filter) -> Self {
        self.query.push_where(filter);
        self
    }

    pub fn where_(mut self, predicate: Predicate) -> Result<Self> {
        let filter = self.converter.convert(&predicate)?;
        self.query.push_where(filter);
        Ok(self)
    }

    pub fn order_by(self, field: &str) -> Result<Self> {
        self.push_order(field, Order::Ascending)
    }

    pub fn order_by_descending(self, field: &str) -> Result<Self> {
        self.push_order(field, Order::Descending)
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.query.push_skip(count);
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.query.push_take(count);
        self
    }

    /// The storage-level query built so far.
    pub fn query(&self) -> &ItemQuery {
        &self.query
    }

    /// Streams matching items wrapped as [`QueryResult`]s.
    ///
    /// Once `token` fires the stream yields a single [`DataError::Cancelled`]
    /// and ends; results already yielded stay valid.
    pub fn execute(&self, token: &CancellationToken) -> BoxStream<'static, Result<QueryResult<T>>> {
        let cursor = Cursor::Start {
            store: Arc::clone(self.factory.store()),
            query: self.query.clone(),
        };
        let state = (cursor, token.clone(), Arc::clone(&self.factory));

        stream::unfold(state, |(cursor, token, factory)| async move {
            if token.is_cancelled() {
                return match cursor {
                    Cursor::Done => None,
                    _ => Some((Err(DataError::Cancelled), (Cursor::Done, token, factory))),
                };
            }

            let mut items = match cursor {
                Cursor::Done => return None,
                Cursor::Streaming(items) => items,
                Cursor::Start { store, query } => {
                    let span =
                        info_span!("query_command.execute", type_name = T::TYPE_NAME, query = %query);
                    match store.query(query, &token).instrument(span).await {
                        Ok(items) => items,
                        Err(err) => return Some((Err(err), (Cursor::Done, token, factory))),
                    }
                }
            };

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => Some(Err(DataError::Cancelled)),
                next = items.next() => next,
            };

            match next {
                None => None,
                Some(Ok(item)) => {
                    let result = QueryResult::new(item, Arc::clone(&factory));
                    Some((Ok(result), (Cursor::Streaming(items), token, factory)))
                }
                Some(Err(err)) => {
                    event!(Level::DEBUG, error = %err, "query stream ended with error");
                    Some((Err(err), (Cursor::Done, token, factory)))
                }
            }
        })
        .boxed()
    }

    /// Runs the query and collects every result.
    pub async fn to_vec(&self, token: &CancellationToken) -> Result<Vec<QueryResult<T>>> {
        self.execute(token).try_collect().await
    }

    fn push_order(mut self, field: &str, order: Order) -> Result<Self> {
        let descriptor = self.converter.resolve_field(field)?;
        self.query.push_order_by(descriptor.external_name, order);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::provider::EventPolicy;
    use crate::query::{Filter, QueryOperation, field};
    use crate::store::InMemoryItemStore;
    use crate::test_support::{TestItem, test_validator};

    fn command() -> QueryCommand<TestItem> {
        let factory = CommandFactory::new(
            Arc::new(InMemoryItemStore::<TestItem>::new()),
            test_validator(),
            EventPolicy::DecoratedChanges,
        );
        QueryCommand::new(Arc::new(factory))
    }

    #[test]
    fn test_operations_recorded_in_call_order() {
        let command = command()
            .where_(field("message_count").gt(1))
            .unwrap()
            .where_(field("public_message").eq("x"))
            .unwrap()
            .order_by_descending("message_count")
            .unwrap()
            .skip(2)
            .take(3);

        let operations = command.query().operations();
        assert_eq!(operations.len(), 4);
        assert!(matches!(&operations[0], QueryOperation::Where(Filter::And(filters)) if filters.len() == 2));
        assert_eq!(
            operations[1],
            QueryOperation::OrderBy {
                attribute: "messageCount".into(),
                order: Order::Descending
            }
        );
        assert_eq!(operations[2], QueryOperation::Skip(2));
        assert_eq!(operations[3], QueryOperation::Take(3));
    }

    #[test]
    fn test_bad_predicate_fails_at_where() {
        assert!(command().where_(field("missing").eq(1)).is_err());
        assert!(command().order_by("missing").is_err());
    }

    #[tokio::test]
    async fn test_pre_cancelled_execute_yields_single_error() {
        let token = CancellationToken::new();
        token.cancel();

        let results: Vec<_> = command().execute(&token).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(DataError::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_store_yields_nothing() {
        let results = command()
            .where_(field("message_count").eq(Value::Integer(1)))
            .unwrap()
            .to_vec(&CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
