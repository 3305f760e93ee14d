use super::models::{
    CollectionSelector, CompositeFilter, CompositeOperator, Cursor, Direction, FieldFilter,
    FieldOperator, FieldReference, FilterType, Order, Projection, QueryFilter, StructuredQuery,
    Value,
};
use super::FirestoreError;
use serde::Serialize;

/// A fluent builder for a [`StructuredQuery`], passed to
/// [`FirebaseFirestore::run_query`](super::FirebaseFirestore::run_query).
///
/// # Examples
///
/// ```rust
/// use firebase_rest_sdk::firestore::models::{Direction, FieldOperator};
/// use firebase_rest_sdk::firestore::query::Query;
///
/// let query = Query::new("cities")
///     .where_filter("population", FieldOperator::GreaterThan, 100_000)?
///     .order_by("population", Direction::Descending)
///     .limit(10);
/// # Ok::<(), firebase_rest_sdk::firestore::FirestoreError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    query: StructuredQuery,
}

impl Query {
    /// Creates a query over the collection with the given id, relative to the query's parent.
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            query: StructuredQuery {
                from: Some(vec![CollectionSelector {
                    collection_id: collection_id.into(),
                    all_descendants: None,
                }]),
                ..Default::default()
            },
        }
    }

    /// Also queries descendant collections with the same id (collection group query).
    pub fn all_descendants(mut self) -> Self {
        if let Some(from) = &mut self.query.from {
            for selector in from.iter_mut() {
                selector.all_descendants = Some(true);
            }
        }
        self
    }

    /// Returns only the listed fields.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.query.select = Some(Projection {
            fields: fields.iter().map(|f| field_ref(f)).collect(),
        });
        self
    }

    /// Adds a field filter. Several filters are combined with `AND`.
    pub fn where_filter<T: Serialize>(
        mut self,
        field: &str,
        op: FieldOperator,
        value: T,
    ) -> Result<Self, FirestoreError> {
        let filter = QueryFilter {
            filter_type: Some(FilterType::FieldFilter(FieldFilter {
                field: field_ref(field),
                op,
                value: Value::try_from(serde_json::to_value(value)?)?,
            })),
        };

        self.query.where_clause = Some(match self.query.where_clause.take() {
            None => filter,
            Some(QueryFilter {
                filter_type: Some(FilterType::CompositeFilter(mut composite)),
            }) if composite.op == CompositeOperator::And => {
                composite.filters.push(filter);
                QueryFilter {
                    filter_type: Some(FilterType::CompositeFilter(composite)),
                }
            }
            Some(existing) => QueryFilter {
                filter_type: Some(FilterType::CompositeFilter(CompositeFilter {
                    op: CompositeOperator::And,
                    filters: vec![existing, filter],
                })),
            },
        });

        Ok(self)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.query
            .order_by
            .get_or_insert_with(Vec::new)
            .push(Order {
                field: field_ref(field),
                direction,
            });
        self
    }

    /// Starts the results at the given order-by values; `before` includes the matching document.
    pub fn start_at(mut self, values: Vec<Value>, before: bool) -> Self {
        self.query.start_at = Some(Cursor {
            values,
            before: Some(before),
        });
        self
    }

    /// Ends the results at the given order-by values; `before` excludes the matching document.
    pub fn end_at(mut self, values: Vec<Value>, before: bool) -> Self {
        self.query.end_at = Some(Cursor {
            values,
            before: Some(before),
        });
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn structured_query(&self) -> &StructuredQuery {
        &self.query
    }
}

impl From<Query> for StructuredQuery {
    fn from(query: Query) -> Self {
        query.query
    }
}

fn field_ref(path: &str) -> FieldReference {
    FieldReference {
        field_path: path.to_string(),
    }
}
