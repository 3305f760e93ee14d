use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(flatten)]
    pub value_type: ValueType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    StringValue(String),
    IntegerValue(String), // Firestore sends integers as strings
    #[serde(serialize_with = "serialize_double", deserialize_with = "deserialize_double")]
    DoubleValue(f64),
    BooleanValue(bool),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
    NullValue(()),
    TimestampValue(String),
    GeoPointValue(GeoPoint),
    BytesValue(String), // base64 encoded
    ReferenceValue(String),
}

// Non-finite doubles travel as the strings "NaN", "Infinity" and "-Infinity".
fn serialize_double<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if value.is_infinite() {
        serializer.serialize_str(if *value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        serializer.serialize_f64(*value)
    }
}

fn deserialize_double<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Double {
        Number(f64),
        Text(String),
    }

    match Double::deserialize(deserializer)? {
        Double::Number(n) => Ok(n),
        Double::Text(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid double value: {}", other))),
        },
    }
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Self { value_type: ValueType::StringValue(value.into()) }
    }

    pub fn integer(value: i64) -> Self {
        Self { value_type: ValueType::IntegerValue(value.to_string()) }
    }

    pub fn double(value: f64) -> Self {
        Self { value_type: ValueType::DoubleValue(value) }
    }

    pub fn boolean(value: bool) -> Self {
        Self { value_type: ValueType::BooleanValue(value) }
    }

    pub fn null() -> Self {
        Self { value_type: ValueType::NullValue(()) }
    }

    /// A bytes value; `bytes` is base64-encoded for the wire.
    pub fn bytes(bytes: &[u8]) -> Self {
        Self { value_type: ValueType::BytesValue(STANDARD.encode(bytes)) }
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self { value_type: ValueType::ArrayValue(ArrayValue { values }) }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListCollectionIdsResponse {
    #[serde(default)]
    pub collection_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// A set of field paths on a document.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

/// A precondition on a document, used for conditional writes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

/// A write on a document, part of a commit.
///
/// See <https://firebase.google.com/docs/firestore/reference/rest/v1/Write>.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    #[serde(flatten)]
    pub operation: WriteOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_transforms: Option<Vec<FieldTransform>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

impl Write {
    /// Writes `document`, replacing it (or only the `update_mask` fields when a mask is set).
    pub fn update(document: Document) -> Self {
        Self::from_operation(WriteOperation::Update(document))
    }

    /// Deletes the document with the given resource name.
    pub fn delete(name: impl Into<String>) -> Self {
        Self::from_operation(WriteOperation::Delete(name.into()))
    }

    /// Applies field transforms to a document.
    pub fn transform(transform: DocumentTransform) -> Self {
        Self::from_operation(WriteOperation::Transform(transform))
    }

    fn from_operation(operation: WriteOperation) -> Self {
        Self {
            operation,
            update_mask: None,
            update_transforms: None,
            current_document: None,
        }
    }

    pub fn with_update_mask(mut self, field_paths: Vec<String>) -> Self {
        self.update_mask = Some(DocumentMask { field_paths });
        self
    }

    pub fn with_update_transforms(mut self, transforms: Vec<FieldTransform>) -> Self {
        self.update_transforms = Some(transforms);
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.current_document = Some(precondition);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WriteOperation {
    Update(Document),
    Delete(String),
    Transform(DocumentTransform),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTransform {
    pub document: String,
    pub field_transforms: Vec<FieldTransform>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    #[serde(flatten)]
    pub transform_type: TransformType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TransformType {
    SetToServerValue(ServerValue),
    Increment(Value),
    Maximum(Value),
    Minimum(Value),
    AppendMissingElements(ArrayValue),
    RemoveAllFromArray(ArrayValue),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerValue {
    ServerValueUnspecified,
    RequestTime,
}

/// Options for creating a new transaction.
///
/// See <https://cloud.google.com/firestore/docs/reference/rest/v1/TransactionOptions>.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TransactionOptions {
    /// A transaction that can only read, optionally at `read_time`.
    ReadOnly(ReadOnly),
    /// A transaction that can read and write, optionally retrying a previous transaction.
    ReadWrite(ReadWrite),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadOnly {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_transaction: Option<String>,
}

/// The consistency mode of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConsistencySelector {
    #[default]
    Undefined,
    /// Run within an existing transaction (base64 transaction id).
    Transaction(String),
    /// Start a new transaction; its id is returned with the first result.
    NewTransaction(TransactionOptions),
    /// Read documents as they were at the given RFC3339 time.
    ReadTime(String),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionResponse {
    pub transaction: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub update_time: Option<String>,
    #[serde(default)]
    pub transform_results: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
    pub commit_time: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub transaction: Option<String>,
    pub document: Option<Document>,
    pub read_time: Option<String>,
    pub skipped_results: Option<i32>,
}

/// A long-running operation, returned by export and import.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub metadata: Option<serde_json::Value>,
    pub response: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
}

// Structured query types.

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Projection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Vec<CollectionSelector>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<QueryFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<Order>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<Cursor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub fields: Vec<FieldReference>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_descendants: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(flatten)]
    pub filter_type: Option<FilterType>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    CompositeFilter(CompositeFilter),
    FieldFilter(FieldFilter),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeFilter {
    pub op: CompositeOperator,
    pub filters: Vec<QueryFilter>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeOperator {
    And,
    Or,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: FieldOperator,
    pub value: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    ArrayContains,
    In,
    ArrayContainsAny,
    NotIn,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub field: FieldReference,
    pub direction: Direction,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<bool>,
}
