//! Wire types for structured validation errors.
//!
//! Field numbers follow `buf/validate/validate.proto` and
//! `google/rpc/status.proto`, so clients decoding `grpc-status-details-bin`
//! with the upstream definitions read the same messages.

/// `buf.validate.Violations`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Violations {
    #[prost(message, repeated, tag = "1")]
    pub violations: Vec<Violation>,
}

/// `buf.validate.Violation`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Violation {
    #[prost(string, optional, tag = "2")]
    pub rule_id: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub message: Option<String>,
    #[prost(bool, optional, tag = "4")]
    pub for_key: Option<bool>,
    #[prost(message, optional, tag = "5")]
    pub field: Option<FieldPath>,
}

impl Violation {
    /// Dotted field path, `name[idx]` for list elements and `name[key]` for map entries.
    pub fn field_path(&self) -> String {
        let Some(field) = &self.field else {
            return String::new();
        };

        field
            .elements
            .iter()
            .filter_map(|el| {
                let name = el.field_name.as_deref().filter(|n| !n.is_empty())?;
                Some(match &el.subscript {
                    Some(subscript) => format!("{}[{}]", name, subscript),
                    None => name.to_string(),
                })
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// `buf.validate.FieldPath`
#[derive(Clone, PartialEq, prost::Message)]
pub struct FieldPath {
    #[prost(message, repeated, tag = "1")]
    pub elements: Vec<FieldPathElement>,
}

/// `buf.validate.FieldPathElement`
#[derive(Clone, PartialEq, prost::Message)]
pub struct FieldPathElement {
    #[prost(int32, optional, tag = "1")]
    pub field_number: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub field_name: Option<String>,
    #[prost(oneof = "Subscript", tags = "6, 7, 8, 9, 10")]
    pub subscript: Option<Subscript>,
}

/// Position of an element inside a repeated or map field.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Subscript {
    #[prost(uint64, tag = "6")]
    Index(u64),
    #[prost(bool, tag = "7")]
    BoolKey(bool),
    #[prost(int64, tag = "8")]
    IntKey(i64),
    #[prost(uint64, tag = "9")]
    UintKey(u64),
    #[prost(string, tag = "10")]
    StringKey(String),
}

impl std::fmt::Display for Subscript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscript::Index(i) => write!(f, "{}", i),
            Subscript::BoolKey(b) => write!(f, "{}", b),
            Subscript::IntKey(i) => write!(f, "{}", i),
            Subscript::UintKey(u) => write!(f, "{}", u),
            Subscript::StringKey(s) => write!(f, "{}", s),
        }
    }
}

/// `google.protobuf.Any`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// `google.rpc.Status`, the payload of `grpc-status-details-bin`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<Any>,
}

/// Type URL of packed [`Violations`].
pub const VIOLATIONS_TYPE_URL: &str = "type.googleapis.com/buf.validate.Violations";
