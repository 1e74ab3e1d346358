//! Structured-value codecs for the JSON wire types.
//!
//! JSON and JSONB columns are decoded into [`StructuredValue`] (a
//! `serde_json::Value`) through sqlx's `Json` wrapper rather than as raw
//! text. Registration on a connection resolves each type in the session and
//! checks it is the built-in type the codec binds to.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::types::Json;

/// The service's native structured-value representation.
pub type StructuredValue = serde_json::Value;

/// A JSON-family wire type bound to the structured-value codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonCodec {
    Json,
    Jsonb,
}

/// Every codec registered on a new connection, in registration order.
pub const JSON_CODECS: [JsonCodec; 2] = [JsonCodec::Json, JsonCodec::Jsonb];

impl JsonCodec {
    /// Type name as it appears in `pg_type.typname`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonb => "jsonb",
        }
    }

    /// Schema the type is resolved in.
    pub fn schema(&self) -> &'static str {
        "pg_catalog"
    }

    /// Built-in OID of the type.
    pub fn oid(&self) -> u32 {
        match self {
            Self::Json => 114,
            Self::Jsonb => 3802,
        }
    }

    /// Fully qualified type name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema(), self.type_name())
    }
}

impl std::fmt::Display for JsonCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Encode a native value into the form bound to JSON/JSONB parameters.
pub fn encode<T: Serialize>(value: &T) -> Result<Json<StructuredValue>, serde_json::Error> {
    serde_json::to_value(value).map(Json)
}

/// Decode a JSON/JSONB column value into a native type.
pub fn decode<T: DeserializeOwned>(value: Json<StructuredValue>) -> Result<T, serde_json::Error> {
    serde_json::from_value(value.0)
}
