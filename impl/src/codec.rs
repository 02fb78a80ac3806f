//! The universal `Codec` abstraction and the canonical internal value
//! representation every codec operates on.

use std::cmp::Ordering;

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::CodecResult;

/// The canonical, in-memory representation a `Codec::from_object` produces
/// and `Codec::append_bytes`/`from_bytes` exchange with the wire.
///
/// `Struct` keeps fields as an ordered `Vec` rather than a map: field order
/// is significant on the wire, and `Vec<(String, Value)>` derives `Ord` for
/// free, which `Vector(sorted)` needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Null,
    U64(u64),
    I64(i64),
    Bytes(Vec<u8>),
    String(String),
    Vector(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn as_struct(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Natural ordering used by sorted vectors. All elements of one vector
    /// share a codec and therefore a `Value` variant; the derived
    /// cross-variant ordering (by declaration order) is never exercised by
    /// a homogeneous vector.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// Options passed to `Codec::to_object`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToObjectConfig {
    /// When true and no value is supplied, produce a representative
    /// default instead of erroring — used for introspection/docs. Never
    /// consulted on the wire-format path.
    pub defaults: bool,
}

/// The four-operation interface every built-in, struct and custom type
/// implements.
pub trait Codec: Send + Sync {
    /// The name this codec is registered under, used to build messages
    /// like `Required <structName>.<fieldName>` without re-threading the
    /// name through every call site.
    fn type_name(&self) -> &str;

    /// Whether `null`/absent is rejected by `from_object`. Optional-wrapped
    /// codecs report `false`.
    fn required(&self) -> bool;

    /// Canonicalize a user-supplied value. `None` and `Some(serde_json::Value::Null)`
    /// are treated identically as "absent".
    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value>;

    /// Inverse of `from_object`. `value` is `None` only when
    /// `config.defaults` is true, in which case a representative default is
    /// produced instead of the real value.
    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value>;

    /// Write the canonical byte encoding of `value` to `writer`.
    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()>;

    /// Read a value from `reader`; the cursor advances exactly by the
    /// bytes consumed.
    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value>;
}

/// Serialize `value` through `codec` into an owned byte buffer.
pub fn to_buffer(codec: &dyn Codec, value: &Value) -> CodecResult<Vec<u8>> {
    let mut w = ByteWriter::new();
    codec.append_bytes(&mut w, value)?;
    Ok(w.into_bytes())
}

/// Deserialize a `Value` through `codec` from a byte slice.
pub fn from_buffer(codec: &dyn Codec, bytes: &[u8]) -> CodecResult<Value> {
    let mut r = ByteReader::new(bytes);
    codec.from_bytes(&mut r)
}
