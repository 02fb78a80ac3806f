//! The Override Engine: lets a caller replace any of the four
//! pipeline stages for a whole type, or intercept a single field within a
//! struct, without disturbing composition with sibling fields.
//!
//! Overrides are keyed structurally — `(type name, field name?, Stage)` —
//! rather than by re-parsing a dotted string on every lookup.
//! `OverrideKey::parse` still accepts the dotted-key shapes as an
//! ergonomic front door, since that's the surface schemas describe their
//! overrides with.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::{Codec, ToObjectConfig, Value};
use crate::config::TypeFactoryConfig;
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::CodecResult;

/// Which of the four `Codec` operations an override replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FromObject,
    ToObject,
    FromBytes,
    AppendBytes,
}

impl Stage {
    fn parse(op: &str) -> Result<Self, String> {
        match op {
            "fromObject" => Ok(Stage::FromObject),
            "toObject" => Ok(Stage::ToObject),
            "fromByteBuffer" => Ok(Stage::FromBytes),
            "appendByteBuffer" => Ok(Stage::AppendBytes),
            other => Err(format!("unknown override stage `{other}`")),
        }
    }
}

/// A resolved override target, parsed from either of the two dotted-key
/// shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideKey {
    /// `"<typeName>.<op>"`
    Type(String, Stage),
    /// `"<structName>.<fieldName>.<op>"`
    Field(String, String, Stage),
}

impl OverrideKey {
    pub fn parse(dotted: &str) -> Result<Self, String> {
        let parts: Vec<&str> = dotted.split('.').collect();
        match parts.as_slice() {
            [type_name, op] => Ok(OverrideKey::Type(
                (*type_name).to_owned(),
                Stage::parse(op)?,
            )),
            [struct_name, field_name, op] => Ok(OverrideKey::Field(
                (*struct_name).to_owned(),
                (*field_name).to_owned(),
                Stage::parse(op)?,
            )),
            _ => Err(format!("malformed override key `{dotted}`")),
        }
    }
}

// --- Type-level overrides ---------------------------------------------

pub type TypeFromObjectFn =
    dyn Fn(Option<&serde_json::Value>) -> CodecResult<Value> + Send + Sync;
pub type TypeToObjectFn =
    dyn Fn(Option<&Value>, &ToObjectConfig) -> CodecResult<serde_json::Value> + Send + Sync;
pub type TypeFromBytesFn = dyn for<'a> Fn(&mut ByteReader<'a>) -> CodecResult<Value> + Send + Sync;
pub type TypeAppendBytesFn = dyn Fn(&mut ByteWriter, &Value) -> CodecResult<()> + Send + Sync;

/// Replacement for a whole type's pipeline, or a subset of its stages.
#[derive(Default, Clone)]
pub struct TypeOverride {
    pub from_object: Option<Arc<TypeFromObjectFn>>,
    pub to_object: Option<Arc<TypeToObjectFn>>,
    pub from_bytes: Option<Arc<TypeFromBytesFn>>,
    pub append_bytes: Option<Arc<TypeAppendBytesFn>>,
}

// --- Field-level overrides ---------------------------------------------

/// Context handed to a field override: `{ fields, object, result?, b?,
/// config }`. The override assigns into `result` (or writes into `b`)
/// itself — the struct performs no default action for that field when an
/// override is present.
pub struct FieldFromObjectCtx<'a> {
    pub fields: &'a [(String, Arc<dyn Codec>)],
    pub object: Option<&'a serde_json::Value>,
    pub result: &'a mut Vec<(String, Value)>,
    pub config: &'a TypeFactoryConfig,
}

pub struct FieldToObjectCtx<'a> {
    pub fields: &'a [(String, Arc<dyn Codec>)],
    pub object: Option<&'a [(String, Value)]>,
    pub result: &'a mut serde_json::Map<String, serde_json::Value>,
    pub config: &'a ToObjectConfig,
}

pub struct FieldFromBytesCtx<'a, 'buf> {
    pub fields: &'a [(String, Arc<dyn Codec>)],
    pub b: &'a mut ByteReader<'buf>,
    pub result: &'a mut Vec<(String, Value)>,
    pub config: &'a TypeFactoryConfig,
}

pub struct FieldAppendBytesCtx<'a> {
    pub fields: &'a [(String, Arc<dyn Codec>)],
    pub object: &'a [(String, Value)],
    pub b: &'a mut ByteWriter,
    pub config: &'a TypeFactoryConfig,
}

pub type FieldFromObjectFn = dyn Fn(&mut FieldFromObjectCtx) -> CodecResult<()> + Send + Sync;
pub type FieldToObjectFn = dyn Fn(&mut FieldToObjectCtx) -> CodecResult<()> + Send + Sync;
pub type FieldFromBytesFn =
    dyn for<'a, 'buf> Fn(&mut FieldFromBytesCtx<'a, 'buf>) -> CodecResult<()> + Send + Sync;
pub type FieldAppendBytesFn = dyn Fn(&mut FieldAppendBytesCtx) -> CodecResult<()> + Send + Sync;

#[derive(Default, Clone)]
pub struct FieldOverride {
    pub from_object: Option<Arc<FieldFromObjectFn>>,
    pub to_object: Option<Arc<FieldToObjectFn>>,
    pub from_bytes: Option<Arc<FieldFromBytesFn>>,
    pub append_bytes: Option<Arc<FieldAppendBytesFn>>,
}

/// All overrides registered for one compilation, keyed structurally.
#[derive(Default, Clone)]
pub struct OverrideTable {
    types: HashMap<String, TypeOverride>,
    fields: HashMap<(String, String), FieldOverride>,
}

impl OverrideTable {
    pub fn type_override(&self, type_name: &str) -> Option<&TypeOverride> {
        self.types.get(type_name)
    }

    pub fn field_override(&self, struct_name: &str, field_name: &str) -> Option<&FieldOverride> {
        self.fields
            .get(&(struct_name.to_owned(), field_name.to_owned()))
    }

    fn type_entry(&mut self, type_name: &str) -> &mut TypeOverride {
        self.types.entry(type_name.to_owned()).or_default()
    }

    fn field_entry(&mut self, struct_name: &str, field_name: &str) -> &mut FieldOverride {
        self.fields
            .entry((struct_name.to_owned(), field_name.to_owned()))
            .or_default()
    }

    pub fn set_type_from_object(
        &mut self,
        type_name: &str,
        f: impl Fn(Option<&serde_json::Value>) -> CodecResult<Value> + Send + Sync + 'static,
    ) {
        self.type_entry(type_name).from_object = Some(Arc::new(f));
    }

    pub fn set_type_to_object(
        &mut self,
        type_name: &str,
        f: impl Fn(Option<&Value>, &ToObjectConfig) -> CodecResult<serde_json::Value>
            + Send
            + Sync
            + 'static,
    ) {
        self.type_entry(type_name).to_object = Some(Arc::new(f));
    }

    pub fn set_type_from_bytes(
        &mut self,
        type_name: &str,
        f: impl for<'a> Fn(&mut ByteReader<'a>) -> CodecResult<Value> + Send + Sync + 'static,
    ) {
        self.type_entry(type_name).from_bytes = Some(Arc::new(f));
    }

    pub fn set_type_append_bytes(
        &mut self,
        type_name: &str,
        f: impl Fn(&mut ByteWriter, &Value) -> CodecResult<()> + Send + Sync + 'static,
    ) {
        self.type_entry(type_name).append_bytes = Some(Arc::new(f));
    }

    pub fn set_field_from_object(
        &mut self,
        struct_name: &str,
        field_name: &str,
        f: impl Fn(&mut FieldFromObjectCtx) -> CodecResult<()> + Send + Sync + 'static,
    ) {
        self.field_entry(struct_name, field_name).from_object = Some(Arc::new(f));
    }

    pub fn set_field_to_object(
        &mut self,
        struct_name: &str,
        field_name: &str,
        f: impl Fn(&mut FieldToObjectCtx) -> CodecResult<()> + Send + Sync + 'static,
    ) {
        self.field_entry(struct_name, field_name).to_object = Some(Arc::new(f));
    }

    pub fn set_field_from_bytes(
        &mut self,
        struct_name: &str,
        field_name: &str,
        f: impl for<'a, 'buf> Fn(&mut FieldFromBytesCtx<'a, 'buf>) -> CodecResult<()>
            + Send
            + Sync
            + 'static,
    ) {
        self.field_entry(struct_name, field_name).from_bytes = Some(Arc::new(f));
    }

    pub fn set_field_append_bytes(
        &mut self,
        struct_name: &str,
        field_name: &str,
        f: impl Fn(&mut FieldAppendBytesCtx) -> CodecResult<()> + Send + Sync + 'static,
    ) {
        self.field_entry(struct_name, field_name).append_bytes = Some(Arc::new(f));
    }
}

/// Wraps `inner` so that any stage named in a registered type-level override
/// runs the replacement instead; stages with no override fall through to
/// `inner` unchanged — a wholesale type override.
struct OverriddenCodec {
    name: String,
    inner: Arc<dyn Codec>,
    over: TypeOverride,
}

impl Codec for OverriddenCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        self.inner.required()
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        match &self.over.from_object {
            Some(f) => f(value),
            None => self.inner.from_object(value),
        }
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        match &self.over.to_object {
            Some(f) => f(value, config),
            None => self.inner.to_object(value, config),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match &self.over.append_bytes {
            Some(f) => f(writer, value),
            None => self.inner.append_bytes(writer, value),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        match &self.over.from_bytes {
            Some(f) => f(reader),
            None => self.inner.from_bytes(reader),
        }
    }
}

/// Looks up `type_name` in `table` and, if any stage is overridden, wraps
/// `inner` to dispatch through it; otherwise returns `inner` untouched.
pub fn apply_type_override(
    type_name: &str,
    inner: Arc<dyn Codec>,
    table: &OverrideTable,
) -> Arc<dyn Codec> {
    match table.type_override(type_name) {
        Some(over)
            if over.from_object.is_some()
                || over.to_object.is_some()
                || over.from_bytes.is_some()
                || over.append_bytes.is_some() =>
        {
            Arc::new(OverriddenCodec {
                name: type_name.to_owned(),
                inner,
                over: over.clone(),
            })
        }
        _ => inner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_key() {
        assert_eq!(
            OverrideKey::parse("uint8.fromObject").unwrap(),
            OverrideKey::Type("uint8".into(), Stage::FromObject)
        );
    }

    #[test]
    fn parses_field_key() {
        assert_eq!(
            OverrideKey::parse("Message.data.fromByteBuffer").unwrap(),
            OverrideKey::Field("Message".into(), "data".into(), Stage::FromBytes)
        );
    }

    #[test]
    fn type_override_replaces_one_stage_and_falls_through_on_others() {
        use crate::primitives::UInt8Codec;

        let mut table = OverrideTable::default();
        table.set_type_from_object("uint8", |_value| Ok(Value::I64(7)));

        let wrapped = apply_type_override("uint8", Arc::new(UInt8Codec), &table);
        let v = wrapped.from_object(Some(&serde_json::json!(1))).unwrap();
        assert_eq!(v, Value::I64(7));

        let back = wrapped
            .to_object(Some(&v), &ToObjectConfig::default())
            .unwrap();
        assert_eq!(back, serde_json::json!(7));
    }

    #[test]
    fn no_registered_override_returns_inner_untouched() {
        use crate::primitives::UInt8Codec;

        let table = OverrideTable::default();
        let inner: Arc<dyn Codec> = Arc::new(UInt8Codec);
        let wrapped = apply_type_override("uint8", inner.clone(), &table);
        assert!(Arc::ptr_eq(&inner, &wrapped));
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(OverrideKey::parse("justAName").is_err());
        assert!(OverrideKey::parse("a.b.c.d").is_err());
        assert!(OverrideKey::parse("a.notAStage").is_err());
    }
}
