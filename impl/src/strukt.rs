//! An ordered list of fields, optionally flattened from a single base,
//! wired through the Override Engine on every operation.

use std::sync::Arc;

use crate::codec::{Codec, ToObjectConfig, Value};
use crate::config::TypeFactoryConfig;
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{CodecError, CodecResult};
use crate::overrides::{
    FieldAppendBytesCtx, FieldFromBytesCtx, FieldFromObjectCtx, FieldToObjectCtx,
};

/// A compiled struct codec: base fields (if any) followed by this struct's
/// own fields, in declaration order.
pub struct StructCodec {
    name: String,
    fields: Vec<(String, Arc<dyn Codec>)>,
    config: TypeFactoryConfig,
}

impl StructCodec {
    /// `base_fields` must already be the base's own fully-flattened field
    /// list (the Schema Compiler resolves inheritance before calling this).
    /// `config` is the complete configuration this struct was compiled
    /// under — stored whole so field-override closures see the same
    /// `debug`/`defaults`/`custom_types` the caller actually passed in,
    /// not a freshly-defaulted stand-in.
    pub fn new(
        name: impl Into<String>,
        base_fields: Vec<(String, Arc<dyn Codec>)>,
        own_fields: Vec<(String, Arc<dyn Codec>)>,
        config: TypeFactoryConfig,
    ) -> Self {
        let mut fields = base_fields;
        fields.extend(own_fields);
        Self {
            name: name.into(),
            fields,
            config,
        }
    }

    pub fn fields(&self) -> &[(String, Arc<dyn Codec>)] {
        &self.fields
    }
}

impl Codec for StructCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if matches!(value, None | Some(serde_json::Value::Null)) {
            return Err(CodecError::Required(self.name.clone()));
        }
        let object = value
            .unwrap()
            .as_object()
            .ok_or_else(|| CodecError::Format(format!("{}: expected an object", self.name)))?;

        let mut result = Vec::with_capacity(self.fields.len());
        for (field_name, codec) in &self.fields {
            if let Some(field_override) = self.config.overrides.field_override(&self.name, field_name) {
                if let Some(f) = &field_override.from_object {
                    let mut ctx = FieldFromObjectCtx {
                        fields: &self.fields,
                        object: Some(&serde_json::Value::Object(object.clone())),
                        result: &mut result,
                        config: &self.config,
                    };
                    f(&mut ctx)?;
                    continue;
                }
            }
            let raw = object.get(field_name);
            if raw.is_none() && !codec.required() {
                result.push((field_name.clone(), Value::Null));
                continue;
            }
            if raw.is_none() && codec.required() {
                return Err(CodecError::Required(format!(
                    "{}.{field_name}",
                    self.name
                )));
            }
            let v = codec.from_object(raw).map_err(|e| match e {
                CodecError::Required(_) => {
                    CodecError::Required(format!("{}.{field_name}", self.name))
                }
                other => other,
            })?;
            result.push((field_name.clone(), v));
        }
        Ok(Value::Struct(result))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let fields_values: Vec<(String, Value)> = match value {
            Some(Value::Struct(fields)) => fields.clone(),
            Some(other) => {
                return Err(CodecError::Format(format!(
                    "{}: internal value {other:?} is not a struct",
                    self.name
                )))
            }
            None if config.defaults => Vec::new(),
            None => return Err(CodecError::Required(self.name.clone())),
        };

        let mut result = serde_json::Map::with_capacity(self.fields.len());
        for (field_name, codec) in &self.fields {
            if let Some(field_override) = self.config.overrides.field_override(&self.name, field_name) {
                if let Some(f) = &field_override.to_object {
                    let mut ctx = FieldToObjectCtx {
                        fields: &self.fields,
                        object: Some(&fields_values),
                        result: &mut result,
                        config,
                    };
                    f(&mut ctx)?;
                    continue;
                }
            }
            let current = fields_values
                .iter()
                .find(|(name, _)| name == field_name)
                .map(|(_, v)| v);
            let json = codec.to_object(current, config)?;
            result.insert(field_name.clone(), json);
        }
        Ok(serde_json::Value::Object(result))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        let fields_values = value.as_struct().ok_or_else(|| {
            CodecError::Format(format!(
                "{}: internal value {value:?} is not a struct",
                self.name
            ))
        })?;
        for (field_name, codec) in &self.fields {
            if let Some(field_override) = self.config.overrides.field_override(&self.name, field_name) {
                if let Some(f) = &field_override.append_bytes {
                    let mut ctx = FieldAppendBytesCtx {
                        fields: &self.fields,
                        object: fields_values,
                        b: writer,
                        config: &self.config,
                    };
                    f(&mut ctx)?;
                    continue;
                }
            }
            let current = fields_values
                .iter()
                .find(|(name, _)| name == field_name)
                .map(|(_, v)| v)
                .ok_or_else(|| CodecError::Required(format!("{}.{field_name}", self.name)))?;
            codec.append_bytes(writer, current)?;
        }
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        let mut result = Vec::with_capacity(self.fields.len());
        for (field_name, codec) in &self.fields {
            if let Some(field_override) = self.config.overrides.field_override(&self.name, field_name) {
                if let Some(f) = &field_override.from_bytes {
                    let mut ctx = FieldFromBytesCtx {
                        fields: &self.fields,
                        b: reader,
                        result: &mut result,
                        config: &self.config,
                    };
                    f(&mut ctx)?;
                    continue;
                }
            }
            let v = codec.from_bytes(reader)?;
            result.push((field_name.clone(), v));
        }
        Ok(Value::Struct(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{StringCodec, UInt8Codec, VectorCodec};

    fn person_codec() -> StructCodec {
        StructCodec::new(
            "Person",
            Vec::new(),
            vec![
                ("name".to_owned(), Arc::new(StringCodec) as Arc<dyn Codec>),
                ("age".to_owned(), Arc::new(UInt8Codec) as Arc<dyn Codec>),
                (
                    "friends".to_owned(),
                    Arc::new(VectorCodec::new(Arc::new(StringCodec), false)) as Arc<dyn Codec>,
                ),
            ],
            TypeFactoryConfig::default(),
        )
    }

    #[test]
    fn roundtrips_through_json_and_wire() {
        let codec = person_codec();
        let json = serde_json::json!({
            "name": "Ada",
            "age": 36,
            "friends": ["Charles", "Mary"],
        });
        let value = codec.from_object(Some(&json)).unwrap();
        let back = codec
            .to_object(Some(&value), &ToObjectConfig::default())
            .unwrap();
        assert_eq!(back, json);

        let mut w = ByteWriter::new();
        codec.append_bytes(&mut w, &value).unwrap();
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let decoded = codec.from_bytes(&mut r).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn base_fields_come_before_own_fields() {
        let base = vec![("id".to_owned(), Arc::new(UInt8Codec) as Arc<dyn Codec>)];
        let own = vec![("name".to_owned(), Arc::new(StringCodec) as Arc<dyn Codec>)];
        let codec = StructCodec::new("Derived", base, own, TypeFactoryConfig::default());
        assert_eq!(
            codec
                .fields()
                .iter()
                .map(|(n, _)| n.as_str())
                .collect::<Vec<_>>(),
            vec!["id", "name"]
        );
    }

    #[test]
    fn missing_required_field_errors() {
        let codec = person_codec();
        let json = serde_json::json!({ "name": "Ada" });
        let err = codec.from_object(Some(&json)).unwrap_err();
        assert!(matches!(err, CodecError::Required(ref s) if s == "Person.age"));
    }

    #[test]
    fn missing_struct_value_is_required_error() {
        let codec = person_codec();
        let err = codec.from_object(None).unwrap_err();
        assert!(matches!(err, CodecError::Required(ref s) if s == "Person"));
    }

    #[test]
    fn field_override_sees_the_full_config_it_was_compiled_with() {
        let mut overrides = crate::overrides::OverrideTable::default();
        overrides.set_field_to_object("Flagged", "value", |ctx| {
            let seen_debug = ctx.config.defaults;
            ctx.result.insert("value".to_owned(), serde_json::json!(seen_debug));
            Ok(())
        });
        let config = TypeFactoryConfig {
            overrides,
            defaults: true,
            ..Default::default()
        };
        let codec = StructCodec::new(
            "Flagged",
            Vec::new(),
            vec![("value".to_owned(), Arc::new(UInt8Codec) as Arc<dyn Codec>)],
            config,
        );
        let value = codec.from_object(Some(&serde_json::json!({ "value": 1 }))).unwrap();
        let back = codec
            .to_object(Some(&value), &ToObjectConfig::default())
            .unwrap();
        assert_eq!(back, serde_json::json!({ "value": true }));
    }
}
