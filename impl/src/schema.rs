//! The Schema Compiler: turns a declarative mapping of type names to
//! alias strings or struct specs into a registry of named struct codecs.
//!
//! Struct construction walks the `base` chain depth-first with a stack used
//! for cycle detection. Field references to *other* structs don't need
//! that stack: they're wrapped in a [`StructRef`] that reads from a
//! `OnceLock` filled in once every struct in the schema has been built, so
//! mutually-referential structs (a tree node's `children: Node[]`) resolve
//! without the compiler needing a topological order over the full
//! reference graph — only over `base`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::codec::{Codec, ToObjectConfig, Value};
use crate::config::TypeFactoryConfig;
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{CodecResult, SchemaError};
use crate::overrides::apply_type_override;
use crate::primitives::{self, MapCodec, OptionalCodec, SetCodec, VectorCodec};
use crate::strukt::StructCodec;
use crate::type_expr::{self, TypeExpr};

/// One entry of a declarative schema: either a rename of an existing
/// type, or a struct spec with an optional base and ordered fields.
#[derive(Debug, Clone)]
pub enum SchemaEntry {
    Alias(String),
    Struct {
        base: Option<String>,
        fields: IndexMap<String, String>,
    },
}

pub type Schema = IndexMap<String, SchemaEntry>;

/// Result of `compile`: the successfully-built structs plus every problem
/// found along the way. Never throws — callers inspect `errors`.
pub struct CompileOutput {
    pub structs: HashMap<String, Arc<dyn Codec>>,
    pub errors: Vec<SchemaError>,
}

/// Syntactic validation: turn a raw JSON mapping into
/// a `Schema`, collecting one error per malformed entry rather than
/// aborting on the first.
pub fn parse_schema_json(raw: &serde_json::Value) -> (Schema, Vec<SchemaError>) {
    let mut schema = Schema::new();
    let mut errors = Vec::new();

    let Some(obj) = raw.as_object() else {
        errors.push(SchemaError::new(
            "<schema>",
            "Expecting object or string in <schema>",
        ));
        return (schema, errors);
    };

    for (name, entry) in obj {
        match entry {
            serde_json::Value::String(alias) => {
                schema.insert(name.clone(), SchemaEntry::Alias(alias.clone()));
            }
            serde_json::Value::Object(spec) => {
                if !spec.contains_key("fields") && !spec.contains_key("base") {
                    errors.push(SchemaError::new(
                        name,
                        "Expecting Struct.fields or Struct.base",
                    ));
                    continue;
                }

                let base = match spec.get("base") {
                    None => None,
                    Some(serde_json::Value::String(b)) => Some(b.clone()),
                    Some(_) => {
                        errors.push(SchemaError::new(
                            name,
                            format!("Expecting string in {name}.base"),
                        ));
                        None
                    }
                };

                let mut fields = IndexMap::new();
                match spec.get("fields") {
                    None => {}
                    Some(serde_json::Value::Object(fmap)) => {
                        for (field_name, field_type) in fmap {
                            match field_type {
                                serde_json::Value::String(s) => {
                                    fields.insert(field_name.clone(), s.clone());
                                }
                                _ => errors.push(SchemaError::new(
                                    name,
                                    format!("Expecting string in {name}.fields.{field_name}"),
                                )),
                            }
                        }
                    }
                    Some(_) => errors.push(SchemaError::new(
                        name,
                        format!("Expecting object in {name}.fields"),
                    )),
                }

                schema.insert(name.clone(), SchemaEntry::Struct { base, fields });
            }
            _ => errors.push(SchemaError::new(
                name,
                format!("Expecting object or string in {name}"),
            )),
        }
    }

    (schema, errors)
}

/// A placeholder standing in for a struct that may not be fully built yet
/// at the point a sibling struct's field references it by name. Filled in
/// once `compile` finishes constructing every struct.
struct StructRef {
    name: String,
    cell: Arc<OnceLock<Arc<dyn Codec>>>,
}

impl StructRef {
    fn resolved(&self) -> &Arc<dyn Codec> {
        self.cell
            .get()
            .expect("struct codec referenced before compilation finished")
    }
}

impl Codec for StructRef {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        self.resolved().from_object(value)
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        self.resolved().to_object(value, config)
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        self.resolved().append_bytes(writer, value)
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        self.resolved().from_bytes(reader)
    }
}

/// Resolves one leaf name in a type-expression, in order: built-in
/// primitive, custom type, struct, alias (transitively, with cycle
/// detection).
fn resolve_leaf(
    name: &str,
    schema: &Schema,
    config: &TypeFactoryConfig,
    cells: &HashMap<String, Arc<OnceLock<Arc<dyn Codec>>>>,
    alias_stack: &mut Vec<String>,
) -> Result<Arc<dyn Codec>, String> {
    if let Some(codec) = primitives::build_primitive(name) {
        return Ok(apply_type_override(name, codec, &config.overrides));
    }
    if let Some(factory) = config.custom_types.get(name) {
        return Ok(apply_type_override(name, factory(), &config.overrides));
    }
    match schema.get(name) {
        Some(SchemaEntry::Struct { .. }) => {
            let cell = cells
                .get(name)
                .expect("cell pre-registered for every struct entry")
                .clone();
            Ok(Arc::new(StructRef {
                name: name.to_owned(),
                cell,
            }))
        }
        Some(SchemaEntry::Alias(target)) => {
            if alias_stack.iter().any(|n| n == name) {
                return Err(format!("cyclic alias involving {name}"));
            }
            alias_stack.push(name.to_owned());
            let resolved = resolve_leaf(target, schema, config, cells, alias_stack);
            alias_stack.pop();
            resolved
        }
        None => Err(format!("Missing {name}")),
    }
}

fn build_codec(
    expr: &TypeExpr,
    schema: &Schema,
    config: &TypeFactoryConfig,
    cells: &HashMap<String, Arc<OnceLock<Arc<dyn Codec>>>>,
) -> Result<Arc<dyn Codec>, String> {
    match expr {
        TypeExpr::Name(name) => resolve_leaf(name, schema, config, cells, &mut Vec::new()),
        TypeExpr::Optional(inner) => Ok(Arc::new(OptionalCodec::new(build_codec(
            inner, schema, config, cells,
        )?))),
        TypeExpr::Vector(inner) => Ok(Arc::new(VectorCodec::new(
            build_codec(inner, schema, config, cells)?,
            false,
        ))),
        TypeExpr::Set(inner) => Ok(Arc::new(SetCodec::new(build_codec(
            inner, schema, config, cells,
        )?))),
        TypeExpr::Map(key, value) => Ok(Arc::new(MapCodec::new(
            build_codec(key, schema, config, cells)?,
            build_codec(value, schema, config, cells)?,
        ))),
    }
}

/// Builds (or returns the already-built) struct codec for `name`, resolving
/// its `base` chain first so flattening can copy the base's already
/// materialized field list.
fn build_struct(
    name: &str,
    schema: &Schema,
    config: &TypeFactoryConfig,
    cells: &HashMap<String, Arc<OnceLock<Arc<dyn Codec>>>>,
    built: &mut HashMap<String, Arc<StructCodec>>,
    errors: &mut Vec<SchemaError>,
    building: &mut Vec<String>,
) -> Option<Arc<StructCodec>> {
    if let Some(existing) = built.get(name) {
        return Some(existing.clone());
    }
    if building.iter().any(|n| n == name) {
        errors.push(SchemaError::new(
            name,
            format!("cyclic base reference through {name}"),
        ));
        return None;
    }
    let Some(SchemaEntry::Struct { base, fields }) = schema.get(name) else {
        return None;
    };

    if config.debug {
        tracing::debug!(struct_name = name, base = ?base, field_count = fields.len(), "building struct");
    }

    building.push(name.to_owned());

    let base_fields = match base {
        None => Vec::new(),
        Some(base_name) => match schema.get(base_name) {
            Some(SchemaEntry::Struct { .. }) => build_struct(
                base_name, schema, config, cells, built, errors, building,
            )
            .map(|codec| codec.fields().to_vec())
            .unwrap_or_default(),
            _ => {
                errors.push(SchemaError::new(
                    name,
                    format!("Missing {base_name} in {name}.base"),
                ));
                Vec::new()
            }
        },
    };

    let mut own_fields = Vec::with_capacity(fields.len());
    for (field_name, type_str) in fields {
        match type_expr::parse(type_str) {
            Ok(expr) => match build_codec(&expr, schema, config, cells) {
                Ok(codec) => {
                    if config.debug {
                        tracing::trace!(
                            struct_name = name,
                            field_name,
                            resolved_type = codec.type_name(),
                            "resolved field"
                        );
                    }
                    own_fields.push((field_name.clone(), codec));
                }
                Err(message) => {
                    errors.push(SchemaError::new(format!("{name}.fields.{field_name}"), message))
                }
            },
            Err(e) => errors.push(SchemaError::new(
                format!("{name}.fields.{field_name}"),
                format!("invalid type expression: {e}"),
            )),
        }
    }

    building.pop();

    let codec = Arc::new(StructCodec::new(
        name.to_owned(),
        base_fields,
        own_fields,
        config.clone(),
    ));
    built.insert(name.to_owned(), codec.clone());
    Some(codec)
}

/// Compiles an already-parsed `Schema` into a registry of struct codecs.
/// Never fails outright — problems are reported in `CompileOutput::errors`
/// alongside whatever did compile.
pub fn compile(schema: &Schema, config: &TypeFactoryConfig) -> CompileOutput {
    if config.debug {
        tracing::debug!(entry_count = schema.len(), "compiling schema");
    }
    let mut errors = Vec::new();

    let cells: HashMap<String, Arc<OnceLock<Arc<dyn Codec>>>> = schema
        .iter()
        .filter(|(_, entry)| matches!(entry, SchemaEntry::Struct { .. }))
        .map(|(name, _)| (name.clone(), Arc::new(OnceLock::new())))
        .collect();

    let mut built: HashMap<String, Arc<StructCodec>> = HashMap::new();
    for name in schema.keys() {
        build_struct(
            name,
            schema,
            config,
            &cells,
            &mut built,
            &mut errors,
            &mut Vec::new(),
        );
    }

    // Every alias leaf must resolve to something; a bare `fromObject`/
    // `toObject`/etc. is never invoked on an alias itself, so the only way
    // to surface "alias to nothing known" is to resolve it eagerly here.
    for (name, entry) in schema {
        if let SchemaEntry::Alias(target) = entry {
            if config.debug {
                tracing::debug!(alias = name, target, "resolving alias");
            }
            if let Err(message) = resolve_leaf(target, schema, config, &cells, &mut vec![name.clone()]) {
                errors.push(SchemaError::new(name, format!("Unrecognized type {target}: {message}")));
            }
        }
    }

    for (name, codec) in &built {
        if let Some(cell) = cells.get(name) {
            let wrapped = apply_type_override(name, codec.clone() as Arc<dyn Codec>, &config.overrides);
            let _ = cell.set(wrapped);
        }
    }

    let structs = built
        .into_iter()
        .map(|(name, codec)| {
            let wrapped = apply_type_override(&name, codec as Arc<dyn Codec>, &config.overrides);
            (name, wrapped)
        })
        .collect();

    if config.debug {
        tracing::debug!(built = structs.len(), errors = errors.len(), "compilation finished");
    }

    CompileOutput { structs, errors }
}

/// Parses then compiles a raw JSON schema mapping in one call.
pub fn compile_json(raw: &serde_json::Value, config: &TypeFactoryConfig) -> CompileOutput {
    let (schema, mut errors) = parse_schema_json(raw);
    let mut output = compile(&schema, config);
    errors.append(&mut output.errors);
    output.errors = errors;
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_struct_with_no_errors() {
        let raw = serde_json::json!({
            "Struct": { "fields": { "checksum": "fixed_bytes32" } }
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert!(output.structs.contains_key("Struct"));
    }

    #[test]
    fn empty_struct_spec_is_an_error() {
        let raw = serde_json::json!({ "Struct": {} });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output
            .errors
            .iter()
            .any(|e| e.message.contains("Expecting Struct.fields or Struct.base")));
    }

    #[test]
    fn missing_base_is_an_error() {
        let raw = serde_json::json!({
            "Person": { "base": "Human", "fields": { "name": "string" } }
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output.errors.iter().any(|e| e.message.contains("Missing Human")));
    }

    #[test]
    fn base_fields_precede_own_fields_and_forward_reference_works() {
        let raw = serde_json::json!({
            "Human": { "fields": { "id": "uint8" } },
            "Person": { "base": "Human", "fields": { "name": "string", "boss": "Person?" } },
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        let person = output.structs.get("Person").unwrap();

        let json = serde_json::json!({ "id": 1, "name": "Ada", "boss": null });
        let value = person.from_object(Some(&json)).unwrap();
        let back = person
            .to_object(Some(&value), &ToObjectConfig::default())
            .unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn cyclic_base_is_rejected() {
        let raw = serde_json::json!({
            "A": { "base": "B", "fields": {} },
            "B": { "base": "A", "fields": {} },
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output
            .errors
            .iter()
            .any(|e| e.message.contains("cyclic base reference")));
    }

    #[test]
    fn alias_to_struct_is_a_valid_field_reference_but_not_a_valid_base() {
        let raw = serde_json::json!({
            "Human": { "fields": { "id": "uint8" } },
            "Person": { "base": "Human", "fields": { "id": "uint8" } },
            "PersonAlias": "Person",
            "Derived": { "base": "PersonAlias", "fields": {} },
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        assert!(output
            .errors
            .iter()
            .any(|e| e.message.contains("Missing PersonAlias")));
    }

    #[test]
    fn empty_buffer_is_illegal_offset() {
        let raw = serde_json::json!({
            "Struct": { "fields": { "value": "uint8" } }
        });
        let output = compile_json(&raw, &TypeFactoryConfig::default());
        let codec = output.structs.get("Struct").unwrap();
        let err = crate::codec::from_buffer(codec.as_ref(), &[]).unwrap_err();
        assert_eq!(err.to_string(), "Illegal offset");
    }
}
