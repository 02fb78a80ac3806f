// MIT License
//
// Copyright (c) 2019 Lukas Lueg (lukas.lueg@gmail.com)
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! `structwire` builds a family of codecs from a declarative schema: every
//! registered type converts between a JSON-ish object form and a compact
//! little-endian byte stream through the same four-operation interface,
//! whether it's a built-in primitive, a struct with inherited fields, or a
//! caller-supplied custom type.
//!
//! ```
//! use structwire::{compile_json, TypeFactoryConfig};
//!
//! let schema = serde_json::json!({
//!     "Person": {
//!         "fields": { "name": "string", "age": "uint8", "friends": "string[]" }
//!     }
//! });
//! let output = compile_json(&schema, &TypeFactoryConfig::default());
//! assert!(output.errors.is_empty());
//!
//! let person = output.structs.get("Person").unwrap();
//! let value = person
//!     .from_object(Some(&serde_json::json!({
//!         "name": "Ada", "age": 36, "friends": ["Charles"]
//!     })))
//!     .unwrap();
//! let bytes = structwire::to_buffer(person.as_ref(), &value).unwrap();
//! let decoded = structwire::from_buffer(person.as_ref(), &bytes).unwrap();
//! assert_eq!(decoded, value);
//! ```

mod codec;
mod config;
mod cursor;
mod error;
mod overrides;
mod primitives;
mod schema;
mod strukt;
mod type_expr;

pub use codec::{from_buffer, to_buffer, Codec, ToObjectConfig, Value};
pub use config::{CustomTypeFactory, TypeFactoryConfig};
pub use cursor::{BlockEncoding, ByteReader, ByteWriter};
pub use error::{CodecError, CodecResult, SchemaError};
pub use overrides::{
    FieldAppendBytesCtx, FieldFromBytesCtx, FieldFromObjectCtx, FieldOverride, FieldToObjectCtx,
    OverrideKey, OverrideTable, Stage, TypeOverride,
};
pub use primitives::{
    build_primitive, MapCodec, OptionalCodec, SetCodec, VectorCodec,
};
pub use schema::{compile, compile_json, parse_schema_json, CompileOutput, Schema, SchemaEntry};
pub use strukt::StructCodec;
pub use type_expr::{parse as parse_type_expr, TypeExpr};
