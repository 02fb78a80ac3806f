//! The Type Factory: the fixed catalog of built-in primitive codecs.
//!
//! Each factory function returns a fresh, stateless `Arc<dyn Codec>`. The
//! factory is driven by the `TypeFactoryConfig` only insofar as
//! `customTypes` can shadow these names before the Schema Compiler ever
//! looks a name up.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::codec::{Codec, ToObjectConfig, Value};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{CodecError, CodecResult};

fn required_error(type_name: &str) -> CodecError {
    CodecError::Required(type_name.to_owned())
}

fn is_absent(value: Option<&serde_json::Value>) -> bool {
    matches!(value, None | Some(serde_json::Value::Null))
}

/// Pulls a JSON number out of an `Option`, rejecting absence for a required
/// primitive.
fn require_json_int(value: Option<&serde_json::Value>, type_name: &str) -> CodecResult<i64> {
    if is_absent(value) {
        return Err(required_error(type_name));
    }
    value
        .unwrap()
        .as_i64()
        .ok_or_else(|| CodecError::Format(format!("{type_name}: not an integer")))
}

fn expect_i64(value: &Value, type_name: &str) -> CodecResult<i64> {
    match value {
        Value::I64(n) => Ok(*n),
        other => Err(CodecError::Format(format!(
            "{type_name}: internal value {other:?} is not an integer"
        ))),
    }
}

fn default_value(value: Option<&Value>, config: &ToObjectConfig, default: Value) -> Value {
    match value {
        Some(v) => v.clone(),
        None if config.defaults => default,
        None => default,
    }
}

macro_rules! unsigned_int_codec {
    ($name:ident, $type_name:literal, $write:ident, $read:ident, $max:expr) => {
        pub struct $name;

        impl Codec for $name {
            fn type_name(&self) -> &str {
                $type_name
            }

            fn required(&self) -> bool {
                true
            }

            fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
                let raw = require_json_int(value, self.type_name())?;
                if raw < 0 {
                    return Err(CodecError::Format(format!(
                        "{}: negative value {raw} for unsigned type",
                        self.type_name()
                    )));
                }
                if raw as u64 > $max {
                    return Err(CodecError::Overflow(format!(
                        "{} out of range [0, {}]: {raw}",
                        self.type_name(),
                        $max
                    )));
                }
                Ok(Value::I64(raw))
            }

            fn to_object(
                &self,
                value: Option<&Value>,
                config: &ToObjectConfig,
            ) -> CodecResult<serde_json::Value> {
                let v = default_value(value, config, Value::I64(0));
                let n = expect_i64(&v, self.type_name())?;
                Ok(serde_json::json!(n))
            }

            fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
                let n = expect_i64(value, self.type_name())?;
                writer.$write(n as _);
                Ok(())
            }

            fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
                Ok(Value::I64(reader.$read()? as i64))
            }
        }
    };
}

macro_rules! signed_int_codec {
    ($name:ident, $type_name:literal, $write:ident, $read:ident, $min:expr, $max:expr) => {
        pub struct $name;

        impl Codec for $name {
            fn type_name(&self) -> &str {
                $type_name
            }

            fn required(&self) -> bool {
                true
            }

            fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
                let raw = require_json_int(value, self.type_name())?;
                if raw < $min || raw > $max {
                    return Err(CodecError::Overflow(format!(
                        "{} out of range [{}, {}]: {raw}",
                        self.type_name(),
                        $min,
                        $max
                    )));
                }
                Ok(Value::I64(raw))
            }

            fn to_object(
                &self,
                value: Option<&Value>,
                config: &ToObjectConfig,
            ) -> CodecResult<serde_json::Value> {
                let v = default_value(value, config, Value::I64(0));
                let n = expect_i64(&v, self.type_name())?;
                Ok(serde_json::json!(n))
            }

            fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
                let n = expect_i64(value, self.type_name())?;
                writer.$write(n as _);
                Ok(())
            }

            fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
                Ok(Value::I64(reader.$read()? as i64))
            }
        }
    };
}

unsigned_int_codec!(UInt8Codec, "uint8", write_u8, read_u8, 0xff);
unsigned_int_codec!(UInt16Codec, "uint16", write_u16, read_u16, 0xffff);
unsigned_int_codec!(UInt32Codec, "uint32", write_u32, read_u32, 0xffff_ffff);
signed_int_codec!(Int8Codec, "int8", write_i8, read_i8, -0x80, 0x7f);
signed_int_codec!(Int16Codec, "int16", write_i16, read_i16, -0x8000, 0x7fff);
signed_int_codec!(
    Int32Codec,
    "int32",
    write_i32,
    read_i32,
    -0x8000_0000,
    0x7fff_ffff
);

pub struct VarUInt32Codec;

impl Codec for VarUInt32Codec {
    fn type_name(&self) -> &str {
        "varuint32"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        let raw = require_json_int(value, self.type_name())?;
        if raw < 0 {
            return Err(CodecError::Format(format!(
                "{}: negative value {raw} for unsigned type",
                self.type_name()
            )));
        }
        if raw as u64 > u64::from(u32::MAX) {
            return Err(CodecError::Overflow(format!(
                "{} out of range [0, {}]: {raw}",
                self.type_name(),
                u32::MAX
            )));
        }
        Ok(Value::I64(raw))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::I64(0));
        Ok(serde_json::json!(expect_i64(&v, self.type_name())?))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        writer.write_varuint32(expect_i64(value, self.type_name())? as u32);
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::I64(i64::from(reader.read_varuint32()?)))
    }
}

pub struct VarInt32Codec;

impl Codec for VarInt32Codec {
    fn type_name(&self) -> &str {
        "varint32"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        let raw = require_json_int(value, self.type_name())?;
        if raw < i64::from(i32::MIN) || raw > i64::from(i32::MAX) {
            return Err(CodecError::Overflow(format!(
                "{} out of range [{}, {}]: {raw}",
                self.type_name(),
                i32::MIN,
                i32::MAX
            )));
        }
        Ok(Value::I64(raw))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::I64(0));
        Ok(serde_json::json!(expect_i64(&v, self.type_name())?))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        writer.write_varint32(expect_i64(value, self.type_name())? as i32);
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::I64(i64::from(reader.read_varint32()?)))
    }
}

/// Parses a decimal string into an `i128` wide enough to detect overflow
/// for both `int64` and `uint64` before narrowing.
fn parse_decimal(s: &str, type_name: &str) -> CodecResult<i128> {
    s.trim()
        .parse::<i128>()
        .map_err(|_| CodecError::Format(format!("{type_name}: not a decimal integer: {s:?}")))
}

pub struct UInt64Codec;

impl Codec for UInt64Codec {
    fn type_name(&self) -> &str {
        "uint64"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value
            .unwrap()
            .as_str()
            .ok_or_else(|| CodecError::Format(format!("{}: expected a string", self.type_name())))?;
        let n = parse_decimal(s, self.type_name())?;
        if n < 0 {
            return Err(CodecError::Format(format!(
                "{}: negative value {n} for unsigned type",
                self.type_name()
            )));
        }
        if n > i128::from(u64::MAX) {
            return Err(CodecError::Overflow(format!(
                "{} out of range [0, {}]: {n}",
                self.type_name(),
                u64::MAX
            )));
        }
        Ok(Value::U64(n as u64))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::U64(0));
        match v {
            Value::U64(n) => Ok(serde_json::Value::String(n.to_string())),
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not a u64",
                self.type_name()
            ))),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::U64(n) => {
                writer.write_u64(*n);
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not a u64",
                self.type_name()
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::U64(reader.read_u64()?))
    }
}

pub struct Int64Codec;

impl Codec for Int64Codec {
    fn type_name(&self) -> &str {
        "int64"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value
            .unwrap()
            .as_str()
            .ok_or_else(|| CodecError::Format(format!("{}: expected a string", self.type_name())))?;
        let n = parse_decimal(s, self.type_name())?;
        if n < i128::from(i64::MIN) || n > i128::from(i64::MAX) {
            return Err(CodecError::Overflow(format!(
                "{} out of range [{}, {}]: {n}",
                self.type_name(),
                i64::MIN,
                i64::MAX
            )));
        }
        Ok(Value::I64(n as i64))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::I64(0));
        let n = expect_i64(&v, self.type_name())?;
        Ok(serde_json::Value::String(n.to_string()))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        writer.write_i64(expect_i64(value, self.type_name())?);
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::I64(reader.read_i64()?))
    }
}

/// Length-prefixed raw bytes; object form is a hex string.
pub struct BytesCodec;

impl Codec for BytesCodec {
    fn type_name(&self) -> &str {
        "bytes"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value
            .unwrap()
            .as_str()
            .ok_or_else(|| CodecError::Format("bytes: expected a hex string".to_owned()))?;
        let bytes =
            hex::decode(s).map_err(|e| CodecError::Format(format!("bytes: invalid hex: {e}")))?;
        Ok(Value::Bytes(bytes))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::Bytes(Vec::new()));
        match v {
            Value::Bytes(b) => Ok(serde_json::Value::String(hex::encode(b))),
            other => Err(CodecError::Format(format!(
                "bytes: internal value {other:?} is not bytes"
            ))),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::Bytes(b) => {
                writer.write_block(b);
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "bytes: internal value {other:?} is not bytes"
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::Bytes(reader.read_block()?))
    }
}

/// Length-prefixed UTF-8 text. Empty string is allowed.
pub struct StringCodec;

impl Codec for StringCodec {
    fn type_name(&self) -> &str {
        "string"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value
            .unwrap()
            .as_str()
            .ok_or_else(|| CodecError::Format("string: expected a string".to_owned()))?;
        Ok(Value::String(s.to_owned()))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::String(String::new()));
        match v {
            Value::String(s) => Ok(serde_json::Value::String(s)),
            other => Err(CodecError::Format(format!(
                "string: internal value {other:?} is not a string"
            ))),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) => {
                writer.write_string(s);
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "string: internal value {other:?} is not a string"
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::String(reader.read_string()?))
    }
}

/// Exactly `n` bytes on the wire, no length prefix; object form is a hex
/// string of length `2n`.
pub struct FixedBytesCodec {
    name: String,
    n: usize,
}

impl FixedBytesCodec {
    pub fn new(n: usize) -> Self {
        Self {
            name: format!("fixed_bytes{n}"),
            n,
        }
    }
}

impl Codec for FixedBytesCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value.unwrap().as_str().ok_or_else(|| {
            CodecError::Format(format!("{}: expected a hex string", self.type_name()))
        })?;
        let bytes = hex::decode(s)
            .map_err(|e| CodecError::Format(format!("{}: invalid hex: {e}", self.type_name())))?;
        if bytes.len() != self.n {
            return Err(CodecError::LengthMismatch(format!(
                "{} length {} does not equal {}",
                self.type_name(),
                bytes.len(),
                self.n
            )));
        }
        Ok(Value::Bytes(bytes))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::Bytes(vec![0; self.n]));
        match v {
            Value::Bytes(b) => Ok(serde_json::Value::String(hex::encode(b))),
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not bytes",
                self.type_name()
            ))),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::Bytes(b) if b.len() == self.n => {
                writer.append(b, crate::cursor::BlockEncoding::Raw);
                Ok(())
            }
            other => Err(CodecError::LengthMismatch(format!(
                "{}: cannot encode {other:?}",
                self.type_name()
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::Bytes(reader.read_bytes(self.n)?))
    }
}

/// Up to `n` UTF-8 bytes, zero-padded to `n` on the wire.
pub struct FixedStringCodec {
    name: String,
    n: usize,
}

impl FixedStringCodec {
    pub fn new(n: usize) -> Self {
        Self {
            name: format!("fixed_string{n}"),
            n,
        }
    }
}

impl Codec for FixedStringCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let s = value
            .unwrap()
            .as_str()
            .ok_or_else(|| CodecError::Format(format!("{}: expected a string", self.type_name())))?;
        if s.len() > self.n {
            return Err(CodecError::LengthMismatch(format!(
                "{} exceeds maxLen {}",
                self.type_name(),
                self.n
            )));
        }
        Ok(Value::String(s.to_owned()))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::String(String::new()));
        match v {
            Value::String(s) => Ok(serde_json::Value::String(s)),
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not a string",
                self.type_name()
            ))),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::String(s) => {
                let mut padded = vec![0u8; self.n];
                padded[..s.len()].copy_from_slice(s.as_bytes());
                writer.append(&padded, crate::cursor::BlockEncoding::Raw);
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not a string",
                self.type_name()
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        let bytes = reader.read_bytes(self.n)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let s = String::from_utf8(bytes[..end].to_vec())
            .map_err(|e| CodecError::Format(format!("{}: invalid utf-8: {e}", self.type_name())))?;
        Ok(Value::String(s))
    }
}

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// 2106-02-07T06:28:16Z, the first instant a 32-bit unsigned second counter
/// can't represent.
const TIME_OVERFLOW_SECONDS: i64 = 1 << 32;

fn seconds_from_json(value: &serde_json::Value, type_name: &str) -> CodecResult<i64> {
    match value {
        serde_json::Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| CodecError::Format(format!("{type_name}: not an integer")))?;
            Ok(millis.div_euclid(1000))
        }
        serde_json::Value::String(s) => {
            let trimmed = s.strip_suffix('Z').unwrap_or(s);
            let parsed = NaiveDateTime::parse_from_str(trimmed, TIME_FORMAT)
                .map_err(|e| CodecError::Format(format!("{type_name}: {e}")))?;
            Ok(Utc.from_utc_datetime(&parsed).timestamp())
        }
        serde_json::Value::Object(obj) => {
            let seconds = obj
                .get("seconds")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| {
                    CodecError::Format(format!(
                        "{type_name}: object form must have an integer `seconds` field"
                    ))
                })?;
            Ok(seconds)
        }
        other => Err(CodecError::Format(format!(
            "{type_name}: unsupported value {other}"
        ))),
    }
}

/// 32-bit unsigned seconds-since-epoch on the wire.
pub struct TimeCodec;

impl Codec for TimeCodec {
    fn type_name(&self) -> &str {
        "time"
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let seconds = seconds_from_json(value.unwrap(), self.type_name())?;
        if seconds < 0 {
            return Err(CodecError::Format(format!(
                "{}: {seconds} is before 1970-01-01T00:00:00",
                self.type_name()
            )));
        }
        if seconds >= TIME_OVERFLOW_SECONDS {
            return Err(CodecError::Overflow(format!(
                "{}: {seconds} is at or after 2106-02-07T06:28:16",
                self.type_name()
            )));
        }
        Ok(Value::U64(seconds as u64))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::U64(0));
        let seconds = match v {
            Value::U64(n) => n,
            other => {
                return Err(CodecError::Format(format!(
                    "time: internal value {other:?} is not a timestamp"
                )))
            }
        };
        let dt = chrono::DateTime::<Utc>::from_timestamp(seconds as i64, 0)
            .ok_or_else(|| CodecError::Overflow(format!("time: {seconds} out of range")))?;
        Ok(serde_json::Value::String(
            dt.naive_utc().format(TIME_FORMAT).to_string(),
        ))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::U64(n) => {
                writer.write_u32(*n as u32);
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "time: internal value {other:?} is not a timestamp"
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        Ok(Value::U64(u64::from(reader.read_u32()?)))
    }
}

/// One byte flag, then the inner encoding iff the flag is 1.
/// Absent/`null` map to `Value::Null`, reused as the generic
/// "nothing here" sentinel.
pub struct OptionalCodec {
    name: String,
    inner: Arc<dyn Codec>,
}

impl OptionalCodec {
    pub fn new(inner: Arc<dyn Codec>) -> Self {
        Self {
            name: format!("{}?", inner.type_name()),
            inner,
        }
    }
}

impl Codec for OptionalCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        false
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Ok(Value::Null);
        }
        self.inner.from_object(value)
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        match value {
            None | Some(Value::Null) => Ok(serde_json::Value::Null),
            Some(other) => self.inner.to_object(Some(other), config),
        }
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                writer.write_u8(0);
                Ok(())
            }
            other => {
                writer.write_u8(1);
                self.inner.append_bytes(writer, other)
            }
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        if reader.read_u8()? == 0 {
            Ok(Value::Null)
        } else {
            self.inner.from_bytes(reader)
        }
    }
}

/// Length-prefixed (varuint32) homogeneous sequence.
pub struct VectorCodec {
    name: String,
    inner: Arc<dyn Codec>,
    sorted: bool,
}

impl VectorCodec {
    pub fn new(inner: Arc<dyn Codec>, sorted: bool) -> Self {
        let name = if sorted {
            format!("sorted_vector[{}]", inner.type_name())
        } else {
            format!("vector[{}]", inner.type_name())
        };
        Self {
            name,
            inner,
            sorted,
        }
    }
}

impl Codec for VectorCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let arr = value
            .unwrap()
            .as_array()
            .ok_or_else(|| CodecError::Format(format!("{}: expected an array", self.type_name())))?;
        let mut items = arr
            .iter()
            .map(|item| self.inner.from_object(Some(item)))
            .collect::<CodecResult<Vec<_>>>()?;
        if self.sorted {
            items.sort_by(Value::natural_cmp);
        }
        Ok(Value::Vector(items))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::Vector(Vec::new()));
        let items = match v {
            Value::Vector(items) => items,
            other => {
                return Err(CodecError::Format(format!(
                    "{}: internal value {other:?} is not a vector",
                    self.type_name()
                )))
            }
        };
        let out = items
            .iter()
            .map(|item| self.inner.to_object(Some(item), config))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(serde_json::Value::Array(out))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        let items = value.as_vector().ok_or_else(|| {
            CodecError::Format(format!(
                "{}: internal value {value:?} is not a vector",
                self.type_name()
            ))
        })?;
        writer.write_varuint32(items.len() as u32);
        for item in items {
            self.inner.append_bytes(writer, item)?;
        }
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        let len = reader.read_varuint32()? as usize;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.inner.from_bytes(reader)?);
        }
        Ok(Value::Vector(items))
    }
}

/// As `vector`, but `fromObject` rejects duplicate canonical elements.
pub struct SetCodec {
    name: String,
    inner: Arc<dyn Codec>,
}

impl SetCodec {
    pub fn new(inner: Arc<dyn Codec>) -> Self {
        Self {
            name: format!("set[{}]", inner.type_name()),
            inner,
        }
    }
}

impl Codec for SetCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        let arr = value
            .unwrap()
            .as_array()
            .ok_or_else(|| CodecError::Format(format!("{}: expected an array", self.type_name())))?;
        let mut seen = std::collections::HashSet::new();
        let mut items = Vec::with_capacity(arr.len());
        for item in arr {
            let v = self.inner.from_object(Some(item))?;
            if !seen.insert(v.clone()) {
                return Err(CodecError::DuplicateElement(format!("{v:?}")));
            }
            items.push(v);
        }
        Ok(Value::Vector(items))
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::Vector(Vec::new()));
        let items = match v {
            Value::Vector(items) => items,
            other => {
                return Err(CodecError::Format(format!(
                    "{}: internal value {other:?} is not a set",
                    self.type_name()
                )))
            }
        };
        let out = items
            .iter()
            .map(|item| self.inner.to_object(Some(item), config))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(serde_json::Value::Array(out))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        let items = value.as_vector().ok_or_else(|| {
            CodecError::Format(format!(
                "{}: internal value {value:?} is not a set",
                self.type_name()
            ))
        })?;
        writer.write_varuint32(items.len() as u32);
        for item in items {
            self.inner.append_bytes(writer, item)?;
        }
        Ok(())
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        let len = reader.read_varuint32()? as usize;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.inner.from_bytes(reader)?);
        }
        Ok(Value::Vector(items))
    }
}

/// Length-prefixed sequence of (key, value) pairs. Object form
/// accepts either a JSON object (string keys) or an array of two-element
/// arrays (any key type).
pub struct MapCodec {
    name: String,
    key: Arc<dyn Codec>,
    value: Arc<dyn Codec>,
}

impl MapCodec {
    pub fn new(key: Arc<dyn Codec>, value: Arc<dyn Codec>) -> Self {
        let name = format!("map[{}, {}]", key.type_name(), value.type_name());
        Self { name, key, value }
    }
}

impl Codec for MapCodec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> bool {
        true
    }

    fn from_object(&self, value: Option<&serde_json::Value>) -> CodecResult<Value> {
        if is_absent(value) {
            return Err(required_error(self.type_name()));
        }
        match value.unwrap() {
            serde_json::Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| {
                    let key = self
                        .key
                        .from_object(Some(&serde_json::Value::String(k.clone())))?;
                    let val = self.value.from_object(Some(v))?;
                    Ok((key, val))
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Map),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|pair| {
                    let pair = pair.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                        CodecError::Format(format!(
                            "{}: expected a two-element [key, value] pair",
                            self.type_name()
                        ))
                    })?;
                    let key = self.key.from_object(Some(&pair[0]))?;
                    let val = self.value.from_object(Some(&pair[1]))?;
                    Ok((key, val))
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Map),
            other => Err(CodecError::Format(format!(
                "{}: expected an object or an array of pairs, got {other}",
                self.type_name()
            ))),
        }
    }

    fn to_object(
        &self,
        value: Option<&Value>,
        config: &ToObjectConfig,
    ) -> CodecResult<serde_json::Value> {
        let v = default_value(value, config, Value::Map(Vec::new()));
        let pairs = match v {
            Value::Map(pairs) => pairs,
            other => {
                return Err(CodecError::Format(format!(
                    "{}: internal value {other:?} is not a map",
                    self.type_name()
                )))
            }
        };
        let out = pairs
            .iter()
            .map(|(k, val)| {
                Ok(serde_json::Value::Array(vec![
                    self.key.to_object(Some(k), config)?,
                    self.value.to_object(Some(val), config)?,
                ]))
            })
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(serde_json::Value::Array(out))
    }

    fn append_bytes(&self, writer: &mut ByteWriter, value: &Value) -> CodecResult<()> {
        match value {
            Value::Map(pairs) => {
                writer.write_varuint32(pairs.len() as u32);
                for (k, v) in pairs {
                    self.key.append_bytes(writer, k)?;
                    self.value.append_bytes(writer, v)?;
                }
                Ok(())
            }
            other => Err(CodecError::Format(format!(
                "{}: internal value {other:?} is not a map",
                self.type_name()
            ))),
        }
    }

    fn from_bytes(&self, reader: &mut ByteReader) -> CodecResult<Value> {
        let len = reader.read_varuint32()? as usize;
        let mut pairs = Vec::with_capacity(len);
        for _ in 0..len {
            let k = self.key.from_bytes(reader)?;
            let v = self.value.from_bytes(reader)?;
            pairs.push((k, v));
        }
        Ok(Value::Map(pairs))
    }
}

/// Constructs the codec for a built-in primitive name, or `None` if `name`
/// doesn't identify one. `fixed_bytesN`/`fixed_stringN` are
/// parsed out of the trailing digits.
pub fn build_primitive(name: &str) -> Option<Arc<dyn Codec>> {
    let codec: Arc<dyn Codec> = match name {
        "uint8" => Arc::new(UInt8Codec),
        "uint16" => Arc::new(UInt16Codec),
        "uint32" => Arc::new(UInt32Codec),
        "uint64" => Arc::new(UInt64Codec),
        "int8" => Arc::new(Int8Codec),
        "int16" => Arc::new(Int16Codec),
        "int32" => Arc::new(Int32Codec),
        "int64" => Arc::new(Int64Codec),
        "varuint32" => Arc::new(VarUInt32Codec),
        "varint32" => Arc::new(VarInt32Codec),
        "bytes" => Arc::new(BytesCodec),
        "string" => Arc::new(StringCodec),
        "time" => Arc::new(TimeCodec),
        _ => {
            if let Some(n) = name.strip_prefix("fixed_bytes") {
                let n: usize = n.parse().ok()?;
                Arc::new(FixedBytesCodec::new(n))
            } else if let Some(n) = name.strip_prefix("fixed_string") {
                let n: usize = n.parse().ok()?;
                Arc::new(FixedStringCodec::new(n))
            } else {
                return None;
            }
        }
    };
    Some(codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(codec: &dyn Codec, json: serde_json::Value) {
        let internal = codec.from_object(Some(&json)).unwrap();
        let back = codec
            .to_object(Some(&internal), &ToObjectConfig::default())
            .unwrap();
        assert_eq!(back, json);
        let mut w = ByteWriter::new();
        codec.append_bytes(&mut w, &internal).unwrap();
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let decoded = codec.from_bytes(&mut r).unwrap();
        assert_eq!(decoded, internal);
    }

    #[test]
    fn uint8_roundtrip_and_bounds() {
        roundtrip(&UInt8Codec, serde_json::json!(255));
        assert!(matches!(
            UInt8Codec.from_object(Some(&serde_json::json!(256))),
            Err(CodecError::Overflow(_))
        ));
        assert!(matches!(
            UInt8Codec.from_object(Some(&serde_json::json!(-1))),
            Err(CodecError::Format(_))
        ));
    }

    #[test]
    fn uint64_decimal_string_roundtrip() {
        roundtrip(&UInt64Codec, serde_json::json!("18446744073709551615"));
        assert!(matches!(
            UInt64Codec.from_object(Some(&serde_json::json!("18446744073709551616"))),
            Err(CodecError::Overflow(_))
        ));
    }

    #[test]
    fn int64_bounds_roundtrip() {
        roundtrip(&Int64Codec, serde_json::json!("-9223372036854775808"));
        roundtrip(&Int64Codec, serde_json::json!("9223372036854775807"));
        assert!(matches!(
            Int64Codec.from_object(Some(&serde_json::json!("-9223372036854775809"))),
            Err(CodecError::Overflow(_))
        ));
        assert!(matches!(
            Int64Codec.from_object(Some(&serde_json::json!("9223372036854775808"))),
            Err(CodecError::Overflow(_))
        ));
    }

    #[test]
    fn bytes_hex_roundtrip() {
        roundtrip(&BytesCodec, serde_json::json!("00aaeeff"));
    }

    #[test]
    fn fixed_bytes_length_mismatch() {
        let codec = FixedBytesCodec::new(16);
        roundtrip(&codec, serde_json::json!("ff".repeat(16)));
        let err = codec
            .from_object(Some(&serde_json::json!("ff".repeat(17))))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "fixed_bytes16 length 17 does not equal 16"
        );
    }

    #[test]
    fn fixed_string_exceeds_maxlen() {
        let codec = FixedStringCodec::new(4);
        roundtrip(&codec, serde_json::json!("abcd"));
        let err = codec
            .from_object(Some(&serde_json::json!("abcde")))
            .unwrap_err();
        assert_eq!(err.to_string(), "fixed_string4 exceeds maxLen 4");
    }

    #[test]
    fn time_roundtrip_and_edges() {
        roundtrip(&TimeCodec, serde_json::json!("2106-02-07T06:28:15"));
        assert!(matches!(
            TimeCodec.from_object(Some(&serde_json::json!("2106-02-07T06:28:16Z"))),
            Err(CodecError::Overflow(_))
        ));
        assert!(matches!(
            TimeCodec.from_object(Some(&serde_json::json!("1969-12-31T23:59:59Z"))),
            Err(CodecError::Format(_))
        ));
    }

    #[test]
    fn optional_roundtrips_null_and_value() {
        let codec = OptionalCodec::new(Arc::new(UInt8Codec));
        assert!(!codec.required());
        roundtrip(&codec, serde_json::Value::Null);
        roundtrip(&codec, serde_json::json!(42));
    }

    #[test]
    fn sorted_vector_reorders_on_from_object() {
        let codec = VectorCodec::new(Arc::new(UInt8Codec), true);
        let v = codec
            .from_object(Some(&serde_json::json!([3, 1, 2])))
            .unwrap();
        assert_eq!(
            v,
            Value::Vector(vec![Value::I64(1), Value::I64(2), Value::I64(3)])
        );
    }

    #[test]
    fn unsorted_vector_preserves_order_and_duplicates() {
        let codec = VectorCodec::new(Arc::new(UInt8Codec), false);
        let v = codec
            .from_object(Some(&serde_json::json!([3, 1, 1, 2])))
            .unwrap();
        assert_eq!(
            v,
            Value::Vector(vec![
                Value::I64(3),
                Value::I64(1),
                Value::I64(1),
                Value::I64(2)
            ])
        );
    }

    #[test]
    fn set_rejects_duplicates() {
        let codec = SetCodec::new(Arc::new(UInt8Codec));
        assert!(codec
            .from_object(Some(&serde_json::json!([1, 2, 1])))
            .is_err());
        assert!(codec
            .from_object(Some(&serde_json::json!([1, 2, 3])))
            .is_ok());
    }

    #[test]
    fn map_roundtrips_through_array_of_pairs() {
        let codec = MapCodec::new(Arc::new(StringCodec), Arc::new(UInt8Codec));
        let json = serde_json::json!([["a", 1], ["b", 2]]);
        roundtrip(&codec, json);
    }
}
