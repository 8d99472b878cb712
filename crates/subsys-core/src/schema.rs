//! Declarative record schema parsing: a comma-separated list of
//! field-type tokens becomes a little-endian pack/unpack descriptor.

use crate::error::SchemaError;

/// Default width, in bytes, of a bare `string` token (no explicit `_N`).
const DEFAULT_STRING_WIDTH: usize = 256;

/// One field of a record, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    /// Fixed-width UTF-8 field, `N` bytes wide, zero-padded.
    StringN(usize),
}

impl FieldType {
    /// Byte width of this field on the wire.
    pub fn size(&self) -> usize {
        match self {
            FieldType::Bool | FieldType::Char | FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float => 4,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Double => 8,
            FieldType::StringN(n) => *n,
        }
    }

    fn parse_token(token: &str) -> Result<Self, SchemaError> {
        let token = token.trim();
        Ok(match token {
            "bool" => FieldType::Bool,
            "char" => FieldType::Char,
            "int8" => FieldType::Int8,
            "uint8" => FieldType::UInt8,
            "int16" => FieldType::Int16,
            "uint16" => FieldType::UInt16,
            "int32" => FieldType::Int32,
            "uint32" => FieldType::UInt32,
            "int64" => FieldType::Int64,
            "uint64" => FieldType::UInt64,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "string" => FieldType::StringN(DEFAULT_STRING_WIDTH),
            other if other.starts_with("string_") => {
                let width = other["string_".len()..]
                    .parse::<usize>()
                    .map_err(|_| SchemaError::InvalidStringWidth(other.to_string()))?;
                if width == 0 {
                    return Err(SchemaError::InvalidStringWidth(other.to_string()));
                }
                FieldType::StringN(width)
            }
            other => return Err(SchemaError::UnknownToken(other.to_string())),
        })
    }
}

/// A parsed, ready-to-use record layout: one [`FieldType`] per field plus
/// the byte offset at which that field begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    fields: Vec<FieldType>,
    offsets: Vec<usize>,
    total_size: usize,
}

impl RecordDescriptor {
    /// Parses a comma-separated schema string, e.g. `"uint64,float,float"`.
    pub fn parse(schema: &str) -> Result<Self, SchemaError> {
        let tokens: Vec<&str> = schema.split(',').map(str::trim).collect();
        if tokens.is_empty() || tokens.iter().all(|t| t.is_empty()) {
            return Err(SchemaError::Empty);
        }
        let mut fields = Vec::with_capacity(tokens.len());
        let mut offsets = Vec::with_capacity(tokens.len());
        let mut offset = 0usize;
        for token in tokens {
            let field = FieldType::parse_token(token)?;
            offsets.push(offset);
            offset += field.size();
            fields.push(field);
        }
        Ok(RecordDescriptor {
            fields,
            offsets,
            total_size: offset,
        })
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Total record size in bytes (`size_of`).
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}

/// One decoded field value. Numeric variants keep their native width so
/// CSV encoding can distinguish numeric from textual fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Char(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl FieldValue {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, FieldValue::Str(_) | FieldValue::Char(_))
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Char(v) => write!(f, "{v}"),
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::Int16(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::Str(v) => write!(f, "{v}"),
        }
    }
}

/// One record: an ordered tuple of field values matching a [`RecordDescriptor`].
pub type Record = Vec<FieldValue>;

/// Packs a record into its little-endian wire representation.
///
/// Panics if `record.len() != descriptor.fields().len()` or a value's
/// variant doesn't match the declared field type — both are caller bugs,
/// not recoverable runtime conditions, since the descriptor and the
/// record are meant to be produced together by the same pipe.
pub fn pack(descriptor: &RecordDescriptor, record: &Record) -> Vec<u8> {
    assert_eq!(
        record.len(),
        descriptor.fields().len(),
        "record field count must match descriptor"
    );
    let mut buf = vec![0u8; descriptor.total_size()];
    for ((field, value), &offset) in descriptor
        .fields()
        .iter()
        .zip(record.iter())
        .zip(descriptor.offsets())
    {
        write_field(&mut buf[offset..offset + field.size()], *field, value);
    }
    buf
}

fn write_field(slot: &mut [u8], field: FieldType, value: &FieldValue) {
    match (field, value) {
        (FieldType::Bool, FieldValue::Bool(v)) => slot[0] = *v as u8,
        (FieldType::Char, FieldValue::Char(v)) => slot[0] = *v,
        (FieldType::Int8, FieldValue::Int8(v)) => slot[0] = *v as u8,
        (FieldType::UInt8, FieldValue::UInt8(v)) => slot[0] = *v,
        (FieldType::Int16, FieldValue::Int16(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::UInt16, FieldValue::UInt16(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Int32, FieldValue::Int32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::UInt32, FieldValue::UInt32(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Int64, FieldValue::Int64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::UInt64, FieldValue::UInt64(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Float, FieldValue::Float(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Double, FieldValue::Double(v)) => slot.copy_from_slice(&v.to_le_bytes()),
        (FieldType::StringN(n), FieldValue::Str(s)) => {
            let bytes = s.as_bytes();
            let copy_len = bytes.len().min(n.saturating_sub(1));
            slot[..copy_len].copy_from_slice(&bytes[..copy_len]);
            // remaining bytes, including the terminator slot, stay zero.
        }
        (field, value) => panic!("value {value:?} does not match field type {field:?}"),
    }
}

/// Unpacks every record concatenated in `buf` according to `descriptor`.
///
/// Trailing bytes that don't form a whole record are left unconsumed and
/// returned as the leftover slice, so callers (the TCP ingress sink) can
/// prepend them to the next read.
pub fn unpack_all<'a>(
    descriptor: &RecordDescriptor,
    buf: &'a [u8],
) -> (Vec<Record>, &'a [u8]) {
    let size = descriptor.total_size();
    if size == 0 {
        return (Vec::new(), buf);
    }
    let whole = buf.len() / size;
    let mut records = Vec::with_capacity(whole);
    for i in 0..whole {
        records.push(unpack_one(descriptor, &buf[i * size..(i + 1) * size]));
    }
    (records, &buf[whole * size..])
}

fn unpack_one(descriptor: &RecordDescriptor, slot: &[u8]) -> Record {
    descriptor
        .fields()
        .iter()
        .zip(descriptor.offsets())
        .map(|(field, &offset)| read_field(*field, &slot[offset..offset + field.size()]))
        .collect()
}

/// Parses one CSV-decoded field string into its typed value per `field`,
/// used by the MQTT ingress subscriber to turn a parsed CSV row
/// back into a record tuple.
pub fn parse_field(field: FieldType, s: &str) -> Result<FieldValue, SchemaError> {
    let invalid = |field: FieldType| SchemaError::InvalidFieldValue {
        field: format!("{field:?}"),
        value: s.to_string(),
    };
    Ok(match field {
        FieldType::Bool => FieldValue::Bool(s == "1" || s.eq_ignore_ascii_case("true")),
        FieldType::Char => FieldValue::Char(s.bytes().next().ok_or_else(|| invalid(field))?),
        FieldType::Int8 => FieldValue::Int8(s.parse().map_err(|_| invalid(field))?),
        FieldType::UInt8 => FieldValue::UInt8(s.parse().map_err(|_| invalid(field))?),
        FieldType::Int16 => FieldValue::Int16(s.parse().map_err(|_| invalid(field))?),
        FieldType::UInt16 => FieldValue::UInt16(s.parse().map_err(|_| invalid(field))?),
        FieldType::Int32 => FieldValue::Int32(s.parse().map_err(|_| invalid(field))?),
        FieldType::UInt32 => FieldValue::UInt32(s.parse().map_err(|_| invalid(field))?),
        FieldType::Int64 => FieldValue::Int64(s.parse().map_err(|_| invalid(field))?),
        FieldType::UInt64 => FieldValue::UInt64(s.parse().map_err(|_| invalid(field))?),
        FieldType::Float => FieldValue::Float(s.parse().map_err(|_| invalid(field))?),
        FieldType::Double => FieldValue::Double(s.parse().map_err(|_| invalid(field))?),
        FieldType::StringN(_) => FieldValue::Str(s.to_string()),
    })
}

/// Parses one CSV row (already split into fields) into a record,
/// applying [`parse_field`] positionally.
pub fn parse_row(descriptor: &RecordDescriptor, fields: impl Iterator<Item = impl AsRef<str>>) -> Result<Record, SchemaError> {
    descriptor
        .fields()
        .iter()
        .zip(fields)
        .map(|(field, s)| parse_field(*field, s.as_ref()))
        .collect()
}

fn read_field(field: FieldType, bytes: &[u8]) -> FieldValue {
    match field {
        FieldType::Bool => FieldValue::Bool(bytes[0] != 0),
        FieldType::Char => FieldValue::Char(bytes[0]),
        FieldType::Int8 => FieldValue::Int8(bytes[0] as i8),
        FieldType::UInt8 => FieldValue::UInt8(bytes[0]),
        FieldType::Int16 => FieldValue::Int16(i16::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::UInt16 => FieldValue::UInt16(u16::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Int32 => FieldValue::Int32(i32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::UInt32 => FieldValue::UInt32(u32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Int64 => FieldValue::Int64(i64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::UInt64 => FieldValue::UInt64(u64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Float => FieldValue::Float(f32::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::Double => FieldValue::Double(f64::from_le_bytes(bytes.try_into().unwrap())),
        FieldType::StringN(_) => {
            let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            FieldValue::Str(String::from_utf8_lossy(&bytes[..nul]).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_tokens_and_sizes() {
        let d = RecordDescriptor::parse("uint64,float,float,float,float").unwrap();
        assert_eq!(d.total_size(), 8 + 4 * 4);
        assert_eq!(d.fields().len(), 5);
    }

    #[test]
    fn string_token_defaults_to_256() {
        let d = RecordDescriptor::parse("string").unwrap();
        assert_eq!(d.total_size(), 256);
    }

    #[test]
    fn string_n_token_is_explicit_width() {
        let d = RecordDescriptor::parse("string_16").unwrap();
        assert_eq!(d.total_size(), 16);
    }

    #[test]
    fn unknown_token_fails() {
        let err = RecordDescriptor::parse("uint64,bogus").unwrap_err();
        assert_eq!(err, SchemaError::UnknownToken("bogus".into()));
    }

    #[test]
    fn pack_unpack_round_trip() {
        let d = RecordDescriptor::parse("uint64,float,float,string_8").unwrap();
        let record: Record = vec![
            FieldValue::UInt64(42),
            FieldValue::Float(1.5),
            FieldValue::Float(-2.25),
            FieldValue::Str("hi".into()),
        ];
        let packed = pack(&d, &record);
        assert_eq!(packed.len(), d.total_size());
        let (records, rest) = unpack_all(&d, &packed);
        assert!(rest.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record);
    }

    #[test]
    fn parse_row_matches_pack_unpack_values() {
        let d = RecordDescriptor::parse("uint64,float,string_8").unwrap();
        let row = parse_row(&d, ["42", "1.5", "hi"].into_iter()).unwrap();
        assert_eq!(
            row,
            vec![
                FieldValue::UInt64(42),
                FieldValue::Float(1.5),
                FieldValue::Str("hi".into()),
            ]
        );
    }

    #[test]
    fn unpack_all_leaves_partial_trailing_bytes() {
        let d = RecordDescriptor::parse("uint32").unwrap();
        let mut buf = 1u32.to_le_bytes().to_vec();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.push(0xFF); // partial third record
        let (records, rest) = unpack_all(&d, &buf);
        assert_eq!(records.len(), 2);
        assert_eq!(rest, &[0xFF]);
    }
}
