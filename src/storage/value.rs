use super::error::{StorageError, StorageResult};
use super::STRING_LEN;
use std::fmt;

/// The closed set of column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// Serialized size of a field of this type in bytes.
    pub fn size(&self) -> usize {
        match self {
            Type::Int => 4,
            // 4-byte length prefix followed by the fixed payload
            Type::String => 4 + STRING_LEN,
        }
    }

    /// Parse a catalog type name ("int" / "string", case-insensitive).
    pub fn parse(name: &str) -> Option<Type> {
        if name.eq_ignore_ascii_case("int") {
            Some(Type::Int)
        } else if name.eq_ignore_ascii_case("string") {
            Some(Type::String)
        } else {
            None
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
        }
    }
}

/// Comparison operators a predicate can apply between two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

/// A single column value. Fields are plain value objects: comparable,
/// hashable, and serializable in the fixed on-disk encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn type_of(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::String,
        }
    }

    /// Apply `self op other`. LIKE degrades to equality for integers and is
    /// substring containment for strings.
    pub fn compare(&self, op: Op, other: &Field) -> StorageResult<bool> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Ok(match op {
                Op::Equals | Op::Like => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
            }),
            (Field::Str(a), Field::Str(b)) => Ok(match op {
                Op::Equals => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::Like => a.contains(b.as_str()),
            }),
            _ => Err(StorageError::TypeMismatch {
                expected: self.type_of().to_string(),
                actual: other.type_of().to_string(),
            }),
        }
    }

    /// Append the fixed-width encoding of this field to `out`.
    ///
    /// INT is 4 bytes big-endian two's complement. STRING is a 4-byte
    /// big-endian length followed by exactly `STRING_LEN` bytes, zero-padded;
    /// payloads longer than `STRING_LEN` are truncated.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.extend(std::iter::repeat(0u8).take(STRING_LEN - len));
            }
        }
    }

    /// Decode one field of type `ty` from the front of `data`. `data` must
    /// hold at least `ty.size()` bytes.
    pub fn deserialize(ty: Type, data: &[u8]) -> StorageResult<Field> {
        if data.len() < ty.size() {
            return Err(StorageError::InvalidPageData(format!(
                "need {} bytes for a {} field, got {}",
                ty.size(),
                ty,
                data.len()
            )));
        }
        match ty {
            Type::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&data[..4]);
                Ok(Field::Int(i32::from_be_bytes(buf)))
            }
            Type::String => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&data[..4]);
                let len = (u32::from_be_bytes(buf) as usize).min(STRING_LEN);
                let payload = &data[4..4 + len];
                let s = std::str::from_utf8(payload).map_err(|e| {
                    StorageError::InvalidPageData(format!("invalid UTF-8 in string field: {}", e))
                })?;
                Ok(Field::Str(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}
