use std::cmp::Ordering;
use std::fmt;

use crate::error::SmallError;

/// Maximum payload length of a STRING field, in bytes. The on-disk
/// encoding is a 4-byte big-endian length prefix followed by this many
/// bytes, zero-padded, for a fixed total width of `STRING_WIDTH`.
pub const STRING_MAX_LEN: usize = 128;
pub const INT_WIDTH: usize = 4;
pub const STRING_WIDTH: usize = 4 + STRING_MAX_LEN;

/// The tagged field type that every column of a schema is declared as.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    /// Fixed byte width of a field of this type, as laid out in a page.
    pub fn width(&self) -> usize {
        match self {
            Type::Int => INT_WIDTH,
            Type::Str => STRING_WIDTH,
        }
    }

    pub fn parse(s: &str) -> Result<Type, SmallError> {
        match s.to_ascii_lowercase().as_str() {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::Str),
            other => Err(SmallError::db_exception(format!(
                "unknown field type: {}",
                other
            ))),
        }
    }

    /// Parse a field's on-disk encoding into a value.
    pub fn parse_field(&self, bytes: &[u8]) -> Field {
        match self {
            Type::Int => {
                let mut buf = [0u8; INT_WIDTH];
                buf.copy_from_slice(&bytes[..INT_WIDTH]);
                Field::Int(i32::from_be_bytes(buf))
            }
            Type::Str => {
                let mut len_buf = [0u8; 4];
                len_buf.copy_from_slice(&bytes[..4]);
                let len = u32::from_be_bytes(len_buf) as usize;
                let payload = &bytes[4..4 + STRING_MAX_LEN];
                let s = String::from_utf8_lossy(&payload[..len]).into_owned();
                Field::Str(s)
            }
        }
    }
}

/// A tagged value: either a 32-bit signed integer, or a fixed-width
/// character string of at most [`STRING_MAX_LEN`] bytes. Fields support
/// total ordering and equality.
#[derive(Clone, Debug)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    /// Encode to the fixed-width on-disk representation for this field's
    /// type: INT as 4-byte big-endian, STRING as a 4-byte big-endian
    /// length prefix followed by 128 zero-padded bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Field::Int(v) => v.to_be_bytes().to_vec(),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_MAX_LEN);
                let mut out = Vec::with_capacity(STRING_WIDTH);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.resize(STRING_WIDTH, 0);
                out
            }
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => a == b,
            (Field::Str(a), Field::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Field {}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => a.partial_cmp(b),
            (Field::Str(a), Field::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .expect("comparing fields of different types")
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}
