use crate::ser::Raw;
use serde::{Serialize, Serializer};

/// A PDF string object. Strings are byte sequences; their encoding is up to whoever interprets
/// them, so they are kept as raw bytes and written back in the syntax they were read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfString {
    Hex(Vec<u8>),
    Literal(Vec<u8>),
}

impl PdfString {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PdfString::Hex(b) | PdfString::Literal(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            PdfString::Hex(b) | PdfString::Literal(b) => b,
        }
    }
}

impl Serialize for PdfString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match self {
            PdfString::Hex(ref s) => to_hex(s),
            PdfString::Literal(ref s) => to_literal(s),
        };
        Raw(&s).serialize(serializer)
    }
}

fn to_hex(s: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    let mut buf = Vec::with_capacity(s.len() * 2 + 2);
    buf.push(b'<');
    for ch in s {
        buf.push(DIGITS[usize::from(ch >> 4)]);
        buf.push(DIGITS[usize::from(ch & 0x0F)]);
    }
    buf.push(b'>');
    buf
}

fn to_literal(s: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 2);
    buf.push(b'(');
    for &ch in s {
        match ch {
            b'\\' | b'(' | b')' => {
                buf.push(b'\\');
                buf.push(ch);
            }
            // a bare CR would be normalized to LF by readers
            b'\r' => buf.extend_from_slice(br"\r"),
            _ => buf.push(ch),
        }
    }
    buf.push(b')');
    buf
}
