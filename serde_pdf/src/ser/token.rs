use std::io;

use serde::ser::{self, Impossible, Serialize};

use super::Serializer;
use crate::error::{Error, Result};

/// What a single token written by [`TokenSerializer`] stands for.
#[derive(Clone, Copy, PartialEq)]
pub(crate) enum Token {
    /// Pre-rendered syntax, copied as is.
    Raw,
    /// A name (dictionary keys and name values), escaped and prefixed with `/`.
    Name,
}

/// Accepts exactly one string or byte slice and writes it as a raw token or a name.
///
/// Map keys go through here too, which is why numbers are accepted as names.
pub(crate) struct TokenSerializer<'a, W> {
    ser: &'a mut Serializer<W>,
    token: Token,
}

impl<'a, W> TokenSerializer<'a, W>
where
    W: io::Write,
{
    pub(crate) fn new(ser: &'a mut Serializer<W>, token: Token) -> Self {
        TokenSerializer { ser, token }
    }

    fn emit(self, bytes: &[u8]) -> Result<()> {
        match self.token {
            Token::Raw => self.ser.write(bytes),
            Token::Name => self.ser.write_name(bytes),
        }
    }

    fn number<N: ToString>(self, n: N) -> Result<()> {
        match self.token {
            Token::Name => self.emit(n.to_string().as_bytes()),
            Token::Raw => Err(self.mismatch()),
        }
    }

    fn mismatch(&self) -> Error {
        match self.token {
            Token::Raw => Error::ExpectedRaw,
            Token::Name => Error::ExpectedName,
        }
    }

    fn reject<T>(self) -> Result<T> {
        Err(self.mismatch())
    }
}

impl<'a, W> ser::Serializer for TokenSerializer<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_str(self, v: &str) -> Result<()> {
        self.emit(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.emit(v)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.emit(variant.as_bytes())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.number(v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.number(v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.number(v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.number(v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.number(v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.number(v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.number(v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.number(v)
    }

    fn serialize_bool(self, _v: bool) -> Result<()> {
        self.reject()
    }

    fn serialize_f32(self, _v: f32) -> Result<()> {
        self.reject()
    }

    fn serialize_f64(self, _v: f64) -> Result<()> {
        self.reject()
    }

    fn serialize_char(self, _v: char) -> Result<()> {
        self.reject()
    }

    fn serialize_none(self) -> Result<()> {
        self.reject()
    }

    fn serialize_some<T>(self, _value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.reject()
    }

    fn serialize_unit(self) -> Result<()> {
        self.reject()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.reject()
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.reject()
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.reject()
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        self.reject()
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.reject()
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        self.reject()
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.reject()
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.reject()
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        self.reject()
    }
}

#[cfg(test)]
mod test {
    use crate::ser::{to_string, Raw};
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn raw_bytes_are_copied() {
        assert_eq!(to_string(&Raw(b"(D:2020)")).unwrap(), "(D:2020)");
    }

    #[test]
    fn numeric_map_keys_become_names() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(1u32, "a");
        assert_eq!(to_string(&map).unwrap(), "<< /1 /a >>");
    }

    #[test]
    fn raw_rejects_non_text() {
        struct NotRaw;
        impl serde::Serialize for NotRaw {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_newtype_struct(crate::ser::NAME_RAW, &1u32)
            }
        }
        assert_eq!(to_string(&NotRaw), Err(Error::ExpectedRaw));
    }
}
