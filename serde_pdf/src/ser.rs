use std::io;

use serde::ser::{self, Impossible, Serialize};
use serde_bytes::Bytes;

pub mod datetime;
mod token;

use crate::error::{Error, Result};
use crate::name::needs_escape;
use token::{Token, TokenSerializer};

pub(crate) const NAME_STREAM: &str = "$__pdf_stream";
pub(crate) const NAME_OBJECT: &str = "$__pdf_object";
pub(crate) const NAME_REFERENCE: &str = "$__pdf_reference";
pub(crate) const NAME_RAW: &str = "$__pdf_raw";
pub(crate) const NAME_NAME: &str = "$__pdf_name";

/// Bytes that are already valid PDF syntax and are written as they are.
pub(crate) struct Raw<'a>(pub(crate) &'a [u8]);

impl<'a> Serialize for Raw<'a> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_newtype_struct(NAME_RAW, Bytes::new(self.0))
    }
}

/// Writes PDF object syntax.
///
/// Maps and structs both become single-line dictionaries (`<< /Key value >>`). A struct also gets
/// a `/Type` entry named after it, unless it is renamed to `""`. Rust strings and unit variants
/// are written as names, sequences and tuples as arrays, and plain byte slices as hex strings.
pub struct Serializer<W> {
    output: W,
}

pub fn to_writer<W, T>(w: W, value: &T) -> Result<()>
where
    W: io::Write,
    T: ?Sized + Serialize,
{
    let mut ser = Serializer::new(w);
    value.serialize(&mut ser)
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    let mut ser = Serializer::new(Vec::new());
    value.serialize(&mut ser)?;
    Ok(ser.into_inner())
}

/// Like [`to_vec`]; bytes that are not valid UTF-8 (stream payloads, mostly) are replaced.
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: ?Sized + Serialize,
{
    let out = to_vec(value)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

impl<W> Serializer<W>
where
    W: io::Write,
{
    pub fn new(output: W) -> Self {
        Serializer { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn write(&mut self, s: &[u8]) -> Result<()> {
        self.output.write_all(s)?;
        Ok(())
    }

    fn write_name(&mut self, name: &[u8]) -> Result<()> {
        self.write(b"/")?;
        let mut from = 0;
        for (i, &ch) in name.iter().enumerate() {
            if needs_escape(ch) {
                self.write(&name[from..i])?;
                write!(self.output, "#{:02x}", ch)?;
                from = i + 1;
            }
        }
        self.write(&name[from..])
    }

    fn write_hex(&mut self, data: &[u8]) -> Result<()> {
        self.write(b"<")?;
        for ch in data {
            write!(self.output, "{:02X}", ch)?;
        }
        self.write(b">")
    }

    fn token(&mut self, token: Token) -> TokenSerializer<'_, W> {
        TokenSerializer::new(self, token)
    }
}

impl<'a, W> ser::Serializer for &'a mut Serializer<W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Array<'a, W>;
    type SerializeTuple = Array<'a, W>;
    type SerializeTupleStruct = Framed<'a, W>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Dict<'a, W>;
    type SerializeStruct = Dict<'a, W>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.write(if v { b"true" } else { b"false" })
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        write!(self.output, "{}", v)?;
        Ok(())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        write!(self.output, "{}", v)?;
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        // PDF has no syntax for NaN or infinities
        let v = if v.is_finite() { v } else { 0.0 };
        write!(self.output, "{}", v)?;
        Ok(())
    }

    fn serialize_char(self, _v: char) -> Result<()> {
        Err(Error::Unsupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.write_name(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.write_hex(v)
    }

    fn serialize_none(self) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_some<T>(self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.write(b"null")
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.write_name(variant.as_bytes())
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match name {
            NAME_RAW => value.serialize(self.token(Token::Raw)),
            NAME_NAME => value.serialize(self.token(Token::Name)),
            _ => value.serialize(self),
        }
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
        Err(Error::Unsupported("newtype variant"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.write(b"[")?;
        Ok(Array {
            ser: self,
            first: true,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        let frame = match name {
            NAME_STREAM => Frame::Stream,
            NAME_OBJECT => Frame::Object,
            NAME_REFERENCE => Frame::Reference,
            _ => return Ok(Framed::Array(self.serialize_seq(Some(len))?)),
        };
        Ok(Framed::Frame {
            ser: self,
            frame,
            field: 0,
        })
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::Unsupported("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.write(b"<<")?;
        Ok(Dict { ser: self })
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.write(b"<<")?;
        if !name.is_empty() {
            self.write(b" /Type ")?;
            self.write_name(name.as_bytes())?;
        }
        Ok(Dict { ser: self })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::Unsupported("struct variant"))
    }
}

/// `[a b c]`
pub struct Array<'a, W> {
    ser: &'a mut Serializer<W>,
    first: bool,
}

impl<'a, W> Array<'a, W>
where
    W: io::Write,
{
    fn element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        if !std::mem::replace(&mut self.first, false) {
            self.ser.write(b" ")?;
        }
        value.serialize(&mut *self.ser)
    }

    fn close(self) -> Result<()> {
        self.ser.write(b"]")
    }
}

impl<'a, W> ser::SerializeSeq for Array<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, W> ser::SerializeTuple for Array<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

/// `<< /Key value … >>`
pub struct Dict<'a, W> {
    ser: &'a mut Serializer<W>,
}

impl<'a, W> ser::SerializeMap for Dict<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.write(b" ")?;
        key.serialize(self.ser.token(Token::Name))
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.write(b" ")?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write(b" >>")
    }
}

impl<'a, W> ser::SerializeStruct for Dict<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.ser.write(b" ")?;
        self.ser.write_name(key.as_bytes())?;
        self.ser.write(b" ")?;
        value.serialize(&mut *self.ser)
    }

    fn end(self) -> Result<()> {
        self.ser.write(b" >>")
    }
}

/// Tuple structs that frame their fields with keywords instead of brackets.
#[derive(Clone, Copy)]
enum Frame {
    /// `dict` and payload: `<dict>\nstream\n<data>\nendstream\n`
    Stream,
    /// id, generation and content: `<id> <rev> obj\n<content>\nendobj\n\n`
    Object,
    /// id and generation: `<id> <rev> R`
    Reference,
}

impl Frame {
    fn before(self, field: usize) -> &'static [u8] {
        match (self, field) {
            (_, 0) => b"",
            (Frame::Stream, _) => b"\nstream\n",
            (Frame::Object, 1) | (Frame::Reference, _) => b" ",
            (Frame::Object, _) => b" obj\n",
        }
    }

    fn end(self) -> &'static [u8] {
        match self {
            Frame::Stream => b"\nendstream\n",
            Frame::Object => b"\nendobj\n\n",
            Frame::Reference => b" R",
        }
    }
}

pub enum Framed<'a, W> {
    Array(Array<'a, W>),
    Frame {
        ser: &'a mut Serializer<W>,
        frame: Frame,
        field: usize,
    },
}

impl<'a, W> ser::SerializeTupleStruct for Framed<'a, W>
where
    W: io::Write,
{
    type Ok = ();
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match self {
            Framed::Array(array) => array.element(value),
            Framed::Frame { ser, frame, field } => {
                ser.write(frame.before(*field))?;
                *field += 1;
                value.serialize(&mut **ser)
            }
        }
    }

    fn end(self) -> Result<()> {
        match self {
            Framed::Array(array) => array.close(),
            Framed::Frame { ser, frame, .. } => ser.write(frame.end()),
        }
    }
}
