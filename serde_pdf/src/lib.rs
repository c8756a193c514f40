//! PDF object syntax: the value model shared by readers and writers, a parser for reading objects
//! out of existing documents, and a serde serializer for writing them.

#[cfg(test)]
#[macro_use]
extern crate serde_derive;

mod de;
mod error;
mod name;
mod object;
mod ser;
mod stream;
mod string;
mod value;

pub use crate::de::{find, from_slice, is_delimiter, is_whitespace, rfind, Parser};
pub use crate::error::{Error, Result};
pub use crate::name::Name;
pub use crate::object::{Object, ObjectId, Reference};
pub use crate::ser::{datetime, to_string, to_vec, to_writer};
pub use crate::stream::Stream;
pub use crate::string::PdfString;
pub use crate::value::{Dictionary, Value};
