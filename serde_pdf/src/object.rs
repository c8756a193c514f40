use std::fmt;
use std::marker::PhantomData;

use crate::ser::{NAME_OBJECT, NAME_REFERENCE};
use serde::{ser::SerializeTupleStruct, Serialize, Serializer};

/// The `(number, generation)` pair addressing an indirect object.
///
/// An id is only meaningful relative to the object table it was read from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    id: u32,
    rev: u16,
}

/// An indirect object, serialized as `<id> <rev> obj … endobj`.
pub struct Object<D = ()>
where
    D: Serialize,
{
    id: ObjectId,
    content: D,
}

/// A typed `<id> <rev> R` reference. The type parameter documents what the reference points at
/// and has no influence on the serialized output.
pub struct Reference<D>(ObjectId, PhantomData<D>)
where
    D: Serialize;

impl ObjectId {
    pub fn new(id: u32, rev: u16) -> Self {
        ObjectId { id, rev }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn rev(&self) -> u16 {
        self.rev
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.rev)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.id, self.rev)
    }
}

impl<D> Object<D>
where
    D: Serialize,
{
    pub fn new(id: ObjectId, content: D) -> Self {
        Object { id, content }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn to_reference(&self) -> Reference<D> {
        Reference::new(self.id)
    }

    pub fn content(&self) -> &D {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut D {
        &mut self.content
    }
}

impl Default for Object<()> {
    fn default() -> Self {
        Object {
            id: ObjectId::new(0, 0),
            content: (),
        }
    }
}

impl<D> Serialize for Object<D>
where
    D: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_tuple_struct(NAME_OBJECT, 3)?;
        s.serialize_field(&self.id.id())?;
        s.serialize_field(&self.id.rev())?;
        s.serialize_field(&self.content)?;
        s.end()
    }
}

impl<D> Reference<D>
where
    D: Serialize,
{
    pub fn new(id: ObjectId) -> Self {
        Reference(id, PhantomData)
    }

    pub fn id(&self) -> ObjectId {
        self.0
    }
}

impl<D: Serialize> Clone for Reference<D> {
    fn clone(&self) -> Self {
        Reference(self.0, PhantomData)
    }
}

impl<D: Serialize> fmt::Debug for Reference<D> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<D> Serialize for Reference<D>
where
    D: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_tuple_struct(NAME_REFERENCE, 2)?;
        s.serialize_field(&(self.0).id())?;
        s.serialize_field(&(self.0).rev())?;
        s.end()
    }
}
