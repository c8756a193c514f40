use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::ser::{self, Serialize};

use crate::name::Name;
use crate::object::{ObjectId, Reference};
use crate::stream::Stream;
use crate::string::PdfString;

/// A PDF dictionary, ordered by key so that it is always written the same way.
///
/// Lookups take anything that views as bytes, so `dict.get("Type")` works without building a
/// [`Name`] first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(BTreeMap<Name, Value>);

impl Dictionary {
    pub fn new() -> Self {
        Dictionary(BTreeMap::new())
    }

    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&Value> {
        self.0.get(key.as_ref())
    }

    pub fn get_mut<K: AsRef<[u8]>>(&mut self, key: K) -> Option<&mut Value> {
        self.0.get_mut(key.as_ref())
    }

    pub fn contains_key<K: AsRef<[u8]>>(&self, key: K) -> bool {
        self.0.contains_key(key.as_ref())
    }

    pub fn insert<K: Into<Name>>(&mut self, key: K, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove<K: AsRef<[u8]>>(&mut self, key: K) -> Option<Value> {
        self.0.remove(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Name, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, Name, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, Name, Value> {
        self.0.values()
    }

    /// The `/Type` entry, if it is a name made of valid UTF-8.
    pub fn type_name(&self) -> Option<&str> {
        self.get("Type")
            .and_then(Value::as_name)
            .and_then(Name::as_str)
    }
}

impl<K: Into<Name>> FromIterator<(K, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Dictionary(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<Name>> Extend<(K, Value)> for Dictionary {
    fn extend<I: IntoIterator<Item = (K, Value)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v)))
    }
}

impl IntoIterator for Dictionary {
    type Item = (Name, Value);
    type IntoIter = btree_map::IntoIter<Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Value);
    type IntoIter = btree_map::Iter<'a, Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Dictionary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.collect_map(&self.0)
    }
}

/// Represents any valid PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(Name),
    Array(Vec<Value>),
    Dictionary(Dictionary),
    Reference(ObjectId),
    Stream(Stream),
}

impl Default for Value {
    fn default() -> Value {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match *self {
            Value::Reference(id) => Some(id),
            _ => None,
        }
    }

    /// The dictionary of a dictionary or stream value.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            Value::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            Value::Stream(stream) => Some(&mut stream.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The `/Type` of a dictionary or stream value, if it is a name made of valid UTF-8.
    pub fn type_name(&self) -> Option<&str> {
        self.as_dict().and_then(Dictionary::type_name)
    }

    /// Calls `f` for every indirect reference embedded in this value, in document order.
    pub fn for_each_reference<F>(&self, f: &mut F)
    where
        F: FnMut(ObjectId),
    {
        match self {
            Value::Reference(id) => f(*id),
            Value::Array(arr) => {
                for v in arr {
                    v.for_each_reference(f);
                }
            }
            Value::Dictionary(dict) => {
                for v in dict.values() {
                    v.for_each_reference(f);
                }
            }
            Value::Stream(stream) => {
                for v in stream.dict.values() {
                    v.for_each_reference(f);
                }
            }
            _ => {}
        }
    }

    /// Replaces every indirect reference embedded in this value by whatever `f` returns for it.
    pub fn map_references<F>(self, f: &mut F) -> Value
    where
        F: FnMut(ObjectId) -> Value,
    {
        match self {
            Value::Reference(id) => f(id),
            Value::Array(arr) => {
                Value::Array(arr.into_iter().map(|v| v.map_references(f)).collect())
            }
            Value::Dictionary(dict) => Value::Dictionary(map_dict_references(dict, f)),
            Value::Stream(Stream { dict, data }) => Value::Stream(Stream {
                dict: map_dict_references(dict, f),
                data,
            }),
            other => other,
        }
    }
}

fn map_dict_references<F>(dict: Dictionary, f: &mut F) -> Dictionary
where
    F: FnMut(ObjectId) -> Value,
{
    dict.into_iter()
        .map(|(k, v)| (k, v.map_references(f)))
        .collect()
}

impl From<Name> for Value {
    fn from(name: Name) -> Self {
        Value::Name(name)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Reference(id)
    }
}

impl ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match *self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(v),
            Value::Integer(v) => serializer.serialize_i64(v),
            Value::Real(v) => serializer.serialize_f64(v),
            Value::String(ref v) => v.serialize(serializer),
            Value::Name(ref v) => v.serialize(serializer),
            Value::Array(ref v) => v.serialize(serializer),
            Value::Dictionary(ref v) => v.serialize(serializer),
            Value::Reference(id) => Reference::<()>::new(id).serialize(serializer),
            Value::Stream(ref v) => v.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ser::to_string;
    use pretty_assertions::assert_eq;

    fn page() -> Value {
        let mut resources = Dictionary::new();
        resources.insert("Font", Value::Reference(ObjectId::new(7, 0)));

        let mut dict = Dictionary::new();
        dict.insert("Type", Value::Name("Page".into()));
        dict.insert("Resources", Value::Dictionary(resources));
        dict.insert(
            "Contents",
            Value::Array(vec![
                Value::Reference(ObjectId::new(4, 0)),
                Value::Reference(ObjectId::new(5, 2)),
            ]),
        );
        Value::Dictionary(dict)
    }

    #[test]
    fn collects_references_in_order() {
        let mut refs = Vec::new();
        page().for_each_reference(&mut |id| refs.push(id));
        assert_eq!(
            refs,
            vec![
                ObjectId::new(4, 0),
                ObjectId::new(5, 2),
                ObjectId::new(7, 0)
            ]
        );
    }

    #[test]
    fn rewrites_references() {
        let rewritten = page().map_references(&mut |id| {
            if id.id() == 7 {
                Value::Null
            } else {
                Value::Reference(ObjectId::new(id.id() + 10, 0))
            }
        });
        assert_eq!(
            to_string(&rewritten).unwrap(),
            "<< /Contents [14 0 R 15 0 R] /Resources << /Font null >> /Type /Page >>"
        );
    }

    #[test]
    fn stream_dictionary_is_a_dictionary() {
        let mut dict = Dictionary::new();
        dict.insert("Type", Value::Name("XObject".into()));
        let stream = Value::Stream(Stream::with_data(dict, b"q Q".to_vec()));
        assert_eq!(stream.type_name(), Some("XObject"));
        assert!(stream.as_stream().is_some());
    }

    #[test]
    fn serializes_scalars() {
        assert_eq!(to_string(&Value::Null).unwrap(), "null");
        assert_eq!(to_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(to_string(&Value::Integer(-12)).unwrap(), "-12");
        assert_eq!(to_string(&Value::Real(0.5)).unwrap(), "0.5");
        assert_eq!(to_string(&Value::Real(612.0)).unwrap(), "612");
        assert_eq!(
            to_string(&Value::Name("Adobe Green".into())).unwrap(),
            "/Adobe#20Green"
        );
        assert_eq!(to_string(&Value::Real(f64::NAN)).unwrap(), "0");
    }

    #[test]
    fn keys_differing_in_high_bytes_stay_apart() {
        let mut fonts = Dictionary::new();
        fonts.insert(vec![b'F', 0xe9], Value::Reference(ObjectId::new(5, 0)));
        fonts.insert(vec![b'F', 0xe8], Value::Reference(ObjectId::new(6, 0)));
        assert_eq!(fonts.len(), 2);
        assert_eq!(
            fonts.get([b'F', 0xe9]),
            Some(&Value::Reference(ObjectId::new(5, 0)))
        );
        assert_eq!(
            to_string(&Value::Dictionary(fonts)).unwrap(),
            "<< /F#e8 6 0 R /F#e9 5 0 R >>"
        );
    }

    #[test]
    fn type_name_needs_utf8() {
        let dict: Dictionary = vec![("Type", Value::Name(Name::new(vec![0xff])))]
            .into_iter()
            .collect();
        let value = Value::Dictionary(dict);
        assert!(value.as_dict().and_then(|d| d.get("Type")).is_some());
        assert_eq!(value.type_name(), None);
    }
}
