use crate::ser::{Raw, NAME_STREAM};
use crate::value::Dictionary;
use serde::{ser::SerializeTupleStruct, Serialize, Serializer};

/// A stream object: a dictionary followed by an opaque (possibly encoded) byte payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream<D = Dictionary>
where
    D: Serialize,
{
    pub dict: D,
    pub data: Vec<u8>,
}

impl<D> Stream<D>
where
    D: Serialize,
{
    pub fn new(dict: D) -> Self {
        Stream {
            dict,
            data: Vec::new(),
        }
    }

    pub fn with_data(dict: D, data: Vec<u8>) -> Self {
        Stream { dict, data }
    }
}

impl<D> Serialize for Stream<D>
where
    D: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_tuple_struct(NAME_STREAM, 2)?;
        s.serialize_field(&self.dict)?;
        s.serialize_field(&Raw(&self.data))?;
        s.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ser::to_string;
    use crate::Value;

    #[test]
    fn test_serialize() {
        let mut dict = Dictionary::new();
        dict.insert("foo", Value::Name("bar".into()));

        let obj = Stream {
            dict,
            data: vec![b'a', b'b'],
        };
        assert_eq!(
            to_string(&obj).unwrap(),
            "<< /foo /bar >>\nstream\nab\nendstream\n"
        );
    }

    #[test]
    fn test_serialize_empty_payload() {
        let obj = Stream::new(Dictionary::new());
        assert_eq!(to_string(&obj).unwrap(), "<< >>\nstream\n\nendstream\n");
    }
}
