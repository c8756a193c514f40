use std::collections::BTreeMap;

use serde_pdf::{find, is_whitespace, Dictionary, ObjectId, Parser, Value};

use crate::error::{Error, Result};
use crate::filter;
use crate::xref::{self, XrefEntry};

/// How many references `resolve` follows before giving up on a chain.
const MAX_REFERENCE_HOPS: usize = 32;

static NULL: Value = Value::Null;

/// A fully parsed PDF file: the table of all indirect objects addressed by its
/// cross-reference data, together with the trailer dictionary.
///
/// The document is immutable after parsing and can be shared across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    version: Option<String>,
    objects: BTreeMap<ObjectId, Value>,
    trailer: Dictionary,
}

impl ParsedDocument {
    /// Parses the raw bytes of a PDF file.
    ///
    /// Objects the cross-reference data points at but that cannot be read are kept as `null`.
    /// Fails with [`Error::MalformedDocument`] if there is no readable cross-reference section or
    /// if the document is encrypted.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let version = header_version(input);
        let startxref = xref::find_startxref(input)?;
        let xref = xref::read(input, startxref)?;

        if xref.trailer.contains_key("Encrypt") {
            return Err(Error::malformed("encrypted documents are not supported"));
        }

        let objects = Loader {
            input,
            entries: &xref.entries,
        }
        .load();

        tracing::debug!(
            version = version.as_deref().unwrap_or("unknown"),
            objects = objects.len(),
            "parsed PDF document"
        );

        Ok(ParsedDocument {
            version,
            objects,
            trailer: xref.trailer,
        })
    }

    /// The version from the `%PDF-x.y` header, if there is one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    pub fn objects(&self) -> &BTreeMap<ObjectId, Value> {
        &self.objects
    }

    pub fn get(&self, id: ObjectId) -> Option<&Value> {
        self.objects.get(&id)
    }

    /// Follows `value` through indirect references until a direct value is reached. Dangling
    /// references resolve to `null`.
    pub fn resolve<'a>(&'a self, mut value: &'a Value) -> &'a Value {
        for _ in 0..MAX_REFERENCE_HOPS {
            match value {
                Value::Reference(id) => value = self.objects.get(id).unwrap_or(&NULL),
                _ => return value,
            }
        }
        &NULL
    }

    /// The id of the document catalog (`/Root` of the trailer).
    pub fn root(&self) -> Option<ObjectId> {
        self.trailer.get("Root").and_then(Value::as_reference)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_objects(objects: Vec<(ObjectId, Value)>, trailer: Dictionary) -> Self {
        ParsedDocument {
            version: None,
            objects: objects.into_iter().collect(),
            trailer,
        }
    }
}

fn header_version(input: &[u8]) -> Option<String> {
    let head = &input[..input.len().min(1024)];
    let start = find(head, b"%PDF-")? + b"%PDF-".len();
    let version: Vec<u8> = head[start..]
        .iter()
        .take_while(|&&ch| !is_whitespace(ch) && ch != b'%')
        .copied()
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&version).into_owned())
    }
}

struct Loader<'a> {
    input: &'a [u8],
    entries: &'a BTreeMap<u32, XrefEntry>,
}

impl<'a> Loader<'a> {
    fn load(&self) -> BTreeMap<ObjectId, Value> {
        let mut objects = BTreeMap::new();
        let mut compressed: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();

        for (&num, &entry) in self.entries {
            match entry {
                XrefEntry::Free => {}
                XrefEntry::InUse { offset, rev } => {
                    let id = ObjectId::new(num, rev);
                    let value = self.load_at(id, offset).unwrap_or_else(|| {
                        tracing::debug!(object = %id, offset, "unreadable object, using null");
                        Value::Null
                    });
                    objects.insert(id, value);
                }
                XrefEntry::Compressed { container, index } => {
                    compressed.entry(container).or_default().push((num, index))
                }
            }
        }

        for (container, members) in compressed {
            let mut unpacked = self.unpack(container, &members, &objects);
            for (num, _) in members {
                // objects inside object streams always have generation 0
                let value = unpacked.remove(&num).unwrap_or_else(|| {
                    tracing::debug!(object = num, container, "unreadable compressed object, using null");
                    Value::Null
                });
                objects.insert(ObjectId::new(num, 0), value);
            }
        }

        objects
    }

    /// Parses the indirect object at `offset`. If it is not there, the file is searched for the
    /// object's header instead (many producers write slightly wrong offsets).
    fn load_at(&self, id: ObjectId, offset: usize) -> Option<Value> {
        match self.parse_at(offset) {
            Some((found, value)) if found == id => return Some(value),
            Some((found, _)) => {
                tracing::debug!(object = %id, %found, offset, "xref offset points at another object")
            }
            None => tracing::debug!(object = %id, offset, "xref offset points at garbage"),
        }

        self.search(id)
    }

    fn parse_at(&self, offset: usize) -> Option<(ObjectId, Value)> {
        if offset >= self.input.len() {
            return None;
        }
        Parser::at(self.input, offset)
            .parse_indirect_object(|len| self.length(len))
            .ok()
    }

    /// Finds the last `<id> <rev> obj` header in the file (the newest revision of an
    /// incrementally updated file wins).
    fn search(&self, id: ObjectId) -> Option<Value> {
        let header = format!("{} {} obj", id.id(), id.rev());
        let header = header.as_bytes();

        let mut end = self.input.len();
        while let Some(pos) = serde_pdf::rfind(&self.input[..end], header) {
            let standalone = pos == 0 || !self.input[pos - 1].is_ascii_digit();
            if standalone {
                if let Some((found, value)) = self.parse_at(pos) {
                    if found == id {
                        return Some(value);
                    }
                }
            }
            end = pos + header.len() - 1;
        }

        None
    }

    /// Resolves a stream's `/Length`, which may be an indirect reference.
    fn length(&self, len: &Value) -> Option<usize> {
        let len = match len {
            Value::Reference(id) => match self.entries.get(&id.id()) {
                Some(&XrefEntry::InUse { offset, rev }) if rev == id.rev() => {
                    Parser::at(self.input, offset)
                        .parse_indirect_object(|_| None)
                        .ok()
                        .filter(|(found, _)| found == id)?
                        .1
                }
                _ => return None,
            },
            len => len.clone(),
        };
        len.as_i64().and_then(|len| usize::try_from(len).ok())
    }

    /// Parses the members of the object stream `container`. Returns them keyed by object number.
    fn unpack(
        &self,
        container: u32,
        members: &[(u32, u32)],
        objects: &BTreeMap<ObjectId, Value>,
    ) -> BTreeMap<u32, Value> {
        let mut unpacked = BTreeMap::new();

        let stream = match self.entries.get(&container) {
            Some(&XrefEntry::InUse { rev, .. }) => {
                objects.get(&ObjectId::new(container, rev)).and_then(Value::as_stream)
            }
            _ => None,
        };
        let stream = match stream {
            Some(stream) if stream.dict.type_name() == Some("ObjStm") => stream,
            _ => {
                tracing::debug!(container, "object stream is missing");
                return unpacked;
            }
        };

        let data = match filter::decode(stream) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(container, %err, "cannot decode object stream");
                return unpacked;
            }
        };

        let count = stream.dict.get("N").and_then(Value::as_i64).unwrap_or(0);
        let first = stream.dict.get("First").and_then(Value::as_i64).unwrap_or(0);
        let first = match usize::try_from(first) {
            Ok(first) if first <= data.len() => first,
            _ => return unpacked,
        };

        // the header is a list of `<object number> <relative offset>` pairs
        let mut header = Vec::new();
        let mut parser = Parser::new(&data[..first]);
        for _ in 0..count {
            match (parser.parse_unsigned(), parser.parse_unsigned()) {
                (Ok(num), Ok(offset)) => header.push((num, offset)),
                _ => break,
            }
        }

        for &(num, index) in members {
            let entry = header
                .get(index as usize)
                .filter(|(n, _)| *n == u64::from(num))
                .or_else(|| header.iter().find(|(n, _)| *n == u64::from(num)));
            let offset = match entry.and_then(|(_, offset)| usize::try_from(*offset).ok()) {
                Some(offset) => first.saturating_add(offset),
                None => continue,
            };
            if offset >= data.len() {
                continue;
            }
            if let Ok(value) = Parser::at(&data, offset).parse_value() {
                unpacked.insert(num, value);
            }
        }

        unpacked
    }
}
