use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_pdf::{Object, ObjectId, PdfString, Reference, Value};
use uuid::Uuid;

use crate::document::ParsedDocument;
use crate::error::{Error, Result};
use crate::idseq::IdSeq;
use crate::pages::{extract_pages, PageClosure, PageLeaf};
use crate::writer::DocWriter;

/// A type used to merge parsed PDF documents into a single new one.
///
/// The output contains every page of every input, in input order, with freshly numbered
/// objects. Objects shared by several pages of the same input are copied once.
pub struct Merger {
    id: Option<String>,
    creation_date: Option<DateTime<Utc>>,
    producer: Option<String>,
}

impl Default for Merger {
    fn default() -> Self {
        Merger::new()
    }
}

impl Merger {
    pub fn new() -> Self {
        Merger {
            id: None,
            creation_date: None,
            producer: None,
        }
    }

    /// Overrides the automatically generated PDF id by the provided `id`.
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Overrides the PDF's creation date (now by default) by the provided `date`.
    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Overrides the default producer (pdfmerge) by the provided `producer`.
    pub fn with_producer<S: Into<String>>(mut self, producer: S) -> Self {
        self.producer = Some(producer.into());
        self
    }

    /// Parses every input, extracts its pages and merges them.
    ///
    /// Errors caused by an input are prefixed with the input's zero-based index.
    pub fn merge_documents<I, B>(&self, inputs: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let parsed = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| {
                let doc = ParsedDocument::parse(input.as_ref()).map_err(|err| err.in_input(i))?;
                let closure = extract_pages(&doc).map_err(|err| err.in_input(i))?;
                Ok((doc, closure))
            })
            .collect::<Result<Vec<_>>>()?;

        self.merge(&parsed)
    }

    /// Writes a new PDF containing the pages of all `inputs`, in order.
    ///
    /// Fails with [`Error::EmptyInput`] if there are no inputs, and with [`Error::NoPages`] if
    /// none of them has a page.
    pub fn merge(&self, inputs: &[(ParsedDocument, PageClosure)]) -> Result<Vec<u8>> {
        if inputs.is_empty() {
            return Err(Error::EmptyInput);
        }
        if inputs.iter().all(|(_, closure)| closure.is_empty()) {
            return Err(Error::NoPages);
        }

        let mut ids = IdSeq::new(1);
        let catalog_id = ObjectId::new(ids.next(), 0);
        let pages_id = ObjectId::new(ids.next(), 0);

        let mut merged = MergedDocument {
            ids,
            pages_id,
            objects: BTreeMap::new(),
            translations: HashMap::new(),
        };
        let mut kids = Vec::new();
        for (index, (doc, closure)) in inputs.iter().enumerate() {
            let source = Source::new(index, doc, closure);
            for page in closure.pages() {
                kids.push(Reference::new(merged.copy(&source, page.id())));
            }
        }
        let info_id = ObjectId::new(merged.ids.next(), 0);

        let out = self.write(catalog_id, pages_id, info_id, kids, &merged.objects)?;
        tracing::debug!(
            inputs = inputs.len(),
            objects = merged.ids.count(),
            bytes = out.len(),
            "merged PDF documents"
        );

        Ok(out)
    }

    fn write(
        &self,
        catalog_id: ObjectId,
        pages_id: ObjectId,
        info_id: ObjectId,
        kids: Vec<Reference<Value>>,
        objects: &BTreeMap<ObjectId, Value>,
    ) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Catalog {
            pages: Reference<Pages>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Pages {
            kids: Vec<Reference<Value>>,
            count: usize,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        #[serde(rename = "")]
        struct Info {
            producer: PdfString,
            #[serde(with = "serde_pdf::datetime")]
            creation_date: DateTime<Utc>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        #[serde(rename = "")]
        struct Trailer {
            size: u32,
            root: Reference<Catalog>,
            info: Reference<Info>,
            #[serde(rename = "ID")]
            id: (PdfString, PdfString),
        }

        let id = self
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let producer = self.producer.clone().unwrap_or_else(|| {
            format!("pdfmerge v{}", env!("CARGO_PKG_VERSION"))
        });

        let mut doc = DocWriter::new(Vec::new());

        // The PDF format mandates that we add at least 4 commented binary characters
        // (ASCII value >= 128), so that generic tools have a chance to detect
        // that it's a binary file
        write!(doc, "%PDF-1.7\n%")?;
        doc.write_all(&[255, 255, 255, 255, b'\n', b'\n'])?;

        let pages_obj = Object::new(
            pages_id,
            Pages {
                count: kids.len(),
                kids,
            },
        );
        let catalog = Object::new(
            catalog_id,
            Catalog {
                pages: pages_obj.to_reference(),
            },
        );
        doc.write_object(&catalog)?;
        doc.write_object(&pages_obj)?;

        for (&id, value) in objects {
            doc.write_object(&Object::new(id, value))?;
        }

        let info = Object::new(
            info_id,
            Info {
                producer: PdfString::Literal(producer.into_bytes()),
                creation_date: self.creation_date.unwrap_or_else(Utc::now),
            },
        );
        doc.write_object(&info)?;

        // xref
        let startxref = doc.len();
        doc.write_xref()?;

        // trailer
        writeln!(doc, "trailer")?;
        let trailer = Trailer {
            size: doc.size(),
            root: catalog.to_reference(),
            info: info.to_reference(),
            id: (
                PdfString::Hex(id.clone().into_bytes()),
                PdfString::Hex(id.into_bytes()),
            ),
        };
        serde_pdf::to_writer(&mut doc, &trailer)?;
        write!(doc, "\nstartxref\n{}\n%%EOF\n", startxref)?;

        Ok(doc.into_inner())
    }
}

/// Merges `inputs` using the default id, creation date and producer.
pub fn merge(inputs: &[(ParsedDocument, PageClosure)]) -> Result<Vec<u8>> {
    Merger::new().merge(inputs)
}

/// Addresses an object of one particular input. The same object id in two inputs (or in the same
/// document given twice) refers to two different objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SourceRef {
    input: usize,
    id: ObjectId,
}

struct Source<'a> {
    index: usize,
    doc: &'a ParsedDocument,
    closure: &'a PageClosure,
    pages: HashMap<ObjectId, &'a PageLeaf>,
}

impl<'a> Source<'a> {
    fn new(index: usize, doc: &'a ParsedDocument, closure: &'a PageClosure) -> Self {
        Source {
            index,
            doc,
            closure,
            pages: closure.pages().iter().map(|page| (page.id(), page)).collect(),
        }
    }

    fn key(&self, id: ObjectId) -> SourceRef {
        SourceRef {
            input: self.index,
            id,
        }
    }
}

/// The output's object table while it is being assembled.
struct MergedDocument {
    ids: IdSeq,
    pages_id: ObjectId,
    objects: BTreeMap<ObjectId, Value>,
    /// Maps every copied source object to its id in the output. An object is copied at most once
    /// per input.
    translations: HashMap<SourceRef, ObjectId>,
}

impl MergedDocument {
    /// Copies the object `id` of `source` and everything it references. Returns the object's id
    /// in the output.
    fn copy(&mut self, source: &Source, id: ObjectId) -> ObjectId {
        let mut pending = VecDeque::new();
        let new_id = self.translate(source, id, &mut pending);

        while let Some((id, new_id)) = pending.pop_front() {
            let mut value = source.doc.get(id).cloned().unwrap_or(Value::Null);

            let page = source.pages.get(&id);
            if let (Some(page), Some(dict)) = (page, value.as_dict_mut()) {
                dict.extend(
                    page.inherited()
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
                dict.remove("Parent");
            }

            // the payload is copied verbatim, so an indirect /Length can be replaced by a direct one
            if let Value::Stream(stream) = &mut value {
                let len = stream.data.len() as i64;
                stream.dict.insert("Length", Value::Integer(len));
            }

            let mut value = value.map_references(&mut |r| self.rewrite(source, r, &mut pending));

            if page.is_some() {
                if let Some(dict) = value.as_dict_mut() {
                    dict.insert("Parent", Value::Reference(self.pages_id));
                }
            }

            self.objects.insert(new_id, value);
        }

        new_id
    }

    fn translate(
        &mut self,
        source: &Source,
        id: ObjectId,
        pending: &mut VecDeque<(ObjectId, ObjectId)>,
    ) -> ObjectId {
        let key = source.key(id);
        if let Some(&new_id) = self.translations.get(&key) {
            return new_id;
        }

        // the generation is kept as-is; only the object number is reassigned
        let new_id = ObjectId::new(self.ids.next(), id.rev());
        self.translations.insert(key, new_id);
        pending.push_back((id, new_id));
        new_id
    }

    fn rewrite(
        &mut self,
        source: &Source,
        id: ObjectId,
        pending: &mut VecDeque<(ObjectId, ObjectId)>,
    ) -> Value {
        if source.closure.contains(id) {
            Value::Reference(self.translate(source, id, pending))
        } else {
            tracing::trace!(object = %id, "dropping reference outside of the page closure");
            Value::Null
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_pdf::Dictionary;

    fn id(num: u32) -> ObjectId {
        ObjectId::new(num, 0)
    }

    fn r(num: u32) -> Value {
        Value::Reference(id(num))
    }

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        Value::Dictionary(entries.into_iter().collect())
    }

    fn single_page() -> (ParsedDocument, PageClosure) {
        let mut trailer = Dictionary::new();
        trailer.insert("Root", r(1));
        let doc = ParsedDocument::from_objects(
            vec![
                (id(1), dict(vec![("Type", Value::Name("Catalog".into())), ("Pages", r(2))])),
                (
                    id(2),
                    dict(vec![
                        ("Type", Value::Name("Pages".into())),
                        ("Kids", Value::Array(vec![r(3)])),
                        ("MediaBox", Value::Array(vec![Value::Integer(0), Value::Integer(0), Value::Integer(10), Value::Integer(10)])),
                    ]),
                ),
                (
                    id(3),
                    dict(vec![
                        ("Type", Value::Name("Page".into())),
                        ("Parent", r(2)),
                        ("Contents", r(4)),
                    ]),
                ),
                (
                    id(4),
                    Value::Stream(serde_pdf::Stream::with_data(
                        [("Length", r(5))].into_iter().collect(),
                        b"0 0 m".to_vec(),
                    )),
                ),
                (id(5), Value::Integer(5)),
            ],
            trailer,
        );
        let closure = extract_pages(&doc).unwrap();
        (doc, closure)
    }

    fn merger() -> Merger {
        Merger::new()
            .with_id("ABCD")
            .with_creation_date(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
            .with_producer("test")
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(merger().merge(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn writes_a_complete_document() {
        let out = merger().merge(&[single_page()]).unwrap();
        assert_eq!(out[..16].to_vec(), b"%PDF-1.7\n%\xFF\xFF\xFF\xFF\n\n".to_vec());
        let out = String::from_utf8_lossy(&out).to_string();

        let objects_start = out.find("1 0 obj").unwrap();
        let startxref = out.find("\nxref\n").unwrap() + 1;
        assert_eq!(
            &out[objects_start..startxref],
            "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\n\
             2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\n\
             3 0 obj\n<< /Contents 4 0 R /MediaBox [0 0 10 10] /Parent 2 0 R /Type /Page >>\nendobj\n\n\
             4 0 obj\n<< /Length 5 >>\nstream\n0 0 m\nendstream\n\nendobj\n\n\
             5 0 obj\n<< /Producer (test) /CreationDate (D:20240102030405+00'00') >>\nendobj\n\n"
        );

        let trailer = out.find("trailer\n").unwrap();
        assert_eq!(
            &out[trailer..],
            format!(
                "trailer\n<< /Size 6 /Root 1 0 R /Info 5 0 R /ID [<41424344> <41424344>] >>\nstartxref\n{}\n%%EOF\n",
                startxref
            )
        );
    }

    #[test]
    fn copied_objects_are_numbered_in_discovery_order() {
        let (doc, closure) = single_page();
        let mut merged = MergedDocument {
            ids: IdSeq::new(3),
            pages_id: id(2),
            objects: BTreeMap::new(),
            translations: HashMap::new(),
        };
        let source = Source::new(0, &doc, &closure);
        assert_eq!(merged.copy(&source, id(3)), id(3));
        assert_eq!(merged.objects.keys().copied().collect::<Vec<_>>(), vec![id(3), id(4)]);
        assert_eq!(merged.translations.get(&source.key(id(4))), Some(&id(4)));
        // the indirect /Length object is not part of the output
        assert_eq!(merged.translations.get(&source.key(id(5))), None);
    }

    #[test]
    fn shared_objects_are_copied_once_per_input() {
        let (doc, closure) = single_page();
        let inputs = vec![(doc.clone(), closure.clone()), (doc, closure)];
        let out = merger().merge(&inputs).unwrap();
        let out = String::from_utf8_lossy(&out).to_string();

        // catalog, pages, 2 × (page + content stream), info
        assert!(out.contains("/Kids [3 0 R 5 0 R]"), "{}", out);
        assert!(out.contains("/Count 2"));
        assert!(out.contains("7 0 obj\n<< /Producer"));
        assert!(out.contains("/Size 8"));
    }
}
