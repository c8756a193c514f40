use std::collections::BTreeMap;
use std::io;

use serde::Serialize;
use serde_pdf::{Object, ObjectId};

/// A type that keeps track of a PDF XREF table while forwarding writes to its wrapped writer.
///
/// It keeps track of how many bytes have already been written to correctly reference objects
/// inside the document.
pub struct DocWriter<W: io::Write> {
    w: W,
    len: usize,
    xref: BTreeMap<u32, (usize, u16)>, // <object number, (offset, generation)>
}

impl<W: io::Write> DocWriter<W> {
    /// Constructs a new `DocWriter<W>` wrapping the given writer.
    pub fn new(w: W) -> Self {
        DocWriter {
            w,
            len: 0,
            xref: BTreeMap::new(),
        }
    }

    /// The length in bytes of the already written PDF output.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Add an XREF entry for the current position of the PDF output and assign it to the provided
    /// `id`.
    pub fn add_xref(&mut self, id: ObjectId) {
        self.xref.insert(id.id(), (self.len, id.rev()));
    }

    /// The trailer's `/Size`: one greater than the highest object number written so far.
    pub fn size(&self) -> u32 {
        self.xref.keys().next_back().map_or(1, |id| id + 1)
    }

    /// Records the object's offset and serializes it into the output.
    pub fn write_object<D: Serialize>(&mut self, obj: &Object<D>) -> Result<(), serde_pdf::Error> {
        self.add_xref(obj.id());
        serde_pdf::to_writer(&mut *self, obj)
    }

    /// Writes the XREF table. Every entry is exactly 20 bytes long; object numbers are grouped
    /// into contiguous subsections, the first one always starting with the free entry `0`.
    pub fn write_xref(&mut self) -> Result<(), io::Error> {
        let mut sections: Vec<(u32, Vec<(usize, u16)>)> = vec![(0, Vec::new())];
        for (&id, &entry) in &self.xref {
            match sections.last_mut() {
                // the free entry takes up the first slot of subsection 0
                Some((0, entries)) if entries.len() as u32 + 1 == id => entries.push(entry),
                Some((from, entries)) if *from != 0 && *from + entries.len() as u32 == id => {
                    entries.push(entry)
                }
                _ => sections.push((id, vec![entry])),
            }
        }

        let mut out = String::from("xref\n");
        for (from, entries) in sections {
            if from == 0 {
                out += &format!("0 {}\n0000000000 65535 f\r\n", entries.len() + 1);
            } else {
                out += &format!("{} {}\n", from, entries.len());
            }
            for (offset, rev) in entries {
                out += &format!("{:010} {:05} n\r\n", offset, rev);
            }
        }

        io::Write::write_all(self, out.as_bytes())
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W> io::Write for DocWriter<W>
where
    W: io::Write,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        let len = self.w.write(buf)?;
        self.len += len;
        Ok(len)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        self.w.flush()
    }
}
