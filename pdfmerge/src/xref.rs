use std::collections::{BTreeMap, HashSet};

use serde_pdf::{rfind, Dictionary, Parser, Value};

use crate::error::{Error, Result};
use crate::filter;

/// A single record of a cross-reference table or stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    Free,
    /// An uncompressed object at a byte offset of the file.
    InUse { offset: usize, rev: u16 },
    /// An object stored at position `index` inside the object stream `container`.
    Compressed { container: u32, index: u32 },
}

/// The cross-reference data of a document, with all sections of an incrementally updated file
/// folded into one map.
#[derive(Debug)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
    /// The most recent trailer (or cross-reference stream dictionary).
    pub trailer: Dictionary,
}

impl Xref {
    /// Adds the entries of an older section. Entries already present take precedence.
    fn fill(&mut self, entries: BTreeMap<u32, XrefEntry>) {
        for (num, entry) in entries {
            self.entries.entry(num).or_insert(entry);
        }
    }
}

/// Locates the byte offset announced by the last `startxref` keyword of the file.
pub fn find_startxref(input: &[u8]) -> Result<usize> {
    let pos = rfind(input, b"startxref").ok_or_else(|| Error::malformed("missing startxref"))?;
    let mut parser = Parser::at(input, pos + b"startxref".len());
    let offset = parser
        .parse_unsigned()
        .map_err(|_| Error::malformed("startxref is not followed by an offset"))?;

    usize::try_from(offset)
        .ok()
        .filter(|&offset| offset < input.len())
        .ok_or_else(|| Error::malformed(format!("startxref offset {} is out of bounds", offset)))
}

/// Reads the cross-reference section at `startxref` and every older section reachable through
/// `/Prev` and `/XRefStm`.
pub fn read(input: &[u8], startxref: usize) -> Result<Xref> {
    let newest = read_section(input, startxref)?;
    let mut xref = Xref {
        entries: BTreeMap::new(),
        trailer: newest.trailer.clone(),
    };

    let mut visited = HashSet::new();
    visited.insert(startxref);

    let mut section = Some(newest);
    while let Some(current) = section.take() {
        let hybrid = current.trailer.get("XRefStm").and_then(offset_value);
        let prev = current.trailer.get("Prev").and_then(offset_value);
        xref.fill(current.entries);

        // hybrid-reference files: the stream's entries rank below the table they are attached to
        if let Some(offset) = hybrid.filter(|offset| visited.insert(*offset)) {
            match read_section(input, offset) {
                Ok(stream) => xref.fill(stream.entries),
                Err(err) => tracing::debug!(offset, %err, "ignoring unreadable /XRefStm"),
            }
        }

        if let Some(offset) = prev {
            if !visited.insert(offset) {
                tracing::debug!(offset, "cross-reference /Prev chain loops");
                break;
            }
            match read_section(input, offset) {
                Ok(older) => section = Some(older),
                Err(err) => tracing::debug!(offset, %err, "ignoring unreadable /Prev section"),
            }
        }
    }

    Ok(xref)
}

fn offset_value(value: &Value) -> Option<usize> {
    value.as_i64().and_then(|v| usize::try_from(v).ok())
}

fn syntax(err: serde_pdf::Error) -> Error {
    Error::malformed(format!("broken cross-reference table: {}", err))
}

fn read_section(input: &[u8], offset: usize) -> Result<Xref> {
    let mut parser = Parser::at(input, offset);
    if parser.parse_keyword(b"xref") {
        read_table(&mut parser)
    } else {
        read_stream(input, offset)
    }
}

/// Reads a classic `xref` table followed by its `trailer` dictionary.
fn read_table(parser: &mut Parser) -> Result<Xref> {
    let mut entries = BTreeMap::new();

    while !parser.parse_keyword(b"trailer") {
        let start = parser.parse_unsigned().map_err(syntax)?;
        let count = parser.parse_unsigned().map_err(syntax)?;

        for i in 0..count {
            let offset = parser.parse_unsigned().map_err(syntax)?;
            let rev = parser.parse_unsigned().map_err(syntax)?;
            let in_use = if parser.parse_keyword(b"n") {
                true
            } else if parser.parse_keyword(b"f") {
                false
            } else {
                return Err(Error::malformed(format!(
                    "invalid cross-reference entry type at byte {}",
                    parser.position()
                )));
            };

            let num = match u32::try_from(start + i) {
                Ok(num) => num,
                Err(_) => continue,
            };
            let entry = match (in_use, usize::try_from(offset), u16::try_from(rev)) {
                (true, Ok(offset), Ok(rev)) if offset > 0 => XrefEntry::InUse { offset, rev },
                _ => XrefEntry::Free,
            };
            entries.entry(num).or_insert(entry);
        }
    }

    let trailer = parser
        .parse_dictionary()
        .map_err(|err| Error::malformed(format!("garbled trailer: {}", err)))?;

    Ok(Xref { entries, trailer })
}

/// Reads a cross-reference stream (`<< /Type /XRef … >> stream`).
fn read_stream(input: &[u8], offset: usize) -> Result<Xref> {
    let mut parser = Parser::at(input, offset);
    let (_, value) = parser
        .parse_indirect_object(offset_value)
        .map_err(|err| {
            Error::malformed(format!(
                "no cross-reference table or stream at byte {}: {}",
                offset, err
            ))
        })?;

    let stream = match value {
        Value::Stream(stream) if stream.dict.type_name() == Some("XRef") => stream,
        _ => {
            return Err(Error::malformed(format!(
                "object at byte {} is not a cross-reference stream",
                offset
            )))
        }
    };

    let widths: Vec<usize> = stream
        .dict
        .get("W")
        .and_then(Value::as_array)
        .map(|w| w.iter().filter_map(offset_value).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::malformed("cross-reference stream has an invalid /W"));
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::malformed("cross-reference stream has an empty /W"));
    }

    let size = stream.dict.get("Size").and_then(offset_value).unwrap_or(0);
    let index: Vec<(u64, u64)> = match stream.dict.get("Index").and_then(Value::as_array) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| match (pair[0].as_i64(), pair[1].as_i64()) {
                (Some(start), Some(count)) if start >= 0 && count >= 0 => {
                    Some((start as u64, count as u64))
                }
                _ => None,
            })
            .collect(),
        None => vec![(0, size as u64)],
    };

    let data = filter::decode(&stream)?;
    let mut rows = data.chunks_exact(row_len);
    let mut entries = BTreeMap::new();

    'sections: for (start, count) in index {
        for num in start..start.saturating_add(count) {
            let row = match rows.next() {
                Some(row) => row,
                None => break 'sections,
            };
            let (kind, rest) = row.split_at(widths[0]);
            let (field2, field3) = rest.split_at(widths[1]);
            // a missing type field defaults to 1
            let kind = if widths[0] == 0 { 1 } else { be_uint(kind) };
            let (field2, field3) = (be_uint(field2), be_uint(field3));

            let num = match u32::try_from(num) {
                Ok(num) => num,
                Err(_) => continue,
            };
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => match (usize::try_from(field2), u16::try_from(field3)) {
                    (Ok(offset), Ok(rev)) if offset > 0 => XrefEntry::InUse { offset, rev },
                    _ => XrefEntry::Free,
                },
                2 => match (u32::try_from(field2), u32::try_from(field3)) {
                    (Ok(container), Ok(index)) => XrefEntry::Compressed { container, index },
                    _ => XrefEntry::Free,
                },
                // unknown types are to be read as references to the null object
                _ => XrefEntry::Free,
            };
            entries.entry(num).or_insert(entry);
        }
    }

    Ok(Xref {
        entries,
        trailer: stream.dict,
    })
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| acc << 8 | u64::from(b))
}
