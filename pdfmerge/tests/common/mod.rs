#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdfmerge::{extract_pages, ParsedDocument, Value};

const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n";

enum Body {
    Plain(String),
    Stream(String, Vec<u8>),
}

/// Writes small PDF files with exact byte offsets, either with a classic cross-reference table
/// or with a cross-reference stream and all non-stream objects packed into an object stream.
pub struct PdfBuilder {
    objects: BTreeMap<u32, Body>,
    trailer: String,
}

impl PdfBuilder {
    pub fn new() -> Self {
        PdfBuilder {
            objects: BTreeMap::new(),
            trailer: "/Root 1 0 R".to_string(),
        }
    }

    pub fn object(mut self, num: u32, body: &str) -> Self {
        self.objects.insert(num, Body::Plain(body.to_string()));
        self
    }

    /// Adds a stream object; `/Length` is appended to `dict` automatically.
    pub fn stream(mut self, num: u32, dict: &str, data: &[u8]) -> Self {
        self.objects
            .insert(num, Body::Stream(dict.to_string(), data.to_vec()));
        self
    }

    /// Replaces the trailer entries (besides `/Size`).
    pub fn trailer(mut self, entries: &str) -> Self {
        self.trailer = entries.to_string();
        self
    }

    fn size(&self) -> u32 {
        self.objects.keys().next_back().map_or(1, |n| n + 1)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = HEADER.to_vec();
        let mut offsets = BTreeMap::new();
        for (&num, body) in &self.objects {
            offsets.insert(num, out.len());
            write_object(&mut out, num, body);
        }

        let size = self.size();
        let startxref = out.len();
        write!(out, "xref\n0 {}\n", size).unwrap();
        for num in 0..size {
            match offsets.get(&num) {
                Some(offset) => write!(out, "{:010} 00000 n\r\n", offset).unwrap(),
                None if num == 0 => out.extend_from_slice(b"0000000000 65535 f\r\n"),
                None => out.extend_from_slice(b"0000000000 00000 f\r\n"),
            }
        }
        write!(
            out,
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            size, self.trailer, startxref
        )
        .unwrap();
        out
    }

    pub fn build_with_object_streams(&self) -> Vec<u8> {
        let size = self.size();
        let container = size;
        let xref_num = size + 1;
        let total = size + 2;

        // (type, field 2, field 3) per object number
        let mut rows: Vec<(u8, u32, u16)> = vec![(0, 0, 0); total as usize];
        rows[0] = (0, 0, 65535);

        let mut out = HEADER.to_vec();
        let mut index_part = String::new();
        let mut body_part = String::new();
        let mut packed = 0;
        for (&num, body) in &self.objects {
            match body {
                Body::Plain(text) => {
                    index_part += &format!("{} {} ", num, body_part.len());
                    body_part += text;
                    body_part += "\n";
                    rows[num as usize] = (2, container, packed);
                    packed += 1;
                }
                Body::Stream(..) => {
                    rows[num as usize] = (1, out.len() as u32, 0);
                    write_object(&mut out, num, body);
                }
            }
        }

        rows[container as usize] = (1, out.len() as u32, 0);
        let data = deflate(format!("{}{}", index_part, body_part).as_bytes());
        write!(
            out,
            "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            container,
            packed,
            index_part.len(),
            data.len()
        )
        .unwrap();
        out.extend_from_slice(&data);
        out.extend_from_slice(b"\nendstream\nendobj\n");

        let startxref = out.len();
        rows[xref_num as usize] = (1, startxref as u32, 0);
        let mut table = Vec::new();
        for (kind, field2, field3) in rows {
            table.push(kind);
            table.extend_from_slice(&field2.to_be_bytes());
            table.extend_from_slice(&field3.to_be_bytes());
        }
        let data = deflate(&table);
        write!(
            out,
            "{} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] {} /Filter /FlateDecode /Length {} >>\nstream\n",
            xref_num,
            total,
            self.trailer,
            data.len()
        )
        .unwrap();
        out.extend_from_slice(&data);
        write!(out, "\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", startxref).unwrap();
        out
    }
}

fn write_object(out: &mut Vec<u8>, num: u32, body: &Body) {
    match body {
        Body::Plain(text) => write!(out, "{} 0 obj\n{}\nendobj\n", num, text).unwrap(),
        Body::Stream(dict, data) => {
            write!(
                out,
                "{} 0 obj\n<< {} /Length {} >>\nstream\n",
                num,
                dict,
                data.len()
            )
            .unwrap();
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream\nendobj\n");
        }
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Appends an incremental update to `base` that redefines object `num`.
pub fn incremental_update(base: &[u8], num: u32, body: &str) -> Vec<u8> {
    let prev = base
        .windows(9)
        .rposition(|w| w == b"startxref")
        .map(|pos| {
            std::str::from_utf8(&base[pos + 9..])
                .unwrap()
                .split_whitespace()
                .next()
                .unwrap()
                .parse::<usize>()
                .unwrap()
        })
        .unwrap();

    let mut out = base.to_vec();
    let offset = out.len();
    write!(out, "{} 0 obj\n{}\nendobj\n", num, body).unwrap();
    let startxref = out.len();
    write!(
        out,
        "xref\n{} 1\n{:010} 00000 n\r\ntrailer\n<< /Size {} /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
        num,
        offset,
        num + 1,
        prev,
        startxref
    )
    .unwrap();
    out
}

pub fn content(label: &str, page: usize) -> Vec<u8> {
    format!("BT /F1 12 Tf 72 720 Td ({} {}) Tj ET", label, page).into_bytes()
}

/// A document whose pages share one font (object 3) and one resource dictionary (object 4).
/// The MediaBox is only defined on the page tree root, so every page inherits it.
///
/// Page `i` is object `5 + 2i`, its content stream object `6 + 2i`.
pub fn simple_document(label: &str, pages: usize) -> PdfBuilder {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 5 + 2 * i)).collect();
    let mut builder = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
                kids.join(" "),
                pages
            ),
        )
        .object(3, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
        .object(4, "<< /Font << /F1 3 0 R >> >>");

    for i in 0..pages {
        let num = 5 + 2 * i as u32;
        builder = builder
            .object(
                num,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /Resources 4 0 R /Contents {} 0 R >>",
                    num + 1
                ),
            )
            .stream(num + 1, "", &content(label, i));
    }

    builder
}

/// The content stream payloads of all pages of `doc`, in page order.
pub fn page_contents(doc: &ParsedDocument) -> Vec<Vec<u8>> {
    let closure = extract_pages(doc).unwrap();
    closure
        .pages()
        .iter()
        .map(|page| {
            let dict = doc.get(page.id()).and_then(Value::as_dict).unwrap();
            let contents = dict.get("Contents").map(|c| doc.resolve(c)).unwrap();
            contents.as_stream().unwrap().data.clone()
        })
        .collect()
}

/// The in-use entries `(number, offset, generation)` of a classic cross-reference table,
/// asserting that every entry is exactly 20 bytes long.
pub fn xref_entries(pdf: &[u8]) -> Vec<(u32, usize, u16)> {
    let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
    let startxref: usize = std::str::from_utf8(&pdf[pos + 9..])
        .unwrap()
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap();

    let table = &pdf[startxref..];
    let mut lines = table.split(|&b| b == b'\n');
    assert_eq!(lines.next(), Some(&b"xref"[..]));

    let mut entries = Vec::new();
    loop {
        let header = std::str::from_utf8(lines.next().unwrap()).unwrap();
        if header == "trailer" {
            break;
        }
        let mut header = header.split(' ').map(|n| n.parse::<u32>().unwrap());
        let (start, count) = (header.next().unwrap(), header.next().unwrap());
        for num in start..start + count {
            let line = std::str::from_utf8(lines.next().unwrap()).unwrap();
            // 18 bytes plus the `\n` the split consumed, the last one being `\r`
            assert_eq!(line.len(), 19, "{:?}", line);
            assert!(line.ends_with('\r'));
            if &line[17..18] == "n" {
                entries.push((
                    num,
                    line[0..10].parse().unwrap(),
                    line[11..16].parse().unwrap(),
                ));
            }
        }
    }
    entries
}
