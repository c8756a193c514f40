use crate::error::{Error, Result};
use crate::name::Name;
use crate::object::ObjectId;
use crate::stream::Stream;
use crate::string::PdfString;
use crate::value::{Dictionary, Value};

/// Arrays and dictionaries nested deeper than this are rejected instead of risking the stack.
const MAX_DEPTH: usize = 256;

/// A reader for PDF object syntax over an in-memory byte buffer.
///
/// The parser never copies the input; positions are byte offsets into the buffer it was created
/// with, which makes it usable both for whole files (seeking to xref offsets) and for decoded
/// object stream payloads.
pub struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
}

/// Parses exactly one value from `input`, allowing surrounding whitespace and comments.
pub fn from_slice(input: &[u8]) -> Result<Value> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value()?;
    parser.discard_whitespace();
    if parser.is_eof() {
        Ok(value)
    } else {
        Err(Error::expected("end of input", parser.pos))
    }
}

/// Whitespace as defined by PDF 1.7, section 7.2.2.
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(ch: u8) -> bool {
    !is_whitespace(ch) && !is_delimiter(ch)
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Parser::at(input, 0)
    }

    /// Constructs a parser that starts reading at byte offset `pos`.
    pub fn at(input: &'a [u8], pos: usize) -> Self {
        Parser {
            input,
            pos: pos.min(input.len()),
            depth: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Look at the next character in the input without consuming it.
    fn peek_char(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_char_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    /// Consume the next character in the input.
    fn next_char(&mut self) -> Option<u8> {
        let ch = self.peek_char()?;
        self.pos += 1;
        Some(ch)
    }

    fn discard_char(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    /// Discard any whitespace and comments. Returns whether anything was discarded.
    pub fn discard_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.discard_char();
            } else if ch == b'%' {
                while let Some(ch) = self.peek_char() {
                    if ch == b'\r' || ch == b'\n' {
                        break;
                    }
                    self.discard_char();
                }
            } else {
                break;
            }
        }
        self.pos > start
    }

    /// Consumes `keyword` (after leading whitespace) if it is next in the input and is not just
    /// the prefix of a longer token.
    pub fn parse_keyword(&mut self, keyword: &[u8]) -> bool {
        let start = self.pos;
        self.discard_whitespace();
        let rest = &self.input[self.pos..];
        let matches = rest.starts_with(keyword)
            && rest
                .get(keyword.len())
                .map_or(true, |&ch| !is_regular(ch));
        if matches {
            self.pos += keyword.len();
        } else {
            self.pos = start;
        }
        matches
    }

    pub fn expect_keyword(&mut self, keyword: &[u8], expected: &'static str) -> Result<()> {
        if self.parse_keyword(keyword) {
            Ok(())
        } else {
            Err(Error::expected(expected, self.pos))
        }
    }

    /// Parses a non-negative decimal integer (after leading whitespace).
    pub fn parse_unsigned(&mut self) -> Result<u64> {
        self.discard_whitespace();
        let start = self.pos;
        let mut val: u64 = 0;
        while let Some(ch @ b'0'..=b'9') = self.peek_char() {
            val = val
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(ch - b'0')))
                .ok_or(Error::NumberOverflow(start))?;
            self.discard_char();
        }
        if self.pos == start {
            return Err(match self.peek_char() {
                Some(_) => Error::expected("unsigned integer", start),
                None => Error::Eof(start),
            });
        }
        Ok(val)
    }

    /// Parses an `<id> <rev> obj` header.
    pub fn parse_object_header(&mut self) -> Result<ObjectId> {
        let offset = self.pos;
        let id = self.parse_unsigned()?;
        let rev = self.parse_unsigned()?;
        self.expect_keyword(b"obj", "obj")?;
        to_object_id(id, rev, offset)
    }

    /// Parses a complete indirect object (`<id> <rev> obj … endobj`), including a trailing stream
    /// payload.
    ///
    /// `length` is asked to turn the stream dictionary's `/Length` entry into a byte count; this
    /// lets callers resolve indirect lengths. When it yields nothing usable, the payload is
    /// delimited by the next `endstream` keyword instead.
    pub fn parse_indirect_object<F>(&mut self, length: F) -> Result<(ObjectId, Value)>
    where
        F: FnOnce(&Value) -> Option<usize>,
    {
        let id = self.parse_object_header()?;
        let value = self.parse_value()?;

        let value = match value {
            Value::Dictionary(dict) if self.parse_keyword(b"stream") => {
                let declared = dict.get("Length").and_then(length);
                let data = self.parse_stream_data(declared)?;
                Value::Stream(Stream::with_data(dict, data))
            }
            value => value,
        };

        // missing `endobj` keywords are common enough to not fail over them
        self.parse_keyword(b"endobj");

        Ok((id, value))
    }

    fn parse_stream_data(&mut self, declared: Option<usize>) -> Result<Vec<u8>> {
        // the `stream` keyword is followed by CRLF or LF (some producers emit a lone CR)
        match self.peek_char() {
            Some(b'\r') => {
                self.discard_char();
                if self.peek_char() == Some(b'\n') {
                    self.discard_char();
                }
            }
            Some(b'\n') => self.discard_char(),
            _ => {}
        }

        let start = self.pos;
        if let Some(len) = declared {
            if let Some(end) = start.checked_add(len).filter(|&end| end <= self.input.len()) {
                self.pos = end;
                if self.parse_keyword(b"endstream") {
                    return Ok(self.input[start..end].to_vec());
                }
                self.pos = start;
            }
        }

        let found = find(&self.input[start..], b"endstream")
            .ok_or_else(|| Error::expected("endstream", start))?;
        let mut end = start + found;
        if end > start && self.input[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.input[end - 1] == b'\r' {
            end -= 1;
        }
        self.pos = start + found + b"endstream".len();
        Ok(self.input[start..end].to_vec())
    }

    /// Parses the next direct value. Integers directly followed by `<rev> R` are read as indirect
    /// references.
    pub fn parse_value(&mut self) -> Result<Value> {
        self.discard_whitespace();
        match self.peek_char() {
            None => Err(Error::Eof(self.pos)),
            Some(b'/') => Ok(Value::Name(self.parse_name()?)),
            Some(b'(') => Ok(Value::String(PdfString::Literal(
                self.parse_literal_string()?,
            ))),
            Some(b'<') => {
                if self.peek_char_at(1) == Some(b'<') {
                    Ok(Value::Dictionary(self.parse_dictionary()?))
                } else {
                    Ok(Value::String(PdfString::Hex(self.parse_hex_string()?)))
                }
            }
            Some(b'[') => Ok(Value::Array(self.parse_array()?)),
            Some(b'0'..=b'9') => {
                let start = self.pos;
                let number = self.parse_number()?;
                if let Value::Integer(id) = number {
                    if let Some(reference) = self.parse_reference_tail(id as u64, start)? {
                        return Ok(Value::Reference(reference));
                    }
                }
                Ok(number)
            }
            Some(b'+') | Some(b'-') | Some(b'.') => self.parse_number(),
            Some(_) => {
                if self.parse_keyword(b"true") {
                    Ok(Value::Bool(true))
                } else if self.parse_keyword(b"false") {
                    Ok(Value::Bool(false))
                } else if self.parse_keyword(b"null") {
                    Ok(Value::Null)
                } else {
                    Err(Error::expected("value", self.pos))
                }
            }
        }
    }

    /// Having just read the integer `id`, checks for a following `<rev> R`. The position is left
    /// untouched if there is none.
    fn parse_reference_tail(&mut self, id: u64, offset: usize) -> Result<Option<ObjectId>> {
        let after_id = self.pos;
        if !self.discard_whitespace() {
            return Ok(None);
        }
        if let Some(b'0'..=b'9') = self.peek_char() {
            if let Ok(rev) = self.parse_unsigned() {
                if self.parse_keyword(b"R") {
                    return to_object_id(id, rev, offset).map(Some);
                }
            }
        }
        self.pos = after_id;
        Ok(None)
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        if let Some(b'+') | Some(b'-') = self.peek_char() {
            self.discard_char();
        }
        // some producers emit doubled signs (`--1`)
        while let Some(b'+') | Some(b'-') = self.peek_char() {
            self.discard_char();
        }

        let mut is_real = false;
        let mut digits = 0;
        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => digits += 1,
                b'.' if !is_real => is_real = true,
                _ => break,
            }
            self.discard_char();
        }
        if digits == 0 {
            return Err(Error::expected("number", start));
        }

        // doubled signs collapse into the first one
        let negative = self.input[start] == b'-';
        let mut text = String::with_capacity(self.pos - start);
        if negative {
            text.push('-');
        }
        text.extend(
            self.input[start..self.pos]
                .iter()
                .filter(|&&ch| ch != b'+' && ch != b'-')
                .map(|&ch| char::from(ch)),
        );

        if !is_real {
            if let Ok(v) = text.parse::<i64>() {
                return Ok(Value::Integer(v));
            }
        }
        // integers that do not fit into 64 bits degrade to reals
        text.parse::<f64>()
            .map(Value::Real)
            .map_err(|_| Error::NumberOverflow(start))
    }

    fn parse_literal_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        if self.next_char() != Some(b'(') {
            return Err(Error::expected("string", start));
        }

        let mut bytes = Vec::new();
        let mut opened_parentheses = 0;
        while let Some(ch) = self.next_char() {
            match ch {
                b'(' => {
                    opened_parentheses += 1;
                    bytes.push(ch);
                }
                b')' => {
                    if opened_parentheses == 0 {
                        return Ok(bytes);
                    }

                    opened_parentheses -= 1;
                    bytes.push(ch);
                }
                b'\r' => {
                    // unescaped end-of-line markers read as a single LF
                    if self.peek_char() == Some(b'\n') {
                        self.discard_char();
                    }
                    bytes.push(b'\n');
                }
                b'\\' => match self.next_char() {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b'r') => bytes.push(b'\r'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'b') => bytes.push(0x08),
                    Some(b'f') => bytes.push(0x0C),
                    Some(b'\r') => {
                        // line continuation
                        if self.peek_char() == Some(b'\n') {
                            self.discard_char();
                        }
                    }
                    Some(b'\n') => {}
                    Some(c1 @ b'0'..=b'7') => {
                        let mut code = u32::from(c1 - b'0');
                        // we take up to three, ie, two more digits
                        for _ in 1..=2 {
                            match self.peek_char() {
                                Some(c @ b'0'..=b'7') => {
                                    code = code * 8 + u32::from(c - b'0');
                                    self.discard_char();
                                }
                                _ => break,
                            }
                        }
                        // high-order overflow is ignored
                        bytes.push((code & 0xFF) as u8);
                    }
                    // the backslash is ignored for any other character
                    Some(other) => bytes.push(other),
                    None => return Err(Error::Eof(self.pos)),
                },
                _ => bytes.push(ch),
            }
        }

        Err(Error::Eof(self.pos))
    }

    fn parse_hex_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        if self.next_char() != Some(b'<') {
            return Err(Error::expected("hex string", start));
        }

        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            match self.next_char() {
                Some(b'>') => break,
                Some(ch) if is_whitespace(ch) => continue,
                Some(ch) => {
                    let nibble =
                        hex_value(ch).ok_or(Error::InvalidEscapeSequence(self.pos - 1))?;
                    match high.take() {
                        Some(h) => bytes.push(h << 4 | nibble),
                        None => high = Some(nibble),
                    }
                }
                None => return Err(Error::Eof(self.pos)),
            }
        }
        // an odd number of digits behaves as if followed by `0`
        if let Some(h) = high {
            bytes.push(h << 4);
        }

        Ok(bytes)
    }

    fn parse_name(&mut self) -> Result<Name> {
        let start = self.pos;
        if self.next_char() != Some(b'/') {
            return Err(Error::expected("name", start));
        }

        let mut name = Vec::new();
        while let Some(ch) = self.peek_char() {
            if !is_regular(ch) {
                // other characters cannot occur inside a name, so we are done here
                break;
            }
            self.discard_char();

            if ch == b'#' {
                let escaped = self
                    .peek_char()
                    .and_then(hex_value)
                    .zip(self.peek_char_at(1).and_then(hex_value));
                if let Some((h, l)) = escaped {
                    self.pos += 2;
                    name.push(h << 4 | l);
                    continue;
                }
            }
            name.push(ch);
        }

        Ok(Name::new(name))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn parse_array(&mut self) -> Result<Vec<Value>> {
        let start = self.pos;
        if self.next_char() != Some(b'[') {
            return Err(Error::expected("array", start));
        }
        self.enter()?;

        let mut arr = Vec::new();
        loop {
            self.discard_whitespace();
            match self.peek_char() {
                Some(b']') => {
                    self.discard_char();
                    break;
                }
                None => return Err(Error::Eof(self.pos)),
                Some(_) => arr.push(self.parse_value()?),
            }
        }

        self.depth -= 1;
        Ok(arr)
    }

    /// Parses a `<< … >>` dictionary.
    pub fn parse_dictionary(&mut self) -> Result<Dictionary> {
        self.discard_whitespace();
        let start = self.pos;
        if !self.input[self.pos..].starts_with(b"<<") {
            return Err(Error::expected("dictionary", start));
        }
        self.pos += 2;
        self.enter()?;

        let mut dict = Dictionary::new();
        loop {
            self.discard_whitespace();
            match self.peek_char() {
                Some(b'>') if self.peek_char_at(1) == Some(b'>') => {
                    self.pos += 2;
                    break;
                }
                Some(b'/') => {
                    let key = self.parse_name()?;
                    let value = self.parse_value()?;
                    // a null value is equivalent to an absent entry
                    if !value.is_null() {
                        dict.insert(key, value);
                    }
                }
                None => return Err(Error::Eof(self.pos)),
                Some(_) => return Err(Error::expected("name", self.pos)),
            }
        }

        self.depth -= 1;
        Ok(dict)
    }
}

fn to_object_id(id: u64, rev: u64, offset: usize) -> Result<ObjectId> {
    match (u32::try_from(id), u16::try_from(rev)) {
        (Ok(id), Ok(rev)) => Ok(ObjectId::new(id, rev)),
        _ => Err(Error::NumberOverflow(offset)),
    }
}

/// Finds the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Finds the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
