//! Decoding of the streams the document parser itself needs to look into (cross-reference streams
//! and object streams). Page content is never decoded.

use std::io::Read;

use flate2::read::ZlibDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use serde_pdf::{Dictionary, Name, Stream, Value};

use crate::error::{Error, Result};

/// Returns the decoded payload of `stream`, applying its `/Filter` chain and predictors.
pub fn decode(stream: &Stream) -> Result<Vec<u8>> {
    let filters = names_or_array(stream.dict.get("Filter"));
    let parms = stream.dict.get("DecodeParms");

    let mut data = stream.data.clone();
    for (i, filter) in filters.iter().enumerate() {
        data = match filter.as_bytes() {
            b"FlateDecode" | b"Fl" => {
                let inflated = inflate(&data);
                match decode_parms(parms, i) {
                    Some(parms) => unpredict(&inflated, parms)?,
                    None => inflated,
                }
            }
            _ => {
                return Err(Error::malformed(format!(
                    "unsupported filter {} on a cross-reference or object stream",
                    filter
                )))
            }
        };
    }

    Ok(data)
}

fn names_or_array(value: Option<&Value>) -> Vec<&Name> {
    match value {
        Some(Value::Name(name)) => vec![name],
        Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_name).collect(),
        _ => Vec::new(),
    }
}

fn decode_parms(parms: Option<&Value>, index: usize) -> Option<&Dictionary> {
    match parms? {
        Value::Dictionary(dict) => Some(dict),
        Value::Array(arr) => arr.get(index).and_then(|v| match v {
            Value::Dictionary(dict) => Some(dict),
            _ => None,
        }),
        _ => None,
    }
}

fn inflate(data: &[u8]) -> Vec<u8> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    if decoder.read_to_end(&mut decompressed).is_err() {
        tracing::debug!("corrupt zlib data, falling back to partial decompression");
        decompressed = inflate_partial(data);
    }
    decompressed
}

/// Best-effort zlib decompression returning everything up to the point the data is corrupt
/// (often only a broken checksum at the very end).
fn inflate_partial(data: &[u8]) -> Vec<u8> {
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) if consumed == 0 && produced == 0 => break,
            Ok(_) => i += consumed,
        }
    }
    out
}

/// A positive size parameter; zero and negative values count as 1.
fn size_parm(parms: &Dictionary, key: &str, default: usize) -> Result<usize> {
    match parms.get(key).and_then(Value::as_i64) {
        Some(v) => usize::try_from(v.max(1))
            .map_err(|_| Error::malformed(format!("/{} {} is out of range", key, v))),
        None => Ok(default),
    }
}

fn bytes_for_bits(bits: usize) -> usize {
    bits / 8 + usize::from(bits % 8 != 0)
}

/// Reverses the TIFF or PNG predictor described by `parms`.
fn unpredict(data: &[u8], parms: &Dictionary) -> Result<Vec<u8>> {
    let predictor = parms
        .get("Predictor")
        .and_then(Value::as_i64)
        .unwrap_or(1);
    if predictor == 1 {
        return Ok(data.to_vec());
    }

    let colors = size_parm(parms, "Colors", 1)?;
    let bits = size_parm(parms, "BitsPerComponent", 8)?;
    let columns = size_parm(parms, "Columns", 1)?;

    let pixel_bits = colors
        .checked_mul(bits)
        .ok_or_else(|| Error::malformed("predictor pixel size overflows"))?;
    let row_bits = pixel_bits
        .checked_mul(columns)
        .ok_or_else(|| Error::malformed("predictor row length overflows"))?;
    let bpp = bytes_for_bits(pixel_bits);
    let row_len = bytes_for_bits(row_bits);
    if row_len > data.len() {
        return Err(Error::malformed(format!(
            "predictor row length {} exceeds the {} bytes of stream data",
            row_len,
            data.len()
        )));
    }

    match predictor {
        2 if bits == 8 => Ok(unpredict_tiff(data, row_len, bpp)),
        2 => Err(Error::malformed(
            "TIFF predictor is only supported for 8 bits per component",
        )),
        10..=15 => unpredict_png(data, row_len, bpp),
        other => Err(Error::malformed(format!("unknown predictor {}", other))),
    }
}

fn unpredict_tiff(data: &[u8], row_len: usize, bpp: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    out
}

/// PNG prediction prefixes each row with a filter type byte; every row is reconstructed relative
/// to the previous (already reconstructed) one.
fn unpredict_png(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (filter_type, encoded) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = encoded.to_vec();
        // a truncated final row is padded
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            row[i] = match filter_type {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::malformed(format!(
                        "invalid PNG predictor row type {}",
                        other
                    )))
                }
            };
        }

        out.extend_from_slice(&row);
        prev = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
