//! strict decode plumbing shared by the canonical codec.
//!
//! AUMs and states hash to their canonical CBOR encoding, so the codec
//! cannot tolerate the usual decoder leniency: unknown fields, duplicate
//! fields, indefinite-length items, and trailing bytes are all rejected.

use std::collections::BTreeMap;

use minicbor::encode::Write;
use minicbor::{Decoder, Encoder, decode, encode};

use crate::Error;

/// sanity cap on decoded sequence length claims.
pub(crate) const MAX_SEQ_LEN: u64 = 65_536;

/// encode a value to its canonical CBOR bytes.
pub(crate) fn to_vec<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, Error> {
    minicbor::to_vec(value).map_err(|e| Error::Cbor(e.to_string()))
}

/// decode a value from CBOR bytes, rejecting trailing input.
pub(crate) fn from_slice<T>(bytes: &[u8]) -> Result<T, Error>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut d = Decoder::new(bytes);
    let value: T = d.decode().map_err(|e| Error::Cbor(e.to_string()))?;
    if d.position() != bytes.len() {
        return Err(Error::Cbor(format!(
            "{} trailing bytes after value",
            bytes.len() - d.position()
        )));
    }
    Ok(value)
}

/// read a definite-length map header within the sequence cap.
pub(crate) fn map_header(d: &mut Decoder<'_>) -> Result<u64, decode::Error> {
    match d.map()? {
        Some(len) if len <= MAX_SEQ_LEN => Ok(len),
        Some(len) => Err(decode::Error::message(format!(
            "map of {len} entries exceeds limit"
        ))),
        None => Err(decode::Error::message("indefinite-length map")),
    }
}

/// read a definite-length array header within the sequence cap.
pub(crate) fn array_header(d: &mut Decoder<'_>) -> Result<u64, decode::Error> {
    match d.array()? {
        Some(len) if len <= MAX_SEQ_LEN => Ok(len),
        Some(len) => Err(decode::Error::message(format!(
            "array of {len} items exceeds limit"
        ))),
        None => Err(decode::Error::message("indefinite-length array")),
    }
}

/// tracks which integer field tags a map has already supplied.
#[derive(Default)]
pub(crate) struct FieldSet(u64);

impl FieldSet {
    /// record `tag`, rejecting duplicates and tags outside the known range.
    pub(crate) fn insert(&mut self, tag: u32) -> Result<(), decode::Error> {
        if tag >= 64 {
            return Err(decode::Error::message(format!("unknown field {tag}")));
        }
        let bit = 1u64 << tag;
        if self.0 & bit != 0 {
            return Err(decode::Error::message(format!("duplicate field {tag}")));
        }
        self.0 |= bit;
        Ok(())
    }
}

/// encode a sequence of byte strings as a definite-length array.
pub(crate) fn encode_byte_seq<W: Write>(
    e: &mut Encoder<W>,
    items: &[Vec<u8>],
) -> Result<(), encode::Error<W::Error>> {
    e.array(items.len() as u64)?;
    for item in items {
        e.bytes(item)?;
    }
    Ok(())
}

/// decode a definite-length array of byte strings.
pub(crate) fn decode_byte_seq(d: &mut Decoder<'_>) -> Result<Vec<Vec<u8>>, decode::Error> {
    let len = array_header(d)?;
    let mut out = Vec::new();
    for _ in 0..len {
        out.push(d.bytes()?.to_vec());
    }
    Ok(out)
}

/// encode a string-to-string map. `BTreeMap` iteration order keeps the
/// encoding canonical.
pub(crate) fn encode_meta<W: Write>(
    e: &mut Encoder<W>,
    meta: &BTreeMap<String, String>,
) -> Result<(), encode::Error<W::Error>> {
    e.map(meta.len() as u64)?;
    for (key, value) in meta {
        e.str(key)?.str(value)?;
    }
    Ok(())
}

/// decode a string-to-string map, rejecting duplicate keys.
pub(crate) fn decode_meta(d: &mut Decoder<'_>) -> Result<BTreeMap<String, String>, decode::Error> {
    let len = map_header(d)?;
    let mut meta = BTreeMap::new();
    for _ in 0..len {
        let key = d.str()?.to_string();
        let value = d.str()?.to_string();
        if meta.insert(key, value).is_some() {
            return Err(decode::Error::message("duplicate meta key"));
        }
    }
    Ok(meta)
}
