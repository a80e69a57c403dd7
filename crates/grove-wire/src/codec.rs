//! The [`Wire`] trait and its implementations for every transmittable type.
//!
//! Layout rules:
//! - integers are big-endian, fixed width
//! - strings and blobs are a `u32` length then raw bytes
//! - `Option` is a tag byte (0 = None, 1 = Some) then the payload
//! - pairs concatenate their fields
//! - lists are a `u32` count then elements in order
//! - sets are encoded as a list in ascending element order; the reader
//!   accepts any order, the writer always canonicalizes

use std::collections::BTreeSet;

use grove_types::{Graph, Key, TagName, Value};

use crate::error::{WireError, WireResult};

/// Cap on speculative pre-allocation from untrusted element counts. A
/// hostile count still fails with `ShortRead` once the buffer runs dry,
/// without a large up-front allocation.
const MAX_PREALLOC: usize = 4096;

/// A type with an exact, canonical binary encoding.
pub trait Wire: Sized {
    /// Exact byte count `encode` will append.
    fn encoded_len(&self) -> usize;

    /// Serialize into `buf`, appending exactly `encoded_len` bytes.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Deserialize from the cursor, advancing it past this value.
    fn decode(r: &mut WireReader<'_>) -> WireResult<Self>;

    /// Encode into a fresh, exactly-sized buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        debug_assert_eq!(buf.len(), self.encoded_len());
        buf
    }

    /// Decode a full payload; leftover bytes are a protocol error.
    fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        let mut r = WireReader::new(bytes);
        let value = Self::decode(&mut r)?;
        if !r.is_empty() {
            return Err(WireError::TrailingBytes(r.remaining()));
        }
        Ok(value)
    }
}

/// Cursor over a byte slice being decoded.
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Start a cursor at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub fn read_byte(&mut self) -> WireResult<u8> {
        if self.pos >= self.data.len() {
            return Err(WireError::ShortRead);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(WireError::ShortRead);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

impl Wire for u8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        r.read_byte()
    }
}

impl Wire for u32 {
    fn encoded_len(&self) -> usize {
        4
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let bytes = r.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Wire for u64 {
    fn encoded_len(&self) -> usize {
        8
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_be_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let bytes = r.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(arr))
    }
}

impl Wire for String {
    fn encoded_len(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as u32).encode(buf);
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let len = u32::decode(r)? as usize;
        let bytes = r.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }
}

impl<T: Wire> Wire for Option<T> {
    fn encoded_len(&self) -> usize {
        match self {
            None => 1,
            Some(v) => 1 + v.encoded_len(),
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            None => buf.push(0),
            Some(v) => {
                buf.push(1);
                v.encode(buf);
            }
        }
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        match r.read_byte()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(r)?)),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

impl<A: Wire, B: Wire> Wire for (A, B) {
    fn encoded_len(&self) -> usize {
        self.0.encoded_len() + self.1.encoded_len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf);
        self.1.encode(buf);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let a = A::decode(r)?;
        let b = B::decode(r)?;
        Ok((a, b))
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn encoded_len(&self) -> usize {
        4 + self.iter().map(Wire::encoded_len).sum::<usize>()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as u32).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let count = u32::decode(r)? as usize;
        let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<T: Wire + Ord> Wire for BTreeSet<T> {
    fn encoded_len(&self) -> usize {
        4 + self.iter().map(Wire::encoded_len).sum::<usize>()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        // BTreeSet iterates ascending, which is the canonical order.
        (self.len() as u32).encode(buf);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let count = u32::decode(r)? as usize;
        let mut items = BTreeSet::new();
        for _ in 0..count {
            items.insert(T::decode(r)?);
        }
        Ok(items)
    }
}

impl Wire for Key {
    fn encoded_len(&self) -> usize {
        32
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let bytes = r.read_bytes(32)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Key::from_hash(arr))
    }
}

impl Wire for Value {
    fn encoded_len(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.len() as u32).encode(buf);
        buf.extend_from_slice(self.as_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let len = u32::decode(r)? as usize;
        let bytes = r.read_bytes(len)?;
        Ok(Value::new(bytes.to_vec()))
    }
}

impl Wire for TagName {
    fn encoded_len(&self) -> usize {
        4 + self.as_str().len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        (self.as_str().len() as u32).encode(buf);
        buf.extend_from_slice(self.as_str().as_bytes());
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let raw = String::decode(r)?;
        TagName::new(raw).map_err(|e| WireError::MalformedFrame(e.to_string()))
    }
}

impl Wire for Graph {
    fn encoded_len(&self) -> usize {
        self.nodes.encoded_len() + self.edges.encoded_len()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        self.nodes.encode(buf);
        self.edges.encode(buf);
    }

    fn decode(r: &mut WireReader<'_>) -> WireResult<Self> {
        let nodes = BTreeSet::decode(r)?;
        let edges = Vec::decode(r)?;
        Ok(Graph { nodes, edges })
    }
}

impl Wire for () {
    fn encoded_len(&self) -> usize {
        0
    }

    fn encode(&self, _buf: &mut Vec<u8>) {}

    fn decode(_r: &mut WireReader<'_>) -> WireResult<Self> {
        Ok(())
    }
}
