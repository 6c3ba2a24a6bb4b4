//! Minimal byte-tuple container: the framing used to carry a local
//! library's blob sequence inside a single host value. Each element is a
//! 16-bit big-endian length followed by the element bytes; the element
//! count is implicit.
//!
//! The surrounding system has a richer tree container; only this flat
//! framing crosses the core's boundary.

use thiserror::Error;

/// Tuple framing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TupleError {
    /// An element longer than the 16-bit length prefix can carry.
    #[error("tuple element of {0} bytes exceeds the 16-bit length prefix")]
    ElementTooLong(usize),
    /// The input ended inside a length prefix or an element.
    #[error("tuple truncated")]
    Truncated,
}

/// Frames a sequence of byte slices as one tuple.
pub fn to_tuple<I, B>(elements: I) -> Result<Vec<u8>, TupleError>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut out = Vec::new();
    for element in elements {
        let element = element.as_ref();
        let len = u16::try_from(element.len())
            .map_err(|_| TupleError::ElementTooLong(element.len()))?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(element);
    }
    Ok(out)
}

/// Splits a tuple back into its elements.
pub fn from_tuple(bytes: &[u8]) -> Result<Vec<Vec<u8>>, TupleError> {
    let mut elements = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let prefix: [u8; 2] = bytes
            .get(pos..pos + 2)
            .and_then(|s| s.try_into().ok())
            .ok_or(TupleError::Truncated)?;
        let len = u16::from_be_bytes(prefix) as usize;
        pos += 2;
        let element = bytes.get(pos..pos + len).ok_or(TupleError::Truncated)?;
        elements.push(element.to_vec());
        pos += len;
    }
    Ok(elements)
}
