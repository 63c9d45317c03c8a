//! Mixed-payload coercion.
//!
//! The source accepts a dynamically-typed mix of integers and character
//! strings and walks it at runtime (`_convert_data`). The systems rewrite
//! exposes a strongly-typed byte buffer plus a small builder for the mixed
//! case, validating each element eagerly and returning `Error::InvalidPayload`
//! instead of silently miscoercing it (the source has a bug in both its
//! integer-only and string-only branches; this implements the semantics
//! spec.md states were intended, not the bug).

use crate::error::{Error, Result};

/// One element of a mixed logical payload, as accepted by the source's
/// `send_data`/`send_response` before byte conversion.
#[derive(Debug, Clone)]
pub enum Element {
    Byte(u32),
    Text(String),
}

impl From<u8> for Element {
    fn from(b: u8) -> Self {
        Element::Byte(b as u32)
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::Text(s.to_owned())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::Text(s)
    }
}

/// Builder that validates a mixed sequence of integers and/or character
/// sequences into a flat byte buffer.
///
/// * A character sequence expands to its code-point sequence; every code
///   point must lie in `[0, 255]`.
/// * An integer must lie in `[0, 255]`.
/// * Any out-of-range or unsupported element fails the whole conversion.
pub struct Payload;

impl Payload {
    /// Fast path: caller already has raw bytes to send, no coercion needed.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Vec<u8> {
        bytes.into()
    }

    /// Coerces a single element (convenience for `send_request(Element::from(...))`
    /// style call sites).
    pub fn try_from_element(element: impl Into<Element>) -> Result<Vec<u8>> {
        Self::try_from_elements([element])
    }

    /// Coerces a mixed list of elements, per the rules above.
    pub fn try_from_elements<I, E>(elements: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = E>,
        E: Into<Element>,
    {
        let mut out = Vec::new();
        for element in elements {
            match element.into() {
                Element::Byte(v) => {
                    if v > 255 {
                        return Err(Error::InvalidPayload);
                    }
                    out.push(v as u8);
                }
                Element::Text(s) => {
                    for ch in s.chars() {
                        let cp = ch as u32;
                        if cp > 255 {
                            return Err(Error::InvalidPayload);
                        }
                        out.push(cp as u8);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_in_range_convert() {
        let bytes = Payload::try_from_elements([0_u8, 1, 255]).unwrap();
        assert_eq!(bytes, vec![0, 1, 255]);
    }

    #[test]
    fn out_of_range_integer_is_rejected() {
        let err = Payload::try_from_elements([Element::Byte(256)]).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload));
    }

    #[test]
    fn ascii_text_expands_to_code_points() {
        let bytes = Payload::try_from_elements(["abc"]).unwrap();
        assert_eq!(bytes, vec![b'a', b'b', b'c']);
    }

    #[test]
    fn non_latin1_code_point_is_rejected() {
        let err = Payload::try_from_elements(["é\u{1F600}"]).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload));
    }

    #[test]
    fn mixed_integers_and_text_compose_in_order() {
        let bytes = Payload::try_from_elements([
            Element::Byte(1),
            Element::Text("AB".into()),
            Element::Byte(2),
        ])
        .unwrap();
        assert_eq!(bytes, vec![1, b'A', b'B', 2]);
    }
}
