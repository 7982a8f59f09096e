use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Wire format of a device bus payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON (what the alarm controller firmware emits).
    #[default]
    Json,

    /// CBOR (compact binary, accepted from constrained devices).
    Cbor,
}

impl Format {
    /// Guess the format from the first non-whitespace byte.
    ///
    /// JSON documents start with `{` or `[`; anything else is treated as CBOR.
    /// Returns `None` for an empty (or all-whitespace) payload.
    pub fn detect(data: &[u8]) -> Option<Format> {
        let first = data.iter().find(|b| !b.is_ascii_whitespace())?;
        match first {
            b'{' | b'[' => Some(Format::Json),
            _ => Some(Format::Cbor),
        }
    }
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

/// Decode bytes to a value using the specified format.
pub fn decode<T: DeserializeOwned>(data: &[u8], format: Format) -> Result<T> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(Error::from),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::Cbor(e.to_string())),
    }
}

/// Decode bytes, auto-detecting the format.
pub fn decode_auto<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    let format = Format::detect(data).ok_or(Error::EmptyPayload)?;
    decode(data, format)
}
