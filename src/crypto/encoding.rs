//! Base64 codec used at every wire boundary (Component A).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("invalid base64 input")]
    InvalidBase64,
}

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    STANDARD.decode(s).map_err(|_| EncodingError::InvalidBase64)
}
