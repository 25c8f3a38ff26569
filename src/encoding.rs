use ethers::types::Address;
use thiserror::Error;

const MIN_RATIO_DIGITS: u32 = 1;
const MAX_RATIO_DIGITS: u32 = 15;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("invalid hex string `{0}`")]
    InvalidHex(String),
    #[error("ratio {0} out of range, expected a value within [0, 1]")]
    RatioOutOfRange(f64),
    #[error("ratio digits {0} out of range, expected 1..=15")]
    DigitsOutOfRange(u32),
    #[error("on-chain ratio {0} exceeds the precision base")]
    RatioValueOutOfRange(u128),
    #[error("invalid proposal id `{0}`")]
    InvalidProposalId(String),
}

pub fn ensure_0x(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}

pub fn strip_0x(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

pub fn hex_to_bytes(value: &str) -> Result<Vec<u8>, EncodingError> {
    let stripped = strip_0x(value);
    if stripped.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(stripped).map_err(|_| EncodingError::InvalidHex(value.to_string()))
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Encodes a 0..=1 ratio into an integer with the given digit precision, the
/// same representation governance contracts store on chain.
pub fn encode_ratio(ratio: f64, digits: u32) -> Result<u64, EncodingError> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(EncodingError::RatioOutOfRange(ratio));
    }
    if !(MIN_RATIO_DIGITS..=MAX_RATIO_DIGITS).contains(&digits) {
        return Err(EncodingError::DigitsOutOfRange(digits));
    }
    Ok((ratio * 10f64.powi(digits as i32)).round() as u64)
}

pub fn decode_ratio(value: u128, digits: u32) -> Result<f64, EncodingError> {
    if !(MIN_RATIO_DIGITS..=MAX_RATIO_DIGITS).contains(&digits) {
        return Err(EncodingError::DigitsOutOfRange(digits));
    }
    let base = 10u128.pow(digits);
    if value > base {
        return Err(EncodingError::RatioValueOutOfRange(value));
    }
    Ok(value as f64 / base as f64)
}

/// Joins a plugin address and a proposal nonce into the composite id the
/// indexer keys proposals by: `<address-hex>_<nonce-hex>`.
pub fn encode_proposal_id(plugin: Address, nonce: u64) -> String {
    format!("{plugin:#x}_{nonce:#x}")
}

pub fn decode_proposal_id(id: &str) -> Result<(Address, u64), EncodingError> {
    let invalid = || EncodingError::InvalidProposalId(id.to_string());
    let (address_part, nonce_part) = id.split_once('_').ok_or_else(invalid)?;
    let stripped = strip_0x(address_part);
    if stripped.len() != 40 {
        return Err(invalid());
    }
    let plugin: Address = address_part.parse().map_err(|_| invalid())?;
    let nonce_hex = nonce_part.strip_prefix("0x").ok_or_else(invalid)?;
    if nonce_hex.is_empty() {
        return Err(invalid());
    }
    let nonce = u64::from_str_radix(nonce_hex, 16).map_err(|_| invalid())?;
    Ok((plugin, nonce))
}
