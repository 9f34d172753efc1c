//! Utility functions for identifiers and store keys

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32, e.g. `rej_1...`
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Big-endian `cashflow_id ++ cashflow_version`, so a prefix scan on the id yields versions in order.
pub fn cashflow_key(cashflow_id: u64, cashflow_version: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&cashflow_id.to_be_bytes());
    key.extend_from_slice(&cashflow_version.to_be_bytes());
    key
}

pub fn decode_cashflow_key(key: &[u8]) -> Option<(u64, u32)> {
    let id: [u8; 8] = key.get(..8)?.try_into().ok()?;
    let version: [u8; 4] = key.get(8..12)?.try_into().ok()?;
    if key.len() != 12 {
        return None;
    }
    Some((u64::from_be_bytes(id), u32::from_be_bytes(version)))
}

pub fn decode_version(value: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = value.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
