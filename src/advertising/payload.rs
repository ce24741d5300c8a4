//! Advertising payload encoding

use heapless::Vec;

use crate::advertising::{ad_type, AdError};
use crate::config;

/// Legacy advertising payload
pub type AdBuffer = Vec<u8, { config::advertising::MAX_AD_LEN }>;

/// LE General Discoverable Mode
pub const LE_GENERAL_DISCOVERABLE: u8 = 0x02;
/// BR/EDR Not Supported
pub const BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// One advertising data structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdStructure<'a> {
    Flags(u8),
    CompleteUuids128(&'a [[u8; 16]]),
    CompleteLocalName(&'a str),
}

impl AdStructure<'_> {
    fn push(&self, out: &mut AdBuffer) -> Result<(), AdError> {
        match self {
            Self::Flags(flags) => push_record(out, ad_type::FLAGS, &[*flags]),
            Self::CompleteUuids128(uuids) => push_uuids(out, ad_type::UUID128_COMPLETE, uuids),
            Self::CompleteLocalName(name) => push_record(out, ad_type::COMPLETE_NAME, name.as_bytes()),
        }
    }
}

fn push_header(out: &mut AdBuffer, ty: u8, len: usize) -> Result<(), AdError> {
    let len = u8::try_from(len + 1).map_err(|_| AdError::TooLong)?;
    out.push(len).map_err(|_| AdError::TooLong)?;
    out.push(ty).map_err(|_| AdError::TooLong)
}

fn push_record(out: &mut AdBuffer, ty: u8, data: &[u8]) -> Result<(), AdError> {
    push_header(out, ty, data.len())?;
    out.extend_from_slice(data).map_err(|_| AdError::TooLong)
}

fn push_uuids(out: &mut AdBuffer, ty: u8, uuids: &[[u8; 16]]) -> Result<(), AdError> {
    push_header(out, ty, uuids.len() * 16)?;
    for uuid in uuids {
        out.extend_from_slice(uuid).map_err(|_| AdError::TooLong)?;
    }
    Ok(())
}

/// Encode `structures` in order into one payload
pub fn encode(structures: &[AdStructure<'_>]) -> Result<AdBuffer, AdError> {
    let mut out = AdBuffer::new();
    for structure in structures {
        structure.push(&mut out)?;
    }
    Ok(out)
}

/// Flags plus the complete NUS service UUID list
pub fn nus_advertisement() -> Result<AdBuffer, AdError> {
    encode(&[
        AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
        AdStructure::CompleteUuids128(&[config::nus::SERVICE_UUID]),
    ])
}

/// Complete local name
pub fn nus_scan_response() -> Result<AdBuffer, AdError> {
    encode(&[AdStructure::CompleteLocalName(config::advertising::DEVICE_NAME)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nus_advertisement_bytes() {
        let adv = nus_advertisement().unwrap();
        assert_eq!(
            adv.as_slice(),
            &[
                0x02, 0x01, 0x06, 0x11, 0x07, 0x9E, 0xCA, 0xDC, 0x24, 0x0E, 0xE5, 0xA9, 0xE0, 0x93, 0xF3,
                0xA3, 0xB5, 0x01, 0x00, 0x40, 0x6E,
            ]
        );
    }

    #[test]
    fn test_scan_response_carries_name() {
        let sd = nus_scan_response().unwrap();
        assert_eq!(sd[0] as usize, 1 + "NUS Peripheral".len());
        assert_eq!(sd[1], 0x09);
        assert_eq!(&sd[2..], b"NUS Peripheral");
    }

    #[test]
    fn test_payload_over_limit_is_rejected() {
        let uuids = [[0u8; 16]; 2];
        assert_eq!(
            encode(&[AdStructure::CompleteUuids128(&uuids)]),
            Err(AdError::TooLong)
        );
        assert_eq!(
            encode(&[AdStructure::CompleteLocalName("a name that is much too long for 31")]),
            Err(AdError::TooLong)
        );
    }
}
