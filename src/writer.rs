//! A tiny binary builder used only by unit tests to construct synthetic
//! font fragments byte by byte, without hand-counting offsets.

use std::vec::Vec;

/// One piece of a test fixture being assembled by [`convert`].
#[derive(Clone, Copy)]
#[allow(missing_docs)]
pub enum TtfType<'a> {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    UInt32(u32),
    CFFInt(i32),
    TrueTypeMagic,
    OpenTypeMagic,
    FontCollectionMagic,
    Raw(&'a [u8]),
}

/// Serializes a sequence of `TtfType` values into a single byte buffer,
/// big-endian throughout (matching SFNT/CFF numeric encoding).
pub fn convert(values: &[TtfType]) -> Vec<u8> {
    let mut data = Vec::new();
    for value in values {
        match *value {
            TtfType::Int8(n) => data.push(n as u8),
            TtfType::UInt8(n) => data.push(n),
            TtfType::Int16(n) => data.extend_from_slice(&n.to_be_bytes()),
            TtfType::UInt16(n) => data.extend_from_slice(&n.to_be_bytes()),
            TtfType::UInt32(n) => data.extend_from_slice(&n.to_be_bytes()),
            TtfType::CFFInt(n) => write_cff_int(&mut data, n),
            TtfType::TrueTypeMagic => data.extend_from_slice(&0x00010000u32.to_be_bytes()),
            TtfType::OpenTypeMagic => data.extend_from_slice(b"OTTO"),
            TtfType::FontCollectionMagic => data.extend_from_slice(b"ttcf"),
            TtfType::Raw(bytes) => data.extend_from_slice(bytes),
        }
    }

    data
}

/// Encodes an integer using the CFF Type 2 charstring/DICT number encoding
/// (Adobe Technical Note #5177, Table 3 / #5176, Table 3).
fn write_cff_int(data: &mut Vec<u8>, n: i32) {
    if (-107..=107).contains(&n) {
        data.push((n + 139) as u8);
    } else if (108..=1131).contains(&n) {
        let n = n - 108;
        data.push((n >> 8) as u8 + 247);
        data.push((n & 0xFF) as u8);
    } else if (-1131..=-108).contains(&n) {
        let n = -n - 108;
        data.push((n >> 8) as u8 + 251);
        data.push((n & 0xFF) as u8);
    } else {
        data.push(28);
        data.extend_from_slice(&(n as i16).to_be_bytes());
    }
}
