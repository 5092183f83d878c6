// https://docs.microsoft.com/en-us/typography/opentype/spec/maxp

use core::num::NonZeroU16;

use crate::parser::SafeStream;
use crate::{Error, Result};

pub(crate) fn parse_number_of_glyphs(data: &[u8]) -> Result<NonZeroU16> {
    if data.len() < 6 {
        return Err(Error::InvalidFormat);
    }

    let mut s = SafeStream::new_at(data, 4);
    let number_of_glyphs: u16 = s.read();
    NonZeroU16::new(number_of_glyphs).ok_or(Error::InvalidFormat)
}

/// Sizing limits for the bytecode interpreter, present only in the
/// version 1.0 `maxp` table (TrueType outlines). CFF fonts carry the
/// version 0.5 table, which stops right after `numGlyphs`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct HintingLimits {
    pub max_twilight_points: u16,
    pub max_storage: u16,
    pub max_function_defs: u16,
    pub max_stack_elements: u16,
}

pub(crate) fn parse_hinting_limits(data: &[u8]) -> Option<HintingLimits> {
    const VERSION_1_0: u32 = 0x0001_0000;
    if data.len() < 32 {
        return None;
    }

    let mut s = SafeStream::new_at(data, 0);
    let version: u32 = s.read();
    if version != VERSION_1_0 {
        return None;
    }

    let mut s = SafeStream::new_at(data, 16);
    let max_twilight_points: u16 = s.read();
    let max_storage: u16 = s.read();
    let max_function_defs: u16 = s.read();
    let _max_instruction_defs: u16 = s.read();
    let max_stack_elements: u16 = s.read();

    Some(HintingLimits { max_twilight_points, max_storage, max_function_defs, max_stack_elements })
}
