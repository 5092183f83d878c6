// https://docs.microsoft.com/en-us/typography/opentype/spec/head

use crate::parser::SafeStream;
use crate::{Face, Result, Error, Rect};

/// The `loca` entry width, selected by `head.indexToLocFormat`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum IndexToLocationFormat {
    /// Offsets are stored `/ 2`.
    Short,
    /// Offsets are stored as-is.
    Long,
}

#[derive(Clone, Copy)]
pub(crate) struct Table {
    units_per_em: u16,
    index_to_loc_format: i16,
    bbox: Rect,
}

impl Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 54 {
            return Err(Error::InvalidFormat);
        }

        let mut s = SafeStream::new(data);
        s.read_bytes(18u32); // version, fontRevision, checkSumAdjustment, magicNumber, flags
        let units_per_em: u16 = s.read();
        s.read_bytes(16u32); // created, modified
        let x_min: i16 = s.read();
        let y_min: i16 = s.read();
        let x_max: i16 = s.read();
        let y_max: i16 = s.read();
        s.read_bytes(6u32); // macStyle, lowestRecPPEM, fontDirectionHint
        let index_to_loc_format: i16 = s.read();

        Ok(Table {
            units_per_em,
            index_to_loc_format,
            bbox: Rect { x_min, y_min, x_max, y_max },
        })
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn index_to_loc_format(&self) -> i16 {
        self.index_to_loc_format
    }
}

impl<'a> Face<'a> {
    /// Returns the `loca` entry width.
    #[inline]
    pub fn index_to_location_format(&self) -> Result<IndexToLocationFormat> {
        match self.head.index_to_loc_format() {
            0 => Ok(IndexToLocationFormat::Short),
            1 => Ok(IndexToLocationFormat::Long),
            _ => Err(Error::InvalidFormat),
        }
    }

    /// Returns the font's units-per-em, the integer denominator of every
    /// design-space coordinate. Typically 1000 (PostScript) or 1024/2048
    /// (TrueType).
    ///
    /// Returns `Error::InvalidFormat` when the value is outside `16..=16384`,
    /// per the OpenType spec's valid range.
    #[inline]
    pub fn units_per_em(&self) -> Result<u16> {
        let num = self.head.units_per_em();
        if num >= 16 && num <= 16384 {
            Ok(num)
        } else {
            Err(Error::InvalidFormat)
        }
    }

    /// Returns the face's design-space bounding box, as stored in `head`.
    #[inline]
    pub fn global_bounding_box(&self) -> Rect {
        self.head.bbox
    }
}
