// https://docs.microsoft.com/en-us/typography/opentype/spec/hhea

use crate::parser::SafeStream;
use crate::{Face, Result, Error};

#[derive(Clone, Copy)]
pub(crate) struct Table {
    ascender: i16,
    descender: i16,
    line_gap: i16,
    number_of_h_metrics: u16,
}

impl Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 36 {
            return Err(Error::InvalidFormat);
        }

        let mut s = SafeStream::new(data);
        s.read_bytes(4u32); // version
        let ascender: i16 = s.read();
        let descender: i16 = s.read();
        let line_gap: i16 = s.read();
        s.read_bytes(24u32); // advanceWidthMax .. metricDataFormat
        let number_of_h_metrics: u16 = s.read();

        Ok(Table { ascender, descender, line_gap, number_of_h_metrics })
    }

    #[inline]
    pub fn ascender(&self) -> i16 { self.ascender }
    #[inline]
    pub fn descender(&self) -> i16 { self.descender }
    #[inline]
    pub fn line_gap(&self) -> i16 { self.line_gap }
    #[inline]
    pub fn number_of_h_metrics(&self) -> u16 { self.number_of_h_metrics }
}

impl<'a> Face<'a> {
    /// Returns the face's ascender, in design units.
    #[inline]
    pub fn ascender(&self) -> i16 {
        self.hhea.ascender()
    }

    /// Returns the face's descender, in design units.
    #[inline]
    pub fn descender(&self) -> i16 {
        self.hhea.descender()
    }

    /// Returns the face's line height (`ascender - descender`), in design units.
    #[inline]
    pub fn height(&self) -> i16 {
        self.ascender() - self.descender()
    }

    /// Returns the face's recommended line gap, in design units.
    #[inline]
    pub fn line_gap(&self) -> i16 {
        self.hhea.line_gap()
    }

    pub(crate) fn number_of_hmetrics(&self) -> Result<u16> {
        let n = self.hhea.number_of_h_metrics();
        if n == 0 {
            Err(Error::NoHorizontalMetrics)
        } else {
            Ok(n)
        }
    }
}
