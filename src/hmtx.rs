// https://docs.microsoft.com/en-us/typography/opentype/spec/hmtx
// Also backs `vmtx`, which shares the exact same `longMetric[] + sidebearing[]` layout.

use crate::parser::{FromData, SafeStream, LazyArray16};
use crate::{Face, TableName, GlyphId, Result, Error};

/// One glyph's horizontal (or, when read from `vmtx`, vertical) metrics.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HorizontalMetrics {
    /// Advance width (or height), in design units.
    pub advance: u16,
    /// Left (or top) side bearing, in design units.
    pub left_side_bearing: i16,
}

impl FromData for HorizontalMetrics {
    const SIZE: usize = 4;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        let mut s = SafeStream::new(data);
        HorizontalMetrics {
            advance: s.read(),
            left_side_bearing: s.read(),
        }
    }
}

/// A parsed `hmtx`/`vmtx` table: `number_of_metrics` `(advance, bearing)`
/// pairs followed by a trailing bearing-only array for the remaining glyphs.
#[derive(Clone, Copy)]
pub(crate) struct Table<'a> {
    metrics: LazyArray16<'a, HorizontalMetrics>,
    bearings: LazyArray16<'a, i16>,
}

impl<'a> Table<'a> {
    pub fn parse(data: &'a [u8], number_of_metrics: u16, number_of_glyphs: core::num::NonZeroU16) -> Result<Self> {
        use crate::parser::Stream;

        if number_of_metrics == 0 {
            return Err(Error::NoHorizontalMetrics);
        }

        let mut s = Stream::new(data);
        let metrics: LazyArray16<HorizontalMetrics> = s.read_array(number_of_metrics)?;

        let total = number_of_glyphs.get();
        let bearings = if total > number_of_metrics {
            s.read_array(total - number_of_metrics)?
        } else {
            LazyArray16::default()
        };

        Ok(Table { metrics, bearings })
    }

    pub fn advance(&self, glyph_id: GlyphId) -> Option<u16> {
        self.metrics.get(glyph_id.0)
            .map(|m| m.advance)
            .or_else(|| self.metrics.last().map(|m| m.advance))
    }

    pub fn side_bearing(&self, glyph_id: GlyphId) -> Option<i16> {
        if let Some(m) = self.metrics.get(glyph_id.0) {
            return Some(m.left_side_bearing);
        }

        let idx = glyph_id.0.checked_sub(self.metrics.len())?;
        self.bearings.get(idx)
    }
}

impl<'a> Face<'a> {
    /// Returns glyph's horizontal metrics.
    pub fn glyph_hor_metrics(&self, glyph_id: GlyphId) -> Result<HorizontalMetrics> {
        self.check_glyph_id(glyph_id)?;
        let table = self.hmtx.ok_or(Error::TableMissing(TableName::HorizontalMetrics))?;
        Ok(HorizontalMetrics {
            advance: table.advance(glyph_id).ok_or(Error::NoHorizontalMetrics)?,
            left_side_bearing: table.side_bearing(glyph_id).ok_or(Error::NoHorizontalMetrics)?,
        })
    }

    /// Returns a glyph's horizontal advance, in design units.
    #[inline]
    pub fn glyph_hor_advance(&self, glyph_id: GlyphId) -> Option<u16> {
        self.hmtx.and_then(|t| t.advance(glyph_id))
    }

    /// Returns a glyph's horizontal side bearing, in design units.
    #[inline]
    pub fn glyph_hor_side_bearing(&self, glyph_id: GlyphId) -> Option<i16> {
        self.hmtx.and_then(|t| t.side_bearing(glyph_id))
    }
}
