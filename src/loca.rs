// https://docs.microsoft.com/en-us/typography/opentype/spec/loca

use core::num::NonZeroU16;
use core::ops::Range;

use crate::parser::Stream;
use crate::head::IndexToLocationFormat;
use crate::{Face, GlyphId, LazyArray16, Result, Error, TableName};

#[derive(Clone, Copy)]
pub enum Table<'a> {
    Short(LazyArray16<'a, u16>),
    Long(LazyArray16<'a, u32>),
}

impl<'a> Table<'a> {
    pub fn parse(
        data: &'a [u8],
        number_of_glyphs: NonZeroU16,
        format: IndexToLocationFormat,
    ) -> Result<Self> {
        // The number of ranges is `maxp.numGlyphs + 1`.
        //
        // Check for overflow first.
        let total = if number_of_glyphs.get() == core::u16::MAX {
            number_of_glyphs.get()
        } else {
            number_of_glyphs.get() + 1
        };

        let mut s = Stream::new(data);
        match format {
            IndexToLocationFormat::Short => {
                Ok(Table::Short(s.read_array(total)?))
            }
            IndexToLocationFormat::Long => {
                Ok(Table::Long(s.read_array(total)?))
            }
        }
    }

    #[inline]
    fn len(&self) -> u16 {
        match self {
            Table::Short(ref array) => array.len(),
            Table::Long(ref array) => array.len(),
        }
    }
}

impl<'a> Face<'a> {
    pub(crate) fn glyph_range(&self, glyph_id: GlyphId) -> Result<Range<usize>> {
        let table = self.loca.ok_or_else(|| Error::TableMissing(TableName::IndexToLocation))?;

        let id = glyph_id.0;
        if id == core::u16::MAX {
            return Err(Error::NoGlyph);
        }

        // Glyph ID must be smaller than total number of values in a `loca` array.
        if id + 1 >= table.len() {
            return Err(Error::NoGlyph);
        }

        let range = match table {
            Table::Short(ref array) => {
                // 'The actual local offset divided by 2 is stored.'
                array.at(id) as usize * 2 .. array.at(id + 1) as usize * 2
            }
            Table::Long(ref array) => {
                array.at(id) as usize .. array.at(id + 1) as usize
            }
        };

        // TODO: use Range::is_empty as soon as it became stable
        if range.start == range.end {
            // No outline, e.g. a space glyph.
            Err(Error::NoGlyph)
        } else if range.start > range.end {
            // 'The offsets must be in ascending order.'
            Err(Error::InvalidFormat)
        } else {
            Ok(range)
        }
    }
}
