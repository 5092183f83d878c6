// https://docs.microsoft.com/en-us/typography/opentype/spec/vmtx
// Layout is identical to `hmtx`; parsing is shared via `hmtx::Table`.

use crate::{Face, GlyphId};

impl<'a> Face<'a> {
    /// Returns a glyph's vertical advance, in design units.
    #[inline]
    pub fn glyph_ver_advance(&self, glyph_id: GlyphId) -> Option<u16> {
        self.vmtx.and_then(|t| t.advance(glyph_id))
    }

    /// Returns a glyph's vertical side bearing (top side bearing), in design units.
    #[inline]
    pub fn glyph_ver_side_bearing(&self, glyph_id: GlyphId) -> Option<i16> {
        self.vmtx.and_then(|t| t.side_bearing(glyph_id))
    }
}
