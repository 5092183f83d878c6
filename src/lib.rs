/*!
A font loading, outlining, rasterizing and SDF-generation engine.

## Pipeline

- (`directory`) Reads SFNT/TrueType Collection containers and locates tables
  by tag, the way [`Face::from_data`] does.
- (`glyf`, `CFF `, `CFF2`) Outlines a glyph into a sequence of move/line/quad/curve
  segments via [`Face::outline_glyph`], with a tight bounding box computed from
  the closed-form Bezier extrema rather than a loose control-point box.
- (`cmap`) Maps a Unicode scalar value to a glyph index via [`Face::glyph_index`].
- (`hmtx`, `vmtx`) Retrieves a glyph's advance and side bearing.
- (`kern`) Retrieves a glyph pair's kerning adjustment.
- (`name`) Lists `name` table records.
- (`post`) Retrieves underline metrics.
- (`head`, `hhea`) Retrieves the face's global metrics.

Outlining, rasterizing and signed-distance-field generation are layered: each
stage consumes the previous stage's output and none of them allocate beyond
what the caller's `OutlineBuilder`/canvas already owns.

## Error handling

Every fallible operation returns [`Result<T>`](Result). There is a single
flat [`Error`] enum rather than one per subsystem: see its documentation for
the module each variant is naturally raised from, and for which failures
recover locally (an unhinted or empty outline) versus propagate.

## Safety

- The library forbids unsafe code.
- The library must not panic on malformed input; a panic is a bug.
*/

#![forbid(unsafe_code)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]

#![no_std]

#[cfg(feature = "std")]
#[macro_use]
extern crate std;

use core::fmt;
use core::num::NonZeroU16;

macro_rules! try_opt_or {
    ($value:expr, $ret:expr) => {
        match $value {
            Some(v) => v,
            None => return $ret,
        }
    };
}

#[cfg(feature = "logging")]
macro_rules! warn {
    ($($arg:tt)+) => (
        log::log!(log::Level::Warn, $($arg)+);
    )
}

#[cfg(not(feature = "logging"))]
macro_rules! warn {
    ($($arg:tt)+) => () // do nothing
}

mod bbox;
mod cff;
mod cff2;
mod cmap;
mod error;
mod fixed;
mod glyf;
mod head;
mod hhea;
#[cfg(feature = "std")]
mod hint;
mod hmtx;
mod kern;
mod loca;
mod maxp;
mod name;
mod parser;
mod post;
#[cfg(feature = "std")]
mod raster;
#[cfg(feature = "std")]
mod sdf;
mod vhea;
mod vmtx;

#[cfg(feature = "std")]
mod writer;

#[cfg(feature = "std")]
pub use raster::{RasterMode, Rasterizer, DEFAULT_LCD_FILTER};
#[cfg(feature = "std")]
pub use sdf::{render_sdf, SdfOutline};

use parser::{Stream, SafeStream, FromData};
use cff::try_f32_to_i16;

pub use error::{Error, Module, Result};
pub use fixed::{F16Dot16, F26Dot6};
pub use head::IndexToLocationFormat;
pub use hmtx::HorizontalMetrics;
pub use name::*;


/// A type-safe wrapper for glyph ID.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub struct GlyphId(pub u16);

impl FromData for GlyphId {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        let mut s = SafeStream::new(data);
        GlyphId(s.read())
    }
}

impl Default for GlyphId {
    fn default() -> Self {
        GlyphId(0)
    }
}


/// A line metrics.
///
/// Used for underline and strikeout.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct LineMetrics {
    /// Line position.
    pub position: i16,

    /// Line thickness.
    pub thickness: i16,
}


/// A rectangle.
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub struct Rect {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl Rect {
    /// The rectangle's width, in design units.
    #[inline]
    pub fn width(&self) -> i16 {
        self.x_max - self.x_min
    }

    /// The rectangle's height, in design units.
    #[inline]
    pub fn height(&self) -> i16 {
        self.y_max - self.y_min
    }
}


/// A trait for glyph outline construction.
pub trait OutlineBuilder {
    /// Appends a MoveTo segment.
    ///
    /// Start of a contour.
    fn move_to(&mut self, x: f32, y: f32);

    /// Appends a LineTo segment.
    fn line_to(&mut self, x: f32, y: f32);

    /// Appends a QuadTo segment.
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32);

    /// Appends a CurveTo segment.
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);

    /// Appends a ClosePath segment.
    ///
    /// End of a contour.
    fn close(&mut self);
}


/// A table name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(missing_docs)]
pub enum TableName {
    CharacterToGlyphIndexMapping,
    CompactFontFormat,
    CompactFontFormat2,
    GlyphData,
    Header,
    HorizontalHeader,
    HorizontalMetrics,
    IndexToLocation,
    Kerning,
    MaximumProfile,
    Naming,
    PostScript,
    VerticalHeader,
    VerticalMetrics,
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableName::CharacterToGlyphIndexMapping => "cmap",
            TableName::CompactFontFormat => "CFF ",
            TableName::CompactFontFormat2 => "CFF2",
            TableName::GlyphData => "glyf",
            TableName::Header => "head",
            TableName::HorizontalHeader => "hhea",
            TableName::HorizontalMetrics => "hmtx",
            TableName::IndexToLocation => "loca",
            TableName::Kerning => "kern",
            TableName::MaximumProfile => "maxp",
            TableName::Naming => "name",
            TableName::PostScript => "post",
            TableName::VerticalHeader => "vhea",
            TableName::VerticalMetrics => "vmtx",
        };
        f.write_str(s)
    }
}


// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#ttc-header
struct TTCHeader;

impl TTCHeader {
    // tag (4) + majorVersion (2) + minorVersion (2) + numFonts (4)
    const SIZE: usize = 12;
}

// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#table-directory
#[derive(Clone, Copy)]
struct TableRecord {
    table_tag: [u8; 4],
    offset: u32,
    length: u32,
}

impl FromData for TableRecord {
    const SIZE: usize = 16;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        let mut s = SafeStream::new(data);
        let table_tag: [u8; 4] = s.read();
        s.read_bytes(4u32); // checksum
        let offset: u32 = s.read();
        let length: u32 = s.read();
        TableRecord { table_tag, offset, length }
    }
}


/// A font face, and the entry point into every other part of this crate.
///
/// Holds already-sanitized references into the tables it needs; every
/// subsequent query only re-parses the small fixed-size records it needs,
/// never the whole table.
#[derive(Clone)]
pub struct Face<'a> {
    cff_: Option<&'a [u8]>,
    cff_metadata: cff::Metadata,
    cff2: Option<cff2::Metadata<'a>>,
    cmap: Option<&'a [u8]>,
    cvt: Option<&'a [u8]>,
    fpgm: Option<&'a [u8]>,
    prep: Option<&'a [u8]>,
    glyf: Option<&'a [u8]>,
    head: head::Table,
    hhea: hhea::Table,
    hinting_limits: Option<maxp::HintingLimits>,
    hmtx: Option<hmtx::Table<'a>>,
    kern: Option<&'a [u8]>,
    loca: Option<loca::Table<'a>>,
    name: Option<&'a [u8]>,
    post: Option<&'a [u8]>,
    vhea: Option<vhea::Table>,
    vmtx: Option<hmtx::Table<'a>>,
    number_of_glyphs: NonZeroU16,
}

impl<'a> Face<'a> {
    /// Creates a `Face` from raw font data.
    ///
    /// `index` selects a font within a TrueType Collection; for a plain
    /// `.ttf`/`.otf` file use `0`.
    ///
    /// Required tables: `head`, `hhea` and `maxp`. An optional table with
    /// malformed data is skipped rather than rejecting the whole face.
    pub fn from_data(data: &'a [u8], index: u32) -> Result<Self> {
        let table_data = if let Some(n) = fonts_in_collection(data) {
            if index >= n {
                return Err(Error::InvalidArgument);
            }

            // https://docs.microsoft.com/en-us/typography/opentype/spec/otff#ttc-header
            const OFFSET_32_SIZE: usize = 4;
            let offset = TTCHeader::SIZE + OFFSET_32_SIZE * index as usize;
            let font_offset: u32 = Stream::read_at(data, offset)?;
            data.get(font_offset as usize..data.len()).ok_or(Error::InvalidStream)?
        } else {
            data
        };

        // https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font
        const SFNT_VERSION_TRUE_TYPE: u32 = 0x0001_0000;
        const SFNT_VERSION_OPEN_TYPE: u32 = 0x4F54_544F; // "OTTO"

        let mut s = Stream::new(table_data);

        let sfnt_version: u32 = s.read()?;
        if sfnt_version != SFNT_VERSION_TRUE_TYPE && sfnt_version != SFNT_VERSION_OPEN_TYPE {
            return Err(Error::UnknownFormat);
        }

        let num_tables: u16 = s.read()?;
        s.advance(6u32); // searchRange (u16) + entrySelector (u16) + rangeShift (u16)
        let tables = s.read_array::<TableRecord, u16>(num_tables)?;

        let mut cff_ = None;
        let mut cff2_data = None;
        let mut cmap = None;
        let mut cvt = None;
        let mut fpgm = None;
        let mut prep = None;
        let mut glyf = None;
        let mut head_data = None;
        let mut hhea_data = None;
        let mut hmtx_data = None;
        let mut kern = None;
        let mut loca_data = None;
        let mut maxp_data = None;
        let mut name = None;
        let mut post = None;
        let mut vhea_data = None;
        let mut vmtx_data = None;

        for table in tables {
            let offset = table.offset as usize;
            let length = table.length as usize;
            let range = offset..offset.saturating_add(length);

            // It's way faster to compare `[u8; 4]` with `[u8; 4]`
            // rather than `&[u8]` with `&[u8]`.
            match &table.table_tag {
                b"CFF " => cff_ = table_data.get(range),
                b"CFF2" => cff2_data = table_data.get(range),
                b"cmap" => cmap = table_data.get(range),
                b"cvt " => cvt = table_data.get(range),
                b"fpgm" => fpgm = table_data.get(range),
                b"prep" => prep = table_data.get(range),
                b"glyf" => glyf = table_data.get(range),
                b"head" => head_data = table_data.get(range),
                b"hhea" => hhea_data = table_data.get(range),
                b"hmtx" => hmtx_data = table_data.get(range),
                b"kern" => kern = table_data.get(range),
                b"loca" => loca_data = table_data.get(range),
                b"maxp" => maxp_data = table_data.get(range),
                b"name" => name = table_data.get(range),
                b"post" => post = table_data.get(range),
                b"vhea" => vhea_data = table_data.get(range),
                b"vmtx" => vmtx_data = table_data.get(range),
                _ => {}
            }
        }

        let head = head::Table::parse(head_data.ok_or_else(|| Error::TableMissing(TableName::Header))?)?;
        let hhea = hhea::Table::parse(hhea_data.ok_or_else(|| Error::TableMissing(TableName::HorizontalHeader))?)?;
        let maxp_data = maxp_data.ok_or_else(|| Error::TableMissing(TableName::MaximumProfile))?;
        let number_of_glyphs = maxp::parse_number_of_glyphs(maxp_data)?;
        let hinting_limits = maxp::parse_hinting_limits(maxp_data);

        let cff_metadata = match cff_ {
            Some(data) => cff::parse_metadata(data).unwrap_or_default(),
            None => cff::Metadata::default(),
        };
        let cff_ = if cff_metadata_is_usable(&cff_metadata) { cff_ } else { None };

        let cff2 = cff2_data.and_then(|data| match cff2::parse_metadata(data) {
            Ok(metadata) => Some(metadata),
            Err(_) => {
                warn!("failed to parse the CFF2 table");
                None
            }
        });

        let mut face = Face {
            cff_,
            cff_metadata,
            cff2,
            cmap,
            cvt,
            fpgm,
            prep,
            glyf,
            head,
            hhea,
            hinting_limits,
            hmtx: None,
            kern,
            loca: None,
            name,
            post,
            vhea: None,
            vmtx: None,
            number_of_glyphs,
        };

        if let Some(data) = hmtx_data {
            if let Ok(number_of_h_metrics) = face.number_of_hmetrics() {
                face.hmtx = hmtx::Table::parse(data, number_of_h_metrics, face.number_of_glyphs).ok();
            }
        }

        if let Some(data) = vhea_data {
            if let Ok(vhea) = vhea::Table::parse(data) {
                face.vhea = Some(vhea);
                if let (Some(number_of_v_metrics), Some(data)) = (face.number_of_vmetrics(), vmtx_data) {
                    if number_of_v_metrics > 0 {
                        face.vmtx = hmtx::Table::parse(data, number_of_v_metrics, face.number_of_glyphs).ok();
                    }
                }
            }
        }

        if let Some(data) = loca_data {
            if let Ok(format) = face.index_to_location_format() {
                face.loca = loca::Table::parse(data, face.number_of_glyphs, format).ok();
            }
        }

        Ok(face)
    }

    /// Checks that face has a specified table.
    ///
    /// Returns `true` only for tables that were successfully parsed.
    #[inline]
    pub fn has_table(&self, name: TableName) -> bool {
        match name {
            TableName::Header                       => true,
            TableName::HorizontalHeader             => true,
            TableName::MaximumProfile               => true,
            TableName::CharacterToGlyphIndexMapping => self.cmap.is_some(),
            TableName::CompactFontFormat            => self.cff_.is_some(),
            TableName::CompactFontFormat2           => self.cff2.is_some(),
            TableName::GlyphData                    => self.glyf.is_some(),
            TableName::HorizontalMetrics            => self.hmtx.is_some(),
            TableName::IndexToLocation              => self.loca.is_some(),
            TableName::Kerning                      => self.kern.is_some(),
            TableName::Naming                       => self.name.is_some(),
            TableName::PostScript                   => self.post.is_some(),
            TableName::VerticalHeader               => self.vhea.is_some(),
            TableName::VerticalMetrics              => self.vmtx.is_some(),
        }
    }

    /// Returns the raw, unparsed data of a table, if present.
    pub(crate) fn table_data(&self, name: TableName) -> Result<&'a [u8]> {
        match name {
            TableName::CharacterToGlyphIndexMapping => self.cmap,
            TableName::CompactFontFormat            => self.cff_,
            TableName::GlyphData                    => self.glyf,
            TableName::Kerning                      => self.kern,
            TableName::Naming                       => self.name,
            TableName::PostScript                   => self.post,
            _ => None,
        }.ok_or(Error::TableMissing(name))
    }

    /// Returns a total number of glyphs in the face.
    ///
    /// Never zero. Already parsed during [`Face::from_data`], so this is free.
    #[inline]
    pub fn number_of_glyphs(&self) -> u16 {
        self.number_of_glyphs.get()
    }

    pub(crate) fn check_glyph_id(&self, glyph_id: GlyphId) -> Result<()> {
        if glyph_id.0 < self.number_of_glyphs.get() {
            Ok(())
        } else {
            Err(Error::NoGlyph)
        }
    }

    /// Outlines a glyph and returns its tight bounding box.
    ///
    /// Supports `glyf`, `CFF` and `CFF2` tables, tried in that order.
    ///
    /// **Warning**: since this is a pull parser, `builder` will receive
    /// segments even when the outline turns out to be malformed. Check the
    /// returned `Result` before trusting what `builder` collected.
    ///
    /// Returns `Ok(None)` when the glyph has no outline (e.g. a space).
    pub fn outline_glyph(
        &self,
        glyph_id: GlyphId,
        builder: &mut dyn OutlineBuilder,
    ) -> Result<Option<Rect>> {
        self.check_glyph_id(glyph_id)?;

        if self.glyf.is_some() {
            return self.glyf_glyph_outline(glyph_id, builder);
        }

        if self.cff_.is_some() {
            return self.cff_glyph_outline(glyph_id, builder);
        }

        if let Some(ref metadata) = self.cff2 {
            return self.cff2_glyph_outline(metadata, glyph_id, builder);
        }

        Err(Error::NotScalable)
    }

    /// Outlines a `CFF` glyph the same way [`Face::outline_glyph`] does, but
    /// with stem darkening applied for `ppem`: every stem is synthetically
    /// emboldened by an amount that shrinks as `ppem` grows, following
    /// Adobe's cf2 darkening curve, so small sizes don't read as thin and
    /// washed out. Has no effect on `glyf`/`CFF2` faces, which are outlined
    /// unhinted exactly as `outline_glyph` would.
    pub fn outline_glyph_darkened(
        &self,
        glyph_id: GlyphId,
        ppem: u16,
        builder: &mut dyn OutlineBuilder,
    ) -> Result<Option<Rect>> {
        self.check_glyph_id(glyph_id)?;

        if self.cff_.is_some() {
            return self.cff_glyph_outline_darkened(glyph_id, ppem, true, builder);
        }

        self.outline_glyph(glyph_id, builder)
    }

    /// Returns a glyph's tight bounding box.
    ///
    /// For `glyf` this is free, since the table stores the box alongside
    /// each glyph. For `CFF`/`CFF2` this outlines the glyph into a no-op
    /// builder to compute it, so prefer [`Face::outline_glyph`] when you
    /// need both the outline and its box.
    pub fn glyph_bounding_box(&self, glyph_id: GlyphId) -> Result<Option<Rect>> {
        self.check_glyph_id(glyph_id)?;

        struct NullOutline;
        impl OutlineBuilder for NullOutline {
            fn move_to(&mut self, _: f32, _: f32) {}
            fn line_to(&mut self, _: f32, _: f32) {}
            fn quad_to(&mut self, _: f32, _: f32, _: f32, _: f32) {}
            fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: f32) {}
            fn close(&mut self) {}
        }

        if self.glyf.is_some() {
            return self.glyf_glyph_bbox(glyph_id);
        }

        if self.cff_.is_some() {
            return self.cff_glyph_outline(glyph_id, &mut NullOutline);
        }

        if let Some(ref metadata) = self.cff2 {
            return self.cff2_glyph_outline(metadata, glyph_id, &mut NullOutline);
        }

        Err(Error::NotScalable)
    }

    /// Builds a reusable hinting context for one pixels-per-em size: runs
    /// `fpgm` once, scales the `cvt` table to that size and runs `prep`.
    ///
    /// Reuse the same context across every glyph rendered at this size;
    /// rebuilding it per-glyph would re-run `prep` needlessly. Faces with
    /// no `glyf` table, or none of `fpgm`/`cvt`/`prep`, still produce a
    /// usable (no-op) context — hinting a glyph with it is simply a no-op.
    #[cfg(feature = "std")]
    pub fn new_hinting_context(&self, ppem: u16) -> Result<HintingContext> {
        let upem = self.units_per_em()? as f32;
        let scale = if upem > 0.0 { ppem as f32 / upem } else { 1.0 };

        let cvt: std::vec::Vec<crate::fixed::F26Dot6> = self.cvt
            .map(|data| {
                parser::LazyArray::<i16>::new(data)
                    .into_iter()
                    .map(|v| crate::fixed::F26Dot6::from_f32(v as f32 * scale))
                    .collect()
            })
            .unwrap_or_default();

        let limits = self.hinting_limits.unwrap_or(maxp::HintingLimits {
            max_twilight_points: 0,
            max_storage: 0,
            max_function_defs: 0,
            max_stack_elements: 0,
        });

        let mut ctx = hint::ExecutionContext::new(limits.max_storage, limits.max_twilight_points, cvt);
        if let Some(fpgm) = self.fpgm {
            ctx.run_font_program(fpgm)?;
        }
        if let Some(prep) = self.prep {
            ctx.run_control_value_program(prep)?;
        }

        Ok(HintingContext(ctx))
    }

    /// Outlines a glyph the same way [`Face::outline_glyph`] does, but runs
    /// the glyph's own TrueType instructions against its scaled points
    /// first, using `ctx` built for the target size.
    ///
    /// Only `glyf` simple glyphs carry a per-glyph instruction stream to
    /// run; composite glyphs and CFF/CFF2 outlines are returned unhinted,
    /// with a warning, since TrueType hinting never applies to them.
    #[cfg(feature = "std")]
    pub fn outline_glyph_hinted(
        &self,
        glyph_id: GlyphId,
        ppem: u16,
        ctx: &mut HintingContext,
        builder: &mut dyn OutlineBuilder,
    ) -> Result<Option<Rect>> {
        self.check_glyph_id(glyph_id)?;

        if self.glyf.is_none() {
            warn!("hinting requested on a non-glyf face; returning the unhinted outline");
            return self.outline_glyph(glyph_id, builder);
        }

        let upem = self.units_per_em()? as f32;
        let scale = if upem > 0.0 { ppem as f32 / upem } else { 1.0 };

        let collected = self.simple_glyph_points_for_hinting(glyph_id)?;
        let (points, contour_ends, instructions) = match collected {
            Some(v) => v,
            None => {
                // Composite glyph, or an empty/malformed simple glyph: hinting
                // doesn't apply, fall back to the plain outline.
                return self.outline_glyph(glyph_id, builder);
            }
        };

        let mut scaled: std::vec::Vec<(f32, f32)> =
            points.iter().map(|&(x, y, _)| (x * scale, y * scale)).collect();

        ctx.0.hint_glyph(&instructions, &mut scaled, &contour_ends);

        // A plain point-extrema box rather than the Bezier-extrema one
        // `outline_glyph` computes: hinting only moves existing on/off
        // curve points, it never changes which points are extremal enough
        // to matter for a bounding box this approximate.
        let mut x_min = f32::MAX;
        let mut y_min = f32::MAX;
        let mut x_max = f32::MIN;
        let mut y_max = f32::MIN;

        let mut start = 0usize;
        for &end in &contour_ends {
            let end = end as usize + 1;
            if end <= start || end > points.len() {
                break;
            }
            let contour: std::vec::Vec<(f32, f32, bool)> = scaled[start..end]
                .iter()
                .zip(points[start..end].iter())
                .map(|(&(x, y), &(_, _, on_curve))| (x, y, on_curve))
                .collect();
            for &(x, y, _) in &contour {
                x_min = x_min.min(x);
                y_min = y_min.min(y);
                x_max = x_max.max(x);
                y_max = y_max.max(y);
            }
            Face::emit_hinted_contour(&contour, builder);
            start = end;
        }

        if x_min > x_max {
            return Ok(None);
        }

        Ok(Some(Rect {
            x_min: try_f32_to_i16(x_min)?,
            y_min: try_f32_to_i16(y_min)?,
            x_max: try_f32_to_i16(x_max)?,
            y_max: try_f32_to_i16(y_max)?,
        }))
    }
}

/// Opaque, reusable per-size state for [`Face::outline_glyph_hinted`].
#[cfg(feature = "std")]
pub struct HintingContext(hint::ExecutionContext);

impl fmt::Debug for Face<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Face()")
    }
}

// A CFF table whose Top DICT never set `CharStrings` has no glyph data at
// all; treat it the same as a missing table rather than failing the whole face.
fn cff_metadata_is_usable(metadata: &cff::Metadata) -> bool {
    metadata.has_char_strings()
}

/// Parses the number of fonts stored in a TrueType Collection.
///
/// Returns `None` if the data is not a TrueType Collection.
#[inline]
pub fn fonts_in_collection(data: &[u8]) -> Option<u32> {
    if data.len() < TTCHeader::SIZE {
        return None;
    }

    if &data[0..4] != b"ttcf" {
        return None;
    }

    let mut s = SafeStream::new_at(data, 8);
    Some(s.read())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer;
    use writer::TtfType::*;

    #[test]
    fn empty_font() {
        assert!(Face::from_data(&[], 0).is_err());
    }

    #[test]
    fn incomplete_header() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        for i in 0..data.len() {
            assert!(Face::from_data(&data[0..i], 0).is_err());
        }
    }

    #[test]
    fn zero_tables() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn tables_count_overflow() {
        let data = writer::convert(&[
            TrueTypeMagic,
            UInt16(std::u16::MAX), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn open_type_magic() {
        let data = writer::convert(&[
            OpenTypeMagic,
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn unknown_magic() {
        let data = writer::convert(&[
            Raw(&[0xFF, 0xFF, 0xFF, 0xFF]),
            UInt16(0), // numTables
            UInt16(0), // searchRange
            UInt16(0), // entrySelector
            UInt16(0), // rangeShift
        ]);

        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn empty_font_collection() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(0), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(0));
        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn font_collection_num_fonts_overflow() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(std::u32::MAX), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(std::u32::MAX));
        assert!(Face::from_data(&data, 0).is_err());
    }

    #[test]
    fn font_index_overflow_1() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(1), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(1));
        assert!(Face::from_data(&data, std::u32::MAX).is_err());
    }

    #[test]
    fn font_index_overflow_2() {
        let data = writer::convert(&[
            FontCollectionMagic,
            UInt16(1), // majorVersion
            UInt16(0), // minorVersion
            UInt32(std::u32::MAX), // numFonts
        ]);

        assert_eq!(fonts_in_collection(&data), Some(std::u32::MAX));
        assert!(Face::from_data(&data, std::u32::MAX - 1).is_err());
    }
}
