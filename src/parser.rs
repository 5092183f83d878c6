//! Low-level binary parsing primitives shared by every table reader.
//!
//! Two families of reader exist side by side:
//! - `FromData`/`LazyArray`/`SafeStream` assume the caller already validated
//!   the slice bounds (e.g. while iterating a `LazyArray` whose length was
//!   checked once) and never fail.
//! - `Stream` performs a bounds check on every read and reports failure as
//!   `crate::Error::InvalidStream` so callers can propagate with `?`.

use crate::{Error, Result};

/// A trait for parsing raw binary data that is known to be in-bounds.
///
/// This is a low-level, internal trait that should not be used directly.
pub trait FromData: Sized {
    /// Stores an object size in raw data.
    ///
    /// `mem::size_of` by default.
    ///
    /// Override when size of `Self` != size of a raw data.
    /// For example, when you are parsing `u16`, but storing it as `u8`.
    /// In this case `size_of::<Self>()` == 1, but `FromData::SIZE` == 2.
    const SIZE: usize = core::mem::size_of::<Self>();

    /// Parses an object from a raw data.
    ///
    /// This method **must** not panic and **must** not read past the bounds.
    fn parse(data: &[u8]) -> Self;
}

impl FromData for u8 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        data[0]
    }
}

impl FromData for i8 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        data[0] as i8
    }
}

impl FromData for u16 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        u16::from_be_bytes([data[0], data[1]])
    }
}

impl FromData for i16 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        i16::from_be_bytes([data[0], data[1]])
    }
}

impl FromData for u32 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        use core::convert::TryInto;
        u32::from_be_bytes(data.try_into().unwrap())
    }
}

impl FromData for i32 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        use core::convert::TryInto;
        i32::from_be_bytes(data.try_into().unwrap())
    }
}


// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#data-types
#[derive(Clone, Copy, Debug)]
pub struct U24(pub u32);

impl FromData for U24 {
    const SIZE: usize = 3;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        U24((data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32)
    }
}


// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#data-types
#[derive(Clone, Copy, Debug)]
pub struct F2DOT14(pub f32);

impl FromData for F2DOT14 {
    const SIZE: usize = 2;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        F2DOT14(i16::parse(data) as f32 / 16384.0)
    }
}


// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#data-types
#[derive(Clone, Copy, Debug)]
pub struct Fixed(pub f32);

impl FromData for Fixed {
    const SIZE: usize = 4;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        Fixed(i32::parse(data) as f32 / 65536.0)
    }
}

/// A trait for parsing raw binary data that additionally validates the
/// decoded value, failing rather than silently accepting garbage.
///
/// Used for enumerations where not every bit pattern is legal (e.g. CFF's
/// `OffSize` byte, which must be 1, 2, 3 or 4).
pub trait TryFromData: Sized {
    const SIZE: usize = core::mem::size_of::<Self>();

    fn try_parse(data: &[u8]) -> Result<Self>;
}

/// A trait for extracting validated sub-slices out of a byte buffer.
///
/// This mirrors `[T]::get` but turns a missing range into a proper
/// `crate::Error` instead of `None`, so call sites can use `?`.
pub trait TrySlice {
    fn try_slice(&self, range: core::ops::Range<usize>) -> Result<&[u8]>;
}

impl TrySlice for [u8] {
    #[inline]
    fn try_slice(&self, range: core::ops::Range<usize>) -> Result<&[u8]> {
        self.get(range).ok_or(Error::InvalidStream)
    }
}


/// A u16/u32 length type used by `LazyArray`.
pub trait ArraySize
    : core::ops::Add<Output=Self>
    + core::ops::AddAssign
    + core::ops::Sub<Output=Self>
    + core::ops::SubAssign
    + core::ops::Div<Output=Self>
    + PartialOrd
    + Sized
    + Copy
{
    const ZERO: Self;
    const ONE: Self;
    const TWO: Self;

    fn from_usize(n: usize) -> Self;
    fn to_usize(&self) -> usize;
}

impl ArraySize for u16 {
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const TWO: Self = 2;

    #[inline]
    fn from_usize(n: usize) -> Self {
        debug_assert!(n <= core::u16::MAX as usize);
        n as u16
    }

    #[inline]
    fn to_usize(&self) -> usize { *self as usize }
}

impl ArraySize for u32 {
    const ZERO: Self = 0;
    const ONE: Self = 1;
    const TWO: Self = 2;

    #[inline]
    fn from_usize(n: usize) -> Self {
        debug_assert!(n <= core::u32::MAX as usize);
        n as u32
    }

    #[inline]
    fn to_usize(&self) -> usize { *self as usize }
}


/// A slice-like container that converts internal binary data only on access.
///
/// This is a low-level, internal structure that should not be used directly.
#[derive(Clone, Copy)]
pub struct LazyArray<'a, T, Idx = u16> {
    data: &'a [u8],
    data_type: core::marker::PhantomData<T>,
    len_type: core::marker::PhantomData<Idx>,
}

impl<T, Idx> Default for LazyArray<'_, T, Idx> {
    fn default() -> Self {
        LazyArray {
            data: &[],
            data_type: core::marker::PhantomData,
            len_type: core::marker::PhantomData,
        }
    }
}

impl<'a, T: FromData, Idx: ArraySize> LazyArray<'a, T, Idx> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        LazyArray {
            data,
            data_type: core::marker::PhantomData,
            len_type: core::marker::PhantomData,
        }
    }

    pub(crate) fn at(&self, index: Idx) -> T {
        let start = index.to_usize() * T::SIZE;
        let end = start + T::SIZE;
        T::parse(&self.data[start..end])
    }

    /// Returns a value at `index`.
    pub fn get(&self, index: Idx) -> Option<T> {
        if index < self.len() {
            let start = index.to_usize() * T::SIZE;
            let end = start + T::SIZE;
            Some(T::parse(&self.data[start..end]))
        } else {
            None
        }
    }

    /// Returns a value at `index`, or `crate::Error::InvalidStream`.
    pub fn try_get(&self, index: Idx) -> Result<T> {
        self.get(index).ok_or(Error::InvalidStream)
    }

    #[inline]
    pub fn last(&self) -> Option<T> {
        if !self.is_empty() {
            self.get(self.len() - Idx::ONE)
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> Idx {
        Idx::from_usize(self.data.len() / T::SIZE)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == Idx::ZERO
    }

    /// Performs a binary search by specified `key`.
    #[inline]
    pub fn binary_search(&self, key: &T) -> Option<(Idx, T)>
        where T: Ord
    {
        self.binary_search_by(|p| p.cmp(key))
    }

    /// Performs a binary search using specified closure.
    #[inline]
    pub fn binary_search_by<F>(&self, mut f: F) -> Option<(Idx, T)>
        where F: FnMut(&T) -> core::cmp::Ordering
    {
        use core::cmp::Ordering;

        let mut size = self.len();
        if size == Idx::ZERO {
            return None;
        }

        let mut base = Idx::ZERO;
        while size > Idx::ONE {
            let half = size / Idx::TWO;
            let mid = base + half;
            let cmp = f(&self.at(mid));
            base = if cmp == Ordering::Greater { base } else { mid };
            size -= half;
        }

        let value = self.at(base);
        if f(&value) == Ordering::Equal { Some((base, value)) } else { None }
    }
}

impl<'a, T: FromData + core::fmt::Debug + Copy, Idx: ArraySize> core::fmt::Debug for LazyArray<'a, T, Idx> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_list().entries(self.into_iter()).finish()
    }
}

impl<'a, T: FromData, Idx: ArraySize> IntoIterator for LazyArray<'a, T, Idx> {
    type Item = T;
    type IntoIter = LazyArrayIter<'a, T, Idx>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        LazyArrayIter {
            data: self,
            index: Idx::ZERO,
        }
    }
}

/// An alias to `LazyArray` with max length equal to `u16`.
pub type LazyArray16<'a, T> = LazyArray<'a, T, u16>;

/// An alias to `LazyArray` with max length equal to `u32`.
pub type LazyArray32<'a, T> = LazyArray<'a, T, u32>;

/// An iterator over `LazyArray`.
#[derive(Clone, Copy)]
pub struct LazyArrayIter<'a, T, Idx: ArraySize> {
    data: LazyArray<'a, T, Idx>,
    index: Idx,
}

impl<'a, T: FromData, Idx: ArraySize> Iterator for LazyArrayIter<'a, T, Idx> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.index += Idx::ONE;
        self.data.get(self.index - Idx::ONE)
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.data.get(ArraySize::from_usize(n))
    }
}

impl<T: FromData, Idx: ArraySize> core::fmt::Debug for LazyArrayIter<'_, T, Idx> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LazyArrayIter()")
    }
}


/// A bounds-checked cursor over a byte slice.
///
/// Every read advances the cursor and returns `Err(Error::InvalidStream)`
/// rather than panicking when it would read past the end.
#[derive(Clone, Copy)]
pub struct Stream<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Stream<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Stream { data, offset: 0 }
    }

    #[inline]
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        Stream { data, offset }
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn tail(&self) -> Result<&'a [u8]> {
        self.data.get(self.offset..self.data.len()).ok_or(Error::InvalidStream)
    }

    #[inline]
    pub fn skip<T: FromData>(&mut self) {
        self.offset += T::SIZE;
    }

    /// Skips an explicit number of bytes, as opposed to `skip::<T>` which
    /// skips `size_of::<T>` bytes. Used after computing a variable-width
    /// region's length (e.g. a `hintmask` bitfield or a dict header).
    #[inline]
    pub fn skip_len<L: ArraySize>(&mut self, len: L) {
        self.offset += len.to_usize();
    }

    #[inline]
    pub fn advance<L: ArraySize>(&mut self, len: L) {
        self.offset += len.to_usize();
    }

    #[inline]
    pub fn read<T: FromData>(&mut self) -> Result<T> {
        let start = self.offset;
        self.offset += T::SIZE;
        let end = self.offset;

        let data = self.data.get(start..end).ok_or(Error::InvalidStream)?;
        Ok(T::parse(data))
    }

    /// Like `read`, but for types whose bit pattern must be validated.
    #[inline]
    pub fn try_read<T: TryFromData>(&mut self) -> Result<T> {
        let start = self.offset;
        self.offset += T::SIZE;
        let end = self.offset;

        let data = self.data.get(start..end).ok_or(Error::InvalidStream)?;
        T::try_parse(data)
    }

    #[inline]
    pub fn read_at<T: FromData>(data: &[u8], offset: usize) -> Result<T> {
        let end = offset + T::SIZE;
        let slice = data.get(offset..end).ok_or(Error::InvalidStream)?;
        Ok(T::parse(slice))
    }

    /// Reads a 2.14 fixed-point value as `f32`.
    #[inline]
    pub fn read_f2_14(&mut self) -> Result<f32> {
        Ok(self.read::<F2DOT14>()?.0)
    }

    #[inline]
    pub fn read_bytes<L: ArraySize>(&mut self, len: L) -> Result<&'a [u8]> {
        let offset = self.offset;
        self.offset += len.to_usize();
        self.data.get(offset..(offset + len.to_usize())).ok_or(Error::InvalidStream)
    }

    #[inline]
    pub fn read_array<T: FromData, Idx: ArraySize>(&mut self, len: Idx) -> Result<LazyArray<'a, T, Idx>> {
        let len = len.to_usize() * T::SIZE;
        let data = self.read_bytes(len as u32)?;
        Ok(LazyArray::new(data))
    }

    #[inline]
    pub fn read_array16<T: FromData>(&mut self) -> Result<LazyArray<'a, T, u16>> {
        let count: u16 = self.read()?;
        self.read_array(count)
    }

    pub fn read_array32<T: FromData>(&mut self) -> Result<LazyArray<'a, T, u32>> {
        let count: u32 = self.read()?;
        self.read_array(count)
    }

    #[inline]
    pub fn read_offsets16(&mut self, data: &'a [u8]) -> Result<Offsets16<'a>> {
        let count: u16 = self.read()?;
        let offsets = self.read_array(count)?;
        Ok(Offsets16 { data, offsets })
    }
}


/// An unchecked stream.
///
/// Unlike `Stream`, `SafeStream` doesn't perform bounds checking on each read.
/// It leverages the type system: if we already validated a `LazyArray`'s
/// size once, we know we can't read past the bounds while iterating it, so
/// the repeated check is redundant overhead.
#[derive(Clone, Copy)]
pub struct SafeStream<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SafeStream<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        SafeStream { data, offset: 0 }
    }

    #[inline]
    pub fn new_at(data: &'a [u8], offset: usize) -> Self {
        SafeStream { data, offset }
    }

    #[inline]
    pub fn read<T: FromData>(&mut self) -> T {
        T::parse(self.read_bytes(T::SIZE as u32))
    }

    #[inline]
    pub fn read_bytes<L: ArraySize>(&mut self, len: L) -> &'a [u8] {
        let offset = self.offset;
        self.offset += len.to_usize();
        &self.data[offset..(offset + len.to_usize())]
    }
}


pub trait Offset {
    fn to_usize(&self) -> usize;
    fn is_null(&self) -> bool { self.to_usize() == 0 }
}


#[derive(Clone, Copy, Debug)]
pub struct Offset16(pub u16);

impl Offset for Offset16 {
    fn to_usize(&self) -> usize {
        self.0 as usize
    }
}

impl FromData for Offset16 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        Offset16(SafeStream::new(data).read())
    }
}

impl FromData for Option<Offset16> {
    const SIZE: usize = Offset16::SIZE;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        let offset = Offset16::parse(data);
        if offset.0 != 0 { Some(offset) } else { None }
    }
}


#[derive(Clone, Copy, Debug)]
pub struct Offset32(pub u32);

impl Offset for Offset32 {
    #[inline]
    fn to_usize(&self) -> usize {
        self.0 as usize
    }
}

impl FromData for Offset32 {
    #[inline]
    fn parse(data: &[u8]) -> Self {
        Offset32(SafeStream::new(data).read())
    }
}


impl FromData for Option<Offset32> {
    const SIZE: usize = Offset32::SIZE;

    #[inline]
    fn parse(data: &[u8]) -> Self {
        let offset = Offset32::parse(data);
        if offset.0 != 0 { Some(offset) } else { None }
    }
}


/// Array of offsets from beginning of `data`.
#[derive(Clone, Copy)]
pub struct Offsets<'a, T: Offset, Idx: ArraySize> {
    data: &'a [u8],
    offsets: LazyArray<'a, T, Idx>,
}

pub type Offsets16<'a> = Offsets<'a, Offset16, u16>;

impl<'a, T: Offset + FromData> Offsets<'a, T, u16> {
    pub fn len(&self) -> u16 {
        self.offsets.len()
    }

    fn at(&self, index: u16) -> T {
        self.offsets.at(index)
    }

    pub fn slice(&self, index: u16) -> Option<&'a [u8]> {
        let offset = self.offsets.at(index).to_usize();
        self.data.get(offset..self.data.len())
    }
}

impl<'a, T: Offset + FromData + Copy + core::fmt::Debug> core::fmt::Debug for Offsets<'a, T, u16> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}", self.offsets)
    }
}


pub struct OffsetsIter<'a, T: Offset + FromData> {
    offsets: Offsets<'a, T, u16>,
    index: u16,
}

impl<'a, T: Offset + FromData> IntoIterator for Offsets<'a, T, u16> {
    type Item = &'a [u8];
    type IntoIter = OffsetsIter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        OffsetsIter { offsets: self, index: 0 }
    }
}

impl<'a, T: Offset + FromData> Iterator for OffsetsIter<'a, T> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.offsets.len() {
            let idx = self.index;
            self.index += 1;

            // Skip NULL offsets.
            if self.offsets.at(idx).is_null() {
                return self.next();
            }

            self.offsets.slice(idx)
        } else {
            None
        }
    }
}
