#[cfg(feature = "std")]
use std::vec::Vec;
#[cfg(feature = "std")]
use std::string::String;

use core::convert::TryFrom;

use crate::parser::{Stream, TrySlice};
use crate::{Face, TableName};


/// A [platform ID](https://docs.microsoft.com/en-us/typography/opentype/spec/name#platform-ids).
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum PlatformId {
    Unicode,
    Macintosh,
    Iso,
    Windows,
    Custom,
}

impl PlatformId {
    /// Converts a raw platform ID. Returns `None` on unknown values instead
    /// of erroring, since callers (`cmap` subtable selection) just skip them.
    pub(crate) fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(PlatformId::Unicode),
            1 => Some(PlatformId::Macintosh),
            2 => Some(PlatformId::Iso),
            3 => Some(PlatformId::Windows),
            4 => Some(PlatformId::Custom),
            _ => None,
        }
    }
}

impl TryFrom<u16> for PlatformId {
    type Error = &'static str;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        PlatformId::from_u16(value).ok_or("invalid id")
    }
}


/// A [name ID](https://docs.microsoft.com/en-us/typography/opentype/spec/name#name-ids).
#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(missing_docs)]
pub enum NameId {
    CopyrightNotice,
    Family,
    Subfamily,
    UniqueID,
    FullName,
    Version,
    PostScriptName,
    Trademark,
    Manufacturer,
    Designer,
    Description,
    VendorUrl,
    DesignerUrl,
    License,
    LicenseUrl,
    TypographicFamily,
    TypographicSubfamily,
    CompatibleFull,
    SampleText,
    PostScriptCID,
    WWSFamily,
    WWSSubfamily,
    LightBackgroundPalette,
    DarkBackgroundPalette,
    VariationsPostScriptNamePrefix,
}

impl TryFrom<u16> for NameId {
    type Error = &'static str;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NameId::CopyrightNotice),
            1 => Ok(NameId::Family),
            2 => Ok(NameId::Subfamily),
            3 => Ok(NameId::UniqueID),
            4 => Ok(NameId::FullName),
            5 => Ok(NameId::Version),
            6 => Ok(NameId::PostScriptName),
            7 => Ok(NameId::Trademark),
            8 => Ok(NameId::Manufacturer),
            9 => Ok(NameId::Designer),
            10 => Ok(NameId::Description),
            11 => Ok(NameId::VendorUrl),
            12 => Ok(NameId::DesignerUrl),
            13 => Ok(NameId::License),
            14 => Ok(NameId::LicenseUrl),
            // 15 - reserved
            16 => Ok(NameId::TypographicFamily),
            17 => Ok(NameId::TypographicSubfamily),
            18 => Ok(NameId::CompatibleFull),
            19 => Ok(NameId::SampleText),
            20 => Ok(NameId::PostScriptCID),
            21 => Ok(NameId::WWSFamily),
            22 => Ok(NameId::WWSSubfamily),
            23 => Ok(NameId::LightBackgroundPalette),
            24 => Ok(NameId::DarkBackgroundPalette),
            25 => Ok(NameId::VariationsPostScriptNamePrefix),
            _ => Err("invalid id"),
        }
    }
}


/// A [Name Record](https://docs.microsoft.com/en-us/typography/opentype/spec/name#name-records).
#[derive(Clone, Copy)]
#[cfg_attr(not(feature = "std"), derive(Debug))]
pub struct Name<'a> {
    /// Raw name data.
    pub name: &'a [u8],

    /// Platform ID.
    pub platform_id: PlatformId,

    /// Platform-specific encoding ID.
    pub encoding_id: u16,

    /// Language ID.
    pub language_id: u16,

    /// Name ID.
    pub name_id: NameId,
}

impl<'a> Name<'a> {
    /// Converts Name's data into a `String`.
    ///
    /// Only Unicode names are supported. And since they are stored as UTF-16BE,
    /// we can't return `&str` and have to allocate a `String`.
    ///
    /// Supports:
    /// - Unicode Platform ID
    /// - Windows Platform ID + Unicode BMP
    #[cfg(feature = "std")]
    pub fn to_string(&self) -> Option<String> {
        if self.is_supported_encoding() {
            self.name_from_utf16_be()
        } else {
            None
        }
    }

    #[cfg(feature = "std")]
    fn is_supported_encoding(&self) -> bool {
        // https://docs.microsoft.com/en-us/typography/opentype/spec/name#windows-encoding-ids
        const WINDOWS_UNICODE_BMP_ENCODING_ID: u16 = 1;

        match self.platform_id {
            PlatformId::Unicode => true,
            PlatformId::Windows if self.encoding_id == WINDOWS_UNICODE_BMP_ENCODING_ID => true,
            _ => false,
        }
    }

    #[cfg(feature = "std")]
    fn name_from_utf16_be(&self) -> Option<String> {
        use crate::parser::LazyArray;

        let mut name: Vec<u16> = Vec::new();
        for c in LazyArray::new(self.name) {
            name.push(c);
        }

        String::from_utf16(&name).ok()
    }
}

#[cfg(feature = "std")]
impl<'a> core::fmt::Debug for Name<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = self.to_string();
        f.debug_struct("Name")
            .field("name", &name.as_ref().map(core::ops::Deref::deref)
                                .unwrap_or("unsupported encoding"))
            .field("platform_id", &self.platform_id)
            .field("encoding_id", &self.encoding_id)
            .field("language_id", &self.language_id)
            .field("name_id", &self.name_id)
            .finish()
    }
}


/// An iterator over font's names.
#[derive(Clone, Copy)]
#[allow(missing_debug_implementations)]
pub struct Names<'a> {
    stream: Stream<'a>,
    storage: &'a [u8],
}

impl<'a> Names<'a> {
    fn empty() -> Self {
        Names { stream: Stream::new(&[]), storage: &[] }
    }
}

impl<'a> Iterator for Names<'a> {
    type Item = Name<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.stream.at_end() {
                return None;
            }

            let platform_id = self.stream.read::<u16>().ok().and_then(PlatformId::from_u16);
            let encoding_id: u16 = self.stream.read().ok()?;
            let language_id: u16 = self.stream.read().ok()?;
            let name_id = self.stream.read::<u16>().ok()
                .and_then(|v| NameId::try_from(v).ok());
            let length = self.stream.read::<u16>().ok()? as usize;
            let offset = self.stream.read::<u16>().ok()? as usize;

            let (platform_id, name_id) = match (platform_id, name_id) {
                (Some(p), Some(n)) => (p, n),
                _ => continue,
            };

            let name = match self.storage.try_slice(offset..offset + length) {
                Ok(name) => name,
                Err(_) => continue,
            };

            return Some(Name { name, platform_id, encoding_id, language_id, name_id });
        }
    }
}


impl<'a> Face<'a> {
    /// Returns an iterator over [Name Records].
    ///
    /// [Name Records]: https://docs.microsoft.com/en-us/typography/opentype/spec/name#name-records
    pub fn names(&self) -> Names {
        // https://docs.microsoft.com/en-us/typography/opentype/spec/name#name-records
        const NAME_RECORD_SIZE: u16 = 12;

        // https://docs.microsoft.com/en-us/typography/opentype/spec/name#naming-table-format-1
        const LANG_TAG_RECORD_SIZE: u16 = 4;

        let data = match self.table_data(TableName::Naming) {
            Ok(data) => data,
            Err(_) => return Names::empty(),
        };

        let mut s = Stream::new(data);
        let format: u16 = match s.read() { Ok(v) => v, Err(_) => return Names::empty() };
        let count: u16 = match s.read() { Ok(v) => v, Err(_) => return Names::empty() };
        s.skip::<u16>(); // offset
        let name_record_len = count * NAME_RECORD_SIZE;
        let name_records_data = match s.read_bytes(name_record_len) {
            Ok(v) => v,
            Err(_) => return Names::empty(),
        };

        if format == 0 {
            Names {
                stream: Stream::new(name_records_data),
                storage: s.tail().unwrap_or(&[]),
            }
        } else if format == 1 {
            let lang_tag_count: u16 = match s.read() { Ok(v) => v, Err(_) => return Names::empty() };
            s.skip_len(lang_tag_count * LANG_TAG_RECORD_SIZE); // langTagRecords
            Names {
                stream: Stream::new(name_records_data),
                storage: s.tail().unwrap_or(&[]),
            }
        } else {
            // Invalid format.
            Names::empty()
        }
    }

    /// Returns font's family name.
    ///
    /// Note that font can have multiple names. You can use [`names()`] to list them all.
    ///
    /// [`names()`]: #method.names
    #[cfg(feature = "std")]
    pub fn family_name(&self) -> Option<String> {
        // Prefer Typographic Family name.

        let name = self.names()
            .find(|name| name.name_id == NameId::TypographicFamily && name.is_supported_encoding())
            .and_then(|name| name.to_string());

        if let Some(name) = name {
            return Some(name);
        }

        self.names()
            .find(|name| name.name_id == NameId::Family && name.is_supported_encoding())
            .and_then(|name| name.to_string())
    }

    /// Returns font's PostScript name.
    ///
    /// Note that font can have multiple names. You can use [`names()`] to list them all.
    ///
    /// [`names()`]: #method.names
    #[cfg(feature = "std")]
    pub fn post_script_name(&self) -> Option<String> {
        self.names()
            .find(|name| name.name_id == NameId::PostScriptName && name.is_supported_encoding())
            .and_then(|name| name.to_string())
    }
}
