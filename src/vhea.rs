// https://docs.microsoft.com/en-us/typography/opentype/spec/vhea

use crate::parser::SafeStream;
use crate::{Face, Result, Error};

#[derive(Clone, Copy)]
pub(crate) struct Table {
    num_of_long_ver_metrics: u16,
}

impl Table {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 36 {
            return Err(Error::InvalidFormat);
        }

        let mut s = SafeStream::new(data);
        s.read_bytes(34u32);
        let num_of_long_ver_metrics: u16 = s.read();
        Ok(Table { num_of_long_ver_metrics })
    }

    #[inline]
    pub fn num_of_long_ver_metrics(&self) -> u16 {
        self.num_of_long_ver_metrics
    }
}

impl<'a> Face<'a> {
    #[inline]
    pub(crate) fn number_of_vmetrics(&self) -> Option<u16> {
        self.vhea.map(|table| table.num_of_long_ver_metrics())
    }
}
