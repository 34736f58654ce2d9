use crate::err::{DeserializationError, DeserializationResult, EvtError, EvtResult};

use encoding::all;
use encoding::{DecoderTrap, EncoderTrap, Encoding, EncodingRef};
use std::fmt;

/// A Windows codepage used for narrow (non-Unicode) string conversions.
///
/// EVT stores its text as UTF-16, so the codepage only affects the narrow-string accessors.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct AsciiCodepage(u32);

impl AsciiCodepage {
    pub const ASCII: AsciiCodepage = AsciiCodepage(20127);
    pub const ISO_8859_1: AsciiCodepage = AsciiCodepage(28591);
    pub const KOI8_R: AsciiCodepage = AsciiCodepage(20866);
    pub const KOI8_U: AsciiCodepage = AsciiCodepage(21866);
    pub const WINDOWS_874: AsciiCodepage = AsciiCodepage(874);
    pub const WINDOWS_932: AsciiCodepage = AsciiCodepage(932);
    pub const WINDOWS_936: AsciiCodepage = AsciiCodepage(936);
    pub const WINDOWS_949: AsciiCodepage = AsciiCodepage(949);
    pub const WINDOWS_950: AsciiCodepage = AsciiCodepage(950);
    pub const WINDOWS_1250: AsciiCodepage = AsciiCodepage(1250);
    pub const WINDOWS_1251: AsciiCodepage = AsciiCodepage(1251);
    pub const WINDOWS_1252: AsciiCodepage = AsciiCodepage(1252);
    pub const WINDOWS_1253: AsciiCodepage = AsciiCodepage(1253);
    pub const WINDOWS_1254: AsciiCodepage = AsciiCodepage(1254);
    pub const WINDOWS_1255: AsciiCodepage = AsciiCodepage(1255);
    pub const WINDOWS_1256: AsciiCodepage = AsciiCodepage(1256);
    pub const WINDOWS_1257: AsciiCodepage = AsciiCodepage(1257);
    pub const WINDOWS_1258: AsciiCodepage = AsciiCodepage(1258);

    pub fn new(codepage: u32) -> EvtResult<AsciiCodepage> {
        if encoding_for(codepage).is_none() {
            return Err(EvtError::UnsupportedCodepage { codepage });
        }
        Ok(AsciiCodepage(codepage))
    }

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn encoding(self) -> EncodingRef {
        // `new` only admits codepages with an encoding.
        encoding_for(self.0).unwrap_or(all::WINDOWS_1252)
    }

    /// Encodes `value` into this codepage. Characters the codepage cannot represent fail
    /// the conversion rather than being replaced.
    pub fn encode(self, value: &str) -> DeserializationResult<Vec<u8>> {
        self.encoding()
            .encode(value, EncoderTrap::Strict)
            .map_err(|_| DeserializationError::FailedToEncodeNarrowString {
                value: value.to_owned(),
                codepage: self.0,
            })
    }

    /// Decodes narrow bytes in this codepage, replacing invalid sequences.
    pub fn decode(self, data: &[u8]) -> String {
        self.encoding()
            .decode(data, DecoderTrap::Replace)
            .unwrap_or_default()
    }
}

impl Default for AsciiCodepage {
    fn default() -> Self {
        AsciiCodepage::WINDOWS_1252
    }
}

impl TryFrom<u32> for AsciiCodepage {
    type Error = EvtError;

    fn try_from(codepage: u32) -> EvtResult<Self> {
        AsciiCodepage::new(codepage)
    }
}

impl fmt::Debug for AsciiCodepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsciiCodepage({}, {})", self.0, self.encoding().name())
    }
}

impl fmt::Display for AsciiCodepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn encoding_for(codepage: u32) -> Option<EncodingRef> {
    let encoding: EncodingRef = match codepage {
        20127 => all::ASCII,
        28591 => all::ISO_8859_1,
        28592 => all::ISO_8859_2,
        28593 => all::ISO_8859_3,
        28594 => all::ISO_8859_4,
        28595 => all::ISO_8859_5,
        28596 => all::ISO_8859_6,
        28597 => all::ISO_8859_7,
        28598 => all::ISO_8859_8,
        // ISO-8859-9 and ISO-8859-11 are decoded through their Windows supersets.
        28599 => all::WINDOWS_1254,
        28600 => all::ISO_8859_10,
        28601 => all::WINDOWS_874,
        28603 => all::ISO_8859_13,
        28604 => all::ISO_8859_14,
        28605 => all::ISO_8859_15,
        28606 => all::ISO_8859_16,
        20866 => all::KOI8_R,
        21866 => all::KOI8_U,
        874 => all::WINDOWS_874,
        932 => all::WINDOWS_31J,
        936 => all::GBK,
        949 => all::WINDOWS_949,
        950 => all::BIG5_2003,
        1250 => all::WINDOWS_1250,
        1251 => all::WINDOWS_1251,
        1252 => all::WINDOWS_1252,
        1253 => all::WINDOWS_1253,
        1254 => all::WINDOWS_1254,
        1255 => all::WINDOWS_1255,
        1256 => all::WINDOWS_1256,
        1257 => all::WINDOWS_1257,
        1258 => all::WINDOWS_1258,
        _ => return None,
    };
    Some(encoding)
}
