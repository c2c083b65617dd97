use core::fmt;

/// 48-bit sensor serial number, as reported in three 16-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialNumber(pub u64);

impl SerialNumber {
    pub const fn from_words(words: [u16; 3]) -> Self {
        let [high, mid, low] = words;
        Self(((high as u64) << 32) | ((mid as u64) << 16) | low as u64)
    }
}

impl fmt::Display for SerialNumber {
    /// Formats as `0x` followed by all 12 hex digits, zero padded.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012X}", self.0 & 0xFFFF_FFFF_FFFF)
    }
}
