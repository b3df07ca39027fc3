//! Structural byte markers of the THR30II patch format.
//!
//! The vocabulary is closed: serializer and parser both go through this
//! enum, so the two directions can never disagree on a pattern.

/// One structural marker. Six-byte tokens delimit sections and units,
/// four-byte tokens introduce the type/count fields inside a unit header,
/// and the two eight-byte tokens name the meta ("PSRP") and data ("TRTG")
/// sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    StructOpen,
    StructClose,
    UnitOpen,
    UnitClose,
    Data,
    Meta,
    TokenData,
    TokenMeta,
    UnitType,
    ParCount,
    PseudoVal,
    PseudoType,
}

impl Token {
    /// The wire pattern of this marker.
    pub const fn bytes(self) -> &'static [u8] {
        match self {
            Token::StructOpen => &[0x00, 0x00, 0x00, 0x80, 0x02, 0x00],
            Token::StructClose => &[0x02, 0x00, 0x00, 0x80, 0x00, 0x00],
            Token::UnitOpen => &[0x03, 0x00, 0x00, 0x80, 0x07, 0x00],
            Token::UnitClose => &[0x04, 0x00, 0x00, 0x80, 0x00, 0x00],
            Token::Data => &[0x01, 0x00, 0x00, 0x00, 0x01, 0x00],
            Token::Meta => &[0x02, 0x00, 0x00, 0x00, 0x01, 0x00],
            Token::TokenData => &[0x00, 0x80, 0x02, 0x00, 0x54, 0x52, 0x54, 0x47],
            Token::TokenMeta => &[0x00, 0x80, 0x02, 0x00, 0x50, 0x53, 0x52, 0x50],
            Token::UnitType => &[0x00, 0x00, 0x05, 0x00],
            Token::ParCount => &[0x00, 0x00, 0x06, 0x00],
            Token::PseudoVal => &[0x00, 0x80, 0x07, 0x00],
            Token::PseudoType => &[0x00, 0x80, 0x02, 0x00],
        }
    }

    /// Whether `window` begins with this marker's pattern.
    pub fn matches(self, window: &[u8]) -> bool {
        let pat = self.bytes();
        window.len() >= pat.len() && &window[..pat.len()] == pat
    }
}
