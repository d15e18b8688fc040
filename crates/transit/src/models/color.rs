//! Route colors and the fallback palette for routes the feed leaves uncolored.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use twox_hash::XxHash64;

use crate::models::types::TransitError;

/// Ten well-separated hues, in a fixed order.
const FALLBACK_PALETTE: [(u8, u8, u8); 10] = [
    (0x1f, 0x77, 0xb4), // blue
    (0xff, 0x7f, 0x0e), // orange
    (0x2c, 0xa0, 0x2c), // green
    (0xd6, 0x27, 0x28), // red
    (0x94, 0x67, 0xbd), // purple
    (0x8c, 0x56, 0x4b), // brown
    (0xe3, 0x77, 0xc2), // pink
    (0x7f, 0x7f, 0x7f), // gray
    (0xbc, 0xbd, 0x22), // olive
    (0x17, 0xbe, 0xcf), // cyan
];

pub const FALLBACK_PALETTE_LEN: usize = FALLBACK_PALETTE.len();

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteColor(pub Srgb<u8>);

impl RouteColor {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self(Srgb::new(red, green, blue))
    }

    /// Parses a feed color, which may or may not carry a leading `#`.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Srgb::<u8>::from_str(s.trim())
            .map(Self)
            .map_err(|_| TransitError::InvalidColor(s.to_string()))
    }
}

impl FromStr for RouteColor {
    type Err = TransitError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RouteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0.red, self.0.green, self.0.blue)
    }
}

/// Palette entry for a segment position, wrapping around.
pub fn fallback_color(index: usize) -> RouteColor {
    let (r, g, b) = FALLBACK_PALETTE[index % FALLBACK_PALETTE_LEN];
    RouteColor::new(r, g, b)
}

/// Stable palette entry for a route that has no color of its own.
pub fn color_for_route(key: &str) -> RouteColor {
    let hash = XxHash64::oneshot(0, key.as_bytes());
    fallback_color((hash % FALLBACK_PALETTE_LEN as u64) as usize)
}
