pub use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Straight (non-premultiplied) sRGB color with 8-bit channels.
///
/// Serialized as a CSS-style hex string: `#rrggbb`, or `#rrggbbaa` when not fully opaque.
/// Parsing also accepts the short `#rgb` / `#rgba` forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color from red/green/blue.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Color from red/green/blue/alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn parse_hex(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);
        if !s.is_ascii() {
            return Err(format!("invalid hex color \"{s}\""));
        }

        fn hex_byte(pair: &str) -> Result<u8, String> {
            u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
        }
        fn hex_nibble(c: &str) -> Result<u8, String> {
            hex_byte(c).map(|v| v * 17)
        }

        match s.len() {
            3 | 4 => {
                let r = hex_nibble(&s[0..1])?;
                let g = hex_nibble(&s[1..2])?;
                let b = hex_nibble(&s[2..3])?;
                let a = if s.len() == 4 {
                    hex_nibble(&s[3..4])?
                } else {
                    255
                };
                Ok(Self::rgba(r, g, b, a))
            }
            6 | 8 => {
                let r = hex_byte(&s[0..2])?;
                let g = hex_byte(&s[2..4])?;
                let b = hex_byte(&s[4..6])?;
                let a = if s.len() == 8 {
                    hex_byte(&s[6..8])?
                } else {
                    255
                };
                Ok(Self::rgba(r, g, b, a))
            }
            _ => Err("hex color must be #RGB, #RGBA, #RRGGBB or #RRGGBBAA".to_owned()),
        }
    }

    /// Lowercase hex form, `#rrggbb` when opaque, `#rrggbbaa` otherwise.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }

    /// Same color with alpha multiplied by `opacity` (clamped to `0..=1`).
    pub fn with_opacity(self, opacity: f64) -> Self {
        let o = opacity.clamp(0.0, 1.0);
        Self {
            a: ((f64::from(self.a) * o).round() as i32).clamp(0, 255) as u8,
            ..self
        }
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
