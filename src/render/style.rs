//! Fill and border colors for the fog overlay
//!
//! Presentation settings only; geometry never depends on them.

use serde::{Deserialize, Serialize};

/// RGBA color (0.0 to 1.0 per channel)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// `#rrggbbaa` for hosts that take hex strings
    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b),
            channel(self.a)
        )
    }
}

/// Default fog: near-black, mostly opaque
pub const FOG_FILL: Color = Color::new(0.05, 0.05, 0.08, 0.85);

/// Thin light edge around revealed holes
pub const FOG_BORDER: Color = Color::new(0.9, 0.9, 0.95, 0.3);

/// How the host map should paint the overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub fill: Color,
    pub border: Color,
    pub border_width: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            fill: FOG_FILL,
            border: FOG_BORDER,
            border_width: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        assert_eq!(Color::new(1.0, 0.0, 0.0, 1.0).to_hex(), "#ff0000ff");
    }
}
