//! Page geometry for canvas documents.
//!
//! All values are layout units (CSS pixels at 96 dpi). A4 portrait is
//! 794 × 1123. Header and footer blocks are drawn in the top and bottom
//! margin bands; only the body height is available to paginated content.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Fixed dimensions of one page. Built once per template and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
}

impl PageDimensions {
    pub const A4_WIDTH: f32 = 794.0;
    pub const A4_HEIGHT: f32 = 1123.0;

    /// A4 portrait with 64-unit header/footer bands and 48-unit side margins.
    pub const fn a4() -> Self {
        Self {
            width: Self::A4_WIDTH,
            height: Self::A4_HEIGHT,
            margins: Margins {
                top: 64.0,
                right: 48.0,
                bottom: 64.0,
                left: 48.0,
            },
        }
    }

    /// A4 landscape, used by certificate-style templates.
    pub const fn a4_landscape() -> Self {
        Self {
            width: Self::A4_HEIGHT,
            height: Self::A4_WIDTH,
            margins: Margins::uniform(56.0),
        }
    }

    /// Height available to body content: page height minus top and bottom margins.
    pub fn body_height(&self) -> f32 {
        (self.height - self.margins.top - self.margins.bottom).max(0.0)
    }
}

impl Default for PageDimensions {
    fn default() -> Self {
        Self::a4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_body_height_excludes_vertical_margins() {
        let dims = PageDimensions::a4();
        assert_eq!(dims.body_height(), 1123.0 - 64.0 - 64.0);
    }

    #[test]
    fn test_landscape_swaps_axes() {
        let dims = PageDimensions::a4_landscape();
        assert!(dims.width > dims.height);
        assert_eq!(dims.body_height(), 794.0 - 112.0);
    }

    #[test]
    fn test_oversized_margins_clamp_to_zero() {
        let dims = PageDimensions {
            width: 100.0,
            height: 100.0,
            margins: Margins::uniform(80.0),
        };
        assert_eq!(dims.body_height(), 0.0);
    }
}
