//! Output canvas variants.

use serde::{Deserialize, Serialize};

/// Target canvas of a single render. Ordering here is the fixed insertion order
/// used when iterating `templates_present` for a job: vertical, then square, then landscape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Vertical,
    Square,
    Landscape,
}

impl Variant {
    pub const ORDERED: [Variant; 3] = [Variant::Vertical, Variant::Square, Variant::Landscape];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Vertical => "vertical",
            Variant::Square => "square",
            Variant::Landscape => "landscape",
        }
    }

    /// Target canvas dimensions, width then height.
    pub fn canvas(&self) -> (u32, u32) {
        match self {
            Variant::Vertical => (1080, 1920),
            Variant::Square => (1080, 1080),
            Variant::Landscape => (1920, 1080),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_dimensions_match_contract() {
        assert_eq!(Variant::Vertical.canvas(), (1080, 1920));
        assert_eq!(Variant::Square.canvas(), (1080, 1080));
        assert_eq!(Variant::Landscape.canvas(), (1920, 1080));
    }

    #[test]
    fn ordered_list_is_vertical_square_landscape() {
        assert_eq!(
            Variant::ORDERED,
            [Variant::Vertical, Variant::Square, Variant::Landscape]
        );
    }
}
