//! Row colors of the Launchpad MK2 palette.

use cloudpad_core::{Error, GRID_SIZE};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowColor {
    None,
    Yellow,
    Blue,
    Purple,
    Red,
    LightBlue,
    LightGreen,
    DarkPurple,
}

impl RowColor {
    pub const ALL: [RowColor; 8] = [
        RowColor::None,
        RowColor::Yellow,
        RowColor::Blue,
        RowColor::Purple,
        RowColor::Red,
        RowColor::LightBlue,
        RowColor::LightGreen,
        RowColor::DarkPurple,
    ];

    /// Device velocity value.
    pub fn value(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Yellow => 13,
            Self::Blue => 45,
            Self::Purple => 53,
            Self::Red => 72,
            Self::LightBlue => 79,
            Self::LightGreen => 21,
            Self::DarkPurple => 81,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Yellow => "YELLOW",
            Self::Blue => "BLUE",
            Self::Purple => "PURPLE",
            Self::Red => "RED",
            Self::LightBlue => "LIGHT_BLUE",
            Self::LightGreen => "LIGHT_GREEN",
            Self::DarkPurple => "DARK_PURPLE",
        }
    }

    /// Default color of a row: the palette in order, skipping `NONE` and
    /// wrapping around. Rows outside the grid get `LIGHT_GREEN`.
    pub fn default_for_row(row: usize) -> Self {
        if row >= GRID_SIZE {
            return Self::LightGreen;
        }
        Self::ALL[row % (Self::ALL.len() - 1) + 1]
    }
}

impl std::fmt::Display for RowColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RowColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Config(format!("Unknown color: {}", s)))
    }
}
