//! Aggregation metrics.

use strum::{AsRefStr, Display, EnumIter, IntoStaticStr};

use crate::schema::ChoiceOption;

/// Metric options, in display order.
pub const METRIC_OPTIONS: &[ChoiceOption] = &[
    ChoiceOption::new(Metric::Size.ordinal(), "Size")
        .with_description("Total size of the matching objects in bytes"),
    ChoiceOption::new(Metric::KeyCount.ordinal(), "Number of Keys")
        .with_description("Number of matching objects"),
];

/// What a partition query aggregates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Sum of object sizes.
    #[default]
    Size,
    /// Number of objects.
    KeyCount,
}

impl Metric {
    /// Returns the ordinal stored in the query.
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Size => 0,
            Self::KeyCount => 1,
        }
    }

    /// Maps a stored ordinal back to a metric; unknown ordinals read as size.
    pub fn from_ordinal(ordinal: u8) -> Self {
        match ordinal {
            1 => Self::KeyCount,
            _ => Self::Size,
        }
    }
}
