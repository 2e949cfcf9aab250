//! Survey categories checked per subject

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One independent partition of status data
///
/// Years sort before `Current`, and years sort numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    /// A yearly survey, e.g. the 2023 edition
    Year(u16),
    /// Fallback: any yearly survey completed, first match in year order
    Current,
}

impl Category {
    /// Default category list: every yearly survey ever run, then `Current`
    pub fn default_set() -> Vec<Category> {
        vec![
            Category::Year(2021),
            Category::Year(2022),
            Category::Year(2023),
            Category::Year(2024),
            Category::Current,
        ]
    }

    pub fn year(&self) -> Option<u16> {
        match self {
            Category::Year(y) => Some(*y),
            Category::Current => None,
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Year(y) => write!(f, "{}", y),
            Category::Current => f.write_str("current"),
        }
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") {
            return Ok(Category::Current);
        }
        if s.len() == 4 {
            if let Ok(year) = s.parse::<u16>() {
                return Ok(Category::Year(year));
            }
        }
        Err(CoreError::InvalidCategory {
            value: s.to_string(),
        })
    }
}

impl TryFrom<String> for Category {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.to_string()
    }
}
