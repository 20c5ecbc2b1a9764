pub mod enums;
pub mod test_suite;

#[cfg(test)]
pub(crate) mod fixtures;

pub use enums::*;
pub use test_suite::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Unknown GAMP category: {0}")]
    UnknownCategory(String),

    #[error("Step action too short ({len} < {min} characters): '{action}'")]
    ActionTooShort { action: String, len: usize, min: usize },
}
