//! Errors returned by domain construction and reader registration.

use std::fmt;

/// Error type of `hazard-swap`.
/// `hazard-swap` 的错误类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardError {
    /// Every hazard slot of the domain is already claimed by a live reader.
    /// 域中的所有危险槽都已被存活的读者占用。
    SlotsExhausted {
        /// Number of slots the domain was built with.
        capacity: usize,
    },
    /// A configuration value is out of range.
    /// 配置值超出范围。
    InvalidConfig(&'static str),
}

impl fmt::Display for HazardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HazardError::SlotsExhausted { capacity } => {
                write!(f, "all {capacity} hazard slots are claimed")
            }
            HazardError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for HazardError {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HazardError>;
