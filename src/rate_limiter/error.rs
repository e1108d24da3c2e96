//! Error kinds surfaced by spec parsing and limiter reconfiguration.
//!
//! Falling behind schedule is never an error; it shows up as scheduling
//! delay instead.

use thiserror::Error;

/// Malformed rate spec text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecParseError {
    /// The text had no rate field.
    #[error("rate spec is empty")]
    Empty,

    /// The rate field was not a positive, finite number.
    #[error("invalid rate '{token}': expected a positive number of ops per second")]
    InvalidRate {
        /// The offending field.
        token: String,
    },

    /// The burst ratio field was not a finite, non-negative number.
    #[error("invalid burst ratio '{token}': expected a finite, non-negative number")]
    InvalidBurstRatio {
        /// The offending field.
        token: String,
    },

    /// The type field named no known scheduling type.
    #[error("unknown rate spec type '{token}': expected strict, average or hybrid")]
    UnknownType {
        /// The offending field.
        token: String,
    },

    /// The strictness field was not a number in `[0, 1]`.
    #[error("invalid strictness '{token}': expected a number between 0.0 and 1.0")]
    InvalidStrictness {
        /// The offending field.
        token: String,
    },

    /// More than four fields were given.
    #[error("unexpected trailing field '{token}' in rate spec")]
    TrailingField {
        /// The first extra field.
        token: String,
    },
}

/// A rate or strictness a limiter can't apply.
///
/// The limiter keeps its previous configuration when this is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Rate not in `(0, 1e9]`.
    #[error("rate {rate} is out of range: must be greater than 0 and at most 1000000000 (timing precision is 1ns)")]
    RateOutOfRange {
        /// The rejected rate.
        rate: f64,
    },

    /// Strictness not in `[0, 1]`.
    #[error("strictness {strictness} is out of range: must be between 0.0 and 1.0")]
    StrictnessOutOfRange {
        /// The rejected strictness.
        strictness: f64,
    },
}

/// Any error produced by this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// See [`SpecParseError`].
    #[error(transparent)]
    SpecParse(#[from] SpecParseError),

    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Result alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, Error>;
