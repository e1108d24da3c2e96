//! # Rate Specs
//!
//! A [`RateSpec`] is the value object describing what a limiter should do:
//! the target rate, a burst ratio, a strictness and a scheduling type.
//!
//! ## Textual Form
//!
//! ```text
//!     <rate>[,<burst ratio>[,<type>[,<strictness>]]]
//!
//!     "523"                     → 523 ops/s, burst 1.1, strict
//!     "12345,1.3"               → 12345 ops/s, burst 1.3, strict
//!     "12345,1.4,average"       → 12345 ops/s, burst 1.4, average
//!     "250,1.1,strict,0.25"     → 250 ops/s, strictness 0.25
//! ```
//!
//! Burst ratio and strictness are separate fields. The burst ratio is
//! headroom over the target rate (1.1 = 10% over) for the average and hybrid
//! types. Strictness is the 0.0–1.0 knob that controls how fast the strict
//! algorithm forgives lag. It is written out only when it differs from the
//! default, so specs at full strictness keep the three-field form.

use super::config::{DEFAULT_BURST_RATIO, DEFAULT_STRICTNESS};
use super::error::SpecParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Scheduling type tag carried by a [`RateSpec`].
///
/// Only the strict timeline algorithm is implemented by
/// [`RateLimiter`](crate::RateLimiter); the other tags travel with the spec
/// so the host system can pick a different limiter for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RateSpecType {
    /// Isochronous pacing: one op every op tick.
    #[default]
    Strict,
    /// Average-rate pacing with burst headroom.
    Average,
    /// Blend of strict and average pacing.
    Hybrid,
}

impl RateSpecType {
    /// Lowercase name as used in spec text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Average => "average",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RateSpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateSpecType {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        [Self::Strict, Self::Average, Self::Hybrid]
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| SpecParseError::UnknownType {
                token: token.to_string(),
            })
    }
}

/// Target rate plus the knobs that shape how it is enforced.
///
/// Immutable once built; the `with_*` methods return modified copies.
///
/// ## Examples
///
/// ```rust
/// use pacer::{RateSpec, RateSpecType};
///
/// let spec: RateSpec = "12345,1.4,hybrid".parse().unwrap();
/// assert_eq!(spec.rate(), 12345.0);
/// assert_eq!(spec.burst_ratio(), 1.4);
/// assert_eq!(spec.kind(), RateSpecType::Hybrid);
///
/// let tuned = RateSpec::new(500.0).unwrap().with_strictness(0.5);
/// assert_eq!(tuned.strictness(), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSpec {
    rate: f64,
    burst_ratio: f64,
    strictness: f64,
    kind: RateSpecType,
}

impl RateSpec {
    /// Creates a strict spec for `rate` ops/s with default burst ratio and
    /// strictness.
    ///
    /// # Errors
    ///
    /// [`SpecParseError::InvalidRate`] when `rate` is not a positive, finite
    /// number. The upper bound is checked by the limiter, not here.
    pub fn new(rate: f64) -> Result<Self, SpecParseError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SpecParseError::InvalidRate {
                token: rate.to_string(),
            });
        }
        Ok(Self {
            rate,
            burst_ratio: DEFAULT_BURST_RATIO,
            strictness: DEFAULT_STRICTNESS,
            kind: RateSpecType::Strict,
        })
    }

    /// Parses the `rate[,burst[,type[,strictness]]]` form. Same as `text.parse()`.
    pub fn parse(text: &str) -> Result<Self, SpecParseError> {
        text.parse()
    }

    /// Target rate in ops per second.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Burst headroom over the target rate.
    #[inline]
    pub fn burst_ratio(&self) -> f64 {
        self.burst_ratio
    }

    /// Gap-forgiveness strictness in `[0, 1]` (validated by the limiter).
    #[inline]
    pub fn strictness(&self) -> f64 {
        self.strictness
    }

    /// Scheduling type tag.
    #[inline]
    pub fn kind(&self) -> RateSpecType {
        self.kind
    }

    /// Returns a copy with a different rate.
    ///
    /// Unlike [`new`](Self::new) this does not check the value. A limiter
    /// rejects a spec whose rate is not in `(0, 1e9]` when built or updated.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Returns a copy with a different burst ratio.
    pub fn with_burst_ratio(mut self, burst_ratio: f64) -> Self {
        self.burst_ratio = burst_ratio;
        self
    }

    /// Returns a copy with a different strictness.
    ///
    /// Range checks happen in the limiter, as with [`with_rate`](Self::with_rate).
    pub fn with_strictness(mut self, strictness: f64) -> Self {
        self.strictness = strictness;
        self
    }

    /// Returns a copy with a different scheduling type.
    pub fn with_kind(mut self, kind: RateSpecType) -> Self {
        self.kind = kind;
        self
    }
}

impl FromStr for RateSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split(',').map(str::trim);

        let rate_token = match fields.next() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(SpecParseError::Empty),
        };
        let rate = rate_token
            .parse::<f64>()
            .ok()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| SpecParseError::InvalidRate {
                token: rate_token.to_string(),
            })?;
        let mut spec = Self::new(rate)?;

        if let Some(token) = fields.next() {
            spec.burst_ratio = token
                .parse::<f64>()
                .ok()
                .filter(|ratio| ratio.is_finite() && *ratio >= 0.0)
                .ok_or_else(|| SpecParseError::InvalidBurstRatio {
                    token: token.to_string(),
                })?;
        }

        if let Some(token) = fields.next() {
            spec.kind = token.parse()?;
        }

        if let Some(token) = fields.next() {
            spec.strictness = token
                .parse::<f64>()
                .ok()
                .filter(|strictness| (0.0..=1.0).contains(strictness))
                .ok_or_else(|| SpecParseError::InvalidStrictness {
                    token: token.to_string(),
                })?;
        }

        if let Some(token) = fields.next() {
            return Err(SpecParseError::TrailingField {
                token: token.to_string(),
            });
        }

        Ok(spec)
    }
}

impl fmt::Display for RateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.rate, self.burst_ratio, self.kind)?;
        if self.strictness != DEFAULT_STRICTNESS {
            write!(f, ",{}", self.strictness)?;
        }
        Ok(())
    }
}

impl Serialize for RateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate_spec_pattern() {
        let spec: RateSpec = "523".parse().unwrap();
        assert_eq!(spec.rate(), 523.0);
        assert_eq!(spec.burst_ratio(), 1.1);
        assert_eq!(spec.strictness(), 1.0);
        assert_eq!(spec.kind(), RateSpecType::Strict);
    }

    #[test]
    fn test_burst_ratio_pattern() {
        let spec: RateSpec = "12345,1.3".parse().unwrap();
        assert_eq!(spec.rate(), 12345.0);
        assert_eq!(spec.burst_ratio(), 1.3);
        assert_eq!(spec.kind(), RateSpecType::Strict);
    }

    #[test]
    fn test_type_selection() {
        let average: RateSpec = "12345,1.4,average".parse().unwrap();
        assert_eq!(average.kind(), RateSpecType::Average);
        assert_eq!(average.burst_ratio(), 1.4);

        let hybrid: RateSpec = "12345,1.4,hybrid".parse().unwrap();
        assert_eq!(hybrid.kind(), RateSpecType::Hybrid);

        let strict: RateSpec = "10,1.0,strict".parse().unwrap();
        assert_eq!(strict.kind(), RateSpecType::Strict);
    }

    #[test]
    fn test_whitespace_and_case_tolerated() {
        let spec: RateSpec = " 100 , 1.2 , Average ".parse().unwrap();
        assert_eq!(spec.rate(), 100.0);
        assert_eq!(spec.burst_ratio(), 1.2);
        assert_eq!(spec.kind(), RateSpecType::Average);
    }

    #[test]
    fn test_fractional_rate() {
        let spec: RateSpec = "0.5".parse().unwrap();
        assert_eq!(spec.rate(), 0.5);
    }

    #[test]
    fn test_parse_errors_identify_token() {
        assert_eq!("".parse::<RateSpec>(), Err(SpecParseError::Empty));
        assert_eq!(",1.2".parse::<RateSpec>(), Err(SpecParseError::Empty));

        assert_eq!(
            "fast".parse::<RateSpec>(),
            Err(SpecParseError::InvalidRate {
                token: "fast".to_string()
            })
        );
        assert_eq!(
            "0".parse::<RateSpec>(),
            Err(SpecParseError::InvalidRate {
                token: "0".to_string()
            })
        );
        assert_eq!(
            "-10".parse::<RateSpec>(),
            Err(SpecParseError::InvalidRate {
                token: "-10".to_string()
            })
        );
        assert_eq!(
            "100,lots".parse::<RateSpec>(),
            Err(SpecParseError::InvalidBurstRatio {
                token: "lots".to_string()
            })
        );
        assert_eq!(
            "100,-1".parse::<RateSpec>(),
            Err(SpecParseError::InvalidBurstRatio {
                token: "-1".to_string()
            })
        );
        assert_eq!(
            "100,1.1,bursty".parse::<RateSpec>(),
            Err(SpecParseError::UnknownType {
                token: "bursty".to_string()
            })
        );
        assert_eq!(
            "100,1.1,strict,loose".parse::<RateSpec>(),
            Err(SpecParseError::InvalidStrictness {
                token: "loose".to_string()
            })
        );
        assert_eq!(
            "100,1.1,strict,1.5".parse::<RateSpec>(),
            Err(SpecParseError::InvalidStrictness {
                token: "1.5".to_string()
            })
        );
        assert_eq!(
            "100,1.1,strict,0.5,extra".parse::<RateSpec>(),
            Err(SpecParseError::TrailingField {
                token: "extra".to_string()
            })
        );
    }

    #[test]
    fn test_non_finite_rates_rejected() {
        assert!("inf".parse::<RateSpec>().is_err());
        assert!("NaN".parse::<RateSpec>().is_err());
        assert!(RateSpec::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let spec: RateSpec = "12345,1.4,average".parse().unwrap();
        assert_eq!(spec.to_string(), "12345,1.4,average");
        assert_eq!(spec.to_string().parse::<RateSpec>().unwrap(), spec);
    }

    #[test]
    fn test_strictness_field() {
        let spec: RateSpec = "250,1.1,strict,0.25".parse().unwrap();
        assert_eq!(spec.strictness(), 0.25);
        assert_eq!(spec.to_string(), "250,1.1,strict,0.25");
        assert_eq!(spec.to_string().parse::<RateSpec>().unwrap(), spec);

        let loose = RateSpec::new(10.0).unwrap().with_strictness(0.0);
        assert_eq!(loose.to_string(), "10,1.1,strict,0");
        assert_eq!(loose.to_string().parse::<RateSpec>().unwrap(), loose);

        // Full strictness keeps the three-field form
        let strict: RateSpec = "250,1.1,strict,1.0".parse().unwrap();
        assert_eq!(strict.to_string(), "250,1.1,strict");
    }

    #[test]
    fn test_with_rate_is_unchecked() {
        let spec = RateSpec::new(100.0).unwrap().with_rate(-1.0);
        assert_eq!(spec.rate(), -1.0);
        let built = crate::RateLimiter::with_clock(&spec, None, crate::VirtualClock::new(0));
        assert!(built.is_err());
    }

    #[test]
    fn test_equality_is_by_value() {
        let a: RateSpec = "100,1.1".parse().unwrap();
        let b = RateSpec::new(100.0).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b.with_strictness(0.5));
        assert_ne!(a, b.with_kind(RateSpecType::Hybrid));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let spec: RateSpec = "250,1.5,hybrid".parse().unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"250,1.5,hybrid\"");

        let back: RateSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);

        let tuned = RateSpec::new(250.0).unwrap().with_strictness(0.25);
        let json = serde_json::to_string(&tuned).unwrap();
        assert_eq!(json, "\"250,1.1,strict,0.25\"");
        let back: RateSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tuned);
        assert_eq!(back.strictness(), 0.25);

        let bad = serde_json::from_str::<RateSpec>("\"nope\"");
        assert!(bad.is_err());
    }
}
