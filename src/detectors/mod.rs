//! Detector registry (C6, spec.md §4.7).
//!
//! A closed tagged variant over the four detection methods, following the
//! spec's own recommendation (§9 "Polymorphic detector set") over open
//! trait-object polymorphism: the method name space is fixed and small.

pub mod ammad;
pub mod fft;
pub mod lof;
pub mod zscore;

use crate::error::detection::DetectionError;

/// The fixed set of detection methods. Name lookup is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    ZScore,
    Lof,
    Fft,
    Ammad,
}

impl Method {
    /// Case-insensitive lookup; also accepts the legacy control-frame
    /// spellings (`Z_score`, `LOF`, `FFT`) as aliases (spec.md §6.2).
    pub fn parse(name: &str) -> Result<Self, DetectionError> {
        match name.to_ascii_lowercase().as_str() {
            "z_score" | "zscore" | "z" => Ok(Method::ZScore),
            "lof" => Ok(Method::Lof),
            "fft" => Ok(Method::Fft),
            "ammad" => Ok(Method::Ammad),
            other => Err(DetectionError::InvalidMethod {
                name: other.to_string(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::ZScore => "z_score",
            Method::Lof => "lof",
            Method::Fft => "fft",
            Method::Ammad => "ammad",
        }
    }

    pub fn default_window(self) -> usize {
        match self {
            Method::ZScore => zscore::DEFAULT_WINDOW,
            Method::Lof => lof::DEFAULT_WINDOW,
            Method::Fft => fft::DEFAULT_WINDOW,
            Method::Ammad => ammad::MIN_HISTORY,
        }
    }

    pub fn default_threshold(self) -> f64 {
        match self {
            Method::ZScore => zscore::DEFAULT_THRESHOLD,
            Method::Lof => lof::DEFAULT_THRESHOLD,
            Method::Fft => fft::DEFAULT_THRESHOLD,
            Method::Ammad => 0.8,
        }
    }

    /// The default buffer capacity covering every non-AMMAD method, used
    /// for the stream session's initial Analysis State (spec.md §4.10).
    pub fn default_triple_max_window() -> usize {
        zscore::DEFAULT_WINDOW
            .max(lof::DEFAULT_WINDOW)
            .max(fft::DEFAULT_WINDOW)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless, non-AMMAD detectors share this signature: a values snapshot,
/// the configured window, and threshold (spec.md §6.1's `detect(values, W,
/// τ, channel_name)`, with `channel_name` unused here).
pub fn detect_stateless(method: Method, values: &[f64], window: usize, threshold: f64) -> bool {
    match method {
        Method::ZScore => zscore::detect(values, window, threshold),
        Method::Lof => lof::detect(values, window, threshold),
        Method::Fft => fft::detect(values, window, threshold),
        Method::Ammad => unreachable!("AMMAD is stateful; call ammad::detect directly"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Method::parse("Z_Score").unwrap(), Method::ZScore);
        assert_eq!(Method::parse("LOF").unwrap(), Method::Lof);
        assert_eq!(Method::parse("fft").unwrap(), Method::Fft);
        assert_eq!(Method::parse("AMMAD").unwrap(), Method::Ammad);
    }

    #[test]
    fn parse_rejects_unknown_method() {
        assert!(Method::parse("bogus").is_err());
    }

    #[test]
    fn default_triple_max_window_covers_all_three() {
        let window = Method::default_triple_max_window();
        assert!(window >= zscore::DEFAULT_WINDOW);
        assert!(window >= lof::DEFAULT_WINDOW);
        assert!(window >= fft::DEFAULT_WINDOW);
    }
}
