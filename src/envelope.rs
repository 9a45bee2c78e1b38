use std::f64::consts::PI;

use strum::{Display, EnumString, VariantNames};

// -------------------------------------------------------------------------------------------------

/// Number of samples in a precomputed envelope lookup table.
pub const ENVELOPE_TABLE_SIZE: usize = 1000;

// -------------------------------------------------------------------------------------------------

/// Window function family applied across a grain's duration.
///
/// A closed set: each kind evaluates a fixed formula over phase `0..=1`, with
/// up to two shape parameters. Parsing from kebab-case names is used by the
/// control surface (`"blackman-harris"`, `"flat-top"`, ...).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum EnvelopeKind {
    /// No windowing. Same curve as `Rectangular`.
    None,
    Rectangular,
    Welch,
    Sine,
    #[default]
    Hann,
    Hamming,
    Blackman,
    Nuttal,
    BlackmanNuttal,
    BlackmanHarris,
    FlatTop,
    /// Linear rise to a peak at `alpha`, then linear fall.
    Triangular,
    /// Linear rise until `alpha`, flat top, linear fall from `beta`.
    Trapezoidal,
    /// Cosine-tapered rise until `alpha` and fall from `beta`.
    Tukey,
    /// Exponential decay with rate `beta`, linear release from `alpha`.
    Expodec,
    /// Time-reversed `Expodec`: linear attack until `alpha`, then a rising
    /// exponential towards the grain end.
    Rexpodec,
}

impl EnvelopeKind {
    /// Default `(alpha, beta)` shape parameters for this family. Parameterless
    /// windows return `(0.0, 0.0)`.
    pub fn default_shape(&self) -> (f64, f64) {
        match self {
            Self::Triangular => (0.5, 0.0),
            Self::Trapezoidal => (0.1, 0.9),
            Self::Tukey => (0.2, 0.8),
            Self::Expodec => (0.9, 0.2),
            Self::Rexpodec => (0.1, 0.2),
            _ => (0.0, 0.0),
        }
    }

    /// Evaluate the window at phase `x` in `0..=1`.
    pub fn evaluate(&self, x: f64, alpha: f64, beta: f64) -> f64 {
        match self {
            Self::None | Self::Rectangular => 1.0,
            Self::Welch => {
                let t = 2.0 * x - 1.0;
                1.0 - t * t
            }
            Self::Sine => (PI * x).sin(),
            Self::Hann => 0.5 - 0.5 * (2.0 * PI * x).cos(),
            Self::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
            Self::Blackman => {
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            }
            Self::Nuttal => {
                0.355768 - 0.487396 * (2.0 * PI * x).cos() + 0.144232 * (4.0 * PI * x).cos()
                    - 0.012604 * (6.0 * PI * x).cos()
            }
            Self::BlackmanNuttal => {
                0.3635819 - 0.4891775 * (2.0 * PI * x).cos() + 0.1365995 * (4.0 * PI * x).cos()
                    - 0.0106411 * (6.0 * PI * x).cos()
            }
            Self::BlackmanHarris => {
                0.35875 - 0.48829 * (2.0 * PI * x).cos() + 0.14128 * (4.0 * PI * x).cos()
                    - 0.01168 * (6.0 * PI * x).cos()
            }
            Self::FlatTop => {
                0.21557895 - 0.41663158 * (2.0 * PI * x).cos()
                    + 0.277263158 * (4.0 * PI * x).cos()
                    - 0.083578947 * (6.0 * PI * x).cos()
                    + 0.006947368 * (8.0 * PI * x).cos()
            }
            Self::Triangular => {
                if x < alpha {
                    x / alpha
                } else {
                    (1.0 - x) / (1.0 - alpha)
                }
            }
            Self::Trapezoidal => {
                if x < alpha {
                    x / alpha
                } else if x > beta {
                    (1.0 - x) / (1.0 - beta)
                } else {
                    1.0
                }
            }
            Self::Tukey => {
                if x < alpha {
                    0.5 - 0.5 * (PI * x / alpha).cos()
                } else if x > beta {
                    0.5 - 0.5 * (PI * (1.0 - x) / (1.0 - beta)).cos()
                } else {
                    1.0
                }
            }
            Self::Expodec => {
                if x <= alpha {
                    (-x / beta).exp()
                } else {
                    (-alpha / beta).exp() * (1.0 - x) / (1.0 - alpha)
                }
            }
            Self::Rexpodec => {
                if x >= alpha {
                    (-(1.0 - x) / beta).exp()
                } else {
                    (-(1.0 - alpha) / beta).exp() * x / alpha
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Precomputed per-seeder envelope lookup table, read by the mixer.
#[derive(Debug, Clone)]
pub struct EnvelopeTable {
    values: Box<[f32]>,
}

impl EnvelopeTable {
    pub fn new(kind: EnvelopeKind) -> Self {
        let mut table = Self {
            values: vec![0.0; ENVELOPE_TABLE_SIZE].into_boxed_slice(),
        };
        table.fill(kind);
        table
    }

    /// Recompute the table in place for the given family with its default
    /// shape parameters. Does not allocate, so it is safe to call from the
    /// audio thread's control message handler.
    pub fn fill(&mut self, kind: EnvelopeKind) {
        let (alpha, beta) = kind.default_shape();
        let last = (self.values.len() - 1) as f64;
        for (index, value) in self.values.iter_mut().enumerate() {
            *value = kind.evaluate(index as f64 / last, alpha, beta) as f32;
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl Default for EnvelopeTable {
    fn default() -> Self {
        Self::new(EnvelopeKind::default())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kebab_case_names() {
        use std::str::FromStr;
        assert_eq!(
            EnvelopeKind::from_str("blackman-harris").unwrap(),
            EnvelopeKind::BlackmanHarris
        );
        assert_eq!(
            EnvelopeKind::from_str("flat-top").unwrap(),
            EnvelopeKind::FlatTop
        );
        assert_eq!(EnvelopeKind::from_str("none").unwrap(), EnvelopeKind::None);
        assert!(EnvelopeKind::from_str("gaussian").is_err());
        assert_eq!(EnvelopeKind::Rexpodec.to_string(), "rexpodec");
    }

    #[test]
    fn window_endpoints_and_peaks() {
        let half = ENVELOPE_TABLE_SIZE / 2;
        for kind in [
            EnvelopeKind::Welch,
            EnvelopeKind::Sine,
            EnvelopeKind::Hann,
            EnvelopeKind::Triangular,
            EnvelopeKind::Tukey,
        ] {
            let table = EnvelopeTable::new(kind);
            let values = table.values();
            assert!(values[0].abs() < 1e-3, "{kind} should start near zero");
            assert!(
                values[ENVELOPE_TABLE_SIZE - 1].abs() < 1e-3,
                "{kind} should end near zero"
            );
            assert!((values[half] - 1.0).abs() < 1e-2, "{kind} should peak at 1");
        }
    }

    #[test]
    fn rectangular_is_flat() {
        let table = EnvelopeTable::new(EnvelopeKind::Rectangular);
        assert!(table.values().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn expodec_decays_and_rexpodec_mirrors_it() {
        let expodec = EnvelopeTable::new(EnvelopeKind::Expodec);
        let rexpodec = EnvelopeTable::new(EnvelopeKind::Rexpodec);
        let values = expodec.values();
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!(values[ENVELOPE_TABLE_SIZE - 1].abs() < 1e-6);
        for window in values.windows(2) {
            assert!(window[1] <= window[0] + 1e-6, "expodec must not rise");
        }
        for index in 0..ENVELOPE_TABLE_SIZE {
            let mirrored = rexpodec.values()[ENVELOPE_TABLE_SIZE - 1 - index];
            assert!((values[index] - mirrored).abs() < 1e-3);
        }
    }
}
