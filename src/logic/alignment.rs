use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Activation, ActivationView};

/// Map a raw activation value onto `[0, 1]`: `value / 100`, clamped.
///
/// Out-of-range upstream values saturate instead of failing. NaN maps to 0.
pub fn intensity(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    (value / 100.0).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenIntensity {
    pub token: String,
    pub intensity: f64,
}

/// Tokens paired positionally with their intensities.
///
/// Only [`AlignmentEngine`] can build one, after checking both sequences have the same
/// length, so holders never index two parallel arrays themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AlignedTokens(Vec<TokenIntensity>);

impl AlignedTokens {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TokenIntensity> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[TokenIntensity] {
        &self.0
    }

    /// The position with the strongest intensity, first one on ties
    pub fn peak(&self) -> Option<&TokenIntensity> {
        self.0.iter().fold(None, |best, item| match best {
            Some(b) if b.intensity >= item.intensity => Some(b),
            _ => Some(item),
        })
    }
}

impl<'a> IntoIterator for &'a AlignedTokens {
    type Item = &'a TokenIntensity;
    type IntoIter = std::slice::Iter<'a, TokenIntensity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Pure, stateless pairing of token sequences with activation values
pub struct AlignmentEngine;

impl AlignmentEngine {
    /// Pair `tokens[i]` with `intensity(values[i])`.
    ///
    /// A length mismatch is a data-integrity failure: nothing is truncated or padded.
    pub fn align(tokens: &[String], values: &[f64]) -> Result<AlignedTokens> {
        if tokens.len() != values.len() {
            return Err(Error::Alignment {
                tokens: tokens.len(),
                values: values.len(),
            });
        }

        Ok(AlignedTokens(
            tokens
                .iter()
                .zip(values)
                .map(|(token, value)| TokenIntensity {
                    token: token.clone(),
                    intensity: intensity(*value),
                })
                .collect(),
        ))
    }

    /// Render one activation row against the tokens of the sample it scores
    pub fn view(activation: &Activation, tokens: &[String]) -> Result<ActivationView> {
        let aligned = Self::align(tokens, &activation.values).map_err(|e| {
            log::warn!(
                "activation {} (feature {}, sample {}) does not align: {}",
                activation.id,
                activation.feature_id,
                activation.sample_id,
                e
            );
            e
        })?;

        Ok(ActivationView {
            activation_id: activation.id,
            feature_id: activation.feature_id,
            sample_id: activation.sample_id,
            tokens: aligned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_intensity_mapping() {
        assert_eq!(intensity(-50.0), 0.0);
        assert_eq!(intensity(0.0), 0.0);
        assert_eq!(intensity(50.0), 0.5);
        assert_eq!(intensity(100.0), 1.0);
        assert_eq!(intensity(150.0), 1.0);
        assert_eq!(intensity(f64::NAN), 0.0);
        assert_eq!(intensity(f64::INFINITY), 1.0);
        assert_eq!(intensity(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_intensity_stays_in_unit_interval() {
        for raw in -300..=300 {
            let value = intensity(raw as f64 * 0.75);
            assert!((0.0..=1.0).contains(&value), "{} escaped [0,1]", value);
        }
    }

    #[test]
    fn test_align_pairs_by_position() {
        let aligned =
            AlignmentEngine::align(&tokens(&["the", "cat", "sat"]), &[0.0, 80.0, 25.0]).unwrap();

        let pairs: Vec<(&str, f64)> = aligned
            .iter()
            .map(|t| (t.token.as_str(), t.intensity))
            .collect();
        assert_eq!(pairs, vec![("the", 0.0), ("cat", 0.8), ("sat", 0.25)]);
        assert_eq!(aligned.peak().map(|t| t.token.as_str()), Some("cat"));
    }

    #[test]
    fn test_length_mismatch_is_an_error_not_a_truncation() {
        let err = AlignmentEngine::align(&tokens(&["the", "cat", "sat"]), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::Alignment { tokens: 3, values: 2 }));

        let err = AlignmentEngine::align(&tokens(&["a"]), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::Alignment { tokens: 1, values: 2 }));
    }

    #[test]
    fn test_empty_sequences_align() {
        let aligned = AlignmentEngine::align(&[], &[]).unwrap();
        assert!(aligned.is_empty());
        assert!(aligned.peak().is_none());
    }

    #[test]
    fn test_view_serializes_as_token_list() {
        let activation = Activation {
            id: 5,
            feature_id: 2,
            sample_id: 3,
            values: vec![100.0, -4.0],
        };
        let view = AlignmentEngine::view(&activation, &tokens(&["a", "dog"])).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "activation_id": 5,
                "feature_id": 2,
                "sample_id": 3,
                "tokens": [
                    {"token": "a", "intensity": 1.0},
                    {"token": "dog", "intensity": 0.0}
                ]
            })
        );
    }
}
