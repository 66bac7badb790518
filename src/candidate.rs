//! Candidate behaviors and batch requests.
//!
//! A [`Candidate`] is the raw, untrusted shape produced by an upstream
//! extractor. It is never persisted. [`Candidate::validate`] turns it into a
//! [`ValidCandidate`], which is what the resolution policy works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::Polarity;
use crate::credibility::Credibility;
use crate::error::ValidationError;

fn default_context() -> String {
    "general".to_string()
}

/// A newly observed behavior, as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub intent: String,
    pub target: String,

    #[serde(default = "default_context")]
    pub context: String,

    pub polarity: Polarity,

    /// Unvalidated; checked by [`Candidate::validate`].
    #[serde(alias = "extracted_credibility")]
    pub credibility: f64,

    #[serde(default)]
    pub embedding: Vec<f32>,

    /// When the behavior was observed. Falls back to the batch timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl Candidate {
    /// Validates the candidate against the configured embedding dimension.
    ///
    /// `fallback_time` is used when the candidate carries no timestamp of its own.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for empty intent/target/context, credibility
    /// outside `[0.0, 1.0]`, a wrong embedding length, or a non-finite
    /// embedding component.
    pub fn validate(
        &self,
        embedding_dimension: usize,
        fallback_time: DateTime<Utc>,
    ) -> Result<ValidCandidate, ValidationError> {
        let intent = required("intent", &self.intent)?;
        let target = required("target", &self.target)?;
        let context = required("context", &self.context)?;
        let credibility = Credibility::new(self.credibility)?;

        if self.embedding.len() != embedding_dimension {
            return Err(ValidationError::InvalidEmbeddingDimension {
                actual: self.embedding.len(),
                expected: embedding_dimension,
            });
        }
        if let Some(index) = self.embedding.iter().position(|x| !x.is_finite()) {
            return Err(ValidationError::NonFiniteEmbedding { index });
        }

        Ok(ValidCandidate {
            intent,
            target,
            context,
            polarity: self.polarity,
            credibility,
            embedding: self.embedding.clone(),
            observed_at: self.observed_at.unwrap_or(fallback_time),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// A candidate that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCandidate {
    pub intent: String,
    pub target: String,
    pub context: String,
    pub polarity: Polarity,
    pub credibility: Credibility,
    pub embedding: Vec<f32>,
    pub observed_at: DateTime<Utc>,
}

/// A batch of candidates observed for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub user_id: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    pub candidates: Vec<Candidate>,
}

impl BatchRequest {
    /// Creates a request stamped with the current time.
    #[must_use]
    pub fn new(user_id: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: Utc::now(),
            candidates,
        }
    }

    /// Sets the observation timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Candidate {
        Candidate {
            intent: "PREFERENCE".to_string(),
            target: "  Rust ".to_string(),
            context: "backend".to_string(),
            polarity: Polarity::Positive,
            credibility: 0.7,
            embedding: vec![0.1, 0.2, 0.3],
            observed_at: None,
        }
    }

    #[test]
    fn validate_accepts_and_trims() {
        let now = Utc::now();
        let valid = raw().validate(3, now).unwrap();
        assert_eq!(valid.target, "Rust");
        assert_eq!(valid.observed_at, now);
        assert!((valid.credibility.value() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_prefers_own_timestamp() {
        let own = Utc::now() - chrono::Duration::hours(2);
        let mut c = raw();
        c.observed_at = Some(own);
        assert_eq!(c.validate(3, Utc::now()).unwrap().observed_at, own);
    }

    #[test]
    fn validate_rejects_bad_credibility() {
        let mut c = raw();
        c.credibility = 1.01;
        assert!(matches!(
            c.validate(3, Utc::now()),
            Err(ValidationError::CredibilityOutOfRange { .. })
        ));
    }

    #[test]
    fn validate_rejects_dimension_mismatch() {
        let err = raw().validate(4, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidEmbeddingDimension {
                actual: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn validate_rejects_non_finite_embedding() {
        let mut c = raw();
        c.embedding[1] = f32::NAN;
        assert_eq!(
            c.validate(3, Utc::now()).unwrap_err(),
            ValidationError::NonFiniteEmbedding { index: 1 }
        );
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let mut c = raw();
        c.target = "   ".to_string();
        assert!(matches!(
            c.validate(3, Utc::now()),
            Err(ValidationError::MissingField { field }) if field == "target"
        ));
    }

    #[test]
    fn deserialize_accepts_extracted_credibility_and_default_context() {
        let json = r#"{
            "intent": "GOAL",
            "target": "learn Go",
            "polarity": "POSITIVE",
            "extracted_credibility": 0.6,
            "embedding": [1.0, 0.0]
        }"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.context, "general");
        assert!((c.credibility - 0.6).abs() < f64::EPSILON);
    }
}
