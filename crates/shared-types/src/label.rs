// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! URL classification labels

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Binary classification label for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UrlLabel {
    /// URL is considered safe
    Benign,
    /// URL is considered malicious (phishing, malware, defacement)
    Malicious,
}

impl UrlLabel {
    /// Both labels, in class-index order
    pub const ALL: [UrlLabel; 2] = [UrlLabel::Benign, UrlLabel::Malicious];

    /// Returns the numeric class index (0 = benign, 1 = malicious)
    pub const fn class_index(self) -> u8 {
        match self {
            Self::Benign => 0,
            Self::Malicious => 1,
        }
    }

    /// Returns the label as a regression target (0.0 or 1.0)
    pub const fn as_target(self) -> f64 {
        match self {
            Self::Benign => 0.0,
            Self::Malicious => 1.0,
        }
    }

    /// Returns the human-readable name of the label
    pub const fn name(self) -> &'static str {
        match self {
            Self::Benign => "Benign",
            Self::Malicious => "Malicious",
        }
    }

    /// Check if the label is malicious
    pub fn is_malicious(self) -> bool {
        matches!(self, Self::Malicious)
    }

    /// Check if the label is benign
    pub fn is_benign(self) -> bool {
        matches!(self, Self::Benign)
    }

    /// Label implied by a malicious-class probability
    ///
    /// Ties resolve to [`UrlLabel::Benign`].
    pub fn from_probability(probability_malicious: f64) -> Self {
        if probability_malicious > 0.5 {
            Self::Malicious
        } else {
            Self::Benign
        }
    }
}

impl fmt::Display for UrlLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UrlLabel {
    type Err = UrlLabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // First try the numeric class index
        if let Ok(index) = s.trim().parse::<u8>() {
            return Self::try_from(index);
        }

        match s.trim().to_ascii_lowercase().as_str() {
            "benign" => Ok(Self::Benign),
            "malicious" => Ok(Self::Malicious),
            _ => Err(UrlLabelParseError::InvalidName(s.to_string())),
        }
    }
}

impl TryFrom<u8> for UrlLabel {
    type Error = UrlLabelParseError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::Benign),
            1 => Ok(Self::Malicious),
            _ => Err(UrlLabelParseError::InvalidIndex(index)),
        }
    }
}

/// Error type for label parsing
#[derive(Debug, thiserror::Error)]
pub enum UrlLabelParseError {
    /// Numeric class index outside 0/1
    #[error("invalid class index: {0}")]
    InvalidIndex(u8),
    /// Unknown label name
    #[error("invalid label name: {0}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parsing() {
        assert_eq!("0".parse::<UrlLabel>().unwrap(), UrlLabel::Benign);
        assert_eq!("1".parse::<UrlLabel>().unwrap(), UrlLabel::Malicious);
        assert_eq!(" Benign ".parse::<UrlLabel>().unwrap(), UrlLabel::Benign);
        assert_eq!("MALICIOUS".parse::<UrlLabel>().unwrap(), UrlLabel::Malicious);

        assert!(matches!(
            "2".parse::<UrlLabel>(),
            Err(UrlLabelParseError::InvalidIndex(2))
        ));
        assert!(matches!(
            "phish".parse::<UrlLabel>(),
            Err(UrlLabelParseError::InvalidName(_))
        ));
    }

    #[test]
    fn label_accessors() {
        assert_eq!(UrlLabel::Benign.class_index(), 0);
        assert_eq!(UrlLabel::Malicious.class_index(), 1);
        assert_eq!(UrlLabel::Malicious.as_target(), 1.0);
        assert!(UrlLabel::Malicious.is_malicious());
        assert!(UrlLabel::Benign.is_benign());
        assert_eq!(UrlLabel::Malicious.to_string(), "Malicious");
    }

    #[test]
    fn probability_threshold() {
        assert_eq!(UrlLabel::from_probability(0.51), UrlLabel::Malicious);
        assert_eq!(UrlLabel::from_probability(0.5), UrlLabel::Benign);
        assert_eq!(UrlLabel::from_probability(0.0), UrlLabel::Benign);
    }

    #[test]
    fn serde_names() {
        let serialized = serde_json::to_string(&UrlLabel::Malicious).unwrap();
        assert_eq!(serialized, "\"Malicious\"");

        let deserialized: UrlLabel = serde_json::from_str("\"Benign\"").unwrap();
        assert_eq!(deserialized, UrlLabel::Benign);
    }
}
