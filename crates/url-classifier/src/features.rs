// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Lexical and structural URL feature extraction
//!
//! [`FeatureExtractor::extract`] turns any string into a fixed-length
//! [`FeatureVector`]. Extraction is total: input that cannot be parsed as a URL
//! still yields a vector, with host-derived features set to `0.0`. The layout
//! of the vector is frozen and identified by [`FEATURE_SCHEMA_VERSION`]; any
//! change to [`FEATURE_NAMES`] or to how a feature is computed requires a new
//! schema version, which invalidates previously trained artifacts.

use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::{ClassifierError, ClassifierResult};

/// Version of the feature layout produced by [`FeatureExtractor`]
pub const FEATURE_SCHEMA_VERSION: &str = "1.0.0";

/// Number of features in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 26;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "url_length",
    "host_length",
    "path_length",
    "query_length",
    "dot_count",
    "hyphen_count",
    "underscore_count",
    "slash_count",
    "at_count",
    "percent_count",
    "digit_count",
    "special_char_count",
    "digit_ratio",
    "is_ip_host",
    "subdomain_count",
    "has_punycode_or_non_ascii",
    "is_https",
    "has_custom_port",
    "suspicious_token_count",
    "high_risk_tld",
    "host_entropy",
    "url_entropy",
    "path_depth",
    "query_param_count",
    "has_embedded_redirect",
    "host_hyphen_count",
];

/// Default top-level domains considered high risk
pub const DEFAULT_HIGH_RISK_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "work", "click", "loan", "win", "bid",
];

/// Default tokens commonly found in phishing URLs
pub const DEFAULT_SUSPICIOUS_TOKENS: &[&str] = &[
    "secure", "login", "verify", "update", "account", "bank", "signin", "confirm", "password",
    "webscr", "ebayisapi", "paypal",
];

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("token regex is valid"));

/// Fixed-length numeric representation of a URL
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Create a feature vector, replacing non-finite values with `0.0`
    pub fn new(mut values: [f64; FEATURE_COUNT]) -> Self {
        for value in values.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        Self(values)
    }

    /// All-zero vector
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    /// Feature values in schema order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of a feature by index
    pub fn value(&self, index: usize) -> f64 {
        self.0[index]
    }

    /// Value of a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| self.0[index])
    }

    /// Check that every value is finite
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|value| value.is_finite())
    }

    /// Length of the vector (always [`FEATURE_COUNT`])
    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    /// Feature vectors are never empty
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Settings of the risk-heuristic features
///
/// These sets are stored inside every trained artifact so inference computes
/// the same features the model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Top-level domains flagged by `high_risk_tld` (without leading dot)
    pub high_risk_tlds: BTreeSet<String>,
    /// Tokens counted by `suspicious_token_count`
    pub suspicious_tokens: BTreeSet<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            high_risk_tlds: DEFAULT_HIGH_RISK_TLDS
                .iter()
                .map(|tld| tld.to_string())
                .collect(),
            suspicious_tokens: DEFAULT_SUSPICIOUS_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
        }
    }
}

impl ExtractorConfig {
    /// Lower-case every entry and strip leading dots from TLDs
    pub fn normalized(self) -> Self {
        Self {
            high_risk_tlds: self
                .high_risk_tlds
                .into_iter()
                .map(|tld| tld.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|tld| !tld.is_empty())
                .collect(),
            suspicious_tokens: self
                .suspicious_tokens
                .into_iter()
                .map(|token| token.trim().to_ascii_lowercase())
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// Validate the heuristic sets
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either set is empty or an entry
    /// contains characters that can never appear in a host label
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.high_risk_tlds.is_empty() {
            return Err(ClassifierError::config(
                "high_risk_tlds cannot be empty".to_string(),
            ));
        }

        if self.suspicious_tokens.is_empty() {
            return Err(ClassifierError::config(
                "suspicious_tokens cannot be empty".to_string(),
            ));
        }

        for entry in self.high_risk_tlds.iter().chain(&self.suspicious_tokens) {
            if !TOKEN_REGEX.is_match(entry) {
                return Err(ClassifierError::config(format!(
                    "invalid heuristic entry '{}': only lowercase letters, digits and hyphens are allowed",
                    entry
                )));
            }
        }

        Ok(())
    }
}

/// Stateless URL feature extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

/// Parsed pieces of a URL that host-based features depend on
struct UrlParts {
    host: String,
    ip_host: bool,
    path: String,
    query: String,
    custom_port: bool,
}

impl FeatureExtractor {
    /// Create an extractor with the given heuristic sets
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config: config.normalized(),
        }
    }

    /// The heuristic sets in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the feature vector of a URL
    ///
    /// Never fails; unparsable input degrades to zero host features.
    pub fn extract(&self, url: &str) -> FeatureVector {
        let raw = url.trim();
        if raw.is_empty() {
            return FeatureVector::zeros();
        }

        let lowered = raw.to_lowercase();
        let parts = Self::parse(raw);

        let url_length = raw.chars().count() as f64;
        let digit_count = count_matching(raw, |c| c.is_ascii_digit());

        let mut values = [0.0; FEATURE_COUNT];
        values[0] = url_length;
        values[4] = count_char(raw, '.');
        values[5] = count_char(raw, '-');
        values[6] = count_char(raw, '_');
        values[7] = count_char(raw, '/');
        values[8] = count_char(raw, '@');
        values[9] = count_char(raw, '%');
        values[10] = digit_count;
        values[11] = count_matching(raw, |c| {
            !c.is_alphanumeric() && !matches!(c, '.' | '-' | '_' | '/')
        });
        values[12] = digit_count / url_length;
        values[15] = bool_feature(!raw.is_ascii() || lowered.contains("xn--"));
        values[16] = bool_feature(lowered.starts_with("https://"));
        values[21] = shannon_entropy(raw);

        // Token search falls back to the whole input when nothing parses
        let haystack = match &parts {
            Some(parts) => format!("{} {} {}", parts.host, parts.path, parts.query).to_lowercase(),
            None => lowered,
        };
        values[18] = self
            .config
            .suspicious_tokens
            .iter()
            .filter(|token| haystack.contains(token.as_str()))
            .count() as f64;

        if let Some(parts) = parts {
            values[1] = parts.host.chars().count() as f64;
            values[2] = parts.path.chars().count() as f64;
            values[3] = parts.query.chars().count() as f64;
            values[13] = bool_feature(parts.ip_host);
            values[14] = subdomain_count(&parts);
            values[17] = bool_feature(parts.custom_port);
            values[19] = bool_feature(self.is_high_risk_tld(&parts));
            values[20] = shannon_entropy(&parts.host);
            values[22] = parts.path.split('/').filter(|s| !s.is_empty()).count() as f64;
            values[23] = if parts.query.is_empty() {
                0.0
            } else {
                parts.query.split('&').filter(|s| !s.is_empty()).count() as f64
            };
            values[24] = bool_feature(parts.path.contains("//"));
            values[25] = count_char(&parts.host, '-');
        }

        FeatureVector::new(values)
    }

    /// Extract features paired with their names
    pub fn extract_named(&self, url: &str) -> Vec<(&'static str, f64)> {
        let vector = self.extract(url);
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(vector.as_slice().iter().copied())
            .collect()
    }

    fn is_high_risk_tld(&self, parts: &UrlParts) -> bool {
        if parts.ip_host {
            return false;
        }

        parts
            .host
            .trim_end_matches('.')
            .rsplit('.')
            .next()
            .map(|tld| self.config.high_risk_tlds.contains(tld))
            .unwrap_or(false)
    }

    /// Parse the URL, retrying scheme-less input as `http://`
    fn parse(raw: &str) -> Option<UrlParts> {
        let parsed = if raw.contains("://") {
            Url::parse(raw).ok()
        } else {
            Url::parse(&format!("http://{}", raw)).ok()
        }?;

        let (host, ip_host) = match parsed.host()? {
            Host::Domain(domain) => (domain.to_string(), false),
            Host::Ipv4(addr) => (addr.to_string(), true),
            Host::Ipv6(addr) => (addr.to_string(), true),
        };

        Some(UrlParts {
            host,
            ip_host,
            path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
            custom_port: parsed.port().is_some(),
        })
    }
}

fn bool_feature(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

fn count_char(text: &str, needle: char) -> f64 {
    text.chars().filter(|c| *c == needle).count() as f64
}

fn count_matching(text: &str, predicate: impl Fn(char) -> bool) -> f64 {
    text.chars().filter(|c| predicate(*c)).count() as f64
}

fn subdomain_count(parts: &UrlParts) -> f64 {
    if parts.ip_host {
        return 0.0;
    }

    let labels = parts
        .host
        .trim_end_matches('.')
        .split('.')
        .filter(|label| !label.is_empty())
        .count();
    labels.saturating_sub(2) as f64
}

/// Shannon entropy in bits per character
fn shannon_entropy(text: &str) -> f64 {
    let mut counts = std::collections::HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
        total += 1;
    }

    if total == 0 {
        return 0.0;
    }

    // Sum over sorted counts so the result is bit-identical across runs
    let mut frequencies: Vec<usize> = counts.into_values().collect();
    frequencies.sort_unstable();

    let total = total as f64;
    frequencies
        .into_iter()
        .map(|count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}
