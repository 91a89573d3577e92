// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Dataset loading, feature preparation and synthetic sample generation
//!
//! The [`DataProcessor`] turns a labeled CSV corpus into a [`TrainingSet`]:
//! columns are resolved once against the header, labels are normalized to
//! [`UrlLabel`], and features are extracted row by row with the processor's
//! [`FeatureExtractor`].

use std::{fs::File, io::Read, path::Path};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shared_types::UrlLabel;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ClassifierError, ClassifierResult},
    features::{FeatureExtractor, FeatureVector},
};

/// Header names accepted for the URL column, in priority order
pub const URL_COLUMNS: &[&str] = &["url", "URL"];

/// Header names accepted for the label column, in priority order
pub const LABEL_COLUMNS: &[&str] = &["type", "label"];

const MALICIOUS_LABELS: &[&str] = &[
    "1",
    "1.0",
    "malicious",
    "bad",
    "phishing",
    "malware",
    "defacement",
    "spam",
];

const BENIGN_LABELS: &[&str] = &["0", "0.0", "benign", "good", "legitimate", "safe"];

/// A labeled URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The URL string as found in the source
    pub url: String,
    /// Its label
    pub label: UrlLabel,
}

impl UrlRecord {
    /// Create a new labeled URL
    pub fn new(url: impl Into<String>, label: UrlLabel) -> Self {
        Self {
            url: url.into(),
            label,
        }
    }
}

/// Counts gathered while loading a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Records returned
    pub total: usize,
    /// Records labeled benign
    pub benign: usize,
    /// Records labeled malicious
    pub malicious: usize,
    /// Rows skipped because the URL was empty
    pub skipped_empty: usize,
}

impl DatasetSummary {
    fn record(&mut self, label: UrlLabel) {
        self.total += 1;
        match label {
            UrlLabel::Benign => self.benign += 1,
            UrlLabel::Malicious => self.malicious += 1,
        }
    }
}

/// Row-aligned feature vectors and labels
///
/// Every value is finite and both columns have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    features: Vec<FeatureVector>,
    labels: Vec<UrlLabel>,
}

impl TrainingSet {
    /// Create a training set
    ///
    /// # Errors
    ///
    /// Returns a dataset format error if the columns are misaligned or a
    /// feature value is not finite
    pub fn new(features: Vec<FeatureVector>, labels: Vec<UrlLabel>) -> ClassifierResult<Self> {
        if features.len() != labels.len() {
            return Err(ClassifierError::dataset_format(format!(
                "misaligned training set: {} feature rows, {} labels",
                features.len(),
                labels.len()
            )));
        }

        if let Some(row) = features.iter().position(|vector| !vector.is_finite()) {
            return Err(ClassifierError::dataset_format(format!(
                "non-finite feature value in row {}",
                row
            )));
        }

        Ok(Self { features, labels })
    }

    /// Get the number of rows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the set has no rows
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Feature rows, aligned with [`TrainingSet::labels`]
    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    /// Labels, aligned with [`TrainingSet::features`]
    pub fn labels(&self) -> &[UrlLabel] {
        &self.labels
    }

    /// Labels as 0.0/1.0 regression targets
    pub fn targets(&self) -> Vec<f64> {
        self.labels.iter().map(|label| label.as_target()).collect()
    }

    /// Number of (benign, malicious) samples
    pub fn class_counts(&self) -> (usize, usize) {
        let malicious = self.labels.iter().filter(|l| l.is_malicious()).count();
        (self.labels.len() - malicious, malicious)
    }

    /// Check that both classes are present
    pub fn has_both_classes(&self) -> bool {
        let (benign, malicious) = self.class_counts();
        benign > 0 && malicious > 0
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Loads labeled corpora and extracts their features
#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    extractor: FeatureExtractor,
    seed: u64,
}

impl DataProcessor {
    /// Create a processor with the given extractor and sample seed
    pub fn new(extractor: FeatureExtractor, seed: u64) -> Self {
        Self { extractor, seed }
    }

    /// Get the feature extractor
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Get the sample generation seed
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Load labeled records from a CSV file
    ///
    /// # Errors
    ///
    /// - `DatasetIo` if the file cannot be read
    /// - `DatasetFormat` if no URL or label column can be resolved, or a row
    ///   is malformed
    /// - `LabelFormat` if a label value is not recognized
    pub fn load<P: AsRef<Path>>(
        &self,
        source: P,
        url_column: Option<&str>,
        label_column: Option<&str>,
    ) -> ClassifierResult<Vec<UrlRecord>> {
        self.load_with_summary(source, url_column, label_column)
            .map(|(records, _)| records)
    }

    /// Load labeled records and report what was read
    #[instrument(skip(self, source), fields(source = %source.as_ref().display()))]
    pub fn load_with_summary<P: AsRef<Path>>(
        &self,
        source: P,
        url_column: Option<&str>,
        label_column: Option<&str>,
    ) -> ClassifierResult<(Vec<UrlRecord>, DatasetSummary)> {
        let path = source.as_ref();
        let file = File::open(path).map_err(|e| {
            ClassifierError::dataset_io(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let (records, summary) = Self::read_records(file, url_column, label_column)?;

        info!(
            total = summary.total,
            benign = summary.benign,
            malicious = summary.malicious,
            skipped_empty = summary.skipped_empty,
            "loaded dataset from {}",
            path.display()
        );

        Ok((records, summary))
    }

    /// Read labeled records from any CSV source
    pub fn read_records<R: Read>(
        reader: R,
        url_column: Option<&str>,
        label_column: Option<&str>,
    ) -> ClassifierResult<(Vec<UrlRecord>, DatasetSummary)> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ClassifierError::dataset_format(format!("Unreadable header: {}", e)))?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect();

        let url_index = resolve_column(&headers, "URL", url_column, URL_COLUMNS)?;
        let label_index = resolve_column(&headers, "label", label_column, LABEL_COLUMNS)?;

        debug!(
            url_column = %headers[url_index],
            label_column = %headers[label_index],
            "resolved dataset columns"
        );

        let mut records = Vec::new();
        let mut summary = DatasetSummary::default();

        for (index, row) in reader.records().enumerate() {
            // Header is line 1
            let line = index + 2;
            let row = row.map_err(|e| {
                ClassifierError::dataset_format(format!("Malformed row at line {}: {}", line, e))
            })?;

            let url = row.get(url_index).unwrap_or_default();
            if url.is_empty() {
                warn!(line, "skipping row with empty URL");
                summary.skipped_empty += 1;
                continue;
            }

            let label = parse_label(line, row.get(label_index).unwrap_or_default())?;
            summary.record(label);
            records.push(UrlRecord::new(url, label));
        }

        Ok((records, summary))
    }

    /// Extract features for every record
    ///
    /// Records with an empty URL are left out with a warning.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn prepare(&self, records: &[UrlRecord]) -> ClassifierResult<TrainingSet> {
        let usable: Vec<&UrlRecord> = records
            .iter()
            .filter(|record| !record.url.trim().is_empty())
            .collect();

        let excluded = records.len() - usable.len();
        if excluded > 0 {
            warn!(excluded, "excluded records with empty URLs from training data");
        }

        let features: Vec<FeatureVector> = usable
            .par_iter()
            .map(|record| self.extractor.extract(&record.url))
            .collect();
        let labels = usable.iter().map(|record| record.label).collect();

        let set = TrainingSet::new(features, labels)?;
        let (benign, malicious) = set.class_counts();
        info!(samples = set.len(), benign, malicious, "prepared training data");

        Ok(set)
    }

    /// Write a synthetic `url,label` dataset of `count` rows
    ///
    /// Half of the rows are benign, the rest follow common phishing patterns.
    /// The output depends only on the processor seed.
    #[instrument(skip(self, target), fields(target = %target.as_ref().display()))]
    pub fn create_sample<P: AsRef<Path>>(
        &self,
        target: P,
        count: usize,
    ) -> ClassifierResult<DatasetSummary> {
        let target = target.as_ref();
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClassifierError::io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let records = generate_sample(self.seed, count);

        let mut writer = csv::Writer::from_path(target).map_err(|e| {
            ClassifierError::io(format!("Failed to create {}: {}", target.display(), e))
        })?;
        writer
            .write_record(["url", "label"])
            .map_err(|e| ClassifierError::io(e.to_string()))?;

        let mut summary = DatasetSummary::default();
        for record in &records {
            let label = record.label.class_index().to_string();
            writer
                .write_record([record.url.as_str(), label.as_str()])
                .map_err(|e| ClassifierError::io(e.to_string()))?;
            summary.record(record.label);
        }
        writer
            .flush()
            .map_err(|e| ClassifierError::io(format!("Failed to write {}: {}", target.display(), e)))?;

        info!(
            rows = summary.total,
            benign = summary.benign,
            malicious = summary.malicious,
            "created sample dataset at {}",
            target.display()
        );

        Ok(summary)
    }
}

/// Normalize a raw label value
///
/// # Errors
///
/// Returns `LabelFormat` carrying `row` and the raw value when no encoding
/// rule matches
pub fn parse_label(row: usize, value: &str) -> ClassifierResult<UrlLabel> {
    let normalized = value.trim().to_ascii_lowercase();

    if MALICIOUS_LABELS.contains(&normalized.as_str()) {
        Ok(UrlLabel::Malicious)
    } else if BENIGN_LABELS.contains(&normalized.as_str()) {
        Ok(UrlLabel::Benign)
    } else {
        Err(ClassifierError::label_format(row, value))
    }
}

/// Index of the caller's column, or of the first default name present
///
/// A caller-named column must exist; the defaults only apply when no column
/// was named.
fn resolve_column(
    headers: &[String],
    role: &str,
    requested: Option<&str>,
    defaults: &[&str],
) -> ClassifierResult<usize> {
    let candidates = match requested {
        Some(name) => vec![name],
        None => defaults.to_vec(),
    };

    candidates
        .iter()
        .find_map(|name| headers.iter().position(|header| header == name))
        .ok_or_else(|| {
            ClassifierError::dataset_format(format!(
                "no {} column found (expected one of {:?}); found columns {:?}",
                role, candidates, headers
            ))
        })
}

const BENIGN_DOMAINS: &[&str] = &[
    "google.com",
    "wikipedia.org",
    "github.com",
    "amazon.com",
    "microsoft.com",
    "apple.com",
    "stackoverflow.com",
    "reddit.com",
    "nytimes.com",
    "bbc.co.uk",
    "mozilla.org",
    "rust-lang.org",
    "python.org",
    "youtube.com",
    "netflix.com",
    "medium.com",
];

const BENIGN_PATHS: &[&str] = &[
    "",
    "/",
    "/about",
    "/news",
    "/docs/guide",
    "/search?q=weather",
    "/products",
    "/wiki/Main_Page",
    "/help",
    "/blog/2024/release-notes",
    "/contact",
];

const PHISHING_TOKENS: &[&str] = &[
    "secure", "login", "verify", "update", "account", "signin", "confirm", "banking",
];

const PHISHING_BRANDS: &[&str] = &["paypal", "apple", "amazon", "netflix", "chase", "wellsfargo"];

const PHISHING_TLDS: &[&str] = &["tk", "ml", "ga", "cf", "gq", "xyz", "top", "click"];

const PHISHING_PAGES: &[&str] = &[
    "login.php",
    "verify.html",
    "account/update",
    "signin/index.php",
    "webscr?cmd=login",
];

fn pick<'a, R: Rng>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn benign_url<R: Rng>(rng: &mut R) -> String {
    let prefix = if rng.random_bool(0.5) { "www." } else { "" };
    format!(
        "https://{}{}{}",
        prefix,
        pick(rng, BENIGN_DOMAINS),
        pick(rng, BENIGN_PATHS)
    )
}

fn malicious_url<R: Rng>(rng: &mut R) -> String {
    let scheme = if rng.random_bool(0.85) { "http" } else { "https" };

    match rng.random_range(0..3) {
        0 => format!(
            "{}://{}-{}-{}.{}/{}",
            scheme,
            pick(rng, PHISHING_TOKENS),
            pick(rng, PHISHING_TOKENS),
            pick(rng, PHISHING_BRANDS),
            pick(rng, PHISHING_TLDS),
            pick(rng, PHISHING_PAGES)
        ),
        1 => format!(
            "http://{}.{}.{}.{}/{}",
            rng.random_range(1..=223),
            rng.random_range(0..=255),
            rng.random_range(0..=255),
            rng.random_range(1..=254),
            pick(rng, PHISHING_PAGES)
        ),
        _ => format!(
            "{}://{}.com.{}-{}.{}/{}?id={}",
            scheme,
            pick(rng, PHISHING_BRANDS),
            pick(rng, PHISHING_TOKENS),
            rng.random_range(100..10_000),
            pick(rng, PHISHING_TLDS),
            pick(rng, PHISHING_PAGES),
            rng.random_range(10_000..100_000)
        ),
    }
}

/// Deterministic synthetic records for a seed
pub fn generate_sample(seed: u64, count: usize) -> Vec<UrlRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let benign = count / 2;

    let mut records: Vec<UrlRecord> = (0..count)
        .map(|i| {
            if i < benign {
                UrlRecord::new(benign_url(&mut rng), UrlLabel::Benign)
            } else {
                UrlRecord::new(malicious_url(&mut rng), UrlLabel::Malicious)
            }
        })
        .collect();
    records.shuffle(&mut rng);

    records
}
