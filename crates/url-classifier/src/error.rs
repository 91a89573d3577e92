// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for URL classification operations
//!
//! This module covers every failure of the training and inference pipeline:
//! dataset problems, per-candidate fit failures, artifact loading and
//! persistence, and configuration issues.

use thiserror::Error;

/// Result type alias for URL classification operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Error types for the classification pipeline
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Dataset source missing or unreadable
    #[error("Dataset I/O error: {message}")]
    DatasetIo { message: String },

    /// URL or label column could not be resolved, or a row is malformed
    #[error("Dataset format error: {message}")]
    DatasetFormat { message: String },

    /// Label value not recognized by any encoding rule
    #[error("Label format error at row {row}: unrecognized label value '{value}'")]
    LabelFormat { row: usize, value: String },

    /// Not enough samples to perform a stratified split
    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    /// A single candidate failed to fit or evaluate
    #[error("Model '{model}' failed: {message}")]
    ModelFit { model: String, message: String },

    /// Model artifact missing, corrupt, or trained for another feature schema
    #[error("Model load error: {message}")]
    ModelLoad { message: String },

    /// Every candidate of a training run failed
    #[error("No viable model: {message}")]
    NoViableModel { message: String },

    /// Artifact or report write failure
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Configuration invalid or unreadable
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Trainer operation invoked out of order
    #[error("Invalid trainer state: {message}")]
    InvalidState { message: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing error
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl ClassifierError {
    /// Create a dataset I/O error
    pub fn dataset_io<T: ToString>(message: T) -> Self {
        Self::DatasetIo {
            message: message.to_string(),
        }
    }

    /// Create a dataset format error
    pub fn dataset_format<T: ToString>(message: T) -> Self {
        Self::DatasetFormat {
            message: message.to_string(),
        }
    }

    /// Create a label format error
    pub fn label_format<T: ToString>(row: usize, value: T) -> Self {
        Self::LabelFormat {
            row,
            value: value.to_string(),
        }
    }

    /// Create an insufficient data error
    pub fn insufficient_data<T: ToString>(message: T) -> Self {
        Self::InsufficientData {
            message: message.to_string(),
        }
    }

    /// Create a model fit error for a named candidate
    pub fn model_fit<M: ToString, T: ToString>(model: M, message: T) -> Self {
        Self::ModelFit {
            model: model.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a model load error
    pub fn model_load<T: ToString>(message: T) -> Self {
        Self::ModelLoad {
            message: message.to_string(),
        }
    }

    /// Create a no viable model error
    pub fn no_viable_model<T: ToString>(message: T) -> Self {
        Self::NoViableModel {
            message: message.to_string(),
        }
    }

    /// Create an I/O error
    pub fn io<T: ToString>(message: T) -> Self {
        Self::Io {
            message: message.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config<T: ToString>(message: T) -> Self {
        Self::Configuration {
            message: message.to_string(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state<T: ToString>(message: T) -> Self {
        Self::InvalidState {
            message: message.to_string(),
        }
    }

    /// Create a JSON error
    pub fn json<T: ToString>(message: T) -> Self {
        Self::Json {
            message: message.to_string(),
        }
    }

    /// Create a YAML error
    pub fn yaml<T: ToString>(message: T) -> Self {
        Self::Yaml {
            message: message.to_string(),
        }
    }

    /// Check if this error comes from reading or interpreting a dataset
    pub fn is_dataset_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::DatasetIo { .. }
                | ClassifierError::DatasetFormat { .. }
                | ClassifierError::LabelFormat { .. }
        )
    }

    /// Check if this error aborts a training run
    ///
    /// Only a single candidate's failure is isolated; everything else stops
    /// the run.
    pub fn is_fatal_to_training(&self) -> bool {
        !matches!(self, ClassifierError::ModelFit { .. })
    }

    /// Check if this error indicates a configuration problem
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::Configuration { .. } | ClassifierError::Yaml { .. }
        )
    }
}

/// Convert from JSON errors
impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Convert from YAML errors
impl From<serde_yaml::Error> for ClassifierError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Convert from I/O errors
impl From<std::io::Error> for ClassifierError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Convert from layered configuration errors
impl From<config::ConfigError> for ClassifierError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}
