// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the URL classification workspace
//!
//! This crate provides the types exchanged between the classification core and
//! the collaborators that expose it (command-line tools, HTTP wrappers), so
//! those collaborators do not need to depend on the training machinery.

pub mod label;
pub mod prediction;

pub use label::{UrlLabel, UrlLabelParseError};
pub use prediction::PredictionResult;
