//! Shared types and models for the OCR Wallet Extractor
//!
//! This crate contains the domain types shared between the backend and any
//! future consumers: document kinds, OCR export geometry, extraction
//! records, quality reports, and the field validation patterns for Mexican
//! identity documents.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
