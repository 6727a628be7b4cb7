//! Business logic services

pub mod classifier;
pub mod extraction;
pub mod layout;
pub mod merge;
pub mod parsers;
pub mod pdf;
pub mod quality;
pub mod template;

pub use extraction::{ExtractRequest, ExtractionService};
pub use template::TemplateStore;
