//! Domain models for the OCR Wallet Extractor

pub mod document;
pub mod export;
pub mod quality;

pub use document::*;
pub use export::*;
pub use quality::*;
