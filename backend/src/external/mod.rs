//! External service clients

pub mod ocr;

pub use ocr::OcrEngineClient;
