//! Image quality assessment models

use serde::{Deserialize, Serialize};

use crate::types::Verdict;

/// Quality report for an uploaded document image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub image: ImageInfo,
    pub metrics: QualityMetrics,
    /// Weighted score on a 0-100 scale
    pub score: f64,
    pub verdict: Verdict,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Raw and normalized quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub brightness: f64,
    pub contrast: f64,
    pub dynamic_range: f64,
    pub sharpness_laplacian_var: f64,
    pub edge_density: f64,
    pub noise_ratio: f64,
    pub resolution_norm: f64,
    pub sharpness_norm: f64,
}
