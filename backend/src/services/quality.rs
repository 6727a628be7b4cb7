//! Image quality scoring
//!
//! Computes per-image metrics (sharpness, resolution, contrast, brightness,
//! edge density, noise), normalizes each to 0..1 against breakpoints tuned
//! on real document photos, and folds them into a weighted 0..100 score
//! with a verdict and Spanish-language recommendations.
//!
//! Only raster images are accepted here; PDF quality is a different
//! problem and is rejected up front.

use image::imageops;
use serde_json::json;

use shared::{ImageInfo, QualityMetrics, QualityReport, Verdict};

use crate::error::{AppError, AppResult};
use crate::services::pdf::is_pdf;

const WEIGHT_SHARP: f64 = 0.35;
const WEIGHT_RES: f64 = 0.25;
const WEIGHT_CONTRAST: f64 = 0.15;
const WEIGHT_BRIGHTNESS: f64 = 0.10;
const WEIGHT_EDGES: f64 = 0.10;
const WEIGHT_NOISE: f64 = 0.05;

struct Gray {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Gray {
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    fn mean(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    fn std(&self) -> f64 {
        let mean = self.mean();
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64;
        var.sqrt()
    }

    fn min_max(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in &self.data {
            min = min.min(v as f64);
            max = max.max(v as f64);
        }
        (min, max)
    }
}

/// 4-neighbor Laplacian variance, with a 2 px border trim to drop frame
/// artifacts.
fn variance_of_laplacian(g: &Gray) -> f64 {
    if g.width < 5 || g.height < 5 {
        return 0.0;
    }
    let mut vals: Vec<f64> = Vec::with_capacity((g.width - 4) * (g.height - 4));
    for y in 2..g.height - 2 {
        for x in 2..g.width - 2 {
            let lap = -4.0 * g.at(x, y)
                + g.at(x, y - 1)
                + g.at(x, y + 1)
                + g.at(x - 1, y)
                + g.at(x + 1, y);
            vals.push(lap as f64);
        }
    }
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / vals.len() as f64
}

/// Fraction of pixels whose gradient magnitude exceeds mean + std.
fn edge_density(g: &Gray) -> f64 {
    if g.width < 3 || g.height < 3 {
        return 0.0;
    }
    let mut mags: Vec<f64> = Vec::with_capacity(g.data.len());
    for y in 0..g.height {
        for x in 0..g.width {
            let gx = match x {
                0 => g.at(1, y) - g.at(0, y),
                x if x == g.width - 1 => g.at(x, y) - g.at(x - 1, y),
                x => (g.at(x + 1, y) - g.at(x - 1, y)) / 2.0,
            };
            let gy = match y {
                0 => g.at(x, 1) - g.at(x, 0),
                y if y == g.height - 1 => g.at(x, y) - g.at(x, y - 1),
                y => (g.at(x, y + 1) - g.at(x, y - 1)) / 2.0,
            };
            mags.push((gx as f64).hypot(gy as f64));
        }
    }
    let mean = mags.iter().sum::<f64>() / mags.len() as f64;
    let var = mags.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / mags.len() as f64;
    let thr = mean + var.sqrt();
    if thr <= 0.0 {
        return 0.0;
    }
    mags.iter().filter(|&&m| m > thr).count() as f64 / mags.len() as f64
}

/// Std of the blur residual relative to the image std; JPEG artifacts and
/// sensor noise survive a mild gaussian blur, real content mostly does not.
fn noise_ratio(gray_img: &image::GrayImage, g: &Gray) -> f64 {
    let blurred = imageops::blur(gray_img, 1.2);
    let resid: Vec<f64> = g
        .data
        .iter()
        .zip(blurred.pixels())
        .map(|(&orig, p)| orig as f64 - p.0[0] as f64)
        .collect();
    let mean = resid.iter().sum::<f64>() / resid.len() as f64;
    let resid_std = (resid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
        / resid.len() as f64)
        .sqrt();
    let denom = g.std().max(1e-6);
    resid_std / denom
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn round_to(x: f64, digits: i32) -> f64 {
    let f = 10f64.powi(digits);
    (x * f).round() / f
}

/// Score an uploaded image. PDFs are rejected with 415.
pub fn assess_quality(file_bytes: &[u8], content_type: Option<&str>) -> AppResult<QualityReport> {
    if is_pdf(file_bytes, content_type) {
        return Err(AppError::unsupported(
            "quality assessment accepts raster images only",
            "La evaluación de calidad solo acepta imágenes",
        ));
    }

    let img = image::load_from_memory(file_bytes)
        .map_err(|e| AppError::InvalidDocument(format!("cannot decode image: {e}")))?;
    let gray_img = img.to_luma8();
    let (width, height) = (gray_img.width() as usize, gray_img.height() as usize);
    if width == 0 || height == 0 {
        return Err(AppError::InvalidDocument("empty image".into()));
    }
    let g = Gray {
        width,
        height,
        data: gray_img.pixels().map(|p| p.0[0] as f32).collect(),
    };

    let brightness = g.mean() / 255.0;
    let contrast = g.std() / 255.0;
    let (gmin, gmax) = g.min_max();
    let dynamic_range = (gmax - gmin) / 255.0;
    let sharp_var = variance_of_laplacian(&g);
    let edges = edge_density(&g);
    let noise_r = noise_ratio(&gray_img, &g);

    let min_edge = width.min(height) as f64;
    let res_norm = clamp01((min_edge - 700.0) / (1500.0 - 700.0));
    let sharp_norm = clamp01((sharp_var - 100.0) / (600.0 - 100.0));

    let bright_norm = if brightness < 0.35 {
        (1.0 - (0.35 - brightness) / 0.35).max(0.0)
    } else if brightness > 0.75 {
        (1.0 - (brightness - 0.75) / 0.25).max(0.0)
    } else {
        1.0
    };

    let contrast_norm = if contrast < 0.15 {
        (contrast / 0.15).max(0.0)
    } else if contrast > 0.35 {
        (1.0 - (contrast - 0.35) / 0.25).max(0.0)
    } else {
        1.0
    };

    let noise_norm = if noise_r <= 0.08 {
        1.0
    } else if noise_r >= 0.25 {
        0.0
    } else {
        1.0 - (noise_r - 0.08) / (0.25 - 0.08)
    };

    let edges_norm = clamp01((edges - 0.01) / (0.12 - 0.01));

    let score = 100.0
        * (WEIGHT_SHARP * sharp_norm
            + WEIGHT_RES * res_norm
            + WEIGHT_CONTRAST * contrast_norm
            + WEIGHT_BRIGHTNESS * bright_norm
            + WEIGHT_EDGES * edges_norm
            + WEIGHT_NOISE * noise_norm);

    let verdict = if score >= 75.0 {
        Verdict::Ok
    } else if score >= 55.0 {
        Verdict::Warn
    } else {
        Verdict::Bad
    };

    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    if res_norm < 0.6 {
        issues.push("Resolución baja".to_string());
        recommendations
            .push("Escanea/fotografía a mayor resolución (lado corto >= 1000 px).".to_string());
    }
    if sharp_norm < 0.6 {
        issues.push("Imagen borrosa".to_string());
        recommendations
            .push("Evita movimiento; apoya el teléfono y enfoca antes de tomar la foto.".to_string());
    }
    if contrast_norm < 0.7 {
        issues.push("Contraste bajo".to_string());
        recommendations
            .push("Ilumina mejor el documento o incrementa el contraste al escanear.".to_string());
    }
    if !(0.35..=0.75).contains(&brightness) {
        issues.push("Exposición deficiente".to_string());
        recommendations.push("Evita sombras o sobreexposición; usa luz uniforme.".to_string());
    }
    if noise_norm < 0.6 {
        issues.push("Ruido alto/compresión".to_string());
        recommendations.push(
            "Evita WhatsApp; sube el archivo original o usa PDF/PNG de mejor calidad.".to_string(),
        );
    }

    Ok(QualityReport {
        image: ImageInfo {
            width: width as u32,
            height: height as u32,
        },
        metrics: QualityMetrics {
            brightness: round_to(brightness, 4),
            contrast: round_to(contrast, 4),
            dynamic_range: round_to(dynamic_range, 4),
            sharpness_laplacian_var: round_to(sharp_var, 2),
            edge_density: round_to(edges, 4),
            noise_ratio: round_to(noise_r, 4),
            resolution_norm: round_to(res_norm, 4),
            sharpness_norm: round_to(sharp_norm, 4),
        },
        score: round_to(score, 1),
        verdict,
        issues,
        recommendations,
    })
}

/// Report as a JSON value, used when embedding a quality preview inside an
/// extract response without failing the whole request.
pub fn assess_quality_value(
    file_bytes: &[u8],
    content_type: Option<&str>,
) -> serde_json::Value {
    match assess_quality(file_bytes, content_type) {
        Ok(report) => serde_json::to_value(report).unwrap_or_else(|e| {
            json!({"error": format!("quality serialization failed: {e}")})
        }),
        Err(e) => json!({"error": e.to_string()}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn png_bytes(img: GrayImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn checkerboard(w: u32, h: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Luma([230u8])
            } else {
                Luma([30u8])
            }
        })
    }

    #[test]
    fn rejects_pdf_bytes() {
        let err = assess_quality(b"%PDF-1.4 fake", None).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMedia { .. }));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = assess_quality(b"not an image", Some("image/png")).unwrap_err();
        assert!(matches!(err, AppError::InvalidDocument(_)));
    }

    #[test]
    fn flat_gray_image_scores_bad() {
        let img = GrayImage::from_pixel(200, 200, Luma([128u8]));
        let report = assess_quality(&png_bytes(img), Some("image/png")).unwrap();
        assert_eq!(report.verdict, Verdict::Bad);
        assert!(report.issues.iter().any(|i| i.contains("Resolución")));
        assert!(report.metrics.sharpness_laplacian_var < 1.0);
    }

    #[test]
    fn sharp_high_res_beats_flat_low_res() {
        let sharp = assess_quality(&png_bytes(checkerboard(1600, 1600, 4)), None).unwrap();
        let flat = assess_quality(
            &png_bytes(GrayImage::from_pixel(300, 300, Luma([128u8]))),
            None,
        )
        .unwrap();
        assert!(sharp.score > flat.score);
        assert_eq!(sharp.metrics.resolution_norm, 1.0);
    }

    #[test]
    fn preview_value_degrades_to_error_object() {
        let v = assess_quality_value(b"junk", None);
        assert!(v.get("error").is_some());
    }
}
