use crate::error::Error;
use crate::math::{self, MAD_SCALE};
use crate::spot::Spot;

use ndarray::prelude::*;

/// Absolute intensity margin above the median used when the MAD of a
/// frame evaluates to zero (uniform or near-uniform background). Keeps
/// the threshold strictly above the median so a flat frame yields no
/// detections.
const FALLBACK_MARGIN: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct SpotDetectorConfig {
    /// Threshold multiplier on the MAD-based spread estimate.
    pub sensitivity: f32,
    /// Candidate area bounds in pixels, inclusive.
    pub min_area: u32,
    pub max_area: u32,
    /// Gaussian denoising before thresholding.
    pub denoising: bool,
    /// Gaussian kernel size; must be odd and at least 3.
    pub kernel_size: usize,
}

impl SpotDetectorConfig {
    pub fn new(sensitivity: f32, min_area: u32, max_area: u32) -> Self {
        Self {
            sensitivity,
            min_area,
            max_area,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(Error::Config(format!(
                "sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if self.min_area == 0 || self.min_area > self.max_area {
            return Err(Error::Config(format!(
                "area bounds [{}, {}] are not a valid range",
                self.min_area, self.max_area
            )));
        }
        if self.kernel_size % 2 == 0 {
            return Err(Error::Config("kernel_size must be odd".into()));
        }
        if self.kernel_size < 3 {
            return Err(Error::Config("kernel_size must be at least 3".into()));
        }

        Ok(())
    }
}

impl Default for SpotDetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity: 2.0,
            min_area: 10,
            max_area: 1000,
            denoising: true,
            kernel_size: 5,
        }
    }
}

/// Turns one intensity frame into candidate spot observations.
///
/// Pure per-frame computation; result ordering is brightest-first but
/// downstream consumers must not depend on it.
pub struct SpotDetector {
    config: SpotDetectorConfig,
}

impl SpotDetector {
    pub fn new(config: SpotDetectorConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &SpotDetectorConfig {
        &self.config
    }

    pub fn detect(&self, frame: ArrayView2<'_, f32>) -> Vec<Spot> {
        if frame.is_empty() {
            return Vec::new();
        }

        let blurred = if self.config.denoising {
            Some(gaussian_blur(frame, self.config.kernel_size))
        } else {
            None
        };
        let pixels: ArrayView2<'_, f32> = match &blurred {
            Some(b) => b.view(),
            None => frame.view(),
        };

        let mut scratch: Vec<f32> = pixels.iter().copied().collect();
        let median = math::median(&mut scratch);
        let mad = math::mad(&scratch, median);

        let (threshold, spread) = if mad > 0.0 {
            (median + self.config.sensitivity * MAD_SCALE * mad, mad)
        } else {
            (median + FALLBACK_MARGIN, FALLBACK_MARGIN)
        };

        let mask = pixels.mapv(|p| p > threshold);

        // Opening suppresses isolated noise pixels, closing fills pinholes
        // inside true spots.
        let mask = dilate(&erode(&mask));
        let mask = erode(&dilate(&mask));

        let mut spots: Vec<Spot> = components(&mask)
            .into_iter()
            .filter(|comp| {
                let area = comp.len() as u32;
                area >= self.config.min_area && area <= self.config.max_area
            })
            .map(|comp| measure(&pixels, &comp, median, spread))
            .collect();

        spots.sort_by(|a, b| {
            b.mean_intensity
                .partial_cmp(&a.mean_intensity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        spots
    }
}

/// Component statistics: mean over the component, peak value, and the
/// centroid of the pixels attaining the peak.
fn measure(pixels: &ArrayView2<'_, f32>, comp: &[(usize, usize)], median: f32, spread: f32) -> Spot {
    let mut sum = 0.0f32;
    let mut max = f32::NEG_INFINITY;

    for &(row, col) in comp {
        let value = pixels[[row, col]];
        sum += value;
        if value > max {
            max = value;
        }
    }

    let mut peak_count = 0usize;
    let mut peak_row_sum = 0.0f32;
    let mut peak_col_sum = 0.0f32;
    for &(row, col) in comp {
        if pixels[[row, col]] == max {
            peak_count += 1;
            peak_row_sum += row as f32;
            peak_col_sum += col as f32;
        }
    }

    Spot {
        x: peak_col_sum / peak_count as f32,
        y: peak_row_sum / peak_count as f32,
        mean_intensity: sum / comp.len() as f32,
        max_intensity: max,
        area: comp.len() as u32,
        quality: (max - median) / spread,
    }
}

/// 8-connected components of a binary mask, in row-major discovery order.
fn components(mask: &Array2<bool>) -> Vec<Vec<(usize, usize)>> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut comps = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[[row, col]] || visited[[row, col]] {
                continue;
            }

            let mut comp = Vec::new();
            let mut stack = vec![(row, col)];
            visited[[row, col]] = true;

            while let Some((r, c)) = stack.pop() {
                comp.push((r, c));

                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        let (nr, nc) = (r as i64 + dr, c as i64 + dc);
                        if nr < 0 || nc < 0 || nr >= rows as i64 || nc >= cols as i64 {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if mask[[nr, nc]] && !visited[[nr, nc]] {
                            visited[[nr, nc]] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
            }

            comps.push(comp);
        }
    }

    comps
}

/// Erosion with a 3x3 cross structuring element. Pixels outside the
/// frame count as background.
fn erode(mask: &Array2<bool>) -> Array2<bool> {
    let (rows, cols) = mask.dim();

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        mask[[r, c]]
            && r > 0
            && r + 1 < rows
            && c > 0
            && c + 1 < cols
            && mask[[r - 1, c]]
            && mask[[r + 1, c]]
            && mask[[r, c - 1]]
            && mask[[r, c + 1]]
    })
}

/// Dilation with a 3x3 cross structuring element.
fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    let (rows, cols) = mask.dim();

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        mask[[r, c]]
            || (r > 0 && mask[[r - 1, c]])
            || (r + 1 < rows && mask[[r + 1, c]])
            || (c > 0 && mask[[r, c - 1]])
            || (c + 1 < cols && mask[[r, c + 1]])
    })
}

/// Separable Gaussian blur with replicated borders. Sigma follows the
/// usual derivation from the kernel size: 0.3 * ((k - 1) / 2 - 1) + 0.8.
fn gaussian_blur(frame: ArrayView2<'_, f32>, kernel_size: usize) -> Array2<f32> {
    let kernel = gaussian_kernel(kernel_size);
    let half = (kernel_size / 2) as i64;
    let (rows, cols) = frame.dim();

    let mut horizontal = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let cc = (c as i64 + k as i64 - half).clamp(0, cols as i64 - 1) as usize;
                acc += w * frame[[r, cc]];
            }
            horizontal[[r, c]] = acc;
        }
    }

    let mut out = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let mut acc = 0.0f32;
            for (k, &w) in kernel.iter().enumerate() {
                let rr = (r as i64 + k as i64 - half).clamp(0, rows as i64 - 1) as usize;
                acc += w * horizontal[[rr, c]];
            }
            out[[r, c]] = acc;
        }
    }

    out
}

fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size - 1) as f32 * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i64;

    let mut weights: Vec<f32> = (-half..=half)
        .map(|d| (-(d * d) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();

    let total: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }

    weights
}
