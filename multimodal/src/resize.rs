//! Pixel-budgeted resolution solver.
//!
//! Maps a native `(height, width)` to dimensions that are multiples of the
//! vision encoder's patch alignment factor, keep the aspect ratio and land
//! inside a `[min_pixels, max_pixels]` budget.

use serde::{Deserialize, Serialize};

use crate::error::{MultiModalError, MultiModalResult};

/// Patch granularity of the vision encoder.
pub const DEFAULT_FACTOR: u32 = 28;

/// Largest accepted `max(h, w) / min(h, w)`.
pub const DEFAULT_MAX_RATIO: u32 = 200;

/// Bounds on the total pixel count of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBudget {
    pub min_pixels: u64,
    pub max_pixels: u64,
}

impl PixelBudget {
    pub fn new(min_pixels: u64, max_pixels: u64) -> MultiModalResult<Self> {
        if min_pixels == 0 {
            return Err(MultiModalError::InvalidBudget(
                "min_pixels must be positive".to_string(),
            ));
        }
        if min_pixels > max_pixels {
            return Err(MultiModalError::InvalidBudget(format!(
                "min_pixels ({min_pixels}) exceeds max_pixels ({max_pixels})"
            )));
        }
        Ok(Self {
            min_pixels,
            max_pixels,
        })
    }

    /// Same lower bound with a different ceiling.
    pub fn with_max(self, max_pixels: u64) -> Self {
        Self {
            min_pixels: self.min_pixels.min(max_pixels),
            max_pixels,
        }
    }

    /// Whether both bounds are whole multiples of `factor²`.
    pub fn is_aligned(&self, factor: u32) -> bool {
        let unit = u64::from(factor) * u64::from(factor);
        unit > 0 && self.min_pixels % unit == 0 && self.max_pixels % unit == 0
    }
}

/// Output of the solver; both sides are multiples of the alignment factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizedDims {
    pub height: u32,
    pub width: u32,
}

impl ResizedDims {
    pub fn area(&self) -> u64 {
        u64::from(self.height) * u64::from(self.width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSolver {
    pub factor: u32,
    pub max_ratio: f64,
}

impl Default for ResolutionSolver {
    fn default() -> Self {
        Self {
            factor: DEFAULT_FACTOR,
            max_ratio: f64::from(DEFAULT_MAX_RATIO),
        }
    }
}

impl ResolutionSolver {
    pub fn new(factor: u32, max_ratio: f64) -> Self {
        Self { factor, max_ratio }
    }

    /// Solve for the aligned output size of a `height x width` input.
    ///
    /// The baseline rounds each side to the nearest multiple of the factor.
    /// An oversized baseline is scaled down and floored, an undersized one is
    /// scaled up and ceiled, so a shrink never exceeds `max_pixels` and a grow
    /// never falls below `min_pixels`. Shrinking wins when both apply. Sides
    /// never drop below one factor, so inputs too thin to fit the ceiling at
    /// one factor wide may still exceed it.
    pub fn solve(
        &self,
        height: u32,
        width: u32,
        budget: PixelBudget,
    ) -> MultiModalResult<ResizedDims> {
        if height == 0 || width == 0 || self.factor == 0 {
            return Err(MultiModalError::InvalidDimensions { height, width });
        }

        let h = f64::from(height);
        let w = f64::from(width);
        let ratio = h.max(w) / h.min(w);
        if ratio > self.max_ratio {
            return Err(MultiModalError::AspectRatioTooLarge {
                ratio,
                max_ratio: self.max_ratio,
            });
        }

        let factor = f64::from(self.factor);
        let max_pixels = budget.max_pixels as f64;
        let min_pixels = budget.min_pixels as f64;

        let mut h_bar = round_by_factor(h, factor).max(factor);
        let mut w_bar = round_by_factor(w, factor).max(factor);

        if h_bar * w_bar > max_pixels {
            let beta = (h * w / max_pixels).sqrt();
            h_bar = floor_by_factor(h / beta, factor).max(factor);
            w_bar = floor_by_factor(w / beta, factor).max(factor);
        } else if h_bar * w_bar < min_pixels {
            let beta = (min_pixels / (h * w)).sqrt();
            h_bar = ceil_by_factor(h * beta, factor);
            w_bar = ceil_by_factor(w * beta, factor);
        }

        Ok(ResizedDims {
            height: h_bar as u32,
            width: w_bar as u32,
        })
    }
}

/// Solve with the default factor and aspect-ratio ceiling.
pub fn smart_resize(height: u32, width: u32, budget: PixelBudget) -> MultiModalResult<ResizedDims> {
    ResolutionSolver::default().solve(height, width, budget)
}

/// Closest multiple of `factor`; ties go to the even multiple.
fn round_by_factor(value: f64, factor: f64) -> f64 {
    (value / factor).round_ties_even() * factor
}

fn ceil_by_factor(value: f64, factor: f64) -> f64 {
    (value / factor).ceil() * factor
}

fn floor_by_factor(value: f64, factor: f64) -> f64 {
    (value / factor).floor() * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u64 = 28 * 28;

    fn image_budget() -> PixelBudget {
        PixelBudget::new(4 * UNIT, 5120 * UNIT).unwrap()
    }

    fn assert_aligned(dims: ResizedDims) {
        assert!(dims.height > 0 && dims.width > 0);
        assert_eq!(dims.height % 28, 0, "{dims:?}");
        assert_eq!(dims.width % 28, 0, "{dims:?}");
    }

    #[test]
    fn in_budget_image_keeps_rounded_baseline() {
        let dims = smart_resize(1080, 1920, image_budget()).unwrap();
        assert_eq!(
            dims,
            ResizedDims {
                height: 1092,
                width: 1932
            }
        );
    }

    #[test]
    fn oversized_image_shrinks_under_ceiling() {
        let budget = image_budget();
        let dims = smart_resize(4000, 6000, budget).unwrap();
        assert_aligned(dims);
        assert!(dims.area() <= budget.max_pixels);
        assert_eq!(
            dims,
            ResizedDims {
                height: 1624,
                width: 2436
            }
        );
    }

    #[test]
    fn undersized_image_grows_over_floor() {
        let budget = image_budget();
        let dims = smart_resize(10, 10, budget).unwrap();
        assert_aligned(dims);
        assert!(dims.area() >= budget.min_pixels);
        assert_eq!(
            dims,
            ResizedDims {
                height: 56,
                width: 56
            }
        );
    }

    #[test]
    fn ties_round_to_even_multiple() {
        // 42 / 28 = 1.5 and 70 / 28 = 2.5 both land on the even multiple.
        let budget = PixelBudget::new(UNIT, 100 * UNIT).unwrap();
        let dims = smart_resize(42, 70, budget).unwrap();
        assert_eq!(
            dims,
            ResizedDims {
                height: 56,
                width: 56
            }
        );
    }

    #[test]
    fn aspect_ratio_at_ceiling_is_accepted() {
        let dims = smart_resize(10, 2000, image_budget()).unwrap();
        assert_aligned(dims);
    }

    #[test]
    fn aspect_ratio_above_ceiling_is_rejected() {
        let err = smart_resize(10, 2001, image_budget()).unwrap_err();
        assert!(matches!(err, MultiModalError::AspectRatioTooLarge { .. }));
        assert!(err.is_validation());

        let err = smart_resize(2001, 10, image_budget()).unwrap_err();
        assert!(matches!(err, MultiModalError::AspectRatioTooLarge { .. }));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let err = smart_resize(0, 100, image_budget()).unwrap_err();
        assert!(matches!(err, MultiModalError::InvalidDimensions { .. }));
    }

    #[test]
    fn shrink_never_exceeds_ceiling_across_shapes() {
        let budget = PixelBudget::new(4 * UNIT, 256 * UNIT).unwrap();
        for (h, w) in [(720, 1280), (3000, 3000), (480, 9000), (2160, 3840), (999, 1001)] {
            let dims = smart_resize(h, w, budget).unwrap();
            assert_aligned(dims);
            assert!(dims.area() <= budget.max_pixels, "{h}x{w} -> {dims:?}");
        }
    }

    #[test]
    fn grow_stays_within_one_step_of_floor() {
        let budget = PixelBudget::new(1024 * UNIT, 5120 * UNIT).unwrap();
        for (h, w) in [(20, 30), (100, 50), (64, 64), (33, 500)] {
            let dims = smart_resize(h, w, budget).unwrap();
            assert_aligned(dims);
            assert!(dims.area() + UNIT >= budget.min_pixels, "{h}x{w} -> {dims:?}");
        }
    }

    #[test]
    fn custom_factor_is_respected() {
        let solver = ResolutionSolver::new(14, 200.0);
        let dims = solver
            .solve(300, 500, PixelBudget::new(196, 1_000_000).unwrap())
            .unwrap();
        assert_eq!(dims.height % 14, 0);
        assert_eq!(dims.width % 14, 0);
    }

    #[test]
    fn budget_validation() {
        assert!(PixelBudget::new(0, 10).is_err());
        assert!(PixelBudget::new(11, 10).is_err());
        assert!(image_budget().is_aligned(28));
        assert!(!PixelBudget::new(100, 1000).unwrap().is_aligned(28));
    }
}
