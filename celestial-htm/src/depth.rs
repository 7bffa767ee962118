//! Attribute histograms and the per-depth attribute ranges derived from them.
//!
//! A table's scalar attribute (magnitude, angular size, ...) decides which
//! mesh depth an object is stored at. Rare values (bright stars, large
//! galaxies) go near the roots where each cell spans a wide area; common
//! values go deep where cells are small. The [`DepthMap`] records one
//! contiguous attribute range per depth, with the lowest values at depth 0.
//!
//! Tiers are built from the high end of the histogram inward. The finest
//! depth takes the smallest run of bins holding at least 80% of the
//! population, the next depth takes 75% of what remains, then 66% and 50%,
//! with the thresholds cycling if the mesh has more depths. Depth 0 takes
//! whatever is left.

use rayon::prelude::*;
use tracing::debug;

use crate::constants::{DEPTH_FILL_THRESHOLDS, HISTOGRAM_DIVS, HTM_MAX_DEPTH};
use crate::error::{HtmError, HtmResult};

/// Population counts over equal-width bins spanning `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    min: f32,
    max: f32,
    bins: [u32; HISTOGRAM_DIVS],
    count: u64,
}

impl Histogram {
    pub fn new(min: f32, max: f32) -> HtmResult<Self> {
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(HtmError::invalid_parameter(format!(
                "invalid histogram range [{min}, {max}]"
            )));
        }
        Ok(Self {
            min,
            max,
            bins: [0; HISTOGRAM_DIVS],
            count: 0,
        })
    }

    /// Counts `values` in parallel. Values outside `[min, max]` are skipped.
    pub fn from_values(values: &[f32], min: f32, max: f32) -> HtmResult<Self> {
        let empty = Self::new(min, max)?;
        let histogram = values
            .par_iter()
            .fold(
                || empty.clone(),
                |mut h, &value| {
                    h.add(value);
                    h
                },
            )
            .reduce(|| empty.clone(), Self::merge);
        Ok(histogram)
    }

    pub(crate) fn from_parts(min: f32, max: f32, bins: [u32; HISTOGRAM_DIVS]) -> HtmResult<Self> {
        let mut histogram = Self::new(min, max)?;
        histogram.count = bins.iter().map(|&b| b as u64).sum();
        histogram.bins = bins;
        Ok(histogram)
    }

    /// Adds one value, returning false if it was outside the range.
    pub fn add(&mut self, value: f32) -> bool {
        match self.bin_of(value) {
            Some(bin) => {
                self.bins[bin] = self.bins[bin].saturating_add(1);
                self.count += 1;
                true
            }
            None => false,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (bin, extra) in self.bins.iter_mut().zip(other.bins) {
            *bin = bin.saturating_add(extra);
        }
        self.count += other.count;
        self
    }

    /// Bin holding `value`. The top edge belongs to the last bin.
    pub fn bin_of(&self, value: f32) -> Option<usize> {
        if !(value >= self.min && value <= self.max) {
            return None;
        }
        let width = self.width();
        if width == 0.0 {
            return Some(0);
        }
        let mut bin = (((value as f64 - self.min as f64) / width) as usize).min(HISTOGRAM_DIVS - 1);
        // agree with the f32 edges the depth map is cut on
        if bin > 0 && value < self.edge(bin) {
            bin -= 1;
        } else if bin + 1 < HISTOGRAM_DIVS && value >= self.edge(bin + 1) {
            bin += 1;
        }
        Some(bin)
    }

    pub fn width(&self) -> f64 {
        (self.max as f64 - self.min as f64) / HISTOGRAM_DIVS as f64
    }

    /// Lower edge of `bin`; `edge(HISTOGRAM_DIVS)` is `max`.
    fn edge(&self, bin: usize) -> f32 {
        if bin >= HISTOGRAM_DIVS {
            self.max
        } else {
            (self.min as f64 + bin as f64 * self.width()) as f32
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn bins(&self) -> &[u32; HISTOGRAM_DIVS] {
        &self.bins
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Attribute range stored at one depth.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl DepthRange {
    pub fn is_empty(&self) -> bool {
        self.min >= self.max
    }

    fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One attribute range per mesh depth, contiguous and increasing with depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    tiers: Vec<DepthRange>,
}

impl DepthMap {
    /// Builds the depth map for a mesh of `max_depth` from a histogram.
    pub fn from_histogram(histogram: &Histogram, max_depth: u8) -> Self {
        let mut tiers = vec![
            DepthRange {
                min: histogram.min(),
                max: histogram.min(),
            };
            max_depth as usize + 1
        ];

        let mut end = HISTOGRAM_DIVS;
        let mut remaining = histogram.count();
        for (step, depth) in (0..=max_depth).rev().enumerate() {
            let start = if depth == 0 {
                0
            } else {
                let threshold = DEPTH_FILL_THRESHOLDS[step % DEPTH_FILL_THRESHOLDS.len()];
                let (start, taken) = fill_limit(histogram.bins(), end, remaining, threshold);
                remaining -= taken;
                start
            };

            tiers[depth as usize] = DepthRange {
                min: histogram.edge(start),
                max: histogram.edge(end),
            };
            debug!(
                depth,
                min = tiers[depth as usize].min,
                max = tiers[depth as usize].max,
                remaining,
                "depth tier"
            );
            end = start;
        }

        Self { tiers }
    }

    /// Adopts explicit tiers, checking they are contiguous and increasing.
    pub fn from_tiers(tiers: Vec<DepthRange>) -> HtmResult<Self> {
        if tiers.is_empty() || tiers.len() > HTM_MAX_DEPTH as usize {
            return Err(HtmError::invalid_parameter(format!(
                "depth map needs 1..={} tiers, got {}",
                HTM_MAX_DEPTH,
                tiers.len()
            )));
        }
        for (depth, tier) in tiers.iter().enumerate() {
            if !(tier.min.is_finite() && tier.max.is_finite() && tier.min <= tier.max) {
                return Err(HtmError::invalid_parameter(format!(
                    "depth {depth} has invalid range [{}, {}]",
                    tier.min, tier.max
                )));
            }
        }
        for (depth, pair) in tiers.windows(2).enumerate() {
            if pair[0].max != pair[1].min {
                return Err(HtmError::invalid_parameter(format!(
                    "depth {} ends at {} but depth {} starts at {}",
                    depth,
                    pair[0].max,
                    depth + 1,
                    pair[1].min
                )));
            }
        }
        Ok(Self { tiers })
    }

    pub fn max_depth(&self) -> u8 {
        (self.tiers.len() - 1) as u8
    }

    pub fn tiers(&self) -> &[DepthRange] {
        &self.tiers
    }

    pub fn tier(&self, depth: u8) -> Option<DepthRange> {
        self.tiers.get(depth as usize).copied()
    }

    pub fn min_value(&self) -> f32 {
        self.tiers[0].min
    }

    pub fn max_value(&self) -> f32 {
        self.tiers[self.tiers.len() - 1].max
    }

    fn is_degenerate(&self) -> bool {
        self.min_value() == self.max_value()
    }

    fn check_range(&self, value: f32) -> HtmResult<()> {
        if !(value >= self.min_value() && value <= self.max_value()) {
            return Err(HtmError::attribute_out_of_range(
                value,
                self.min_value(),
                self.max_value(),
            ));
        }
        Ok(())
    }

    fn usable(&self, tier: &DepthRange) -> bool {
        !tier.is_empty() || self.is_degenerate()
    }

    /// The single depth whose half-open range `[min, max)` holds `value`.
    /// The table maximum belongs to the deepest tier.
    pub fn depth_of(&self, value: f32) -> HtmResult<u8> {
        self.check_range(value)?;
        let depth = self
            .tiers
            .iter()
            .position(|t| value >= t.min && value < t.max)
            .unwrap_or(self.tiers.len() - 1);
        Ok(depth as u8)
    }

    /// Shallowest depth whose range holds `value`; tier boundaries go to
    /// the coarser depth. Used to place objects in ascending tables.
    pub fn depth_for_min(&self, value: f32) -> HtmResult<u8> {
        self.check_range(value)?;
        self.tiers
            .iter()
            .position(|t| self.usable(t) && t.contains(value))
            .map(|d| d as u8)
            .ok_or_else(|| HtmError::unmappable_depth(format!("no tier holds {value}")))
    }

    /// Deepest depth whose range holds `value`; tier boundaries go to the
    /// finer depth. Used to place objects in descending tables.
    pub fn depth_for_max(&self, value: f32) -> HtmResult<u8> {
        self.check_range(value)?;
        self.tiers
            .iter()
            .rposition(|t| self.usable(t) && t.contains(value))
            .map(|d| d as u8)
            .ok_or_else(|| HtmError::unmappable_depth(format!("no tier holds {value}")))
    }

    /// Depth span a query over `[attr_min, attr_max]` must scan.
    ///
    /// Bounds beyond the table's range are clamped to depth 0 and the deepest
    /// depth. Fails if the bounds are reversed, NaN, or miss the table's range.
    pub fn clip_range(&self, attr_min: f32, attr_max: f32) -> HtmResult<(u8, u8)> {
        if !(attr_min <= attr_max) {
            return Err(HtmError::unmappable_depth(format!(
                "attribute bounds [{attr_min}, {attr_max}] are not ordered"
            )));
        }
        if attr_min > self.max_value() || attr_max < self.min_value() {
            return Err(HtmError::unmappable_depth(format!(
                "attribute bounds [{attr_min}, {attr_max}] miss table range [{}, {}]",
                self.min_value(),
                self.max_value()
            )));
        }

        let min_depth = if attr_min <= self.min_value() {
            0
        } else {
            self.depth_for_min(attr_min)?
        };
        let max_depth = if attr_max >= self.max_value() {
            self.max_depth()
        } else {
            self.depth_for_max(attr_max)?
        };
        Ok((min_depth, max_depth))
    }
}

/// Walks bins downward from `end` until at least `threshold` of `remaining`
/// is covered. Returns the first bin of the run and the population taken.
fn fill_limit(bins: &[u32], end: usize, remaining: u64, threshold: f64) -> (usize, u64) {
    let required = threshold * remaining as f64;
    let mut taken = 0u64;
    for bin in (0..end).rev() {
        taken += bins[bin] as u64;
        if taken as f64 >= required {
            return (bin, taken);
        }
    }
    (0, taken)
}
