//! Batched min/sum/max over a run of values.
//!
//! Full batches of [`LANES`] values are folded lane-wise into fixed arrays,
//! which the compiler lowers to packed SIMD min/max/add. The lanes are then
//! collapsed and the tail shorter than one batch is folded with a scalar loop.

use crate::aggregate::Aggregate;
use crate::error::EmptyGroupError;

pub const LANES: usize = 8;

pub fn reduce(values: &[f32]) -> Result<Aggregate, EmptyGroupError> {
    let Some(&first) = values.first() else {
        return Err(EmptyGroupError);
    };

    let mut mins = [first; LANES];
    let mut maxs = [first; LANES];
    let mut sums = [0f64; LANES];

    let mut batches = values.chunks_exact(LANES);
    for batch in &mut batches {
        for lane in 0..LANES {
            let v = batch[lane];
            mins[lane] = mins[lane].min(v);
            maxs[lane] = maxs[lane].max(v);
            sums[lane] += f64::from(v);
        }
    }

    let mut min = mins.iter().copied().fold(first, f32::min);
    let mut max = maxs.iter().copied().fold(first, f32::max);
    let mut sum: f64 = sums.iter().sum();
    for &v in batches.remainder() {
        min = min.min(v);
        max = max.max(v);
        sum += f64::from(v);
    }

    Aggregate::from_parts(min, max, sum, values.len() as u64)
}
