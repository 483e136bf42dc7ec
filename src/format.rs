use std::fmt::{self, Write};

use crate::store::Summary;

/// Rounds to one decimal place, ties to even. The scaling happens in `f32`,
/// the precision values are parsed at, so a parsed `2.35` scales to exactly
/// `23.5` and rounds to `2.4`. Negative zero comes back as positive zero so
/// it prints as `0.0`.
pub fn round_tenths(value: f32) -> f32 {
    (value * 10.0).round_ties_even() / 10.0 + 0.0
}

/// Renders `{k1=min/mean/max, k2=min/mean/max, ...}` in ordinal key order.
pub fn format_summary(summary: &Summary) -> String {
    let mut out = String::with_capacity(summary.len().saturating_mul(32) + 2);
    // writing into a String cannot fail
    let _ = write_summary(&mut out, summary);
    out
}

pub fn write_summary(out: &mut impl Write, summary: &Summary) -> fmt::Result {
    out.write_char('{')?;
    for (i, (key, agg)) in summary.sorted().into_iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(
            out,
            "{key}={:.1}/{:.1}/{:.1}",
            round_tenths(agg.min()),
            // narrowed after the division; the sum itself stays wide
            round_tenths(agg.mean() as f32),
            round_tenths(agg.max()),
        )?;
    }
    out.write_char('}')
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, self)
    }
}
