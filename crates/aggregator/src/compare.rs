//! Cross-source price comparison

use dexai_core::{MultiSourcePriceData, PriceComparison};

/// Each source's current price relative to the first entry
///
/// Entries are in priority order, so the baseline is the highest-priority
/// source that settled. A zero baseline yields a zero percentage.
pub fn compare_price_sources(data: &MultiSourcePriceData) -> Vec<PriceComparison> {
    let Some(baseline) = data.sources.first().map(|e| e.price.current_price) else {
        return Vec::new();
    };

    data.sources
        .iter()
        .map(|entry| {
            let price = entry.price.current_price;
            let difference = price - baseline;
            let percentage_diff = if baseline == 0.0 {
                0.0
            } else {
                difference / baseline * 100.0
            };
            PriceComparison {
                source: entry.source,
                price,
                difference,
                percentage_diff,
            }
        })
        .collect()
}

/// Largest absolute percentage deviation from the baseline, if any source has one
pub fn max_deviation_pct(comparisons: &[PriceComparison]) -> Option<f64> {
    comparisons
        .iter()
        .skip(1)
        .map(|c| c.percentage_diff.abs())
        .max_by(|a, b| a.total_cmp(b))
}
