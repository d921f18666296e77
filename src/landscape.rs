//! Resource capacity layouts.

use crate::config::{EnvironmentConfig, Landscape};

/// Capacity of one resource at `(x, y)` given peaks and a global maximum.
///
/// Capacity falls by one unit per ring around the nearest peak; ring width
/// is chosen so the outermost non-empty ring sits a quarter of the grid away
/// from its peak on a square grid.
fn peaked_capacity(x: usize, y: usize, peaks: &[(f64, f64)], max: f64, width: usize, height: usize) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    let ring = width.min(height) as f64 / 2.0 / (max.floor() + 1.0);
    if ring <= 0.0 {
        return max;
    }
    peaks
        .iter()
        .map(|&(px, py)| {
            let dx = x as f64 - px;
            let dy = y as f64 - py;
            let rings = ((dx * dx + dy * dy).sqrt() / ring).floor();
            (max - rings).max(0.0)
        })
        .fold(0.0, f64::max)
}

/// Sugar and spice capacities for a cell
pub fn capacity_at(config: &EnvironmentConfig, x: usize, y: usize) -> (f64, f64) {
    match config.landscape {
        Landscape::Uniform => (config.max_sugar, config.max_spice),
        Landscape::TwinPeaks => {
            let w = config.width as f64;
            let h = config.height as f64;
            let sugar_peaks = [(0.7 * w, 0.3 * h), (0.3 * w, 0.7 * h)];
            let spice_peaks = [(0.3 * w, 0.3 * h), (0.7 * w, 0.7 * h)];
            (
                peaked_capacity(x, y, &sugar_peaks, config.max_sugar, config.width, config.height),
                peaked_capacity(x, y, &spice_peaks, config.max_spice, config.width, config.height),
            )
        }
    }
}
