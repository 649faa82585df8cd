//! Gradient-to-color classification.
//!
//! Pure functions mapping a segment's signed gradient to a display color from
//! one of two fixed six-color ramps (ascent and descent), relative to a
//! caller-supplied steepness threshold. Segments with unresolved elevations
//! classify to a neutral gray.

/// Color for segments whose gradient is not yet known.
pub const NEUTRAL_COLOR: &str = "#9e9e9e";

/// Ascent ramp, flat to steepest.
pub const ASCENT_RAMP: [&str; 6] = [
    "#2dc937", "#99c140", "#e7b416", "#e68a19", "#cc3232", "#8f1010",
];

/// Descent ramp, flat to steepest.
pub const DESCENT_RAMP: [&str; 6] = [
    "#2dc937", "#40c1a5", "#16a0e7", "#2b62db", "#3232cc", "#10108f",
];

/// Index into a ramp for the given gradient magnitude.
///
/// `ratio = clamp(|gradient| / max_gradient, 0, 1)`, then
/// `index = ceil(ratio * 5)` clamped into the ramp. A gradient at or beyond
/// `max_gradient` always lands on the last ramp entry, never out of bounds.
pub fn ramp_index(gradient: f64, max_gradient: f64) -> usize {
    let last = ASCENT_RAMP.len() - 1;
    let ratio = if max_gradient > 0.0 {
        (gradient.abs() / max_gradient).clamp(0.0, 1.0)
    } else if gradient == 0.0 {
        0.0
    } else {
        1.0
    };
    ((ratio * last as f64).ceil() as usize).min(last)
}

/// Color for a segment gradient relative to the steepness threshold.
///
/// `None` means the segment's elevations have not resolved yet.
pub fn classify(gradient: Option<f64>, max_gradient: f64) -> &'static str {
    match gradient {
        None => NEUTRAL_COLOR,
        Some(g) if g > 0.0 => ASCENT_RAMP[ramp_index(g, max_gradient)],
        Some(g) => DESCENT_RAMP[ramp_index(g, max_gradient)],
    }
}
