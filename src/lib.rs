//! # Gradient Path
//!
//! Gradient-aware geographic path building with asynchronous elevation
//! profiling, for map UIs where a user clicks out a route point by point.
//!
//! This library provides:
//! - An incremental path model (clicked points become chained segments)
//! - Async elevation acquisition with stale-result discarding
//! - Per-segment gradient computation and color classification
//! - Distance/ascent/descent aggregation and lossless JSON export/import
//!
//! ## Features
//!
//! - **`http`** - Enable the Open-Elevation HTTP provider
//!
//! ## Quick Start
//!
//! ```rust
//! use gradient_path::{GeoPoint, Path};
//!
//! // Two clicks make one segment; each pending endpoint yields a ticket.
//! let mut path = Path::new();
//! let mut tickets = path.add_point(GeoPoint::new(35.713, 51.396));
//! tickets.extend(path.add_point(GeoPoint::new(35.720, 51.400)));
//!
//! // Feed the elevation results back in (normally done by the PathEngine).
//! path.apply_lookup(&tickets[0], Ok(1200.0));
//! path.apply_lookup(&tickets[1], Ok(1250.0));
//!
//! let segment = path.last().unwrap();
//! println!(
//!     "{}m at {:.1}%",
//!     segment.distance.unwrap(),
//!     segment.gradient.unwrap()
//! );
//! assert!(path.total_distance() > 0.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{PathError, Result};

// Geographic math (haversine distance, gradient formula)
pub mod geo_utils;

// The path model: segments, construction/removal, lookup reconciliation
pub mod path;
pub use path::{
    Elevation, Endpoint, LookupOutcome, LookupTicket, Path, PathSegment, SegmentId,
    FLAT_GRADIENT_BAND,
};

// Gradient-to-color classification
pub mod classifier;
pub use classifier::{classify, ramp_index, ASCENT_RAMP, DESCENT_RAMP, NEUTRAL_COLOR};

// JSON export/import
pub mod codec;
pub use codec::{deserialize, serialize, SegmentRecord};

// Elevation acquisition
pub mod elevation;
pub use elevation::ElevationSource;
#[cfg(feature = "http")]
pub use elevation::OpenElevationSource;

// Stateful path engine (serialized mutations, async lookups, notifications)
pub mod engine;
pub use engine::{
    init_engine, with_engine, PathChangedCallback, PathEngine, SegmentDescriptor,
    DEFAULT_MAX_GRADIENT, ENGINE,
};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use gradient_path::GeoPoint;
/// let point = GeoPoint::new(35.713, 51.396); // Tehran
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that the point has finite, in-range coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }
}
