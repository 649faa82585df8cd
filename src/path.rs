//! The path model: an ordered chain of segments built click by click.
//!
//! A `Path` owns all mutation: points are appended or removed through
//! [`Path::add_point`] and [`Path::remove_last_point`], and asynchronous
//! elevation results re-enter through [`Path::apply_lookup`]. Every endpoint
//! marked pending gets a [`LookupTicket`] naming the segment identity and a
//! generation counter; a late result whose ticket no longer matches a live,
//! pending endpoint is discarded instead of resurrecting removed state.
//!
//! Invariants maintained here:
//! - derived `distance`/`gradient` are present iff both endpoint elevations
//!   are known;
//! - only the tail segment may be incomplete (`dst == None`);
//! - consecutive segments share their junction point, and a known junction
//!   elevation is reused by the next segment rather than fetched again.

use crate::geo_utils::{gradient_percent, haversine_distance};
use crate::{GeoPoint, Result};

/// Gradient band (in percent) inside which a segment counts as flat, so
/// elevation-source jitter does not inflate ascent/descent totals.
pub const FLAT_GRADIENT_BAND: f64 = 0.5;

/// Identity of a segment within its path. Never reused after removal.
pub type SegmentId = u64;

/// State of one endpoint's elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elevation {
    /// No value and no lookup in flight (initial state, or a failed lookup)
    Unknown,
    /// A lookup has been issued but has not resolved
    Pending,
    /// Resolved value in meters
    Known(f64),
}

impl Elevation {
    /// The resolved value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            Elevation::Known(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Elevation::Known(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Elevation::Pending)
    }

    pub(crate) fn from_value(value: Option<f64>) -> Self {
        match value {
            Some(v) => Elevation::Known(v),
            None => Elevation::Unknown,
        }
    }
}

/// Which end of a segment a lookup was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Src,
    Dst,
}

/// Identity tag for one in-flight elevation lookup.
///
/// Carries everything [`Path::apply_lookup`] needs to decide whether the
/// result still targets the endpoint it was issued for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupTicket {
    pub segment: SegmentId,
    pub endpoint: Endpoint,
    /// Destination generation at issue time; `dst` edits bump it, so a result
    /// for a cleared-and-reassigned destination never applies.
    pub generation: u64,
    /// Coordinate the lookup was issued for.
    pub point: GeoPoint,
}

/// Whether a lookup result was applied or discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Applied,
    Stale,
}

/// One drawn edge of the path.
///
/// `dst` is `None` while the segment is still being drawn, which can only be
/// true for the tail segment. Once both elevations resolve, `distance` and
/// `gradient` are computed and the segment is frozen until explicit removal.
#[derive(Debug, Clone)]
pub struct PathSegment {
    id: SegmentId,
    dst_generation: u64,
    pub src: GeoPoint,
    pub src_elevation: Elevation,
    pub dst: Option<GeoPoint>,
    pub dst_elevation: Elevation,
    /// Great-circle distance in meters, present iff both elevations are known
    pub distance: Option<f64>,
    /// Signed gradient percentage, present iff both elevations are known
    pub gradient: Option<f64>,
}

impl PathSegment {
    fn new(id: SegmentId, src: GeoPoint, src_elevation: Elevation) -> Self {
        Self {
            id,
            dst_generation: 0,
            src,
            src_elevation,
            dst: None,
            dst_elevation: Elevation::Unknown,
            distance: None,
            gradient: None,
        }
    }

    pub(crate) fn restore(
        src: GeoPoint,
        src_elevation: Elevation,
        dst: Option<GeoPoint>,
        dst_elevation: Elevation,
        distance: Option<f64>,
        gradient: Option<f64>,
    ) -> Self {
        Self {
            id: 0,
            dst_generation: 0,
            src,
            src_elevation,
            dst,
            dst_elevation,
            distance,
            gradient,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// A segment is complete once its destination has been clicked.
    pub fn is_complete(&self) -> bool {
        self.dst.is_some()
    }

    fn recompute_derived(&mut self) {
        self.distance = None;
        self.gradient = None;
        if let (Some(dst), Some(src_elev), Some(dst_elev)) = (
            self.dst,
            self.src_elevation.value(),
            self.dst_elevation.value(),
        ) {
            let distance = haversine_distance(self.src, dst);
            self.distance = Some(distance);
            self.gradient = Some(gradient_percent(dst_elev - src_elev, distance));
        }
    }
}

// Value equality ignores the segment identity and generation, which are
// bookkeeping for in-flight lookups, not part of the path's value.
impl PartialEq for PathSegment {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
            && self.src_elevation == other.src_elevation
            && self.dst == other.dst
            && self.dst_elevation == other.dst_elevation
            && self.distance == other.distance
            && self.gradient == other.gradient
    }
}

/// Ordered chain of segments.
#[derive(Debug, Clone, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
    next_id: SegmentId,
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Path {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_segments(segments: Vec<PathSegment>) -> Self {
        let mut next_id = 0;
        let segments = segments
            .into_iter()
            .map(|mut seg| {
                seg.id = next_id;
                next_id += 1;
                seg
            })
            .collect();
        Self { segments, next_id }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The tail segment, if the path has one.
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Append a clicked point to the path.
    ///
    /// An empty path gains a single incomplete segment; an incomplete tail is
    /// completed with the point as its destination; a complete tail chains
    /// into a new segment that reuses the tail's destination point and its
    /// elevation state, so a resolved junction is never fetched twice.
    ///
    /// Returns a ticket for every endpoint this call marked pending. The
    /// caller is responsible for issuing the lookups and routing each result
    /// back through [`Path::apply_lookup`].
    pub fn add_point(&mut self, point: GeoPoint) -> Vec<LookupTicket> {
        match self.segments.last_mut() {
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.segments
                    .push(PathSegment::new(id, point, Elevation::Unknown));
            }
            Some(tail) => match tail.dst {
                None => {
                    tail.dst = Some(point);
                    tail.dst_generation += 1;
                }
                Some(junction) => {
                    // Chain: the junction elevation is carried over even when
                    // still pending; the original lookup's resolution will
                    // propagate forward (see apply_lookup).
                    let src_elevation = tail.dst_elevation;
                    let id = self.next_id;
                    self.next_id += 1;
                    let mut seg = PathSegment::new(id, junction, src_elevation);
                    seg.dst = Some(point);
                    self.segments.push(seg);
                }
            },
        }

        let mut tickets = Vec::with_capacity(2);
        if let Some(tail) = self.segments.last_mut() {
            if tail.src_elevation == Elevation::Unknown {
                tail.src_elevation = Elevation::Pending;
                tickets.push(LookupTicket {
                    segment: tail.id,
                    endpoint: Endpoint::Src,
                    generation: 0,
                    point: tail.src,
                });
            }
            if let Some(dst) = tail.dst {
                if tail.dst_elevation == Elevation::Unknown {
                    tail.dst_elevation = Elevation::Pending;
                    tickets.push(LookupTicket {
                        segment: tail.id,
                        endpoint: Endpoint::Dst,
                        generation: tail.dst_generation,
                        point: dst,
                    });
                }
            }
        }
        tickets
    }

    /// Undo the most recent click.
    ///
    /// The common case pops the tail segment. A path consisting of exactly
    /// one complete segment instead reverts to a single incomplete segment,
    /// so a single removal never erases the path's origin point. Returns
    /// `false` on an empty path.
    pub fn remove_last_point(&mut self) -> bool {
        let n = self.segments.len();
        if n == 0 {
            return false;
        }
        if n == 1 && self.segments[0].is_complete() {
            let tail = &mut self.segments[0];
            tail.dst = None;
            tail.dst_elevation = Elevation::Unknown;
            tail.dst_generation += 1;
            tail.distance = None;
            tail.gradient = None;
        } else {
            self.segments.pop();
        }
        true
    }

    /// Apply one elevation lookup result.
    ///
    /// The ticket must still name a live segment whose endpoint is pending at
    /// the same coordinate (and, for destinations, the same generation);
    /// otherwise the result is stale and nothing changes. On success the
    /// value is stored and the segment's derived fields recomputed; a failure
    /// reverts the endpoint to unknown. A resolved destination also fills the
    /// successor segment's source if that copy is still pending.
    pub fn apply_lookup(&mut self, ticket: &LookupTicket, result: Result<f64>) -> LookupOutcome {
        let Some(idx) = self.segments.iter().position(|s| s.id == ticket.segment) else {
            return LookupOutcome::Stale;
        };

        let live = {
            let seg = &self.segments[idx];
            match ticket.endpoint {
                Endpoint::Src => seg.src_elevation.is_pending() && seg.src == ticket.point,
                Endpoint::Dst => {
                    seg.dst_elevation.is_pending()
                        && seg.dst_generation == ticket.generation
                        && seg.dst == Some(ticket.point)
                }
            }
        };
        if !live {
            return LookupOutcome::Stale;
        }

        let resolved = Elevation::from_value(result.ok());
        let seg = &mut self.segments[idx];
        match ticket.endpoint {
            Endpoint::Src => seg.src_elevation = resolved,
            Endpoint::Dst => seg.dst_elevation = resolved,
        }
        seg.recompute_derived();

        // A successor created while this junction was unresolved carried the
        // pending state; hand it the outcome instead of re-fetching.
        if ticket.endpoint == Endpoint::Dst && idx + 1 < self.segments.len() {
            let next = &mut self.segments[idx + 1];
            if next.src_elevation.is_pending() && next.src == ticket.point {
                next.src_elevation = resolved;
                next.recompute_derived();
            }
        }

        LookupOutcome::Applied
    }

    /// Sum of the known segment distances matching `predicate`, in meters.
    ///
    /// Segments whose distance is not yet known contribute nothing.
    pub fn total_distance_where<P>(&self, predicate: P) -> f64
    where
        P: Fn(&PathSegment) -> bool,
    {
        self.segments
            .iter()
            .filter(|s| predicate(s))
            .filter_map(|s| s.distance)
            .sum()
    }

    /// Sum of all known segment distances, in meters.
    pub fn total_distance(&self) -> f64 {
        self.total_distance_where(|_| true)
    }

    /// Distance covered by climbing segments (gradient above the flat band).
    pub fn ascent_distance(&self) -> f64 {
        self.total_distance_where(|s| s.gradient.is_some_and(|g| g > FLAT_GRADIENT_BAND))
    }

    /// Distance covered by descending segments (gradient below the flat band).
    pub fn descent_distance(&self) -> f64 {
        self.total_distance_where(|s| s.gradient.is_some_and(|g| g < -FLAT_GRADIENT_BAND))
    }
}
