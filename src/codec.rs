//! JSON export/import of a path.
//!
//! The interchange format is an ordered array of segment records with
//! camelCase fields (`src`, `srcElevation`, `dst`, `dstElevation`,
//! `gradient`, `distance`); absent values are `null`. Pending elevations are
//! never written: an export taken mid-lookup records them as unknown.
//! Import restores segments verbatim, including already-computed gradients
//! and distances, and performs no elevation re-lookup, so a previously
//! computed path comes back exactly.

use serde::{Deserialize, Serialize};

use crate::path::{Elevation, Path, PathSegment};
use crate::{GeoPoint, PathError, Result};

/// One serialized segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub src: GeoPoint,
    #[serde(deserialize_with = "Option::deserialize")]
    pub src_elevation: Option<f64>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub dst: Option<GeoPoint>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub dst_elevation: Option<f64>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub gradient: Option<f64>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub distance: Option<f64>,
}

impl SegmentRecord {
    fn from_segment(seg: &PathSegment) -> Self {
        Self {
            src: seg.src,
            src_elevation: seg.src_elevation.value(),
            dst: seg.dst,
            dst_elevation: seg.dst_elevation.value(),
            gradient: seg.gradient,
            distance: seg.distance,
        }
    }
}

/// Serialize a path to its JSON interchange form.
pub fn serialize(path: &Path) -> Result<String> {
    let records: Vec<SegmentRecord> = path
        .segments()
        .iter()
        .map(SegmentRecord::from_segment)
        .collect();
    serde_json::to_string(&records).map_err(|e| PathError::EncodeFailed {
        message: e.to_string(),
    })
}

/// Reconstruct a path from its JSON interchange form.
///
/// Rejects records with out-of-range coordinates, an incomplete segment
/// anywhere but the tail, a broken chain between consecutive segments, or
/// derived fields without the elevations that justify them. On error no path
/// is produced, so a caller's existing path stays untouched.
pub fn deserialize(bytes: &[u8]) -> Result<Path> {
    let records: Vec<SegmentRecord> =
        serde_json::from_slice(bytes).map_err(|e| PathError::MalformedImport {
            message: e.to_string(),
        })?;

    let mut segments = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let predecessor = if i == 0 { None } else { records.get(i - 1) };
        validate_record(i, rec, i + 1 < records.len(), predecessor)?;
        segments.push(PathSegment::restore(
            rec.src,
            Elevation::from_value(rec.src_elevation),
            rec.dst,
            Elevation::from_value(rec.dst_elevation),
            rec.distance,
            rec.gradient,
        ));
    }
    Ok(Path::from_segments(segments))
}

fn validate_record(
    index: usize,
    rec: &SegmentRecord,
    has_successor: bool,
    predecessor: Option<&SegmentRecord>,
) -> Result<()> {
    let malformed = |message: String| PathError::MalformedImport { message };

    if !rec.src.is_valid() {
        return Err(malformed(format!(
            "segment {}: source coordinate out of range",
            index
        )));
    }
    if let Some(dst) = rec.dst {
        if !dst.is_valid() {
            return Err(malformed(format!(
                "segment {}: destination coordinate out of range",
                index
            )));
        }
    } else if has_successor {
        return Err(malformed(format!(
            "segment {}: incomplete segment before the tail",
            index
        )));
    }

    for (name, value) in [
        ("srcElevation", rec.src_elevation),
        ("dstElevation", rec.dst_elevation),
        ("gradient", rec.gradient),
        ("distance", rec.distance),
    ] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(malformed(format!("segment {}: non-finite {}", index, name)));
        }
    }

    // Derived fields only make sense with both elevations present.
    if (rec.gradient.is_some() || rec.distance.is_some())
        && (rec.src_elevation.is_none() || rec.dst_elevation.is_none() || rec.dst.is_none())
    {
        return Err(malformed(format!(
            "segment {}: derived fields without resolved elevations",
            index
        )));
    }

    if index > 0 {
        let prev = predecessor.ok_or_else(|| malformed("missing predecessor".to_string()))?;
        if prev.dst != Some(rec.src) {
            return Err(malformed(format!(
                "segment {}: source does not chain to previous destination",
                index
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::LookupTicket;

    fn resolved_path() -> Path {
        let mut path = Path::new();
        let mut tickets: Vec<LookupTicket> = Vec::new();
        tickets.extend(path.add_point(GeoPoint::new(35.713, 51.396)));
        tickets.extend(path.add_point(GeoPoint::new(35.720, 51.400)));
        tickets.extend(path.add_point(GeoPoint::new(35.731, 51.410)));
        for (i, t) in tickets.iter().enumerate() {
            path.apply_lookup(t, Ok(100.0 + i as f64 * 40.0));
        }
        path
    }

    #[test]
    fn test_round_trip_resolved_path() {
        let path = resolved_path();
        let json = serialize(&path).unwrap();
        let restored = deserialize(json.as_bytes()).unwrap();
        assert_eq!(restored, path);
    }

    #[test]
    fn test_round_trip_incomplete_tail() {
        let mut path = Path::new();
        let tickets = path.add_point(GeoPoint::new(35.713, 51.396));
        path.apply_lookup(&tickets[0], Ok(1200.0));

        let json = serialize(&path).unwrap();
        let restored = deserialize(json.as_bytes()).unwrap();
        assert_eq!(restored, path);
    }

    #[test]
    fn test_field_names_are_camel_case() {
        let json = serialize(&resolved_path()).unwrap();
        assert!(json.contains("\"srcElevation\""));
        assert!(json.contains("\"dstElevation\""));
        assert!(json.contains("\"lat\""));
        assert!(json.contains("\"lng\""));
    }

    #[test]
    fn test_pending_exports_as_unknown() {
        let mut path = Path::new();
        path.add_point(GeoPoint::new(35.713, 51.396));

        let json = serialize(&path).unwrap();
        let restored = deserialize(json.as_bytes()).unwrap();
        let seg = restored.last().unwrap();
        assert_eq!(seg.src_elevation, Elevation::Unknown);
    }

    #[test]
    fn test_import_does_not_resume_lookups() {
        let restored = deserialize(serialize(&resolved_path()).unwrap().as_bytes()).unwrap();
        assert!(restored
            .segments()
            .iter()
            .all(|s| !s.src_elevation.is_pending() && !s.dst_elevation.is_pending()));
        // Derived values come back verbatim.
        assert!(restored.segments()[0].gradient.is_some());
    }

    #[test]
    fn test_reject_invalid_json() {
        assert!(matches!(
            deserialize(b"not json"),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_reject_missing_fields() {
        let json = br#"[{"src": {"lat": 1.0, "lng": 2.0}}]"#;
        assert!(matches!(
            deserialize(json),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_reject_out_of_range_coordinate() {
        let json = br#"[{"src":{"lat":95.0,"lng":2.0},"srcElevation":null,"dst":null,"dstElevation":null,"gradient":null,"distance":null}]"#;
        assert!(matches!(
            deserialize(json),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_reject_incomplete_segment_before_tail() {
        let json = br#"[
            {"src":{"lat":1.0,"lng":2.0},"srcElevation":null,"dst":null,"dstElevation":null,"gradient":null,"distance":null},
            {"src":{"lat":1.0,"lng":2.0},"srcElevation":null,"dst":{"lat":1.5,"lng":2.5},"dstElevation":null,"gradient":null,"distance":null}
        ]"#;
        assert!(matches!(
            deserialize(json),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_reject_broken_chain() {
        let json = br#"[
            {"src":{"lat":1.0,"lng":2.0},"srcElevation":null,"dst":{"lat":1.5,"lng":2.5},"dstElevation":null,"gradient":null,"distance":null},
            {"src":{"lat":9.0,"lng":9.0},"srcElevation":null,"dst":{"lat":1.7,"lng":2.7},"dstElevation":null,"gradient":null,"distance":null}
        ]"#;
        assert!(matches!(
            deserialize(json),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_reject_derived_without_elevations() {
        let json = br#"[{"src":{"lat":1.0,"lng":2.0},"srcElevation":null,"dst":{"lat":1.5,"lng":2.5},"dstElevation":null,"gradient":3.2,"distance":100.0}]"#;
        assert!(matches!(
            deserialize(json),
            Err(PathError::MalformedImport { .. })
        ));
    }

    #[test]
    fn test_empty_path_round_trips() {
        let path = Path::new();
        let json = serialize(&path).unwrap();
        assert_eq!(json, "[]");
        assert_eq!(deserialize(json.as_bytes()).unwrap(), path);
    }
}
