//! Radius queries over record coordinates.
//!
//! Records with coordinates are bulk-loaded into an R-tree keyed by
//! `[lng, lat]`. A query first collects the points inside a bounding box
//! around the centre, then keeps those whose great-circle distance is
//! within the radius. Records whose coordinates were the `0,0`
//! placeholder are never indexed.

use geo::{Distance, Haversine, Point};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use chi_pb_search_index_models::{AddressRecord, SearchIndex};

/// Feet to meters.
pub const METERS_PER_FOOT: f64 = 0.3048;

/// Meters spanned by one degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Smallest cosine used when widening the box in longitude, so a centre
/// near a pole still gets a finite box.
const MIN_COS_LAT: f64 = 0.01;

type PointEntry = GeomWithData<[f64; 2], u32>;

/// A record within a query radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyPoint {
    /// Record id in the [`SearchIndex`].
    pub id: u32,
    /// Great-circle distance from the query centre, in feet.
    pub distance_feet: f64,
}

/// R-tree over every record that has coordinates.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<PointEntry>,
}

impl SpatialIndex {
    /// Indexes every record of `index` that has coordinates.
    #[must_use]
    pub fn from_index(index: &SearchIndex) -> Self {
        Self::from_records(&index.addresses)
    }

    /// Indexes every record in `records` that has coordinates.
    #[must_use]
    pub fn from_records(records: &[AddressRecord]) -> Self {
        let entries: Vec<PointEntry> = records
            .iter()
            .filter_map(|record| {
                let (lat, lng) = record.coordinates()?;
                Some(GeomWithData::new([lng, lat], record.id))
            })
            .collect();

        log::debug!(
            "Spatial index: {} of {} records have coordinates",
            entries.len(),
            records.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no record had coordinates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Records within `radius_feet` of (`lat`, `lng`), nearest first and
    /// then by id. A negative or non-finite radius or centre matches
    /// nothing.
    #[must_use]
    pub fn within_radius(&self, lat: f64, lng: f64, radius_feet: f64) -> Vec<NearbyPoint> {
        if !(lat.is_finite() && lng.is_finite() && radius_feet.is_finite()) || radius_feet < 0.0 {
            return Vec::new();
        }

        let radius_m = radius_feet * METERS_PER_FOOT;
        let envelope = bounding_box(lat, lng, radius_m);
        let centre = Point::new(lng, lat);

        let mut found: Vec<NearbyPoint> = self
            .tree
            .locate_in_envelope(&envelope)
            .filter_map(|entry| {
                let [x, y] = *entry.geom();
                let meters = Haversine.distance(centre, Point::new(x, y));
                (meters <= radius_m).then_some(NearbyPoint {
                    id: entry.data,
                    distance_feet: meters / METERS_PER_FOOT,
                })
            })
            .collect();

        found.sort_by(|a, b| {
            a.distance_feet
                .total_cmp(&b.distance_feet)
                .then(a.id.cmp(&b.id))
        });
        found
    }

    /// Like [`within_radius`](Self::within_radius), resolved to records
    /// of `index`.
    #[must_use]
    pub fn records_within<'a>(
        &self,
        index: &'a SearchIndex,
        lat: f64,
        lng: f64,
        radius_feet: f64,
    ) -> Vec<(&'a AddressRecord, f64)> {
        self.within_radius(lat, lng, radius_feet)
            .into_iter()
            .filter_map(|hit| index.record(hit.id).map(|r| (r, hit.distance_feet)))
            .collect()
    }
}

/// `[lng, lat]` box that contains every point within `radius_m` of the
/// centre, padded slightly so the exact filter decides the boundary.
fn bounding_box(lat: f64, lng: f64, radius_m: f64) -> AABB<[f64; 2]> {
    let d_lat = radius_m / METERS_PER_DEGREE * 1.01;
    let d_lng = d_lat / lat.to_radians().cos().abs().max(MIN_COS_LAT);
    AABB::from_corners([lng - d_lng, lat - d_lat], [lng + d_lng, lat + d_lat])
}
