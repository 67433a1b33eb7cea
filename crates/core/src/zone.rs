//! Persisted, named regions of interest.
//!
//! A [`Zone`]'s bounding box is always derived from its region. The
//! serialized form carries the box for thumbnail rendering, but it is
//! recomputed on load and can never be set independently of the region.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::region::{Point, RectRegion, Region};
use crate::types::{Timestamp, ZoneId};

/// Maximum allowed length for a zone name.
pub const MAX_ZONE_NAME_LENGTH: usize = 100;

/// Validate a zone name: non-empty, no surrounding whitespace, within
/// [`MAX_ZONE_NAME_LENGTH`].
pub fn validate_zone_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Zone name must not be empty".to_string(),
        ));
    }
    if trimmed.len() != name.len() {
        return Err(CoreError::Validation(
            "Zone name must not have leading or trailing whitespace".to_string(),
        ));
    }
    if name.chars().count() > MAX_ZONE_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Zone name must not exceed {MAX_ZONE_NAME_LENGTH} characters, got {}",
            name.chars().count()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ZoneRecord", try_from = "ZoneRecord")]
pub struct Zone {
    id: ZoneId,
    name: String,
    order: u32,
    region: Region,
    created_at: Timestamp,
}

/// Wire shape of a zone: bounding box plus an optional vertex list.
#[derive(Serialize, Deserialize)]
struct ZoneRecord {
    id: ZoneId,
    name: String,
    order: u32,
    bounds: RectRegion,
    #[serde(default)]
    points: Vec<Point>,
    created_at: Timestamp,
}

impl From<Zone> for ZoneRecord {
    fn from(zone: Zone) -> Self {
        let bounds = zone.bounding_box();
        let points = match &zone.region {
            Region::Rect(_) => Vec::new(),
            Region::Polygon(polygon) => polygon.points().to_vec(),
        };
        Self {
            id: zone.id,
            name: zone.name,
            order: zone.order,
            bounds,
            points,
            created_at: zone.created_at,
        }
    }
}

impl TryFrom<ZoneRecord> for Zone {
    type Error = CoreError;

    fn try_from(r: ZoneRecord) -> Result<Self, Self::Error> {
        validate_zone_name(&r.name)?;
        let region = Region::from_parts(r.bounds, r.points)?;
        region.ensure_usable()?;
        Ok(Self {
            id: r.id,
            name: r.name,
            order: r.order,
            region,
            created_at: r.created_at,
        })
    }
}

impl Zone {
    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation order within the owning [`ZoneSet`].
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn bounding_box(&self) -> RectRegion {
        self.region.bounding_box()
    }
}

// ---------------------------------------------------------------------------
// ZoneSet
// ---------------------------------------------------------------------------

/// The zones of one project, kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    zones: Vec<Zone>,
    next_order: u32,
}

impl ZoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from persisted zones. Every zone is held to the same
    /// name and region rules as [`ZoneSet::add`]; duplicate ids and shared
    /// creation orders are rejected.
    pub fn from_zones(mut zones: Vec<Zone>) -> Result<Self, CoreError> {
        for zone in &zones {
            validate_zone_name(&zone.name)?;
            zone.region.ensure_usable()?;
        }
        zones.sort_by_key(|z| z.order);
        for pair in zones.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(CoreError::Validation(format!(
                    "Zones {} and {} share creation order {}",
                    pair[0].id, pair[1].id, pair[0].order
                )));
            }
        }
        let mut ids: Vec<ZoneId> = zones.iter().map(|z| z.id).collect();
        ids.sort();
        ids.dedup();
        if ids.len() != zones.len() {
            return Err(CoreError::Validation("Duplicate zone id".to_string()));
        }
        let next_order = match zones.last() {
            Some(last) => next_order_after(last.order)?,
            None => 0,
        };
        Ok(Self { zones, next_order })
    }

    /// Add a zone. The region must be non-degenerate.
    pub fn add(&mut self, name: impl Into<String>, region: Region) -> Result<&Zone, CoreError> {
        let name = name.into();
        validate_zone_name(&name)?;
        region.ensure_usable()?;
        let following = next_order_after(self.next_order)?;

        let zone = Zone {
            id: uuid::Uuid::now_v7(),
            name,
            order: self.next_order,
            region,
            created_at: chrono::Utc::now(),
        };
        self.next_order = following;
        self.zones.push(zone);
        Ok(&self.zones[self.zones.len() - 1])
    }

    pub fn rename(&mut self, id: ZoneId, name: impl Into<String>) -> Result<&Zone, CoreError> {
        let name = name.into();
        validate_zone_name(&name)?;
        let zone = self.get_mut(id)?;
        zone.name = name;
        Ok(&*zone)
    }

    /// Replace a zone's region. The derived bounding box follows.
    pub fn reshape(&mut self, id: ZoneId, region: Region) -> Result<&Zone, CoreError> {
        region.ensure_usable()?;
        let zone = self.get_mut(id)?;
        zone.region = region;
        Ok(&*zone)
    }

    pub fn remove(&mut self, id: ZoneId) -> Result<Zone, CoreError> {
        let index = self
            .zones
            .iter()
            .position(|z| z.id == id)
            .ok_or(CoreError::ZoneNotFound(id))?;
        Ok(self.zones.remove(index))
    }

    pub fn get(&self, id: ZoneId) -> Result<&Zone, CoreError> {
        self.zones
            .iter()
            .find(|z| z.id == id)
            .ok_or(CoreError::ZoneNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Zone> {
        self.zones.clone()
    }

    fn get_mut(&mut self, id: ZoneId) -> Result<&mut Zone, CoreError> {
        self.zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or(CoreError::ZoneNotFound(id))
    }
}

fn next_order_after(order: u32) -> Result<u32, CoreError> {
    order
        .checked_add(1)
        .ok_or_else(|| CoreError::Validation("Zone creation order exhausted".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{normalize_rect, PolygonRegion};
    use assert_matches::assert_matches;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
        Region::Rect(normalize_rect(Point::new(x0, y0), Point::new(x1, y1)))
    }

    fn triangle() -> Region {
        Region::Polygon(
            PolygonRegion::new(vec![
                Point::new(10.0, 10.0),
                Point::new(60.0, 20.0),
                Point::new(30.0, 70.0),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn add_assigns_increasing_order() {
        let mut zones = ZoneSet::new();
        zones.add("Sofa corner", rect(0.0, 0.0, 20.0, 20.0)).unwrap();
        zones.add("Window", rect(50.0, 0.0, 90.0, 30.0)).unwrap();
        let orders: Vec<u32> = zones.iter().map(Zone::order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn add_rejects_degenerate_region() {
        let mut zones = ZoneSet::new();
        assert_matches!(
            zones.add("Click", rect(10.0, 10.0, 10.5, 40.0)),
            Err(CoreError::InvalidRegion(_))
        );
        assert!(zones.is_empty());
    }

    #[test]
    fn add_rejects_bad_names() {
        let mut zones = ZoneSet::new();
        assert!(zones.add("", rect(0.0, 0.0, 20.0, 20.0)).is_err());
        assert!(zones.add(" padded", rect(0.0, 0.0, 20.0, 20.0)).is_err());
        let long = "z".repeat(MAX_ZONE_NAME_LENGTH + 1);
        assert!(zones.add(long, rect(0.0, 0.0, 20.0, 20.0)).is_err());
    }

    #[test]
    fn reshape_updates_bounding_box() {
        let mut zones = ZoneSet::new();
        let id = zones.add("Rug", rect(0.0, 0.0, 20.0, 20.0)).unwrap().id();

        zones.reshape(id, triangle()).unwrap();

        let zone = zones.get(id).unwrap();
        assert_eq!(
            zone.bounding_box(),
            RectRegion::new(10.0, 10.0, 60.0, 70.0).unwrap()
        );
    }

    #[test]
    fn remove_unknown_zone_fails() {
        let mut zones = ZoneSet::new();
        assert_matches!(
            zones.remove(uuid::Uuid::now_v7()),
            Err(CoreError::ZoneNotFound(_))
        );
    }

    #[test]
    fn order_continues_after_reload() {
        let mut zones = ZoneSet::new();
        zones.add("A", rect(0.0, 0.0, 20.0, 20.0)).unwrap();
        zones.add("B", rect(0.0, 0.0, 30.0, 30.0)).unwrap();
        let first = zones.iter().next().unwrap().id();
        zones.remove(first).unwrap();

        let mut reloaded = ZoneSet::from_zones(zones.to_vec()).unwrap();
        let added = reloaded.add("C", rect(0.0, 0.0, 40.0, 40.0)).unwrap();
        assert_eq!(added.order(), 2);
    }

    #[test]
    fn serialized_bounds_are_recomputed_on_load() {
        let mut zones = ZoneSet::new();
        zones.add("Bed", triangle()).unwrap();
        let mut json = serde_json::to_value(zones.to_vec()).unwrap();

        assert_eq!(json[0]["bounds"]["x_end"], 60.0);

        // A stale stored box must not survive a reload.
        json[0]["bounds"]["x_end"] = serde_json::json!(99.0);
        let loaded: Vec<Zone> = serde_json::from_value(json).unwrap();
        assert_eq!(loaded[0].bounding_box().x_end(), 60.0);
    }

    #[test]
    fn rect_zone_round_trips_without_points() {
        let mut zones = ZoneSet::new();
        zones.add("Desk", rect(5.0, 5.0, 25.0, 45.0)).unwrap();
        let json = serde_json::to_value(zones.to_vec()).unwrap();
        assert!(json[0]["points"].as_array().unwrap().is_empty());

        let loaded: Vec<Zone> = serde_json::from_value(json).unwrap();
        assert_eq!(loaded[0].region(), &rect(5.0, 5.0, 25.0, 45.0));
    }

    fn stored_zone(name: &str, order: u32, x_end: f64, y_end: f64) -> serde_json::Value {
        serde_json::json!({
            "id": uuid::Uuid::now_v7(),
            "name": name,
            "order": order,
            "bounds": { "x_start": 10.0, "y_start": 10.0, "x_end": x_end, "y_end": y_end },
            "points": [],
            "created_at": "2026-01-05T10:00:00Z",
        })
    }

    #[test]
    fn loading_rejects_blank_name() {
        let result = serde_json::from_value::<Zone>(stored_zone("   ", 0, 40.0, 40.0));
        assert!(result.is_err());
    }

    #[test]
    fn loading_rejects_degenerate_region() {
        let result = serde_json::from_value::<Zone>(stored_zone("Sliver", 0, 10.0, 10.5));
        assert!(result.is_err());
    }

    #[test]
    fn from_zones_applies_name_and_region_rules() {
        let mut zone = ZoneSet::new()
            .add("Lamp", rect(0.0, 0.0, 20.0, 20.0))
            .unwrap()
            .clone();
        zone.name = "   ".to_string();
        assert_matches!(
            ZoneSet::from_zones(vec![zone.clone()]),
            Err(CoreError::Validation(_))
        );

        zone.name = "Lamp".to_string();
        zone.region = rect(10.0, 10.0, 10.0, 10.5);
        assert_matches!(
            ZoneSet::from_zones(vec![zone]),
            Err(CoreError::InvalidRegion(_))
        );
    }

    #[test]
    fn last_creation_order_cannot_be_followed() {
        let zone: Zone = serde_json::from_value(stored_zone("Shelf", u32::MAX, 40.0, 40.0)).unwrap();
        assert_matches!(
            ZoneSet::from_zones(vec![zone]),
            Err(CoreError::Validation(_))
        );

        let mut zones = ZoneSet {
            zones: Vec::new(),
            next_order: u32::MAX,
        };
        assert_matches!(
            zones.add("Shelf", rect(0.0, 0.0, 20.0, 20.0)),
            Err(CoreError::Validation(_))
        );
        assert!(zones.is_empty());
    }
}
