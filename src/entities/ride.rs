use geo_types::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::JoinRequest;

// placeholder pins (downtown San Francisco) used when a draft carries no coordinates
const FALLBACK_ORIGIN: Coordinates = Coordinates {
    latitude: 37.7749,
    longitude: -122.4194,
};

const FALLBACK_DESTINATION: Coordinates = Coordinates {
    latitude: 37.7849,
    longitude: -122.4094,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinates> for Point<f64> {
    fn from(coordinates: Coordinates) -> Self {
        Point::new(coordinates.longitude, coordinates.latitude)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_name: String,
    pub origin: String,
    pub destination: String,
    pub origin_coordinate: Coordinates,
    pub destination_coordinate: Coordinates,
    pub departure_label: String,
    pub seats_available: i64,
    pub cost_per_rider: f64,
    pub join_requests: Vec<JoinRequest>,
}

impl Ride {
    pub fn new(draft: RideDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver_name: draft.driver_name.unwrap_or_else(|| "You".into()),
            origin: draft.origin,
            destination: draft.destination,
            origin_coordinate: draft.origin_coordinate.unwrap_or(FALLBACK_ORIGIN),
            destination_coordinate: draft.destination_coordinate.unwrap_or(FALLBACK_DESTINATION),
            departure_label: draft.departure_label,
            seats_available: draft.seats_available,
            cost_per_rider: draft.cost_per_rider,
            join_requests: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.seats_available == 0
    }

    // clamped at zero; acceptance is not gated on remaining seats
    pub fn take_seat(&mut self) {
        self.seats_available = (self.seats_available - 1).max(0);
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideDraft {
    pub origin: String,
    pub destination: String,
    pub departure_label: String,
    pub seats_available: i64,
    pub cost_per_rider: f64,
    pub origin_coordinate: Option<Coordinates>,
    pub destination_coordinate: Option<Coordinates>,
    pub driver_name: Option<String>,
}

impl RideDraft {
    pub fn new(
        origin: String,
        destination: String,
        departure_label: String,
        seats_available: i64,
        cost_per_rider: f64,
    ) -> Self {
        Self {
            origin,
            destination,
            departure_label,
            seats_available,
            cost_per_rider,
            origin_coordinate: None,
            destination_coordinate: None,
            driver_name: None,
        }
    }

    // raw form text; seats fall back to 1 and cost to 0.0 when unparseable
    pub fn from_form(
        origin: &str,
        destination: &str,
        departure_label: &str,
        seats: &str,
        cost: &str,
    ) -> Self {
        Self::new(
            origin.into(),
            destination.into(),
            departure_label.into(),
            seats.trim().parse().unwrap_or(1),
            cost.trim().parse().unwrap_or(0.0),
        )
    }
}

#[test]
fn draft_form_fallbacks() {
    let draft = RideDraft::from_form("San Francisco", "Oakland", "June 23, 10:00 AM", "", "");
    assert_eq!(draft.seats_available, 1);
    assert_eq!(draft.cost_per_rider, 0.0);

    let draft = RideDraft::from_form("San Francisco", "Oakland", "June 23, 10:00 AM", "3", "30");
    assert_eq!(draft.seats_available, 3);
    assert_eq!(draft.cost_per_rider, 30.0);

    let draft = RideDraft::from_form("A", "B", "noon", "many", "cheap");
    assert_eq!(draft.seats_available, 1);
    assert_eq!(draft.cost_per_rider, 0.0);
}

#[test]
fn ride_defaults() {
    let ride = Ride::new(RideDraft::new(
        "San Francisco".into(),
        "Oakland".into(),
        "June 23, 10:00 AM".into(),
        3,
        30.0,
    ));

    assert_eq!(ride.driver_name, "You");
    assert_eq!(ride.origin_coordinate.latitude, 37.7749);
    assert_eq!(ride.origin_coordinate.longitude, -122.4194);
    assert_eq!(ride.destination_coordinate.latitude, 37.7849);
    assert!(ride.join_requests.is_empty());
    assert!(!ride.is_full());
}

#[test]
fn take_seat_clamps_at_zero() {
    let mut ride = Ride::new(RideDraft::new("A".into(), "B".into(), "noon".into(), 1, 0.0));

    ride.take_seat();
    assert_eq!(ride.seats_available, 0);
    assert!(ride.is_full());

    ride.take_seat();
    assert_eq!(ride.seats_available, 0);
}

#[test]
fn coordinates_into_point() {
    let point: Point<f64> = Coordinates {
        latitude: 37.8044,
        longitude: -122.2711,
    }
    .into();

    assert_eq!(point.x(), -122.2711);
    assert_eq!(point.y(), 37.8044);
}
