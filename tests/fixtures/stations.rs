//! Real Las Vegas / Henderson locations used as logistics stations.
//!
//! Coordinates sourced from OpenStreetMap.

use dispatch_routing::geo_key::Coordinate;

/// A named station with coordinates.
#[derive(Debug, Clone)]
pub struct Station {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Station {
    pub const fn new(id: &'static str, name: &'static str, lat: f64, lng: f64) -> Self {
        Self { id, name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lng, self.lat)
    }
}

pub const MGM_GRAND: Station = Station::new("ST-01", "MGM Grand", 36.1023654, -115.1688720);
pub const BELLAGIO: Station = Station::new("ST-02", "Bellagio", 36.1126, -115.1767);
pub const CAESARS: Station = Station::new("ST-03", "Caesars Palace", 36.1162, -115.1745);
pub const WYNN: Station = Station::new("ST-04", "Wynn Las Vegas", 36.1263781, -115.1658180);
pub const LONGHORN: Station = Station::new("ST-05", "Longhorn Casino", 36.1070664, -115.0591256);
