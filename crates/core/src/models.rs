use serde::{Deserialize, Serialize};

pub const MAX_LATITUDE: f64 = 85.0;
pub const MAX_LONGITUDE: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Coordinate { lat, lng }
    }

    /// Finite and inside the renderable latitude/longitude ranges.
    pub fn in_range(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.lat)
            && (-MAX_LONGITUDE..=MAX_LONGITUDE).contains(&self.lng)
    }

    /// Exact equality: two pins here are visually indistinguishable at any zoom.
    pub fn same_location(&self, other: &Coordinate) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

/// How a person's location was derived, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyClass {
    Address,
    Office,
    Phone,
    Timezone,
}

impl AccuracyClass {
    pub const ALL: [AccuracyClass; 4] = [
        AccuracyClass::Address,
        AccuracyClass::Office,
        AccuracyClass::Phone,
        AccuracyClass::Timezone,
    ];

    /// Unknown or missing location types are treated as the least accurate class.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("address") => AccuracyClass::Address,
            Some("office") => AccuracyClass::Office,
            Some("phone") => AccuracyClass::Phone,
            _ => AccuracyClass::Timezone,
        }
    }

    pub fn border(self) -> BorderColor {
        match self {
            AccuracyClass::Address | AccuracyClass::Office => BorderColor::Green,
            AccuracyClass::Phone => BorderColor::Orange,
            AccuracyClass::Timezone => BorderColor::Gray,
        }
    }
}

impl std::fmt::Display for AccuracyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccuracyClass::Address => write!(f, "Address"),
            AccuracyClass::Office => write!(f, "Office"),
            AccuracyClass::Phone => write!(f, "Phone"),
            AccuracyClass::Timezone => write!(f, "Timezone"),
        }
    }
}

/// Ring color baked into a pin icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderColor {
    Green,
    Orange,
    Gray,
}

impl BorderColor {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "green" => Some(BorderColor::Green),
            "orange" => Some(BorderColor::Orange),
            "gray" | "grey" => Some(BorderColor::Gray),
            _ => None,
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            BorderColor::Green => "#107c10",
            BorderColor::Orange => "#ff8c00",
            BorderColor::Gray => "#8a8886",
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            BorderColor::Green => [0x10, 0x7c, 0x10],
            BorderColor::Orange => [0xff, 0x8c, 0x00],
            BorderColor::Gray => [0x8a, 0x88, 0x86],
        }
    }
}

/// A validated, geolocated person.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointEntity {
    pub id: String,
    pub coordinate: Coordinate,
    pub display_name: String,
    pub title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub address_text: Option<String>,
    pub accuracy_class: AccuracyClass,
    pub border: BorderColor,
    /// Opaque key handed to the photo source.
    pub photo_ref: String,
}

/// Points grouped at the current viewport. Recomputed wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroup {
    pub cluster_id: String,
    pub centroid: Coordinate,
    pub member_count: usize,
    pub member_point_ids: Vec<String>,
    /// Every member shares one coordinate.
    pub same_location: bool,
}

// Raw records as delivered by the people/location backend.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    pub user: Option<RawUser>,
    pub location: Option<RawLocation>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub location_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

/// Latitude and longitude arrive either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocation {
    pub latitude: Option<serde_json::Value>,
    pub longitude: Option<serde_json::Value>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_border_palette() {
        assert_eq!(AccuracyClass::Address.border(), BorderColor::Green);
        assert_eq!(AccuracyClass::Office.border(), BorderColor::Green);
        assert_eq!(AccuracyClass::Phone.border(), BorderColor::Orange);
        assert_eq!(AccuracyClass::Timezone.border(), BorderColor::Gray);
    }

    #[test]
    fn test_accuracy_parse_unknown_is_timezone() {
        assert_eq!(AccuracyClass::parse(Some("Phone")), AccuracyClass::Phone);
        assert_eq!(AccuracyClass::parse(Some("satellite")), AccuracyClass::Timezone);
        assert_eq!(AccuracyClass::parse(None), AccuracyClass::Timezone);
    }

    #[test]
    fn test_coordinate_range_edges() {
        assert!(Coordinate::new(85.0, 180.0).in_range());
        assert!(Coordinate::new(-85.0, -180.0).in_range());
        assert!(!Coordinate::new(85.01, 0.0).in_range());
        assert!(!Coordinate::new(0.0, -180.5).in_range());
        assert!(!Coordinate::new(f64::NAN, 0.0).in_range());
    }

    #[test]
    fn test_border_color_hex() {
        assert_eq!(BorderColor::parse("ORANGE"), Some(BorderColor::Orange));
        assert_eq!(BorderColor::parse("purple"), None);
        assert_eq!(BorderColor::Green.hex(), "#107c10");
    }

    #[test]
    fn test_raw_record_deserializes_string_coordinates() {
        let json = r#"{
            "user": { "id": "u1", "displayName": "Ada", "mail": "ada@example.com" },
            "location": { "latitude": "40.5", "longitude": -75.25, "address": "Somewhere" },
            "border_color": "green",
            "location_type": "address"
        }"#;
        let rec: RawRecord = serde_json::from_str(json).unwrap();
        let loc = rec.location.unwrap();
        assert_eq!(loc.latitude, Some(serde_json::json!("40.5")));
        assert_eq!(rec.user.unwrap().display_name.as_deref(), Some("Ada"));
        assert_eq!(rec.location_type.as_deref(), Some("address"));
    }
}
