use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{MapError, ValidationIssue};
use crate::models::{AccuracyClass, BorderColor, Coordinate, PointEntity, RawRecord};

/// Output of [`validate`]: the renderable points plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct ValidPoints {
    pub points: Vec<PointEntity>,
    /// `(record index, reason)` for every dropped record.
    pub rejected: Vec<(usize, ValidationIssue)>,
}

impl ValidPoints {
    pub fn dropped(&self) -> usize {
        self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The points, or the recoverable "no valid locations" condition.
    pub fn into_points(self) -> Result<Vec<PointEntity>, MapError> {
        if self.points.is_empty() {
            Err(MapError::NoValidLocations)
        } else {
            Ok(self.points)
        }
    }
}

/// Filter raw records down to renderable points. Never fails.
pub fn validate(records: &[RawRecord]) -> ValidPoints {
    let mut out = ValidPoints::default();
    for (index, record) in records.iter().enumerate() {
        match to_point(index, record) {
            Ok(point) => out.points.push(point),
            Err(issue) => {
                debug!(index, %issue, "Dropping location record");
                out.rejected.push((index, issue));
            }
        }
    }
    debug!(
        valid = out.points.len(),
        dropped = out.dropped(),
        "Validated location records"
    );
    out
}

fn to_point(index: usize, record: &RawRecord) -> Result<PointEntity, ValidationIssue> {
    let user = record.user.as_ref().ok_or(ValidationIssue::MissingUser)?;
    let location = record.location.as_ref().ok_or(ValidationIssue::MissingLocation)?;

    let lat = parse_axis("latitude", location.latitude.as_ref())?;
    let lng = parse_axis("longitude", location.longitude.as_ref())?;
    let coordinate = Coordinate::new(lat, lng);
    if !coordinate.in_range() {
        return Err(ValidationIssue::OutOfRange { lat, lng });
    }

    let accuracy_class = AccuracyClass::parse(record.location_type.as_deref());
    let border = record
        .border_color
        .as_deref()
        .and_then(BorderColor::parse)
        .unwrap_or_else(|| accuracy_class.border());

    let id = non_empty(user.id.as_deref()).unwrap_or_else(|| format!("user_{index}"));

    Ok(PointEntity {
        photo_ref: id.clone(),
        id,
        coordinate,
        display_name: non_empty(user.display_name.as_deref())
            .unwrap_or_else(|| "Unknown User".to_string()),
        title: non_empty(user.job_title.as_deref()),
        department: non_empty(user.department.as_deref()),
        email: non_empty(user.mail.as_deref())
            .or_else(|| non_empty(user.user_principal_name.as_deref())),
        address_text: Some(
            non_empty(location.address.as_deref())
                .unwrap_or_else(|| "Unknown Location".to_string()),
        ),
        accuracy_class,
        border,
    })
}

fn parse_axis(axis: &'static str, raw: Option<&Value>) -> Result<f64, ValidationIssue> {
    let value = match raw {
        None | Some(Value::Null) => return Err(ValidationIssue::MissingCoordinate(axis)),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ValidationIssue::MissingCoordinate(axis))
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ValidationIssue::Unparseable {
            axis,
            raw: raw.map(|v| v.to_string()).unwrap_or_default(),
        }),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Records per accuracy class, counted over the whole result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocationStats {
    pub address: usize,
    pub office: usize,
    pub phone: usize,
    pub timezone: usize,
}

impl LocationStats {
    pub fn from_records(records: &[RawRecord]) -> Self {
        let mut stats = LocationStats::default();
        for record in records {
            match AccuracyClass::parse(record.location_type.as_deref()) {
                AccuracyClass::Address => stats.address += 1,
                AccuracyClass::Office => stats.office += 1,
                AccuracyClass::Phone => stats.phone += 1,
                AccuracyClass::Timezone => stats.timezone += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.address + self.office + self.phone + self.timezone
    }
}
