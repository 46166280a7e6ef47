//! Verifier edits: input validation and field-level diffing.
//!
//! The diff is computed against a snapshot and turned into an
//! [`InstallationPatch`] whose history appends are versioned by the store at
//! write time, so every edited field keeps a gap-free list of prior values.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::installation::{
    EditableField, FieldValue, Installation, InstallationPatch, EDITED_BY_VERIFIER_TAG,
};

static LOCATION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("location id pattern is valid"));

/// Malformed edit or submission input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditValidationError {
    #[error("Device id must not be empty")]
    EmptyDeviceId,

    #[error("Sensor reading must be a positive number, got {0}")]
    InvalidSensorReading(f64),

    #[error("Location id must be a non-empty string of digits, got {0:?}")]
    InvalidLocationId(String),

    #[error("Latitude must be within [-90, 90], got {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude must be within [-180, 180], got {0}")]
    LongitudeOutOfRange(f64),

    #[error("Unknown reading unit: {0}")]
    UnknownUnit(String),
}

pub fn validate_location_id(location_id: &str) -> Result<(), EditValidationError> {
    if LOCATION_ID_RE.is_match(location_id) {
        Ok(())
    } else {
        Err(EditValidationError::InvalidLocationId(location_id.to_string()))
    }
}

pub fn validate_sensor_reading(reading: f64) -> Result<(), EditValidationError> {
    if reading.is_finite() && reading > 0.0 {
        Ok(())
    } else {
        Err(EditValidationError::InvalidSensorReading(reading))
    }
}

pub fn validate_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), EditValidationError> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(EditValidationError::LatitudeOutOfRange(lat));
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(EditValidationError::LongitudeOutOfRange(lng));
        }
    }
    Ok(())
}

/// Unit an installer entered a reading in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingUnit {
    #[default]
    Cm,
    Mm,
    M,
    In,
}

impl ReadingUnit {
    pub fn to_centimeters(&self, value: f64) -> f64 {
        match self {
            Self::Cm => value,
            Self::Mm => value / 10.0,
            Self::M => value * 100.0,
            Self::In => value * 2.54,
        }
    }
}

impl std::str::FromStr for ReadingUnit {
    type Err = EditValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cm" => Ok(Self::Cm),
            "mm" => Ok(Self::Mm),
            "m" => Ok(Self::M),
            "in" | "inch" | "inches" => Ok(Self::In),
            other => Err(EditValidationError::UnknownUnit(other.to_string())),
        }
    }
}

/// Image attached to an edit.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Fields a verifier proposes to change. `None` means "not proposed".
///
/// Coordinates use `Some(None)` to propose clearing the value.
#[derive(Debug, Clone, Default)]
pub struct ProposedEdit {
    pub device_id: Option<String>,
    pub sensor_reading: Option<f64>,
    pub location_id: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub image: Option<NewImage>,
}

impl ProposedEdit {
    pub fn validate(&self) -> Result<(), EditValidationError> {
        if let Some(device_id) = &self.device_id {
            if device_id.trim().is_empty() {
                return Err(EditValidationError::EmptyDeviceId);
            }
        }
        if let Some(reading) = self.sensor_reading {
            validate_sensor_reading(reading)?;
        }
        if let Some(location_id) = &self.location_id {
            validate_location_id(location_id)?;
        }
        validate_coordinates(self.latitude.flatten(), self.longitude.flatten())
    }
}

/// One field that differs between the stored document and the proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: EditableField,
    pub previous: FieldValue,
    pub proposed: FieldValue,
    /// History version the previous value is stored under
    pub version: usize,
}

/// Diff a proposal against the current document.
pub fn diff(current: &Installation, proposed: &ProposedEdit) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let mut push = |field: EditableField, proposed: FieldValue| {
        let previous = current.field_value(field);
        if previous != proposed {
            changes.push(FieldChange {
                field,
                previous,
                proposed,
                version: current.history.next_version(field),
            });
        }
    };

    if let Some(device_id) = &proposed.device_id {
        push(EditableField::DeviceId, FieldValue::Text(device_id.trim().to_string()));
    }
    if let Some(reading) = proposed.sensor_reading {
        push(EditableField::SensorReading, FieldValue::Number(reading));
    }
    if let Some(location_id) = &proposed.location_id {
        push(EditableField::LocationId, FieldValue::Text(location_id.clone()));
    }
    // Absent and null coordinates compare equal via FieldValue::Null.
    if let Some(latitude) = proposed.latitude {
        push(EditableField::Latitude, latitude.into());
    }
    if let Some(longitude) = proposed.longitude {
        push(EditableField::Longitude, longitude.into());
    }

    changes
}

/// Build the store patch for a set of changes plus an optional uploaded image.
pub fn changes_to_patch(changes: &[FieldChange], image_url: Option<String>) -> InstallationPatch {
    let mut patch = InstallationPatch {
        add_tags: vec![EDITED_BY_VERIFIER_TAG.to_string()],
        append_image_urls: image_url.into_iter().collect(),
        ..Default::default()
    };

    for change in changes {
        patch
            .history_appends
            .push((change.field, change.previous.clone()));
        match (&change.field, &change.proposed) {
            (EditableField::DeviceId, FieldValue::Text(v)) => patch.device_id = Some(v.clone()),
            (EditableField::SensorReading, FieldValue::Number(v)) => {
                patch.sensor_reading = Some(*v);
            }
            (EditableField::LocationId, FieldValue::Text(v)) => {
                patch.location_id = Some(v.clone());
            }
            (EditableField::Latitude, value) => patch.latitude = Some(as_number(value)),
            (EditableField::Longitude, value) => patch.longitude = Some(as_number(value)),
            _ => {}
        }
    }

    // The telemetry comparison was made against the old reading or device.
    let comparison_stale = changes.iter().any(|c| {
        matches!(c.field, EditableField::SensorReading | EditableField::DeviceId)
    });
    if comparison_stale {
        patch.latest_dis_cm = Some(None);
        patch.latest_dis_timestamp = Some(None);
        patch.server_refreshed_at = Some(None);
        patch.system_pre_verified = Some(false);
        patch.system_pre_verified_at = Some(None);
    }

    patch
}

fn as_number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn installation() -> Installation {
        Installation::new("DEV-1", "inst-1", "42", 100.0)
    }

    #[test]
    fn test_validation_rules() {
        let ok = ProposedEdit {
            device_id: Some("DEV-2".into()),
            sensor_reading: Some(12.5),
            location_id: Some("0042".into()),
            latitude: Some(Some(-90.0)),
            longitude: Some(Some(180.0)),
            image: None,
        };
        assert!(ok.validate().is_ok());

        let cases = [
            (
                ProposedEdit { device_id: Some("  ".into()), ..Default::default() },
                EditValidationError::EmptyDeviceId,
            ),
            (
                ProposedEdit { sensor_reading: Some(0.0), ..Default::default() },
                EditValidationError::InvalidSensorReading(0.0),
            ),
            (
                ProposedEdit { location_id: Some("4a".into()), ..Default::default() },
                EditValidationError::InvalidLocationId("4a".into()),
            ),
            (
                ProposedEdit { location_id: Some("٤٢".into()), ..Default::default() },
                EditValidationError::InvalidLocationId("٤٢".into()),
            ),
            (
                ProposedEdit { location_id: Some(String::new()), ..Default::default() },
                EditValidationError::InvalidLocationId(String::new()),
            ),
            (
                ProposedEdit { latitude: Some(Some(90.5)), ..Default::default() },
                EditValidationError::LatitudeOutOfRange(90.5),
            ),
            (
                ProposedEdit { longitude: Some(Some(-181.0)), ..Default::default() },
                EditValidationError::LongitudeOutOfRange(-181.0),
            ),
        ];
        for (edit, expected) in cases {
            assert_eq!(edit.validate(), Err(expected));
        }

        let nan = ProposedEdit { sensor_reading: Some(f64::NAN), ..Default::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_diff_skips_unchanged_fields() {
        let current = installation();
        let proposed = ProposedEdit {
            device_id: Some("DEV-1".into()),
            sensor_reading: Some(100.0),
            location_id: Some("42".into()),
            latitude: Some(None),
            longitude: None,
            image: None,
        };
        assert!(diff(&current, &proposed).is_empty());
    }

    #[test]
    fn test_diff_reports_versions_from_existing_history() {
        let mut current = installation();
        current
            .history
            .record(EditableField::SensorReading, FieldValue::Number(90.0));

        let proposed = ProposedEdit {
            sensor_reading: Some(110.0),
            latitude: Some(Some(1.5)),
            ..Default::default()
        };
        let changes = diff(&current, &proposed);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, EditableField::SensorReading);
        assert_eq!(changes[0].previous, FieldValue::Number(100.0));
        assert_eq!(changes[0].version, 2);
        assert_eq!(changes[1].field, EditableField::Latitude);
        assert_eq!(changes[1].previous, FieldValue::Null);
        assert_eq!(changes[1].version, 1);
    }

    #[test]
    fn test_reading_edit_invalidates_telemetry_comparison() {
        let now = Utc::now();
        let mut current = installation();
        current.latest_dis_cm = Some(102.0);
        current.latest_dis_timestamp = Some("2024-06-01T00:00:00Z".into());
        current.server_refreshed_at = Some(now);
        current.system_pre_verified = true;
        current.system_pre_verified_at = Some(now);

        let location_only = ProposedEdit { location_id: Some("43".into()), ..Default::default() };
        let patch = changes_to_patch(&diff(&current, &location_only), None);
        assert_eq!(patch.system_pre_verified, None);
        assert_eq!(patch.latest_dis_cm, None);

        let proposed = ProposedEdit { sensor_reading: Some(150.0), ..Default::default() };
        changes_to_patch(&diff(&current, &proposed), None).apply(&mut current, now);
        assert!(!current.system_pre_verified);
        assert!(current.system_pre_verified_at.is_none());
        assert!(current.latest_dis_cm.is_none());
        assert!(current.server_refreshed_at.is_none());
        assert!(current.check_invariants().is_ok());
    }

    #[test]
    fn test_patch_applies_history_then_values() {
        let mut current = installation();
        current.latitude = Some(3.0);
        let proposed = ProposedEdit {
            location_id: Some("43".into()),
            latitude: Some(None),
            ..Default::default()
        };
        let changes = diff(&current, &proposed);
        let patch = changes_to_patch(&changes, Some("file:///img.jpg".into()));
        patch.apply(&mut current, Utc::now());

        assert_eq!(current.location_id, "43");
        assert_eq!(current.latitude, None);
        assert_eq!(
            current.history.versions(EditableField::LocationId),
            &[FieldValue::Text("42".into())]
        );
        assert_eq!(
            current.history.versions(EditableField::Latitude),
            &[FieldValue::Number(3.0)]
        );
        assert!(current.tags.contains(EDITED_BY_VERIFIER_TAG));
        assert_eq!(current.image_urls, vec!["file:///img.jpg".to_string()]);
    }

    #[test]
    fn test_reading_units_normalize_to_centimeters() {
        assert!((ReadingUnit::Mm.to_centimeters(1000.0) - 100.0).abs() < 1e-9);
        assert!((ReadingUnit::M.to_centimeters(1.5) - 150.0).abs() < 1e-9);
        assert!((ReadingUnit::In.to_centimeters(10.0) - 25.4).abs() < 1e-9);
        assert_eq!("MM".parse::<ReadingUnit>().unwrap(), ReadingUnit::Mm);
        assert!("ft".parse::<ReadingUnit>().is_err());
    }
}
