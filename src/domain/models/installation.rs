//! Installation domain model.
//!
//! An installation records one installer's claim that a device was mounted at
//! a location with a measured reading. Reconciliation later attaches the
//! device's own reading, and verifiers approve, flag, edit or delete it.
//!
//! The persisted document shape (camelCase keys, flattened
//! `original_<field>_<n>` history keys) is consumed by external dashboards and
//! exporters and must not drift.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::classification::variance;

/// Actor name stamped on installations rejected by reconciliation.
pub const SYSTEM_AUTO_REJECT_ACTOR: &str = "System (Auto-rejected)";

/// Tag added to every installation a verifier has edited.
pub const EDITED_BY_VERIFIER_TAG: &str = "edited by verifier";

/// Verification status of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    /// Awaiting verification (possibly pre-verified by the system)
    #[default]
    Pending,
    /// Approved by a human verifier
    Verified,
    /// Rejected by a human verifier or by reconciliation
    Flagged,
}

impl InstallationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Flagged => "flagged",
        }
    }

    /// Verified installations are never touched by reconciliation again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstallationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "flagged" => Ok(Self::Flagged),
            other => Err(format!("unknown installation status: {other}")),
        }
    }
}

/// Fields a verifier may edit. Each keeps its own version history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditableField {
    DeviceId,
    SensorReading,
    LocationId,
    Latitude,
    Longitude,
}

impl EditableField {
    pub const ALL: [Self; 5] = [
        Self::DeviceId,
        Self::SensorReading,
        Self::LocationId,
        Self::Latitude,
        Self::Longitude,
    ];

    /// Persisted document key for the field.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::DeviceId => "deviceId",
            Self::SensorReading => "sensorReading",
            Self::LocationId => "locationId",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.wire_name() == name)
    }

    /// Key under which the `version`th prior value is persisted.
    pub fn history_key(&self, version: usize) -> String {
        format!("original_{}_{}", self.wire_name(), version)
    }
}

impl fmt::Display for EditableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl Serialize for EditableField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

/// A field value as stored in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Number)
    }
}

/// Ordered prior values per editable field.
///
/// Index `i` of a field's list is version `i + 1`. Entries are only ever
/// appended, so the persisted `original_<field>_<n>` keys stay gap-free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditHistory {
    entries: BTreeMap<EditableField, Vec<FieldValue>>,
}

impl EditHistory {
    /// Append a prior value and return the version it was stored under.
    pub fn record(&mut self, field: EditableField, prior: FieldValue) -> usize {
        let versions = self.entries.entry(field).or_default();
        versions.push(prior);
        versions.len()
    }

    pub fn versions(&self, field: EditableField) -> &[FieldValue] {
        self.entries.get(&field).map_or(&[], Vec::as_slice)
    }

    pub fn next_version(&self, field: EditableField) -> usize {
        self.versions(field).len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

impl Serialize for EditHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.entries.values().map(Vec::len).sum();
        let mut map = serializer.serialize_map(Some(len))?;
        for (field, versions) in &self.entries {
            for (idx, value) in versions.iter().enumerate() {
                map.serialize_entry(&field.history_key(idx + 1), value)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EditHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HistoryVisitor;

        impl<'de> Visitor<'de> for HistoryVisitor {
            type Value = EditHistory;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of original_<field>_<n> keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut numbered: BTreeMap<EditableField, BTreeMap<usize, FieldValue>> =
                    BTreeMap::new();

                while let Some(key) = map.next_key::<String>()? {
                    match parse_history_key(&key) {
                        Some((field, version)) => {
                            let value = map.next_value::<FieldValue>()?;
                            numbered.entry(field).or_default().insert(version, value);
                        }
                        None => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }

                let entries = numbered
                    .into_iter()
                    .map(|(field, versions)| (field, versions.into_values().collect()))
                    .collect();
                Ok(EditHistory { entries })
            }
        }

        deserializer.deserialize_map(HistoryVisitor)
    }
}

fn parse_history_key(key: &str) -> Option<(EditableField, usize)> {
    let rest = key.strip_prefix("original_")?;
    let (name, version) = rest.rsplit_once('_')?;
    let field = EditableField::from_wire_name(name)?;
    let version = version.parse::<usize>().ok().filter(|v| *v > 0)?;
    Some((field, version))
}

/// An installation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub id: Uuid,
    pub device_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    pub installed_by: String,
    #[serde(default)]
    pub installed_by_name: String,
    pub location_id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Installer-reported reading in centimeters
    pub sensor_reading: f64,
    /// Device-reported reading in centimeters
    #[serde(default)]
    pub latest_dis_cm: Option<f64>,
    #[serde(default)]
    pub latest_dis_timestamp: Option<String>,
    #[serde(default)]
    pub status: InstallationStatus,
    #[serde(default)]
    pub system_pre_verified: bool,
    #[serde(default)]
    pub system_pre_verified_at: Option<DateTime<Utc>>,
    /// Last reconciliation attempt that reached the telemetry service
    #[serde(default)]
    pub server_refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flagged_reason: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Location before the first bulk reassignment
    #[serde(default)]
    pub original_location_id: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub history: EditHistory,
}

impl Installation {
    /// Create a pending installation.
    pub fn new(
        device_id: impl Into<String>,
        installed_by: impl Into<String>,
        location_id: impl Into<String>,
        sensor_reading: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            team_id: None,
            installed_by: installed_by.into(),
            installed_by_name: String::new(),
            location_id: location_id.into(),
            latitude: None,
            longitude: None,
            sensor_reading,
            latest_dis_cm: None,
            latest_dis_timestamp: None,
            status: InstallationStatus::Pending,
            system_pre_verified: false,
            system_pre_verified_at: None,
            server_refreshed_at: None,
            flagged_reason: None,
            verified_by: None,
            verified_at: None,
            tags: BTreeSet::new(),
            original_location_id: None,
            image_urls: Vec::new(),
            created_at: now,
            updated_at: now,
            history: EditHistory::default(),
        }
    }

    /// Whether the device has reported a usable (positive) reading.
    pub fn has_server_data(&self) -> bool {
        self.latest_dis_cm.is_some_and(|v| v > 0.0)
    }

    /// Percentage variance between the two readings, if both are present.
    pub fn variance(&self) -> Option<f64> {
        if !self.has_server_data() {
            return None;
        }
        self.latest_dis_cm
            .map(|server| variance(self.sensor_reading, server))
    }

    /// Current value of an editable field.
    pub fn field_value(&self, field: EditableField) -> FieldValue {
        match field {
            EditableField::DeviceId => FieldValue::Text(self.device_id.clone()),
            EditableField::SensorReading => FieldValue::Number(self.sensor_reading),
            EditableField::LocationId => FieldValue::Text(self.location_id.clone()),
            EditableField::Latitude => self.latitude.into(),
            EditableField::Longitude => self.longitude.into(),
        }
    }

    /// Cross-field invariants that must hold for every persisted document.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.system_pre_verified && self.status != InstallationStatus::Pending {
            return Err(format!(
                "installation {} is pre-verified while {}",
                self.id, self.status
            ));
        }
        if self.status == InstallationStatus::Flagged
            && self.flagged_reason.is_some()
            && self.verified_by.is_none()
        {
            return Err(format!("installation {} is flagged without an actor", self.id));
        }
        Ok(())
    }
}

/// Field-level update applied atomically by a store.
///
/// `None` leaves a field untouched; `Some(None)` clears a nullable field.
/// Patches are how concurrent writers (reconciliation, edits, bulk
/// reassignment) touch disjoint fields without clobbering each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallationPatch {
    pub device_id: Option<String>,
    pub sensor_reading: Option<f64>,
    pub location_id: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub latest_dis_cm: Option<Option<f64>>,
    pub latest_dis_timestamp: Option<Option<String>>,
    pub status: Option<InstallationStatus>,
    pub system_pre_verified: Option<bool>,
    pub system_pre_verified_at: Option<Option<DateTime<Utc>>>,
    pub server_refreshed_at: Option<Option<DateTime<Utc>>>,
    pub flagged_reason: Option<Option<String>>,
    pub verified_by: Option<Option<String>>,
    pub verified_at: Option<Option<DateTime<Utc>>>,
    /// Copy the stored `locationId` into `originalLocationId` if it was never set
    pub preserve_original_location: bool,
    pub history_appends: Vec<(EditableField, FieldValue)>,
    pub add_tags: Vec<String>,
    pub append_image_urls: Vec<String>,
}

impl InstallationPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to a document read inside the store's write scope.
    pub fn apply(&self, installation: &mut Installation, now: DateTime<Utc>) {
        // History first: prior values are captured before live fields move.
        for (field, prior) in &self.history_appends {
            installation.history.record(*field, prior.clone());
        }
        if self.preserve_original_location && installation.original_location_id.is_none() {
            installation.original_location_id = Some(installation.location_id.clone());
        }

        if let Some(v) = &self.device_id {
            installation.device_id.clone_from(v);
        }
        if let Some(v) = self.sensor_reading {
            installation.sensor_reading = v;
        }
        if let Some(v) = &self.location_id {
            installation.location_id.clone_from(v);
        }
        if let Some(v) = self.latitude {
            installation.latitude = v;
        }
        if let Some(v) = self.longitude {
            installation.longitude = v;
        }
        if let Some(v) = self.latest_dis_cm {
            installation.latest_dis_cm = v;
        }
        if let Some(v) = &self.latest_dis_timestamp {
            installation.latest_dis_timestamp.clone_from(v);
        }
        if let Some(v) = self.status {
            installation.status = v;
        }
        if let Some(v) = self.system_pre_verified {
            installation.system_pre_verified = v;
        }
        if let Some(v) = self.system_pre_verified_at {
            installation.system_pre_verified_at = v;
        }
        if let Some(v) = self.server_refreshed_at {
            installation.server_refreshed_at = v;
        }
        if let Some(v) = &self.flagged_reason {
            installation.flagged_reason.clone_from(v);
        }
        if let Some(v) = &self.verified_by {
            installation.verified_by.clone_from(v);
        }
        if let Some(v) = self.verified_at {
            installation.verified_at = v;
        }
        for tag in &self.add_tags {
            installation.tags.insert(tag.clone());
        }
        installation
            .image_urls
            .extend(self.append_image_urls.iter().cloned());

        installation.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Installation {
        Installation::new("DEV-1", "installer-1", "42", 100.0)
    }

    #[test]
    fn test_history_versions_are_per_field_and_gap_free() {
        let mut history = EditHistory::default();
        assert_eq!(history.next_version(EditableField::SensorReading), 1);
        assert_eq!(
            history.record(EditableField::SensorReading, FieldValue::Number(100.0)),
            1
        );
        assert_eq!(
            history.record(EditableField::LocationId, FieldValue::Text("7".into())),
            1
        );
        assert_eq!(
            history.record(EditableField::SensorReading, FieldValue::Number(110.0)),
            2
        );
        assert_eq!(
            history.versions(EditableField::SensorReading),
            &[FieldValue::Number(100.0), FieldValue::Number(110.0)]
        );
    }

    #[test]
    fn test_history_serializes_to_flat_original_keys() {
        let mut inst = sample();
        inst.history
            .record(EditableField::SensorReading, FieldValue::Number(100.0));
        inst.history
            .record(EditableField::SensorReading, FieldValue::Number(110.0));
        inst.history.record(EditableField::Latitude, FieldValue::Null);

        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["original_sensorReading_1"], 100.0);
        assert_eq!(json["original_sensorReading_2"], 110.0);
        assert!(json["original_latitude_1"].is_null());
        assert!(json.get("original_latitude_1").is_some());
        assert_eq!(json["deviceId"], "DEV-1");
        assert_eq!(json["sensorReading"], 100.0);
    }

    #[test]
    fn test_editable_field_serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_value(EditableField::SensorReading).unwrap(),
            "sensorReading"
        );
        let fields: Vec<_> = EditableField::ALL
            .iter()
            .map(|f| serde_json::to_value(f).unwrap())
            .collect();
        assert_eq!(
            fields,
            ["deviceId", "sensorReading", "locationId", "latitude", "longitude"]
        );
    }

    #[test]
    fn test_history_deserializes_from_flat_keys_in_version_order() {
        let mut json = serde_json::to_value(sample()).unwrap();
        let obj = json.as_object_mut().unwrap();
        obj.insert("original_locationId_2".into(), "8".into());
        obj.insert("original_locationId_1".into(), "7".into());
        obj.insert("original_unknown_1".into(), "x".into());

        let inst: Installation = serde_json::from_value(json).unwrap();
        assert_eq!(
            inst.history.versions(EditableField::LocationId),
            &[FieldValue::Text("7".into()), FieldValue::Text("8".into())]
        );
        assert_eq!(inst.history.next_version(EditableField::LocationId), 3);
        assert!(inst.history.versions(EditableField::DeviceId).is_empty());
    }

    #[test]
    fn test_original_location_id_is_not_history() {
        let mut inst = sample();
        inst.original_location_id = Some("41".into());
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["originalLocationId"], "41");

        let back: Installation = serde_json::from_value(json).unwrap();
        assert!(back.history.is_empty());
        assert_eq!(back.original_location_id.as_deref(), Some("41"));
    }

    #[test]
    fn test_has_server_data_treats_non_positive_as_missing() {
        let mut inst = sample();
        assert!(!inst.has_server_data());
        inst.latest_dis_cm = Some(0.0);
        assert!(!inst.has_server_data());
        assert!(inst.variance().is_none());
        inst.latest_dis_cm = Some(107.0);
        assert!(inst.has_server_data());
        assert_eq!(inst.variance(), Some(7.0));
    }

    #[test]
    fn test_patch_preserve_original_location_only_once() {
        let mut inst = sample();
        let patch = InstallationPatch {
            location_id: Some("43".into()),
            preserve_original_location: true,
            ..Default::default()
        };
        patch.apply(&mut inst, Utc::now());
        assert_eq!(inst.original_location_id.as_deref(), Some("42"));
        assert_eq!(inst.location_id, "43");

        let patch = InstallationPatch {
            location_id: Some("44".into()),
            preserve_original_location: true,
            ..Default::default()
        };
        patch.apply(&mut inst, Utc::now());
        assert_eq!(inst.original_location_id.as_deref(), Some("42"));
        assert_eq!(inst.location_id, "44");
    }

    #[test]
    fn test_patch_tags_stay_deduplicated() {
        let mut inst = sample();
        let patch = InstallationPatch {
            add_tags: vec![EDITED_BY_VERIFIER_TAG.to_string()],
            ..Default::default()
        };
        patch.apply(&mut inst, Utc::now());
        patch.apply(&mut inst, Utc::now());
        assert_eq!(inst.tags.len(), 1);
        let json = serde_json::to_value(&inst).unwrap();
        assert_eq!(json["tags"], serde_json::json!([EDITED_BY_VERIFIER_TAG]));
    }

    #[test]
    fn test_invariants() {
        let mut inst = sample();
        assert!(inst.check_invariants().is_ok());
        inst.system_pre_verified = true;
        inst.status = InstallationStatus::Flagged;
        assert!(inst.check_invariants().is_err());

        let mut inst = sample();
        inst.status = InstallationStatus::Flagged;
        inst.flagged_reason = Some("bad".into());
        assert!(inst.check_invariants().is_err());
        inst.verified_by = Some(SYSTEM_AUTO_REJECT_ACTOR.into());
        assert!(inst.check_invariants().is_ok());
    }
}
