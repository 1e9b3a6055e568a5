use serde::{Deserialize, Serialize};

use crate::document::{Changeset, Document};
use crate::errors::ModelError;
use crate::patch::Patch;
use crate::time::Timestamp;
use crate::validation::{check_max_len, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Feed,
    Walk,
    Play,
    Vet,
    Train,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Feed => "feed",
            ActivityType::Walk => "walk",
            ActivityType::Play => "play",
            ActivityType::Vet => "vet",
            ActivityType::Train => "train",
        }
    }
}

const NOTES_MAX: usize = 1000;

fn check_pet_id(pet_id: &str) -> Result<(), ModelError> {
    if pet_id.trim().is_empty() {
        return Err(ModelError::validation("petId must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub pet_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for NewActivity {
    fn validate(&self) -> Result<(), ModelError> {
        check_pet_id(&self.pet_id)?;
        check_max_len("notes", self.notes.as_deref(), NOTES_MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityChanges {
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub pet_id: Patch<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Patch::is_missing")]
    pub kind: Patch<ActivityType>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub timestamp: Patch<Timestamp>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub notes: Patch<String>,
}

impl Validate for ActivityChanges {
    fn validate(&self) -> Result<(), ModelError> {
        self.pet_id.require_non_null("petId")?;
        self.kind.require_non_null("type")?;
        self.timestamp.require_non_null("timestamp")?;
        if let Some(pet_id) = self.pet_id.value() {
            check_pet_id(pet_id)?;
        }
        check_max_len("notes", self.notes.value().map(String::as_str), NOTES_MAX)
    }
}

impl Changeset for ActivityChanges {
    fn is_empty(&self) -> bool {
        self.pet_id.is_missing() && self.kind.is_missing() && self.timestamp.is_missing() && self.notes.is_missing()
    }
}

/// A timestamped event in a pet's life. Listed newest `timestamp` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub pet_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document for Activity {
    type Create = NewActivity;
    type Update = ActivityChanges;

    const KIND: &'static str = "activity";
    const ORDER_FIELD: &'static str = "timestamp";

    fn from_input(input: NewActivity, id: String, now: Timestamp) -> Self {
        Self {
            id,
            pet_id: input.pet_id,
            kind: input.kind,
            timestamp: input.timestamp,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str { &self.id }
    fn created_at(&self) -> Timestamp { self.created_at }
    fn updated_at(&self) -> Timestamp { self.updated_at }

    fn apply(&mut self, changes: ActivityChanges) -> Result<(), ModelError> {
        changes.validate()?;
        changes.pet_id.merge_into("petId", &mut self.pet_id)?;
        changes.kind.merge_into("type", &mut self.kind)?;
        changes.timestamp.merge_into("timestamp", &mut self.timestamp)?;
        changes.notes.merge_into_option(&mut self.notes);
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) { self.updated_at = at; }

    fn samples(now: Timestamp) -> Vec<Self> {
        [
            ("a1", "p1", ActivityType::Walk, "2025-10-05T08:30:00Z", "Park loop"),
            ("a2", "p2", ActivityType::Feed, "2025-10-05T07:00:00Z", "Tuna pouch"),
            ("a3", "p1", ActivityType::Play, "2025-10-04T18:00:00Z", "Frisbee"),
        ]
        .into_iter()
        .filter_map(|(id, pet_id, kind, at, notes)| {
            let timestamp = Timestamp::parse(at).ok()?;
            Some(Activity {
                id: id.into(),
                pet_id: pet_id.into(),
                kind,
                timestamp,
                notes: Some(notes.into()),
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_is_renamed() {
        let raw = r#"{"petId":"p1","type":"vet","timestamp":"2025-10-05T08:30:00+00:00"}"#;
        let input: NewActivity = serde_json::from_str(raw).unwrap();
        assert_eq!(input.kind, ActivityType::Vet);
        let record = Activity::from_input(input, "a9".into(), Timestamp::now());
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["type"], "vet");
        assert_eq!(v["timestamp"], "2025-10-05T08:30:00.000000Z");
    }

    #[test]
    fn blank_pet_id_is_invalid() {
        let input = NewActivity {
            pet_id: "  ".into(),
            kind: ActivityType::Feed,
            timestamp: Timestamp::now(),
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn samples_are_complete() {
        let samples = Activity::samples(Timestamp::now());
        assert_eq!(samples.len(), 3);
        assert!(samples[0].timestamp > samples[1].timestamp);
    }

    #[test]
    fn changes_can_move_timestamp() {
        let mut a = Activity::samples(Timestamp::now()).remove(0);
        let changes: ActivityChanges = serde_json::from_str(r#"{"timestamp":"2025-11-01T00:00:00Z"}"#).unwrap();
        a.apply(changes).unwrap();
        assert_eq!(a.timestamp.to_iso(), "2025-11-01T00:00:00.000000Z");
    }
}
