use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::document::{Changeset, Document};
use crate::errors::ModelError;
use crate::patch::Patch;
use crate::time::Timestamp;
use crate::validation::{check_len, check_max_len, check_range, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
    Bird,
    Other,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Bird => "bird",
            Species::Other => "other",
        }
    }
}

const NAME_MAX: usize = 100;
const NOTES_MAX: usize = 1000;
const AGE_MAX: i64 = 50;
const STAT_MAX: i64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPet {
    pub name: String,
    pub species: Species,
    pub age_years: i64,
    pub health: i64,
    pub happiness: i64,
    pub energy: i64,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for NewPet {
    fn validate(&self) -> Result<(), ModelError> {
        check_len("name", &self.name, 1, NAME_MAX)?;
        check_range("ageYears", self.age_years, 0, AGE_MAX)?;
        check_range("health", self.health, 0, STAT_MAX)?;
        check_range("happiness", self.happiness, 0, STAT_MAX)?;
        check_range("energy", self.energy, 0, STAT_MAX)?;
        check_max_len("notes", self.notes.as_deref(), NOTES_MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetChanges {
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub species: Patch<Species>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub age_years: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub health: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub happiness: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub energy: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub avatar_url: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub notes: Patch<String>,
}

impl Validate for PetChanges {
    fn validate(&self) -> Result<(), ModelError> {
        self.name.require_non_null("name")?;
        self.species.require_non_null("species")?;
        self.age_years.require_non_null("ageYears")?;
        self.health.require_non_null("health")?;
        self.happiness.require_non_null("happiness")?;
        self.energy.require_non_null("energy")?;
        if let Some(name) = self.name.value() {
            check_len("name", name, 1, NAME_MAX)?;
        }
        if let Some(age) = self.age_years.value() {
            check_range("ageYears", *age, 0, AGE_MAX)?;
        }
        for (field, stat) in [("health", &self.health), ("happiness", &self.happiness), ("energy", &self.energy)] {
            if let Some(v) = stat.value() {
                check_range(field, *v, 0, STAT_MAX)?;
            }
        }
        check_max_len("notes", self.notes.value().map(String::as_str), NOTES_MAX)
    }
}

impl Changeset for PetChanges {
    fn is_empty(&self) -> bool {
        self.name.is_missing()
            && self.species.is_missing()
            && self.age_years.is_missing()
            && self.health.is_missing()
            && self.happiness.is_missing()
            && self.energy.is_missing()
            && self.avatar_url.is_missing()
            && self.notes.is_missing()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub species: Species,
    pub age_years: i64,
    pub health: i64,
    pub happiness: i64,
    pub energy: i64,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document for Pet {
    type Create = NewPet;
    type Update = PetChanges;

    const KIND: &'static str = "pet";
    const ORDER_FIELD: &'static str = "createdAt";

    fn from_input(input: NewPet, id: String, now: Timestamp) -> Self {
        Self {
            id,
            name: input.name,
            species: input.species,
            age_years: input.age_years,
            health: input.health,
            happiness: input.happiness,
            energy: input.energy,
            avatar_url: input.avatar_url,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str { &self.id }
    fn created_at(&self) -> Timestamp { self.created_at }
    fn updated_at(&self) -> Timestamp { self.updated_at }

    fn apply(&mut self, changes: PetChanges) -> Result<(), ModelError> {
        changes.validate()?;
        changes.name.merge_into("name", &mut self.name)?;
        changes.species.merge_into("species", &mut self.species)?;
        changes.age_years.merge_into("ageYears", &mut self.age_years)?;
        changes.health.merge_into("health", &mut self.health)?;
        changes.happiness.merge_into("happiness", &mut self.happiness)?;
        changes.energy.merge_into("energy", &mut self.energy)?;
        changes.avatar_url.merge_into_option(&mut self.avatar_url);
        changes.notes.merge_into_option(&mut self.notes);
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) { self.updated_at = at; }

    fn samples(now: Timestamp) -> Vec<Self> {
        let rows = [
            ("p1", "Luna", Species::Dog, 3, 92, 85, 70, "Loves long walks"),
            ("p2", "Milo", Species::Cat, 5, 88, 76, 55, "Naps in the sun"),
            ("p3", "Pico", Species::Bird, 1, 95, 90, 80, "Whistles at dawn"),
        ];
        let n = rows.len() as i64;
        rows.into_iter()
            .enumerate()
            .map(|(i, (id, name, species, age, health, happiness, energy, notes))| {
                // later rows are newer, so p3 leads a createdAt DESC listing;
                // all of them predate `now`
                let at = now.offset_by(Duration::milliseconds(i as i64 - n));
                Pet {
                    id: id.into(),
                    name: name.into(),
                    species,
                    age_years: age,
                    health,
                    happiness,
                    energy,
                    avatar_url: None,
                    notes: Some(notes.into()),
                    created_at: at,
                    updated_at: at,
                }
            })
            .collect()
    }
}
