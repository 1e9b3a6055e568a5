use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ModelError;

/// One field of a partial update.
///
/// `Missing` means the client did not send the key; `Null` means it sent an
/// explicit `null`; `Value` carries the new value. Fields must be annotated with
/// `#[serde(default)]` so an absent key deserializes to `Missing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self { Patch::Missing }
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool { matches!(self, Patch::Missing) }

    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Reject `null` for fields the record cannot be without.
    pub fn require_non_null(&self, field: &str) -> Result<(), ModelError> {
        match self {
            Patch::Null => Err(ModelError::validation(format!("{field} cannot be null"))),
            _ => Ok(()),
        }
    }

    /// Merge into a required field; `null` is an error.
    pub fn merge_into(self, field: &str, target: &mut T) -> Result<(), ModelError> {
        match self {
            Patch::Missing => Ok(()),
            Patch::Null => Err(ModelError::validation(format!("{field} cannot be null"))),
            Patch::Value(v) => {
                *target = v;
                Ok(())
            }
        }
    }

    /// Merge into an optional field; `null` clears it.
    pub fn merge_into_option(self, target: &mut Option<T>) {
        match self {
            Patch::Missing => {}
            Patch::Null => *target = None,
            Patch::Value(v) => *target = Some(v),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Value(v) => serializer.serialize_some(v),
            _ => serializer.serialize_none(),
        }
    }
}
