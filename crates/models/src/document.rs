use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::ModelError;
use crate::time::Timestamp;
use crate::validation::Validate;

/// A partial-update view. Empty means no field was supplied.
pub trait Changeset: Validate {
    fn is_empty(&self) -> bool;
}

/// A record kept as one document in its own partition, keyed by `id`.
pub trait Document: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    type Create: Validate + DeserializeOwned + Debug + Send + Sync + 'static;
    type Update: Changeset + DeserializeOwned + Debug + Send + Sync + 'static;

    /// Singular name used in logs and metric labels.
    const KIND: &'static str;
    /// JSON field that search results are ordered by, newest first.
    const ORDER_FIELD: &'static str;

    fn from_input(input: Self::Create, id: String, now: Timestamp) -> Self;

    fn id(&self) -> &str;
    fn created_at(&self) -> Timestamp;
    fn updated_at(&self) -> Timestamp;

    /// Merge supplied fields. Leaves timestamps alone.
    fn apply(&mut self, changes: Self::Update) -> Result<(), ModelError>;

    fn touch(&mut self, at: Timestamp);

    /// Canonical fixtures written when a container is provisioned.
    fn samples(now: Timestamp) -> Vec<Self>;
}
