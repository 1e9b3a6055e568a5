pub mod errors;
pub mod time;
pub mod patch;
pub mod validation;
pub mod document;
pub mod pet;
pub mod activity;
pub mod accessory;

pub use document::{Changeset, Document};
pub use errors::ModelError;
pub use patch::Patch;
pub use time::Timestamp;
pub use validation::Validate;

#[cfg(test)]
mod tests;
