use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::document::{Changeset, Document};
use crate::errors::ModelError;
use crate::patch::Patch;
use crate::time::Timestamp;
use crate::validation::{check_len, check_max_len, check_non_negative, check_price, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryType {
    Toy,
    Food,
    Collar,
    Bedding,
    Grooming,
    Other,
}

impl AccessoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessoryType::Toy => "toy",
            AccessoryType::Food => "food",
            AccessoryType::Collar => "collar",
            AccessoryType::Bedding => "bedding",
            AccessoryType::Grooming => "grooming",
            AccessoryType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    #[serde(rename = "S")]
    Small,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Large,
    #[serde(rename = "XL")]
    ExtraLarge,
}

const NAME_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccessory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccessoryType,
    pub price: f64,
    pub stock: i64,
    pub size: Size,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Validate for NewAccessory {
    fn validate(&self) -> Result<(), ModelError> {
        check_len("name", &self.name, 1, NAME_MAX)?;
        check_price("price", self.price)?;
        check_non_negative("stock", self.stock)?;
        check_max_len("description", self.description.as_deref(), DESCRIPTION_MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryChanges {
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub name: Patch<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Patch::is_missing")]
    pub kind: Patch<AccessoryType>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub price: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub stock: Patch<i64>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub size: Patch<Size>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub image_url: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_missing")]
    pub description: Patch<String>,
}

impl Validate for AccessoryChanges {
    fn validate(&self) -> Result<(), ModelError> {
        self.name.require_non_null("name")?;
        self.kind.require_non_null("type")?;
        self.price.require_non_null("price")?;
        self.stock.require_non_null("stock")?;
        self.size.require_non_null("size")?;
        if let Some(name) = self.name.value() {
            check_len("name", name, 1, NAME_MAX)?;
        }
        if let Some(price) = self.price.value() {
            check_price("price", *price)?;
        }
        if let Some(stock) = self.stock.value() {
            check_non_negative("stock", *stock)?;
        }
        check_max_len("description", self.description.value().map(String::as_str), DESCRIPTION_MAX)
    }
}

impl Changeset for AccessoryChanges {
    fn is_empty(&self) -> bool {
        self.name.is_missing()
            && self.kind.is_missing()
            && self.price.is_missing()
            && self.stock.is_missing()
            && self.size.is_missing()
            && self.image_url.is_missing()
            && self.description.is_missing()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessory {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AccessoryType,
    pub price: f64,
    pub stock: i64,
    pub size: Size,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document for Accessory {
    type Create = NewAccessory;
    type Update = AccessoryChanges;

    const KIND: &'static str = "accessory";
    const ORDER_FIELD: &'static str = "createdAt";

    fn from_input(input: NewAccessory, id: String, now: Timestamp) -> Self {
        Self {
            id,
            name: input.name,
            kind: input.kind,
            price: input.price,
            stock: input.stock,
            size: input.size,
            image_url: input.image_url,
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str { &self.id }
    fn created_at(&self) -> Timestamp { self.created_at }
    fn updated_at(&self) -> Timestamp { self.updated_at }

    fn apply(&mut self, changes: AccessoryChanges) -> Result<(), ModelError> {
        changes.validate()?;
        changes.name.merge_into("name", &mut self.name)?;
        changes.kind.merge_into("type", &mut self.kind)?;
        changes.price.merge_into("price", &mut self.price)?;
        changes.stock.merge_into("stock", &mut self.stock)?;
        changes.size.merge_into("size", &mut self.size)?;
        changes.image_url.merge_into_option(&mut self.image_url);
        changes.description.merge_into_option(&mut self.description);
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) { self.updated_at = at; }

    fn samples(now: Timestamp) -> Vec<Self> {
        let older = now.offset_by(Duration::milliseconds(-2));
        let newer = now.offset_by(Duration::milliseconds(-1));
        vec![
            Accessory {
                id: "x1".into(),
                name: "Chew Toy".into(),
                kind: AccessoryType::Toy,
                price: 8.99,
                stock: 12,
                size: Size::Medium,
                image_url: None,
                description: Some("Durable rope".into()),
                created_at: older,
                updated_at: older,
            },
            Accessory {
                id: "x2".into(),
                name: "Salmon Treats".into(),
                kind: AccessoryType::Food,
                price: 5.49,
                stock: 3,
                size: Size::Small,
                image_url: None,
                description: Some("Soft chews".into()),
                created_at: newer,
                updated_at: newer,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewAccessory {
        NewAccessory {
            name: "Leash".into(),
            kind: AccessoryType::Collar,
            price: 12.5,
            stock: 4,
            size: Size::Large,
            image_url: None,
            description: None,
        }
    }

    #[test]
    fn size_uses_short_codes() {
        assert_eq!(serde_json::to_value(Size::ExtraLarge).unwrap(), "XL");
        assert_eq!(serde_json::from_str::<Size>(r#""S""#).unwrap(), Size::Small);
    }

    #[test]
    fn price_and_stock_bounds() {
        assert!(input().validate().is_ok());
        assert!(NewAccessory { price: -0.01, ..input() }.validate().is_err());
        assert!(NewAccessory { stock: -1, ..input() }.validate().is_err());
        assert!(NewAccessory { name: "x".repeat(201), ..input() }.validate().is_err());
    }

    #[test]
    fn empty_changes_detected() {
        let changes: AccessoryChanges = serde_json::from_str("{}").unwrap();
        assert!(changes.is_empty());
        let changes: AccessoryChanges = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert!(!changes.is_empty());
    }
}
