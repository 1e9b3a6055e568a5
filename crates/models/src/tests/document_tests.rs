use std::collections::HashSet;

use crate::accessory::Accessory;
use crate::activity::Activity;
use crate::pet::Pet;
use crate::{Document, Timestamp, Validate};

fn samples_are_valid_fixtures<D: Document>() {
    let now = Timestamp::now();
    let samples = D::samples(now);
    assert!(!samples.is_empty(), "{} has no samples", D::KIND);

    let ids: HashSet<&str> = samples.iter().map(|s| s.id()).collect();
    assert_eq!(ids.len(), samples.len(), "{} sample ids must be unique", D::KIND);

    for s in &samples {
        assert_eq!(s.created_at(), s.updated_at());
        assert!(s.created_at() <= now);
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["id"], s.id());
        assert!(json.get(D::ORDER_FIELD).is_some(), "{} lacks order field", D::KIND);
        let back: D = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&back).unwrap(), json);
    }
}

#[test]
fn pet_samples() { samples_are_valid_fixtures::<Pet>(); }

#[test]
fn activity_samples() { samples_are_valid_fixtures::<Activity>(); }

#[test]
fn accessory_samples() { samples_are_valid_fixtures::<Accessory>(); }

#[test]
fn pet_samples_newest_last() {
    let now = Timestamp::now();
    let samples = Pet::samples(now);
    let ids: Vec<&str> = samples.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p2", "p3"]);
    assert!(samples[2].created_at > samples[1].created_at);
    assert!(samples[1].created_at > samples[0].created_at);
    assert!(samples[2].created_at < now);
}

#[test]
fn accessory_samples_predate_seeding() {
    let now = Timestamp::now();
    let samples = Accessory::samples(now);
    assert!(samples[1].created_at > samples[0].created_at);
    assert!(samples.iter().all(|a| a.created_at < now));
}

#[test]
fn create_views_parse_from_wire_json() {
    let pet: <Pet as Document>::Create = serde_json::from_str(
        r#"{"name":"Rex","species":"dog","ageYears":2,"health":90,"happiness":80,"energy":70,"avatarUrl":"https://img/rex.png"}"#,
    )
    .unwrap();
    assert!(pet.validate().is_ok());
    assert_eq!(pet.notes, None);

    let acc: <Accessory as Document>::Create = serde_json::from_str(
        r#"{"name":"Bed","type":"bedding","price":30.0,"stock":2,"size":"L"}"#,
    )
    .unwrap();
    assert!(acc.validate().is_ok());
}
