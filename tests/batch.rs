#![cfg(feature = "rusqlite")]

mod common;

use common::{ids, registry, session, setup_db};
use eagerload::prelude::*;
use eagerload::SessionOptions;

fn products() -> Vec<Record> {
    vec![
        Record::new().with("Id", 10).with("Title", "Clip").with("Price", 0.25),
        Record::new().with("Id", 11).with("Title", "Tape").with("Price", 3.0),
        Record::new().with("Id", 12).with("Title", "Glue").with("Price", 2.5),
    ]
}

#[test]
fn test_insert_then_read_back_by_key() {
    let session = session();
    let records = products();
    assert_eq!(session.batch_insert("Product", &records).unwrap(), 3);

    for record in &records {
        let key = record.get("Id").cloned().unwrap();
        let product = session.query("Product").where_(col("Id").eq(key)).single().unwrap();
        for (property, value) in record.iter() {
            assert_eq!(product.get(property), Some(value), "{property}");
        }
    }
}

#[test]
fn test_round_trip_of_dates_and_nulls() {
    let session = session();
    let placed = Value::from("2024-05-01").coerce(ScalarKind::Date).unwrap();
    let order = Record::new()
        .with("Id", 10)
        .with("CustomerId", 2)
        .with("Status", "NEW")
        .with("PlacedOn", placed.clone());
    session.batch_insert("Order", &[order]).unwrap();

    let loaded = session
        .query("Order")
        .where_(col("Id").eq(10))
        .include("Customer")
        .single()
        .unwrap();
    assert_eq!(loaded.get("PlacedOn"), Some(&placed));
    assert_eq!(loaded.get("ShipperId"), Some(&Value::Null));
    assert_eq!(
        loaded.reference("Customer").and_then(|c| c.get("Name").cloned()),
        Some(Value::from("Bob"))
    );
}

#[test]
fn test_masked_columns_round_trip_unmasked() {
    let session = session();
    let customer = Record::new()
        .with("Id", 9)
        .with("Name", "Dee")
        .with("Email", "dee@example.com");
    session.batch_insert("Customer", &[customer]).unwrap();

    let plain = session
        .query("Customer")
        .where_(col("Id").eq(9))
        .disable_sensitive()
        .single()
        .unwrap();
    assert_eq!(plain.get("Email"), Some(&Value::from("dee@example.com")));
    assert_eq!(plain.get("CountryId"), Some(&Value::Null));
}

#[test]
fn test_inserts_are_chunked() {
    let engine = setup_db();
    let session = Session::new(engine, registry()).with_options(SessionOptions::default().batch_size(2));
    let tags: Vec<Record> = (1..=5)
        .map(|id| Record::new().with("Id", id).with("Name", format!("tag{id}")))
        .collect();
    assert_eq!(session.batch_insert("Tag", &tags).unwrap(), 5);
    assert_eq!(session.query("Tag").count().unwrap(), 5);
    assert_eq!(session.batch_insert("Tag", &[]).unwrap(), 0);
}

#[test]
fn test_update_changes_only_carried_properties() {
    let session = session();
    session.batch_insert("Product", &products()).unwrap();

    let changes = [
        Record::new().with("Id", 10).with("Price", 0.5),
        Record::new().with("Id", 11).with("Title", "Duct tape"),
    ];
    assert_eq!(session.batch_update("Product", &changes).unwrap(), 2);

    let updated = session
        .query("Product")
        .where_(col("Id").ge(10))
        .order_by(col("Id"))
        .to_list()
        .unwrap();
    assert_eq!(updated[0].get("Price"), Some(&Value::Real(0.5)));
    assert_eq!(updated[0].get("Title"), Some(&Value::from("Clip")));
    assert_eq!(updated[1].get("Title"), Some(&Value::from("Duct tape")));
    assert_eq!(updated[1].get("Price"), Some(&Value::Real(3.0)));
    assert_eq!(updated[2].get("Price"), Some(&Value::Real(2.5)));
}

#[test]
fn test_update_requires_keys() {
    let session = session();
    let err = session
        .batch_update("Product", &[Record::new().with("Title", "Nameless")])
        .unwrap_err();
    assert!(matches!(err, EagerError::InvalidUsage(_)));
}

#[test]
fn test_delete_by_key() {
    let session = session();
    session.batch_insert("Product", &products()).unwrap();
    assert_eq!(session.batch_delete("Product", [10, 12, 99]).unwrap(), 2);

    let left = session.query("Product").order_by(col("Id")).to_list().unwrap();
    assert_eq!(ids(&left), vec![1, 2, 3, 11]);
    assert_eq!(session.batch_delete("Product", Vec::<i64>::new()).unwrap(), 0);
}

#[test]
fn test_failed_batch_reports_the_statement() {
    let session = session();
    let duplicate = [Record::new().with("Id", 1).with("Title", "Pen again").with("Price", 1.0)];
    match session.batch_insert("Product", &duplicate).unwrap_err() {
        EagerError::Execution { sql, .. } => assert!(sql.starts_with(r#"INSERT INTO "products""#)),
        other => panic!("unexpected error: {other}"),
    }
}
