#![cfg(feature = "rusqlite")]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{ids, registry, session, setup_db};
use eagerload::prelude::*;
use eagerload::SessionOptions;

#[test]
fn test_to_sql_matches_executed_statement() {
    let session = session();
    let query = session.query("Order").where_(col("Status").eq("OPEN")).take(1);
    assert_eq!(
        query.to_sql().unwrap(),
        r#"SELECT o0."Id" AS "Id", o0."CustomerId" AS "CustomerId", o0."ShipperId" AS "ShipperId", o0."Status" AS "Status", o0."PlacedOn" AS "PlacedOn" FROM "orders" AS o0 WHERE o0."Status" = 'OPEN' LIMIT 1"#
    );
}

#[test]
fn test_first_and_first_or_default() {
    let session = session();
    let last = session.query("Order").order_by_desc(col("Id")).first().unwrap();
    assert_eq!(last.get("Id"), Some(&Value::Integer(4)));

    let none = session
        .query("Order")
        .where_(col("Status").eq("LOST"))
        .first_or_default()
        .unwrap();
    assert!(none.is_none());

    let err = session.query("Order").where_(col("Status").eq("LOST")).first().unwrap_err();
    assert!(matches!(err, EagerError::NoResult));
}

#[test]
fn test_first_with_collection_keeps_every_item() {
    let session = session();
    let order = session
        .query("Order")
        .include("Lines")
        .order_by(col("Id"))
        .first()
        .unwrap();
    assert_eq!(order.collection("Lines").len(), 2);
}

#[test]
fn test_single_contracts() {
    let session = session();
    let one = session.query("Order").where_(col("Id").eq(3)).single().unwrap();
    assert_eq!(one.get("Status"), Some(&Value::from("OPEN")));

    let err = session.query("Order").where_(col("Status").eq("OPEN")).single().unwrap_err();
    assert!(matches!(err, EagerError::MultipleResults(2)));

    let err = session.query("Order").where_(col("Id").eq(99)).single().unwrap_err();
    assert!(matches!(err, EagerError::NoResult));

    let none = session.query("Order").where_(col("Id").eq(99)).single_or_default().unwrap();
    assert!(none.is_none());

    let err = session
        .query("Order")
        .where_(col("Status").eq("OPEN"))
        .single_or_default()
        .unwrap_err();
    assert!(matches!(err, EagerError::MultipleResults(2)));
}

#[test]
fn test_count_and_any() {
    let session = session();
    assert_eq!(session.query("Order").where_(col("Status").eq("OPEN")).count().unwrap(), 2);
    assert_eq!(
        session
            .query("Order")
            .where_(col("Shipper.Name").eq("Post"))
            .count()
            .unwrap(),
        2
    );
    assert_eq!(session.query("Order").include("Lines").count().unwrap(), 4);
    assert_eq!(session.query("Order").skip(3).count().unwrap(), 1);

    assert!(session.query("Customer").any().unwrap());
    assert!(!session.query("Order").where_(col("Status").eq("LOST")).any().unwrap());
}

#[test]
fn test_all() {
    let session = session();
    let few_lines = session
        .query("Order")
        .include("Lines")
        .all(|order| order.collection("Lines").len() <= 2)
        .unwrap();
    assert!(few_lines);

    let all_open = session.query("Order").all(|order| order.get("Status") == Some(&Value::from("OPEN")));
    assert!(!all_open.unwrap());

    let vacuous = session
        .query("Order")
        .where_(col("Id").eq(99))
        .all(|_| false)
        .unwrap();
    assert!(vacuous);
}

#[test]
fn test_aggregates_over_root_properties() {
    let session = session();
    assert_eq!(session.query("Product").sum("Price").unwrap(), 7.75);

    let average = session.query("Product").average("Price").unwrap().unwrap();
    assert!((average - 7.75 / 3.0).abs() < 1e-9);

    assert_eq!(session.query("Product").min("Price").unwrap(), Some(Value::Real(1.5)));
    assert_eq!(session.query("Product").max("Title").unwrap(), Some(Value::from("Pen")));
    assert_eq!(
        session.query("Product").where_(col("Id").gt(10)).average("Price").unwrap(),
        None
    );
    assert_eq!(session.query("Product").where_(col("Id").gt(10)).sum("Price").unwrap(), 0.0);

    let err = session.query("Product").sum("Title").unwrap_err();
    assert!(matches!(err, EagerError::Conversion(_)));
}

#[test]
fn test_projection_rows() {
    let session = session();
    let rows = session
        .query("Order")
        .select_as(col("Customer.Name"), "name")
        .group_by(col("Customer.Name"))
        .order_by(col("Customer.Name"))
        .to_rows()
        .unwrap();
    let names: Vec<Value> = rows.iter().filter_map(|r| r.get("name").cloned()).collect();
    assert_eq!(names, vec![Value::from("Ann"), Value::from("Bob"), Value::from("Cid")]);

    let qty = session.query("OrderLine").select_as(col("Qty"), "qty").sum("qty").unwrap();
    assert_eq!(qty, 12.0);

    let err = session.query("Order").select([col("Status")]).to_list().unwrap_err();
    assert!(matches!(err, EagerError::InvalidUsage(_)));
}

#[test]
fn test_raw_sql_materializes_flat_roots() {
    let session = session();
    let mut params = Parameters::new();
    params.bind("status", Value::from("OPEN"));
    let orders = session
        .query("Order")
        .from_sql_raw("SELECT * FROM orders WHERE Status = :status ORDER BY Id", params)
        .to_list()
        .unwrap();
    assert_eq!(ids(&orders), vec![1, 3]);
    assert_eq!(
        orders[0].get("PlacedOn"),
        Value::from("2024-01-05").coerce(ScalarKind::Date).ok().as_ref()
    );
}

#[test]
fn test_untranslatable_filter_keeps_bound_values_aligned() {
    let session = session();
    let query = session
        .query("Order")
        .where_(col("Status").eq(param("s", "OPEN")))
        .where_(param("x", 1).eq(col("Nope")))
        .order_by(col("Id"));
    let compiled = query.compiled().unwrap();
    assert_eq!(compiled.params.len(), 1);
    assert!(compiled.sql.contains(r#"WHERE o0."Status" = :s AND 1=1"#));

    let orders = query.to_list().unwrap();
    assert_eq!(ids(&orders), vec![1, 3]);
}

#[test]
fn test_explicit_join_may_take_the_root_alias() {
    let session = session();
    let orders = session
        .query("Order")
        .join(JoinKind::Inner, "Customer", "o0", col("o0.Id").eq(col("CustomerId")))
        .where_(col("o0.Name").eq("Ann"))
        .order_by(col("Id"))
        .to_list()
        .unwrap();
    assert_eq!(ids(&orders), vec![1, 2]);
}

#[test]
fn test_execution_errors_carry_the_statement() {
    let session = session();
    let err = session
        .query("Order")
        .from_sql_raw("SELECT * FROM nowhere", Parameters::new())
        .to_list()
        .unwrap_err();
    match err {
        EagerError::Execution { message, sql } => {
            assert!(message.contains("nowhere"));
            assert_eq!(sql, "SELECT * FROM nowhere");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_usage_errors_surface_on_execution() {
    let session = session();
    let err = session.query("Order").then_include("Lines").to_list().unwrap_err();
    assert!(matches!(err, EagerError::InvalidUsage(_)));

    let err = session.query("Invoice").to_list().unwrap_err();
    assert!(matches!(err, EagerError::Metadata(_)));
}

#[test]
fn test_tracking_hook_sees_each_root_once() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let engine = setup_db();
    engine.execute_batch(common::SEED).unwrap();
    let session = Session::new(engine, registry()).with_tracker(move |_root: &Arc<Entity>| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    session.query("Order").include("Customer").to_list().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 4);

    session.query("Order").as_no_tracking().to_list().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 4);

    let quiet = session.with_options(SessionOptions::default().tracking(false));
    quiet.query("Order").to_list().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 4);
    quiet.query("Customer").as_tracking().to_list().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

#[test]
fn test_hints_reach_the_engine() {
    let session = session();
    let orders = session
        .query("Order")
        .optimizer_hint("no-op")
        .order_by(col("Id"))
        .to_list()
        .unwrap();
    assert_eq!(orders.len(), 4);

    let sql = session.query("Order").with_lock(LockMode::Update).to_sql().unwrap();
    assert!(!sql.contains("FOR UPDATE"));
}
