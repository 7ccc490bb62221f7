#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use std::sync::Arc;

use eagerload::prelude::*;
use eagerload::sqlite::RusqliteEngine;

pub const SCHEMA: &str = "
CREATE TABLE countries (Id INTEGER PRIMARY KEY, Code TEXT NOT NULL);
CREATE TABLE customers (
    Id INTEGER PRIMARY KEY,
    Name TEXT NOT NULL,
    CountryId INTEGER REFERENCES countries(Id),
    Email TEXT,
    Phone TEXT
);
CREATE TABLE shippers (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL);
CREATE TABLE orders (
    Id INTEGER PRIMARY KEY,
    CustomerId INTEGER NOT NULL REFERENCES customers(Id),
    ShipperId INTEGER REFERENCES shippers(Id),
    Status TEXT NOT NULL,
    PlacedOn TEXT NOT NULL
);
CREATE TABLE products (Id INTEGER PRIMARY KEY, Title TEXT NOT NULL, Price REAL NOT NULL);
CREATE TABLE order_lines (
    Id INTEGER PRIMARY KEY,
    OrderId INTEGER NOT NULL REFERENCES orders(Id),
    ProductId INTEGER NOT NULL REFERENCES products(Id),
    Qty INTEGER NOT NULL
);
CREATE TABLE tags (Id INTEGER PRIMARY KEY, Name TEXT NOT NULL);
CREATE TABLE order_tags (
    Id INTEGER PRIMARY KEY,
    OrderId INTEGER NOT NULL REFERENCES orders(Id),
    TagId INTEGER NOT NULL REFERENCES tags(Id)
);
";

pub const SEED: &str = "
INSERT INTO countries VALUES (1, 'NO'), (2, 'SE');
INSERT INTO customers VALUES
    (1, 'Ann', 1, 'ann@example.com', '1234567890'),
    (2, 'Bob', NULL, 'bob@example.com', NULL),
    (3, 'Cid', 2, NULL, NULL);
INSERT INTO shippers VALUES (1, 'Post');
INSERT INTO orders VALUES
    (1, 1, 1, 'OPEN', '2024-01-05'),
    (2, 1, NULL, 'SHIPPED', '2024-02-10'),
    (3, 2, 1, 'OPEN', '2024-03-15'),
    (4, 3, NULL, 'CANCELLED', '2024-04-20');
INSERT INTO products VALUES (1, 'Pen', 1.5), (2, 'Ink', 4.0), (3, 'Pad', 2.25);
INSERT INTO order_lines VALUES
    (1, 1, 1, 2),
    (2, 1, 2, 1),
    (3, 2, 1, 5),
    (4, 3, 3, 1),
    (5, 3, 1, 3);
INSERT INTO tags VALUES (1, 'gift'), (2, 'rush');
INSERT INTO order_tags VALUES (1, 1, 1), (2, 1, 2), (3, 3, 1);
";

/// Masks everything but the first character of an email.
pub fn email_mask() -> MaskingRule {
    MaskingRule::new(1, 0)
}

/// Keeps the first two and last two digits of a phone number.
pub fn phone_mask() -> MaskingRule {
    MaskingRule::new(2, 2)
}

pub fn registry() -> Arc<MetadataRegistry> {
    let registry = MetadataRegistry::new();
    let entities = [
        EntityDescriptor::builder("Country")
            .table("countries")
            .key("Id", ScalarKind::Integer)
            .field("Code", ScalarKind::Text)
            .build(),
        EntityDescriptor::builder("Customer")
            .table("customers")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .optional("CountryId", ScalarKind::Integer)
            .column(
                ColumnDescriptor::new("Email", ScalarKind::Text)
                    .nullable()
                    .masked(email_mask()),
            )
            .column(
                ColumnDescriptor::new("Phone", ScalarKind::Text)
                    .nullable()
                    .masked(phone_mask()),
            )
            .reference("Country", "Country")
            .collection("Orders", "Order")
            .build(),
        EntityDescriptor::builder("Shipper")
            .table("shippers")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .build(),
        EntityDescriptor::builder("Order")
            .table("orders")
            .key("Id", ScalarKind::Integer)
            .field("CustomerId", ScalarKind::Integer)
            .optional("ShipperId", ScalarKind::Integer)
            .field("Status", ScalarKind::Text)
            .field("PlacedOn", ScalarKind::Date)
            .reference("Customer", "Customer")
            .reference("Shipper", "Shipper")
            .collection("Lines", "OrderLine")
            .navigation(NavigationDescriptor::collection("Tags", "Tag").through("OrderTag"))
            .build(),
        EntityDescriptor::builder("Product")
            .table("products")
            .key("Id", ScalarKind::Integer)
            .field("Title", ScalarKind::Text)
            .field("Price", ScalarKind::Real)
            .build(),
        EntityDescriptor::builder("OrderLine")
            .table("order_lines")
            .key("Id", ScalarKind::Integer)
            .field("OrderId", ScalarKind::Integer)
            .field("ProductId", ScalarKind::Integer)
            .field("Qty", ScalarKind::Integer)
            .reference("Product", "Product")
            .build(),
        EntityDescriptor::builder("Tag")
            .table("tags")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .build(),
        EntityDescriptor::builder("OrderTag")
            .table("order_tags")
            .key("Id", ScalarKind::Integer)
            .field("OrderId", ScalarKind::Integer)
            .field("TagId", ScalarKind::Integer)
            .reference("Tag", "Tag")
            .build(),
    ];
    for entity in entities {
        registry.register(entity.expect("valid descriptor"));
    }
    Arc::new(registry)
}

/// An in-memory database with the shop schema, empty.
pub fn setup_db() -> RusqliteEngine {
    let engine = RusqliteEngine::open_in_memory().expect("Failed to create in-memory database");
    engine.execute_batch(SCHEMA).expect("Failed to create tables");
    engine
}

/// A session over the seeded shop database.
pub fn session() -> Session<RusqliteEngine> {
    let engine = setup_db();
    engine.execute_batch(SEED).expect("Failed to seed");
    Session::new(engine, registry())
}

pub fn ids(entities: &[Arc<Entity>]) -> Vec<i64> {
    entities
        .iter()
        .filter_map(|e| e.get("Id").and_then(Value::as_i64))
        .collect()
}
