use eagerload_types::{Dialect, ScalarKind, Value};

use super::*;
use crate::error::EagerError;
use crate::expr::{col, param};
use crate::metadata::{ColumnDescriptor, EntityDescriptor, MaskingRule, MetadataRegistry, NavigationDescriptor};
use crate::spec::{JoinKind, LockMode};

fn registry() -> MetadataRegistry {
    let registry = MetadataRegistry::new();
    registry.register_all([
        EntityDescriptor::builder("Order")
            .table("orders")
            .key("Id", ScalarKind::Integer)
            .field("CustomerId", ScalarKind::Integer)
            .optional("ShipperId", ScalarKind::Integer)
            .field("Status", ScalarKind::Text)
            .reference("Customer", "Customer")
            .reference("Shipper", "Shipper")
            .collection("Lines", "OrderLine")
            .navigation(NavigationDescriptor::collection("Tags", "Tag").through("OrderTag"))
            .build()
            .unwrap(),
        EntityDescriptor::builder("Customer")
            .table("customers")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .optional("CountryId", ScalarKind::Integer)
            .column(ColumnDescriptor::new("Email", ScalarKind::Text).masked(MaskingRule::new(1, 0)))
            .reference("Country", "Country")
            .collection("Orders", "Order")
            .build()
            .unwrap(),
        EntityDescriptor::builder("Country")
            .table("countries")
            .key("Id", ScalarKind::Integer)
            .field("Code", ScalarKind::Text)
            .build()
            .unwrap(),
        EntityDescriptor::builder("Shipper")
            .table("shippers")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .build()
            .unwrap(),
        EntityDescriptor::builder("OrderLine")
            .table("order_lines")
            .key("Id", ScalarKind::Integer)
            .field("OrderId", ScalarKind::Integer)
            .field("ProductId", ScalarKind::Integer)
            .field("Qty", ScalarKind::Integer)
            .reference("Product", "Product")
            .build()
            .unwrap(),
        EntityDescriptor::builder("Product")
            .table("products")
            .key("Id", ScalarKind::Integer)
            .field("Title", ScalarKind::Text)
            .build()
            .unwrap(),
        EntityDescriptor::builder("OrderTag")
            .table("order_tags")
            .key("Id", ScalarKind::Integer)
            .field("OrderId", ScalarKind::Integer)
            .field("TagId", ScalarKind::Integer)
            .reference("Tag", "Tag")
            .build()
            .unwrap(),
        EntityDescriptor::builder("Tag")
            .table("tags")
            .key("Id", ScalarKind::Integer)
            .field("Name", ScalarKind::Text)
            .build()
            .unwrap(),
    ]);
    registry
}

fn sqlite(spec: &QuerySpec) -> CompiledQuery {
    compile(spec, &registry(), EmitOptions::new(Dialect::SQLite)).unwrap()
}

const ORDER_COLUMNS: &str =
    r#"o0."Id" AS "Id", o0."CustomerId" AS "CustomerId", o0."ShipperId" AS "ShipperId", o0."Status" AS "Status""#;

#[test]
fn test_flat_query() {
    let spec = QuerySpec::new("Order")
        .where_(col("Status").eq("OPEN"))
        .order_by_desc(col("Id"))
        .skip(20)
        .take(10);
    let compiled = sqlite(&spec);
    assert_eq!(compiled.shape, QueryShape::Flat);
    assert_eq!(
        compiled.sql,
        format!(
            r#"SELECT {ORDER_COLUMNS} FROM "orders" AS o0 WHERE o0."Status" = 'OPEN' ORDER BY o0."Id" DESC LIMIT 10 OFFSET 20"#
        )
    );
    assert_eq!(compiled.plan.len(), 1);
    assert_eq!(compiled.plan.root().unwrap().key, "Id");
}

#[test]
fn test_filters_fold_left() {
    let spec = QuerySpec::new("Order")
        .where_(col("Status").eq("a"))
        .or_where(col("Status").eq("b"))
        .where_(col("Id").gt(3));
    assert!(sqlite(&spec).sql.ends_with(
        r#"WHERE (o0."Status" = 'a' OR o0."Status" = 'b') AND o0."Id" > 3"#
    ));
}

#[test]
fn test_untranslatable_filter_defaults_to_true() {
    let spec = QuerySpec::new("Order")
        .where_(col("Missing").eq(1))
        .where_(col("Status").eq("OPEN"));
    assert!(sqlite(&spec).sql.ends_with(r#"WHERE 1=1 AND o0."Status" = 'OPEN'"#));
}

#[test]
fn test_untranslatable_filter_releases_its_parameters() {
    let spec = QuerySpec::new("Order")
        .where_(col("Status").eq(param("s", "OPEN")))
        .where_(param("x", 1).eq(col("Nope")))
        .where_(col("Id").gt(param("min", 0)));
    let compiled = sqlite(&spec);
    assert!(compiled.sql.ends_with(r#"WHERE o0."Status" = :s AND 1=1 AND o0."Id" > :min"#));
    let names: Vec<&str> = compiled.params.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["s", "min"]);

    let pg = compile(&spec, &registry(), EmitOptions::new(Dialect::PostgreSQL)).unwrap();
    assert!(pg.sql.ends_with(r#"WHERE o0."Status" = $1 AND 1=1 AND o0."Id" > $2"#));
}

#[test]
fn test_dropped_order_key_releases_its_parameters() {
    let spec = QuerySpec::new("Order")
        .order_by(param("k", 1).eq(col("Nope")))
        .where_(col("Id").gt(param("min", 0)));
    let compiled = sqlite(&spec);
    assert_eq!(compiled.params.len(), 1);
    assert_eq!(compiled.params.get("min"), Some(&Value::Integer(0)));
    assert!(!compiled.sql.contains(":k"));
}

#[test]
fn test_parameters_are_named() {
    let spec = QuerySpec::new("Order").where_(col("Status").eq(param("status", "OPEN")));
    let compiled = sqlite(&spec);
    assert!(compiled.sql.ends_with(r#"WHERE o0."Status" = :status"#));
    assert_eq!(compiled.params.get("status"), Some(&Value::from("OPEN")));
}

#[test]
fn test_filtered_and_included_reference_joins_once() {
    let spec = QuerySpec::new("Order")
        .where_(col("Customer.Name").eq("Ann"))
        .include("Customer");
    let compiled = sqlite(&spec);
    assert_eq!(compiled.shape, QueryShape::Graph);
    assert_eq!(compiled.sql.matches(r#"JOIN "customers""#).count(), 1);
    assert!(compiled.sql.contains(r#"INNER JOIN "customers" AS c1 ON c1."Id" = o0."CustomerId""#));
    assert!(compiled.sql.contains(r#"WHERE c1."Name" = 'Ann') AS s"#));
    assert!(compiled.sql.ends_with(r#"ORDER BY s."Id", s."Id1""#));

    let root = compiled.plan.root().unwrap();
    assert_eq!(root.key, "s_Id");
    assert_eq!(root.references.len(), 1);
    let customer = compiled.plan.node(root.references[0].node).unwrap();
    assert_eq!(root.references[0].navigation, "Customer");
    assert_eq!(customer.key, "s_Id1");
    assert!(customer.columns.iter().any(|c| c.property == "Name" && c.source == "s_Name1"));
}

#[test]
fn test_filter_only_reference_is_not_materialized() {
    let spec = QuerySpec::new("Order").where_(col("Customer.Name").eq("Ann"));
    let compiled = sqlite(&spec);
    assert!(compiled.sql.contains(r#"INNER JOIN "customers" AS c1"#));
    assert!(compiled.plan.root().unwrap().references.is_empty());
}

#[test]
fn test_included_references_are_left_joined() {
    let spec = QuerySpec::new("Order")
        .include("Customer")
        .then_include("Country")
        .include("Shipper");
    let sql = sqlite(&spec).sql;
    assert!(sql.contains(r#"LEFT JOIN "customers" AS c1 ON c1."Id" = o0."CustomerId""#));
    assert!(sql.contains(r#"LEFT JOIN "countries" AS c2 ON c2."Id" = c1."CountryId""#));
    assert!(sql.contains(r#"LEFT JOIN "shippers" AS s3 ON s3."Id" = o0."ShipperId""#));
    assert!(sql.contains(r#"c2."Code" AS "Code2""#));
    assert!(sql.contains(r#"s3."Name" AS "Name3""#));
}

#[test]
fn test_filtered_reference_beside_collection_include() {
    let spec = QuerySpec::new("Customer")
        .where_(col("Country.Code").eq("NZ"))
        .include("Orders");
    let sql = sqlite(&spec).sql;
    assert!(sql.contains(r#"INNER JOIN "countries" AS c1 ON c1."Id" = c0."CountryId""#));
    assert!(sql.contains(r#"LEFT JOIN (SELECT o2."Id" AS "Id""#));
    assert!(sql.contains(r#") AS o2 ON o2."CustomerId" = s."Id""#));
}

#[test]
fn test_paged_collection_include() {
    let spec = QuerySpec::new("Order")
        .include("Lines")
        .then_include("Product")
        .order_by_desc(col("Status"))
        .take(5);
    let compiled = sqlite(&spec);

    let page = format!(
        r#"SELECT {ORDER_COLUMNS} FROM "orders" AS o0 ORDER BY o0."Status" DESC, o0."Id" LIMIT 5"#
    );
    let lines = concat!(
        r#"SELECT l1."Id" AS "Id", l1."OrderId" AS "OrderId", l1."ProductId" AS "ProductId", l1."Qty" AS "Qty", "#,
        r#"l1."Id" AS "Id0", p2."Id" AS "Id1", p2."Title" AS "Title1" "#,
        r#"FROM "order_lines" AS l1 INNER JOIN "products" AS p2 ON p2."Id" = l1."ProductId""#
    );
    let outer_columns = concat!(
        r#"s."Id" AS "s_Id", s."CustomerId" AS "s_CustomerId", s."ShipperId" AS "s_ShipperId", s."Status" AS "s_Status", "#,
        r#"l1."Id" AS "l1_Id", l1."OrderId" AS "l1_OrderId", l1."ProductId" AS "l1_ProductId", l1."Qty" AS "l1_Qty", "#,
        r#"l1."Id0" AS "l1_Id0", l1."Id1" AS "l1_Id1", l1."Title1" AS "l1_Title1""#
    );
    assert_eq!(
        compiled.sql,
        format!(
            r#"SELECT {outer_columns} FROM ({page}) AS s LEFT JOIN ({lines}) AS l1 ON l1."OrderId" = s."Id" ORDER BY s."Status" DESC, s."Id", l1."Id0""#
        )
    );

    let root = compiled.plan.root().unwrap();
    assert_eq!(root.collections.len(), 1);
    assert!(!root.collections[0].scoped);
    let line = compiled.plan.node(root.collections[0].node).unwrap();
    assert_eq!(line.key, "l1_Id0");
    assert_eq!(line.references[0].navigation, "Product");
    assert_eq!(compiled.plan.node(line.references[0].node).unwrap().key, "l1_Id1");
}

#[test]
fn test_join_entity_collection() {
    let compiled = sqlite(&QuerySpec::new("Order").include("Tags"));
    assert!(compiled.sql.contains(concat!(
        r#"(SELECT t1."Id" AS "Id", t1."Name" AS "Name", t1."Id" AS "Id0", "#,
        r#"o2."Id" AS "j_Id", o2."OrderId" AS "j_OrderId", o2."TagId" AS "j_TagId" "#,
        r#"FROM "order_tags" AS o2 INNER JOIN "tags" AS t1 ON t1."Id" = o2."TagId") AS t1 ON t1."j_OrderId" = s."Id""#
    )));

    let root = compiled.plan.root().unwrap();
    assert!(root.collections[0].scoped);
    let tag = compiled.plan.node(root.collections[0].node).unwrap();
    assert_eq!(tag.references[0].navigation, "OrderTag");
    assert_eq!(compiled.plan.node(tag.references[0].node).unwrap().key, "t1_j_Id");
}

#[test]
fn test_collection_under_reference_correlates_on_reference_key() {
    let compiled = sqlite(&QuerySpec::new("Order").include("Customer").then_include("Orders"));
    assert!(compiled.sql.contains(r#") AS o2 ON o2."CustomerId" = s."Id1""#));
    let root = compiled.plan.root().unwrap();
    let customer = compiled.plan.node(root.references[0].node).unwrap();
    assert_eq!(customer.collections[0].navigation, "Orders");
}

#[test]
fn test_masking_applies_unless_disabled() {
    let spec = QuerySpec::new("Customer").where_(col("Name").eq("Ann"));
    let masked = sqlite(&spec).sql;
    assert!(masked.contains(r#"CASE WHEN c0."Email" IS NULL THEN NULL"#));
    assert!(!masked.contains(r#"c0."Email" AS "Email""#));

    let plain = sqlite(&spec.clone().disable_sensitive()).sql;
    assert!(plain.contains(r#"c0."Email" AS "Email""#));

    let options = EmitOptions::new(Dialect::SQLite).masking(false);
    let plain = compile(&spec, &registry(), options).unwrap().sql;
    assert!(plain.contains(r#"c0."Email" AS "Email""#));
}

#[test]
fn test_unresolvable_include_is_skipped() {
    let compiled = sqlite(&QuerySpec::new("Order").include("Missing"));
    assert_eq!(compiled.shape, QueryShape::Flat);
}

#[test]
fn test_misuse_is_reported() {
    let spec = QuerySpec::new("Order").then_include("Customer");
    let err = compile(&spec, &registry(), EmitOptions::new(Dialect::SQLite)).unwrap_err();
    assert!(matches!(err, EagerError::InvalidUsage(_)));
}

#[test]
fn test_unknown_root_is_a_metadata_error() {
    let err = compile(&QuerySpec::new("Nope"), &registry(), EmitOptions::new(Dialect::SQLite)).unwrap_err();
    assert!(matches!(err, EagerError::Metadata(_)));
}

#[test]
fn test_projection_with_navigation() {
    let spec = QuerySpec::new("Order")
        .select_as(col("Customer.Name"), "name")
        .group_by(col("Customer.Name"));
    let compiled = sqlite(&spec);
    assert_eq!(compiled.shape, QueryShape::Projection);
    assert_eq!(
        compiled.sql,
        r#"SELECT c1."Name" AS "name" FROM "orders" AS o0 LEFT JOIN "customers" AS c1 ON c1."Id" = o0."CustomerId" GROUP BY c1."Name""#
    );
}

#[test]
fn test_count() {
    let spec = QuerySpec::new("Order").where_(col("Customer.Name").eq("Ann"));
    let compiled = compile_count(&spec, &registry(), EmitOptions::new(Dialect::SQLite)).unwrap();
    assert_eq!(
        compiled.sql,
        r#"SELECT COUNT(*) AS "count" FROM "orders" AS o0 INNER JOIN "customers" AS c1 ON c1."Id" = o0."CustomerId" WHERE c1."Name" = 'Ann'"#
    );
}

#[test]
fn test_raw_sql() {
    let mut params = Parameters::new();
    params.bind("id", Value::Integer(3));
    let spec = QuerySpec::new("Order").from_sql_raw("SELECT * FROM orders WHERE Id = :id", params.clone());

    let compiled = sqlite(&spec);
    assert_eq!(compiled.shape, QueryShape::Raw);
    assert_eq!(compiled.sql, "SELECT * FROM orders WHERE Id = :id");
    assert_eq!(compiled.params, params);

    let count = compile_count(&spec, &registry(), EmitOptions::new(Dialect::SQLite)).unwrap();
    assert_eq!(count.sql, r#"SELECT COUNT(*) AS "count" FROM (SELECT * FROM orders WHERE Id = :id) AS s"#);
}

#[test]
fn test_explicit_join() {
    let spec = QuerySpec::new("Order")
        .join(JoinKind::Inner, "Customer", "cu", col("cu.Id").eq(col("CustomerId")))
        .where_(col("cu.Name").eq("Ann"));
    let compiled = sqlite(&spec);
    assert_eq!(compiled.shape, QueryShape::Flat);
    assert!(compiled.sql.ends_with(
        r#"FROM "orders" AS o0 INNER JOIN "customers" AS cu ON cu."Id" = o0."CustomerId" WHERE cu."Name" = 'Ann'"#
    ));
}

#[test]
fn test_explicit_join_alias_never_shadows_the_root() {
    let spec = QuerySpec::new("Order").join(JoinKind::Inner, "Customer", "o0", col("o0.Id").eq(col("CustomerId")));
    let sql = sqlite(&spec).sql;
    assert!(sql.contains(r#"FROM "orders" AS o1 INNER JOIN "customers" AS o0 ON o0."Id" = o1."CustomerId""#));
}

#[test]
fn test_skip_without_take() {
    let spec = QuerySpec::new("Order").skip(5);
    assert!(sqlite(&spec).sql.ends_with("LIMIT -1 OFFSET 5"));
    let pg = compile(&spec, &registry(), EmitOptions::new(Dialect::PostgreSQL)).unwrap();
    assert!(pg.sql.ends_with(r#"FROM "orders" AS o0 OFFSET 5"#));
}

#[test]
fn test_hints() {
    let spec = QuerySpec::new("Order").use_index("ix_status").with_lock(LockMode::Update);
    let sql = sqlite(&spec).sql;
    assert!(sql.ends_with(r#"FROM "orders" AS o0 INDEXED BY "ix_status""#));

    let spec = QuerySpec::new("Order").timeout(100).with_lock(LockMode::Update);
    let mysql = compile(&spec, &registry(), EmitOptions::new(Dialect::MySQL)).unwrap().sql;
    assert!(mysql.starts_with("SELECT /*+ MAX_EXECUTION_TIME(100) */ o0.`Id` AS `Id`"));
    assert!(mysql.ends_with(" FOR UPDATE"));
}
