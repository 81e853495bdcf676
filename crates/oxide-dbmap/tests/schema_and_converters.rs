//! Table management and custom type conversion.

mod common;

use common::{mapper, pool, Invoice, Person};
use oxide_dbmap::{
    BoxError, CustomScanner, DbMap, DbMapError, SqlValue, SqliteDialect, TypeConverter, ValueType,
};

struct YesNo;

impl TypeConverter for YesNo {
    fn to_db(&self, value_type: &ValueType, value: SqlValue) -> Result<SqlValue, BoxError> {
        match (value_type.dereferenced(), value) {
            (ValueType::Bool, SqlValue::Bool(b)) => {
                Ok(SqlValue::Text(if b { "yes" } else { "no" }.into()))
            }
            (_, value) => Ok(value),
        }
    }

    fn from_db(&self, value_type: &ValueType) -> Option<CustomScanner> {
        if *value_type.dereferenced() != ValueType::Bool {
            return None;
        }
        Some(CustomScanner::new(|holder| match holder {
            SqlValue::Text(s) if s == "yes" => Ok(SqlValue::Bool(true)),
            SqlValue::Text(s) if s == "no" => Ok(SqlValue::Bool(false)),
            SqlValue::Text(s) => Err(format!("not a yes/no value: {s}").into()),
            other => Ok(other),
        }))
    }
}

#[tokio::test]
async fn test_converter_applies_both_ways() {
    let mut map = mapper();
    map.set_type_converter(YesNo);
    let mut pool = pool().await;
    map.create_tables(&mut pool).await.unwrap();

    let mut invoice = Invoice::new("converted", 1);
    invoice.is_paid = true;
    map.insert(&mut pool, &mut invoice).await.unwrap();

    let raw = map
        .select_str(&mut pool, "select is_paid from invoices", ())
        .await
        .unwrap();
    assert_eq!(raw, "yes");

    let stored: Invoice = map
        .get(&mut pool, &[invoice.id.into()])
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_paid);

    let selected: Vec<Invoice> = map
        .select(&mut pool, "select * from invoices", ())
        .await
        .unwrap();
    assert!(selected[0].is_paid);
}

#[tokio::test]
async fn test_converter_errors_name_the_field() {
    let mut map = mapper();
    map.set_type_converter(YesNo);
    let mut pool = pool().await;
    map.create_tables(&mut pool).await.unwrap();
    map.exec(
        &mut pool,
        "insert into invoices (version, memo, person_id, is_paid) values (1, 'bad', 1, 'maybe')",
        (),
    )
    .await
    .unwrap();

    let err = map
        .select::<Invoice, _>(&mut pool, "select * from invoices", ())
        .await
        .unwrap_err();
    assert!(matches!(err, DbMapError::TypeConverter { ref field, .. } if field == "is_paid"));
}

#[tokio::test]
async fn test_create_truncate_and_drop() {
    let map = mapper();
    let mut pool = pool().await;
    map.create_tables_if_not_exists(&mut pool).await.unwrap();
    map.create_tables_if_not_exists(&mut pool).await.unwrap();
    assert!(map.create_tables(&mut pool).await.is_err());

    map.insert(&mut pool, &mut Invoice::new("temp", 1)).await.unwrap();
    map.truncate_tables(&mut pool).await.unwrap();
    let count = map
        .select_int(&mut pool, "select count(*) from invoices", ())
        .await
        .unwrap();
    assert_eq!(count, 0);

    map.drop_table::<Person, _>(&mut pool).await.unwrap();
    map.drop_tables_if_exists(&mut pool).await.unwrap();
    let tables = map
        .select_int(
            &mut pool,
            "select count(*) from sqlite_master where type = 'table' and name = 'invoices'",
            (),
        )
        .await
        .unwrap();
    assert_eq!(tables, 0);
    assert!(map.drop_tables(&mut pool).await.is_err());
}

#[tokio::test]
async fn test_indexes() {
    let mut map = mapper();
    map.table_mut::<Invoice>()
        .unwrap()
        .add_index("idx_invoices_memo", None, &["memo"])
        .unwrap()
        .set_unique(false);
    let mut pool = pool().await;
    map.create_tables(&mut pool).await.unwrap();
    map.create_indexes(&mut pool).await.unwrap();

    let index_count =
        "select count(*) from sqlite_master where type = 'index' and name = 'idx_invoices_memo'";
    assert_eq!(map.select_int(&mut pool, index_count, ()).await.unwrap(), 1);

    map.drop_index::<Invoice, _>(&mut pool, "idx_invoices_memo")
        .await
        .unwrap();
    assert_eq!(map.select_int(&mut pool, index_count, ()).await.unwrap(), 0);
    assert!(map
        .drop_index::<Invoice, _>(&mut pool, "unknown")
        .await
        .is_err());
}

#[tokio::test]
async fn test_unique_together_is_enforced() {
    let mut map = mapper();
    map.table_mut::<Invoice>()
        .unwrap()
        .set_unique_together(&["memo", "person_id"])
        .unwrap();
    let mut pool = pool().await;
    map.create_tables(&mut pool).await.unwrap();

    map.insert(&mut pool, &mut Invoice::new("dup", 1)).await.unwrap();
    let err = map
        .insert(&mut pool, &mut Invoice::new("dup", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DbMapError::Database(_)));
}

#[tokio::test]
async fn test_drop_unregistered_table() {
    let map = DbMap::new(SqliteDialect::new());
    let mut pool = pool().await;
    let err = map
        .drop_table_if_exists::<Invoice, _>(&mut pool)
        .await
        .unwrap_err();
    assert!(err.is_non_fatal());
}
