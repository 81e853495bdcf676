//! Transactions and savepoints.

mod common;

use common::{setup, Invoice};
use oxide_dbmap::{DbMapError, TransactionState};

#[tokio::test]
async fn test_commit_persists_and_closes() {
    let (map, mut pool) = setup().await;
    let mut tx = map.begin(&pool).await.unwrap();
    let mut invoice = Invoice::new("in tx", 1);
    tx.insert(&mut invoice).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Committed);

    assert!(matches!(tx.commit().await, Err(DbMapError::TransactionClosed)));
    assert!(matches!(tx.rollback().await, Err(DbMapError::TransactionClosed)));
    assert!(matches!(
        tx.insert(&mut Invoice::new("late", 1)).await,
        Err(DbMapError::TransactionClosed)
    ));
    assert!(matches!(
        map.select_int(&mut tx, "select 1", ()).await,
        Err(DbMapError::TransactionClosed)
    ));
    drop(tx);

    let stored: Option<Invoice> = map.get(&mut pool, &[invoice.id.into()]).await.unwrap();
    assert_eq!(stored, Some(invoice));
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    let (map, mut pool) = setup().await;
    let mut tx = map.begin(&pool).await.unwrap();
    map.insert(&mut tx, &mut Invoice::new("discarded", 1))
        .await
        .unwrap();
    assert_eq!(tx.select_int("select count(*) from invoices", ()).await.unwrap(), 1);
    tx.rollback().await.unwrap();
    assert!(!tx.is_open());
    assert!(matches!(
        tx.savepoint("late").await,
        Err(DbMapError::TransactionClosed)
    ));
    drop(tx);

    let count = map
        .select_int(&mut pool, "select count(*) from invoices", ())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_rollback_to_savepoint() {
    let (map, mut pool) = setup().await;
    let mut tx = map.begin(&pool).await.unwrap();
    tx.insert(&mut Invoice::new("kept", 1)).await.unwrap();
    tx.savepoint("before_second").await.unwrap();
    tx.insert(&mut Invoice::new("undone", 1)).await.unwrap();
    tx.rollback_to_savepoint("before_second").await.unwrap();
    tx.release_savepoint("before_second").await.unwrap();
    tx.commit().await.unwrap();
    drop(tx);

    let memos: Vec<String> = map
        .select_values(&mut pool, "select memo from invoices", ())
        .await
        .unwrap();
    assert_eq!(memos, vec!["kept"]);
}

#[tokio::test]
async fn test_update_and_get_inside_transaction() {
    let (map, mut pool) = setup().await;
    let mut invoice = Invoice::new("before", 1);
    map.insert(&mut pool, &mut invoice).await.unwrap();

    let mut tx = map.begin(&pool).await.unwrap();
    invoice.memo = "after".into();
    tx.update(&mut invoice).await.unwrap();
    let seen: Invoice = tx.get(&[invoice.id.into()]).await.unwrap().unwrap();
    assert_eq!(seen.memo, "after");
    tx.commit().await.unwrap();
}
