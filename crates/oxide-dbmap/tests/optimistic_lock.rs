//! Version-column conflicts.

mod common;

use common::{setup, Invoice};
use oxide_dbmap::DbMapError;

#[tokio::test]
async fn test_stale_update_is_rejected() {
    let (map, mut pool) = setup().await;
    let mut invoice = Invoice::new("shared", 1);
    map.insert(&mut pool, &mut invoice).await.unwrap();
    let mut stale = invoice.clone();

    invoice.memo = "winner".into();
    map.update(&mut pool, &mut invoice).await.unwrap();

    stale.memo = "loser".into();
    let err = map.update(&mut pool, &mut stale).await.unwrap_err();
    let conflict = match err {
        DbMapError::OptimisticLock(conflict) => conflict,
        other => panic!("expected optimistic lock error, got {other:?}"),
    };
    assert!(conflict.row_exists);
    assert_eq!(conflict.local_version, 1);
    assert_eq!(conflict.table, "invoices");
    assert_eq!(stale.version, 1);

    let stored: Invoice = map
        .get(&mut pool, &[invoice.id.into()])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.memo, "winner");
}

#[tokio::test]
async fn test_stale_delete_is_rejected() {
    let (map, mut pool) = setup().await;
    let mut invoice = Invoice::new("shared", 1);
    map.insert(&mut pool, &mut invoice).await.unwrap();
    let mut stale = invoice.clone();
    map.update(&mut pool, &mut invoice).await.unwrap();

    let err = map.delete(&mut pool, &mut stale).await.unwrap_err();
    assert!(matches!(err, DbMapError::OptimisticLock(ref c) if c.row_exists));
}

#[tokio::test]
async fn test_update_of_deleted_row() {
    let (map, mut pool) = setup().await;
    let mut invoice = Invoice::new("short lived", 1);
    map.insert(&mut pool, &mut invoice).await.unwrap();
    let mut copy = invoice.clone();
    map.delete(&mut pool, &mut invoice).await.unwrap();

    let err = map.update(&mut pool, &mut copy).await.unwrap_err();
    let conflict = match err {
        DbMapError::OptimisticLock(conflict) => conflict,
        other => panic!("expected optimistic lock error, got {other:?}"),
    };
    assert!(!conflict.row_exists);
    assert!(conflict.to_string().contains("row no longer exists"));
}

#[tokio::test]
async fn test_sequential_updates_keep_succeeding() {
    let (map, mut pool) = setup().await;
    let mut invoice = Invoice::new("v", 1);
    map.insert(&mut pool, &mut invoice).await.unwrap();
    for expected in 2..=5 {
        map.update(&mut pool, &mut invoice).await.unwrap();
        assert_eq!(invoice.version, expected);
    }
}
