//! End-to-end condition handling: index selection, residual filtering, scan
//! degradation, and conditional deletes.

mod common;

use anyhow::Result;
use common::*;
use keyplane::condition::Condition;
use keyplane::error::RetrievalError;
use keyplane::store::ItemKey;

#[tokio::test]
async fn equality_on_indexed_field_uses_a_query_not_a_scan() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(10)).await?;

    let found = engine.fetch_many(&UserMapper, vec![Condition::eq("email", "user3@example.com")]).await?;
    assert_eq!(found, vec![user(3)]);
    assert_eq!(store.call_counts().query, 1);
    assert_eq!(store.call_counts().scan, 0);
    Ok(())
}

#[tokio::test]
async fn unindexed_conditions_degrade_to_a_filtered_scan() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(10)).await?;

    let found = engine.fetch_many(&UserMapper, vec![Condition::eq("name", "User 7")]).await?;
    assert_eq!(found, vec![user(7)]);
    assert_eq!(store.call_counts().scan, 1);
    assert_eq!(store.call_counts().query, 0);
    Ok(())
}

#[tokio::test]
async fn residual_conditions_filter_an_under_matched_index() -> Result<()> {
    // org-index covers org_id/created_at; the name condition must be
    // applied client-side on the query results
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(12)).await?;

    let found = engine
        .fetch_many(&UserMapper, vec![Condition::eq("org_id", "org1"), Condition::eq("name", "User 4")])
        .await?;
    assert_eq!(found, vec![user(4)]);
    assert_eq!(store.call_counts().query, 1);
    assert_eq!(store.call_counts().scan, 0);
    Ok(())
}

#[tokio::test]
async fn range_bound_on_index_sort_key_is_pushed_down() -> Result<()> {
    let (_store, engine) = setup();
    engine.write_many(&UserMapper, &users(12)).await?;

    // org1 holds users 1, 4, 7, 10 with created_at 1, 4, 7, 10
    let mut found = engine
        .fetch_many(&UserMapper, vec![Condition::eq("org_id", "org1"), Condition::gte("created_at", 5i64)])
        .await?;
    found.sort_by_key(|u| u.created_at);
    assert_eq!(found, vec![user(7), user(10)]);
    Ok(())
}

#[tokio::test]
async fn membership_fan_out_on_an_indexed_field() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(10)).await?;

    let mut found = engine
        .fetch_many(&UserMapper, vec![Condition::one_of("email", ["user2@example.com", "user6@example.com"])])
        .await?;
    found.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(found, vec![user(2), user(6)]);
    // one partition query per membership value
    assert_eq!(store.call_counts().query, 2);
    Ok(())
}

#[tokio::test]
async fn conflicting_range_directions_are_rejected() -> Result<()> {
    let (_store, engine) = setup();
    let err = engine
        .fetch_many(&UserMapper, vec![Condition::gt("created_at", 5i64), Condition::lt("created_at", 10i64)])
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    Ok(())
}

#[tokio::test]
async fn delete_many_removes_only_matching_records() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(9)).await?;

    // org0 holds users 0, 3, 6
    let outcome = engine.delete_many(&UserMapper, vec![Condition::eq("org_id", "org0")]).await?;
    assert_eq!(outcome.deleted_count, 3);
    assert!(outcome.failed_keys.is_empty());

    assert_eq!(store.items("users").len(), 6);
    let gone = engine.fetch_one(&UserMapper, ItemKey::new("id", "u0003")).await?;
    assert_eq!(gone, None);
    let kept = engine.fetch_one(&UserMapper, ItemKey::new("id", "u0004")).await?;
    assert_eq!(kept, Some(user(4)));
    Ok(())
}

#[tokio::test]
async fn delete_many_with_no_matches_deletes_nothing() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(4)).await?;
    let writes = store.call_counts().batch_write_item;

    let outcome = engine.delete_many(&UserMapper, vec![Condition::eq("email", "nobody@example.com")]).await?;
    assert_eq!(outcome.deleted_count, 0);
    assert!(outcome.failed_keys.is_empty());
    // zero matching items means zero delete requests
    assert_eq!(store.call_counts().batch_write_item, writes);
    Ok(())
}
