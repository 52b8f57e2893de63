//! Chunk-shape scenarios: the engine must slice batches to the store's
//! ceilings (25 writes, 100 reads) by plain sequential slicing.

mod common;

use anyhow::Result;
use common::*;
use keyplane::condition::Condition;
use keyplane::value::Value;

#[tokio::test]
async fn fifty_five_writes_issue_three_chunk_requests() -> Result<()> {
    let (store, engine) = setup();

    let outcome = engine.write_many(&UserMapper, &users(55)).await?;
    assert_eq!(outcome.succeeded, 55);
    assert!(outcome.failed.is_empty());

    // ceil(55 / 25) = 3 requests: 25, 25, 5
    assert_eq!(store.call_counts().batch_write_item, 3);
    assert_eq!(store.items("users").len(), 55);
    Ok(())
}

#[tokio::test]
async fn chunk_boundaries_are_exact() -> Result<()> {
    let (store, engine) = setup();

    engine.write_many(&UserMapper, &users(25)).await?;
    assert_eq!(store.call_counts().batch_write_item, 1);

    engine.write_many(&UserMapper, &users(26)).await?;
    assert_eq!(store.call_counts().batch_write_item, 1 + 2);
    Ok(())
}

#[tokio::test]
async fn fetching_110_keys_issues_two_read_chunks() -> Result<()> {
    let (store, engine) = setup();
    engine.write_many(&UserMapper, &users(110)).await?;
    let writes = store.call_counts().batch_write_item;

    let ids: Vec<String> = (0..110).map(|n| format!("u{n:04}")).collect();
    let found = engine.fetch_many(&UserMapper, vec![Condition::one_of("id", ids)]).await?;

    assert_eq!(found.len(), 110);
    // ceil(110 / 100) = 2 requests: 100, 10
    assert_eq!(store.call_counts().batch_get_item, 2);
    assert_eq!(store.call_counts().batch_write_item, writes);
    Ok(())
}

#[tokio::test]
async fn chunked_writes_preserve_every_item() -> Result<()> {
    let (store, engine) = setup();
    let records = users(60);
    engine.write_many(&UserMapper, &records).await?;

    let stored = store.items("users");
    assert_eq!(stored.len(), 60);
    for record in &records {
        assert!(stored.iter().any(|item| item.get("id") == Some(&Value::String(record.id.clone()))), "missing {}", record.id);
    }
    Ok(())
}
