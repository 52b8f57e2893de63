//! The executor must follow continuation tokens to exhaustion before
//! returning; a page is never surfaced while a token is outstanding.

mod common;

use anyhow::Result;
use common::*;
use keyplane::condition::Condition;
use keyplane_storage_memory::MemoryStore;

#[tokio::test]
async fn scan_follows_continuation_tokens() -> Result<()> {
    let (store, engine) = setup_with(MemoryStore::new().with_page_size(4));
    engine.write_many(&UserMapper, &users(10)).await?;

    let found = engine.fetch_many(&UserMapper, vec![Condition::eq("name", "User 9")]).await?;
    assert_eq!(found, vec![user(9)]);
    // 10 items at 4 per page: 3 scan requests before the result surfaces
    assert_eq!(store.call_counts().scan, 3);
    Ok(())
}

#[tokio::test]
async fn index_query_follows_continuation_tokens() -> Result<()> {
    let (store, engine) = setup_with(MemoryStore::new().with_page_size(2));
    engine.write_many(&UserMapper, &users(15)).await?;

    // org0 holds users 0, 3, 6, 9, 12 -> five matches at 2 per page
    let mut found = engine.fetch_many(&UserMapper, vec![Condition::eq("org_id", "org0")]).await?;
    found.sort_by_key(|u| u.created_at);
    assert_eq!(found, vec![user(0), user(3), user(6), user(9), user(12)]);
    assert_eq!(store.call_counts().query, 3);
    Ok(())
}

#[tokio::test]
async fn paged_results_are_complete_and_unduplicated() -> Result<()> {
    let (_store, engine) = setup_with(MemoryStore::new().with_page_size(3));
    engine.write_many(&UserMapper, &users(20)).await?;

    let mut found = engine.fetch_many(&UserMapper, vec![Condition::gte("created_at", 0i64)]).await?;
    found.sort_by_key(|u| u.created_at);
    assert_eq!(found, users(20));
    Ok(())
}
