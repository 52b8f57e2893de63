mod common;

use anyhow::Result;
use common::*;
use keyplane::condition::Condition;
use keyplane::store::ItemKey;

#[tokio::test]
async fn write_then_fetch_one() -> Result<()> {
    let (_store, engine) = setup();

    let records = users(3);
    let outcome = engine.write_many(&UserMapper, &records).await?;
    assert_eq!(outcome.succeeded, 3);
    assert!(outcome.failed.is_empty());

    let found = engine.fetch_one(&UserMapper, ItemKey::new("id", "u0001")).await?;
    assert_eq!(found, Some(user(1)));

    let missing = engine.fetch_one(&UserMapper, ItemKey::new("id", "nope")).await?;
    assert_eq!(missing, None);
    Ok(())
}

#[tokio::test]
async fn fetch_many_by_primary_key_membership() -> Result<()> {
    let (_store, engine) = setup();
    engine.write_many(&UserMapper, &users(5)).await?;

    let mut found = engine
        .fetch_many(&UserMapper, vec![Condition::one_of("id", ["u0001", "u0003", "u0004"])])
        .await?;
    found.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(found, vec![user(1), user(3), user(4)]);
    Ok(())
}

#[tokio::test]
async fn empty_write_is_immediate_success_with_no_store_calls() -> Result<()> {
    let (store, engine) = setup();

    let outcome = engine.write_many(&UserMapper, &[]).await?;
    assert_eq!(outcome.succeeded, 0);
    assert!(outcome.failed.is_empty());
    assert_eq!(store.call_counts().batch_write_item, 0);
    assert_eq!(store.call_counts().put_item, 0);
    Ok(())
}

#[tokio::test]
async fn rewriting_the_same_records_succeeds_again() -> Result<()> {
    // puts overwrite by key, so write_many is idempotent
    let (store, engine) = setup();
    let records = users(10);

    let first = engine.write_many(&UserMapper, &records).await?;
    assert_eq!(first.succeeded, 10);
    assert!(first.failed.is_empty());

    let second = engine.write_many(&UserMapper, &records).await?;
    assert_eq!(second.succeeded, 10);
    assert!(second.failed.is_empty());

    assert_eq!(store.items("users").len(), 10);
    Ok(())
}

#[tokio::test]
async fn unknown_record_type_is_a_caller_error() -> Result<()> {
    let (_store, engine) = setup();

    struct GhostMapper;
    impl keyplane::materialize::RecordMapper for GhostMapper {
        type Record = ();
        fn record_type(&self) -> &str { "ghosts" }
        fn to_raw_item(&self, _: &()) -> Result<keyplane::store::RawItem, keyplane::error::MappingError> {
            Ok(keyplane::store::RawItem::new())
        }
        fn from_raw_item(&self, _: &keyplane::store::RawItem) -> Result<(), keyplane::error::MappingError> { Ok(()) }
    }

    let err = engine.fetch_many(&GhostMapper, vec![]).await.unwrap_err();
    assert!(matches!(err, keyplane::error::RetrievalError::UnknownRecordType(name) if name == "ghosts"));
    Ok(())
}
