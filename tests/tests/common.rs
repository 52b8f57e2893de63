//! Shared fixtures: a `users` record type with two secondary indexes, its
//! mapper, and an engine wired to a `MemoryStore` with a no-op sleeper so
//! retry paths run instantly.

use async_trait::async_trait;
use keyplane::engine::{Engine, EngineConfig};
use keyplane::error::MappingError;
use keyplane::materialize::RecordMapper;
use keyplane::retry::Sleeper;
use keyplane::schema::{Catalog, IndexDescriptor, KeySchema, Projection, SchemaDescriptor};
use keyplane::store::RawItem;
use keyplane::value::Value;
use keyplane_storage_memory::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub org_id: String,
    pub created_at: i64,
    pub name: String,
}

pub fn user(n: usize) -> User {
    User {
        id: format!("u{n:04}"),
        email: format!("user{n}@example.com"),
        org_id: format!("org{}", n % 3),
        created_at: n as i64,
        name: format!("User {n}"),
    }
}

pub fn users(count: usize) -> Vec<User> { (0..count).map(user).collect() }

pub struct UserMapper;

impl RecordMapper for UserMapper {
    type Record = User;

    fn record_type(&self) -> &str { "users" }

    fn to_raw_item(&self, record: &User) -> Result<RawItem, MappingError> {
        let mut item = RawItem::new();
        item.insert("id".into(), Value::String(record.id.clone()));
        item.insert("email".into(), Value::String(record.email.clone()));
        item.insert("org_id".into(), Value::String(record.org_id.clone()));
        item.insert("created_at".into(), Value::I64(record.created_at));
        item.insert("name".into(), Value::String(record.name.clone()));
        Ok(item)
    }

    fn from_raw_item(&self, item: &RawItem) -> Result<User, MappingError> {
        Ok(User {
            id: string_field(item, "id")?,
            email: string_field(item, "email")?,
            org_id: string_field(item, "org_id")?,
            created_at: i64_field(item, "created_at")?,
            name: string_field(item, "name")?,
        })
    }
}

fn string_field(item: &RawItem, field: &str) -> Result<String, MappingError> {
    match item.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(MappingError::InvalidType { field: field.into(), expected: "String".into(), given: format!("{other}") }),
        None => Err(MappingError::MissingField(field.into())),
    }
}

fn i64_field(item: &RawItem, field: &str) -> Result<i64, MappingError> {
    match item.get(field) {
        Some(Value::I64(n)) => Ok(*n),
        Some(other) => Err(MappingError::InvalidType { field: field.into(), expected: "I64".into(), given: format!("{other}") }),
        None => Err(MappingError::MissingField(field.into())),
    }
}

pub fn users_schema() -> SchemaDescriptor {
    SchemaDescriptor::new("users", ["id", "email", "org_id", "created_at", "name"], KeySchema::hash("id"))
        .with_index(IndexDescriptor::new("email-index", KeySchema::hash("email"), Projection::All))
        .with_index(IndexDescriptor::new("org-index", KeySchema::hash_range("org_id", "created_at"), Projection::All))
}

/// Sleeper that returns immediately; retry loops still count attempts.
pub struct NullSleeper;

#[async_trait]
impl Sleeper for NullSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

pub fn catalog() -> Arc<Catalog> {
    let mut catalog = Catalog::new();
    catalog.register(users_schema()).unwrap();
    Arc::new(catalog)
}

/// A fresh engine over a fresh store, retries instant.
pub fn setup() -> (Arc<MemoryStore>, Engine) {
    setup_with(MemoryStore::new())
}

pub fn setup_with(store: MemoryStore) -> (Arc<MemoryStore>, Engine) {
    init_tracing();
    store.create_table("users", KeySchema::hash("id"));
    let store = Arc::new(store);
    let config = EngineConfig { sleeper: Arc::new(NullSleeper), ..Default::default() };
    let engine = Engine::with_config(catalog(), store.clone(), config);
    (store, engine)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).with_test_writer().try_init();
}
