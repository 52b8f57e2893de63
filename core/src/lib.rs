pub mod chunk;
pub mod condition;
pub mod engine;
pub mod error;
pub mod executor;
pub mod materialize;
pub mod plan;
pub mod retry;
pub mod schema;
pub mod store;
pub mod value;

pub use condition::{Comparison, Condition, ConditionSet};
pub use engine::{DeleteOutcome, Engine, EngineConfig};
pub use error::{MappingError, MutationError, PlanError, RetrievalError, StoreError};
pub use executor::{Executor, ReadOutcome, WriteOutcome};
pub use materialize::RecordMapper;
pub use plan::{plan_access, AccessPlan, QuerySpec};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use schema::{Catalog, IndexDescriptor, KeySchema, Projection, SchemaDescriptor};
pub use store::{ItemKey, RawItem, StoreClient, StoreLimits, WriteOp};
pub use value::{Value, ValueType};
