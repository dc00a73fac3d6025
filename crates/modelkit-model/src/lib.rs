//! Records and persistence operations for modelkit.
//!
//! `modelkit-model` is the **write path** of the workspace. It turns compiled
//! descriptors into live records and drives the query layer to persist them.
//!
//! # Role In The Architecture
//!
//! - **Records**: `Record` holds assigned values, the origin snapshot read
//!   from storage, one-shot raw SQL overrides and the known existence state.
//! - **Save data**: `SaveDataCompiler` selects, fills and coerces the columns
//!   of one insert, update or save, including timestamps, generated ids and
//!   incremental diffing.
//! - **Policies**: `CoercionSet`, `GeneratorRegistry`, `Clock` and
//!   `SoftDeletePolicy` are injected into `Orm` through `OrmBuilder`.
//! - **Collaborators**: `RelationRegistry` is notified around writes;
//!   `EventBus` dispatches lifecycle events to listeners.
//! - **Operations**: `Orm` exposes insert, update, save, delete, the
//!   soft-delete variants and the read side over one `Connection`.

pub mod coerce;
pub mod events;
pub mod generator;
pub mod persistence;
pub mod record;
pub mod relation;
pub mod save_data;
pub mod soft_delete;
pub mod timestamp;

#[cfg(test)]
mod fixtures;

pub use coerce::{CoercionSet, DelimitedCoercion, JsonCoercion, ValueCoercion};
pub use events::{EventBus, EventContext, Listener, ModelEvent};
pub use generator::{GeneratorRegistry, IdGenerator, UuidGenerator};
pub use persistence::{ModelRef, Orm, OrmBuilder};
pub use record::{Existence, Record};
pub use relation::{NoRelations, RelationCatalogAdapter, RelationRegistry};
pub use save_data::{Operation, SaveDataCompiler};
pub use soft_delete::{SoftDeletePolicy, UnixSeconds, deleted_condition, live_condition};
pub use timestamp::{Clock, FixedClock, SystemClock, format_timestamp};
