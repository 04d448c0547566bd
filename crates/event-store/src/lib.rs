//! Change-event store
//!
//! The canonical `ChangeEvent` record that every connector source is
//! normalized into, plus the idempotent persistence contract connectors
//! write through.
//!
//! # Example
//!
//! ```no_run
//! use event_store::{ChangeEventStore, InsertOutcome, MemoryEventStore};
//!
//! # async fn example(event: event_store::ChangeEvent) -> Result<(), event_store::StoreError> {
//! let store = MemoryEventStore::new();
//!
//! // Duplicate deliveries of the same external id collapse to one record.
//! if !store.exists_by_external_id(event.connection_id, &event.external_id).await? {
//!     match store.insert(event).await? {
//!         InsertOutcome::Inserted => println!("stored"),
//!         InsertOutcome::AlreadyExists => println!("lost the race, skipped"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//!
//! `insert` carries conflict-ignore semantics: the store treats
//! `(connection_id, external_id)` as a uniqueness constraint and reports a
//! duplicate as `InsertOutcome::AlreadyExists` rather than an error. Events
//! are immutable once stored; there is no update path.

pub mod error;
pub mod memory;
pub mod models;
#[path = "trait.rs"]
pub mod store_trait;

pub use error::StoreError;
pub use memory::MemoryEventStore;
pub use models::ChangeEvent;
pub use store_trait::{ChangeEventStore, InsertOutcome};
