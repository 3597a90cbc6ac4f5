//! Global configuration (`spec.md` §6's `<configuration>` document):
//! recognised `<settings>`, `<environments>`, and the auto-mapping/unknown-
//! column policies those settings select.
//!
//! No teacher counterpart — `asphalt_core::connection::establish` takes a
//! backend-specific `Config` struct directly, with no settings layer above
//! it — so this is new ambient surface grounded directly in `spec.md` §6's
//! settings table, shaped as a plain struct-with-defaults the way the
//! teacher shapes `TransactionConfig` (`connection/transaction.rs`).

mod environment;
mod settings;

pub use environment::{DatabaseIdProvider, Environment};
pub use settings::{AutoMappingBehavior, ExecutorType, LocalCacheScope, Settings, UnknownColumnBehavior};
