//! Umbrella crate re-exporting the SQL mapping runtime.
//!
//! Application code typically depends on [`sqlmap_core`] directly along with
//! a backend crate (e.g. `sqlmap-postgres`); this crate exists so a single
//! dependency line pulls in the core engine, matching how the original
//! workspace exposed `asphalt-core` through its root package.

pub use sqlmap_core::*;
