//! Runtime for externally-declared, parameterized SQL statements: dynamic
//! SQL rendering, typed interface-based invocation, result mapping, second
//! level caching, and key generation.
//!
//! Grounded in `asphalt_core`, whose connection/transaction/error layering
//! this crate keeps; the statement-execution side is rebuilt around a
//! runtime, string-addressed catalogue instead of `asphalt_core`'s
//! compile-time-typed query DSL, since mapped statements here are parsed
//! from XML documents rather than resolved by the Rust type checker.

/// Traits and types related to database backends.
pub mod backend;
/// Traits and types related to database connections.
pub mod connection;
/// Second level (and session-local) statement result caching.
pub mod cache;
/// Global configuration: settings, environments, and the mapper document
/// reader.
pub mod config;
/// The mapper-document compiler: turns XML into a populated [`Configuration`].
pub mod compiler;
/// The central catalogue of compiled statements, result maps, and caches.
pub mod catalogue;
/// Database type tags.
pub mod dbtype;
/// Dynamic SQL: the `<if>`/`<choose>`/`<foreach>`/... AST, its expression
/// engine, and the `#{...}`/`${...}` rewriters.
pub mod dynamic_sql;
/// Errors.
pub mod error;
/// The statement-execution core: executors, key generators.
pub mod executor;
/// Mapped statements, parameter mappings, result maps, bound SQL.
pub mod mapping;
/// Reflective property access over [`Value`] trees.
pub mod reflect;
/// Result-set materialization: discriminator dispatch, object
/// instantiation, nested result composition, lazy loading.
pub mod result;
/// The SQL session facade and typed mapper binding.
pub mod session;
pub mod binding;
/// ANSI transaction-manager implementation.
pub mod sql;
/// TypeHandler registry.
pub mod type_handler;
/// The dynamic value representation used throughout the runtime.
pub mod value;

pub use catalogue::Configuration;
pub use error::{Error, Result};
pub use session::SqlSession;
pub use value::Value;
