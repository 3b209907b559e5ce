//! Epistemic self-awareness for AI coding agents.
//!
//! Noetic keeps what an agent learned, what it is unsure about and what it
//! already tried across sessions, and turns those breadcrumbs into a
//! recommendation at the start of the next session.
//!
//! | Breadcrumb | Meaning | Lifecycle |
//! |------------|---------|-----------|
//! | **Finding** | A discovered fact | Decays with a 14-day half-life until verified |
//! | **Unknown** | An open question | Open until resolved |
//! | **Dead end** | An approach that failed | Immutable |
//! | **Mistake** | An error and its root cause | Immutable |
//!
//! # Architecture
//!
//! - **Storage**: a single SQLite file per user, one connection per invocation
//! - **Engine**: pure functions over breadcrumbs and timestamps; file-change
//!   state is gathered up front by shelling out to `git hash-object`
//! - **Interface**: a CLI that prints JSON by default and text with `--text`
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: database initialization, schema, migrations and health checks
//! - [`model`]: entity types and the 13-dimension vector model
//! - [`store`]: parameterized CRUD over the entities
//! - [`engine`]: decay, state synthesis, guidance and fuzzy search
//! - [`active`]: the active-session file shared between invocations
//! - [`cli`]: subcommand implementations

pub mod active;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod git;
pub mod model;
pub mod store;
