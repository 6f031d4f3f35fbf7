//! Core business logic, free of Discord types.
//!
//! The bot layer drives these modules; they talk back to Discord only through
//! the traits in [`surface`].

pub mod cache;
pub mod capper;
pub mod draft;
pub mod guild;
pub mod league;
pub mod odds;
pub mod paths;
pub mod placement;
pub mod reconcile;
pub mod resolver;
pub mod rollup;
pub mod schedule;
pub mod serial;
pub mod session;
pub mod settlement;
pub mod surface;
