//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions that are not slash
//! commands: autocomplete and outcome reactions on wager cards.

/// Autocomplete handlers for wager serials and leagues
pub mod autocomplete;
/// Gateway reaction events turned into resolution signals
pub mod reactions;
