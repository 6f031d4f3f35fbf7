//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Interactive bet slip
pub mod bet;

/// General utility commands
pub mod general;

/// Guild configuration commands (administrators only)
pub mod settings;

/// Capper record and leaderboard
pub mod stats;

/// Pending wager listing and cancellation
pub mod wagers;

// Export commands
pub use bet::*;
pub use general::*;
pub use settings::*;
pub use stats::*;
pub use wagers::*;
