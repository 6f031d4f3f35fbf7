//! Unified error type for the capper bot.
//!
//! Every failure the core can report is one of these variants. Collaborator
//! errors (Discord, the notification surface) are translated into them at the
//! core boundary, and [`Error::user_message`] gives the short text shown to
//! users while the full error is only logged.

use thiserror::Error;

/// Broad classification of an [`Error`], used to decide how a failure is
/// reported and whether it is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad user input; re-prompting fixes it.
    Input,
    /// Someone acted on a session or wager that isn't theirs.
    Authorization,
    /// Missing permission or missing guild configuration.
    Resource,
    /// Database or transport failure.
    Persistence,
    /// Deployment defect, e.g. a league with no path handler.
    Configuration,
}

/// All errors produced by the bot.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Serenity/Poise framework error: {0}")]
    FrameworkError(Box<poise::serenity_prelude::Error>),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid odds: {value}")]
    InvalidOdds { value: String },

    #[error("Invalid units: {units} (allowed {min}-{max})")]
    InvalidUnits { units: i64, min: u8, max: u8 },

    #[error("Unsupported league: {code}")]
    UnsupportedLeague { code: String },

    #[error("Unknown sub-league {code} for {league}")]
    UnsupportedSubLeague { league: String, code: String },

    #[error("Bet type not yet available: {bet_type}")]
    BetTypeUnavailable { bet_type: String },

    #[error("Unknown bet path {path} for {league}")]
    UnknownPath { league: String, path: String },

    #[error("No path handler registered for league {league}")]
    MissingPathHandler { league: String },

    #[error("Draft is not ready to {action}")]
    DraftNotReady { action: &'static str },

    #[error("Bet slip session {session_id} not found")]
    SessionNotFound { session_id: u64 },

    #[error("User {user_id} does not own this bet slip")]
    NotSessionOwner { user_id: String },

    #[error("Channel {channel_id} is not configured for bets")]
    ChannelNotAllowed { channel_id: String },

    #[error("Missing permission: {permission}")]
    MissingPermission { permission: String },

    #[error("Wager {serial} not found")]
    WagerNotFound { serial: i64 },

    #[error("Wager {serial} is already resolved")]
    AlreadyResolved { serial: i64 },

    #[error("User {user_id} may not cancel wager {serial}")]
    NotWagerOwner { serial: i64, user_id: String },

    #[error("Notification surface error: {message}")]
    Surface { message: String },
}

impl Error {
    /// Which taxonomy bucket this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::InvalidOdds { .. }
            | Self::InvalidUnits { .. }
            | Self::UnsupportedLeague { .. }
            | Self::UnsupportedSubLeague { .. }
            | Self::BetTypeUnavailable { .. }
            | Self::UnknownPath { .. }
            | Self::DraftNotReady { .. }
            | Self::SessionNotFound { .. }
            | Self::WagerNotFound { .. }
            | Self::AlreadyResolved { .. } => ErrorKind::Input,
            Self::NotSessionOwner { .. } | Self::NotWagerOwner { .. } => ErrorKind::Authorization,
            Self::ChannelNotAllowed { .. } | Self::MissingPermission { .. } => ErrorKind::Resource,
            Self::Config { .. } | Self::MissingPathHandler { .. } | Self::EnvVar(_) => {
                ErrorKind::Configuration
            }
            Self::Database(_)
            | Self::Io(_)
            | Self::Fmt(_)
            | Self::FrameworkError(_)
            | Self::Surface { .. } => ErrorKind::Persistence,
        }
    }

    /// Short, non-technical text safe to show in Discord.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingField { field } => format!("Please fill in **{field}**."),
            Self::InvalidOdds { value } => {
                format!("`{value}` isn't valid American odds. Try `-110`, `+150` or `EVEN`.")
            }
            Self::InvalidUnits { min, max, .. } => format!("Units must be between {min} and {max}."),
            Self::UnsupportedLeague { code } => format!("`{code}` isn't a supported league."),
            Self::UnsupportedSubLeague { code, .. } => {
                format!("`{code}` isn't a supported organization.")
            }
            Self::BetTypeUnavailable { bet_type } => {
                format!("{bet_type} bets are not yet available.")
            }
            Self::UnknownPath { path, .. } => format!("`{path}` isn't a bet option for that league."),
            Self::DraftNotReady { action } => format!("Finish the bet slip before you {action}."),
            Self::SessionNotFound { .. } => "That bet slip has expired. Start a new one with `/bet`.".to_string(),
            Self::NotSessionOwner { .. } => "This bet slip belongs to someone else.".to_string(),
            Self::ChannelNotAllowed { .. } => {
                "That channel isn't configured for bets. Ask an admin to run `/settings channel_add`."
                    .to_string()
            }
            Self::MissingPermission { permission } => {
                format!("I'm missing the **{permission}** permission in that channel.")
            }
            Self::WagerNotFound { serial } => format!("No bet with serial `{serial}` was found."),
            Self::AlreadyResolved { serial } => format!("Bet `{serial}` is already resolved."),
            Self::NotWagerOwner { serial, .. } => {
                format!("Only the bettor or an admin can cancel bet `{serial}`.")
            }
            Self::MissingPathHandler { .. } | Self::Config { .. } | Self::EnvVar(_) => {
                "This league is misconfigured on the bot. Please report it to the bot owner.".to_string()
            }
            Self::Database(_)
            | Self::Io(_)
            | Self::Fmt(_)
            | Self::FrameworkError(_)
            | Self::Surface { .. } => "Something went wrong. Please try again later.".to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Database(value.to_string())
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_follow_taxonomy() {
        assert_eq!(
            Error::MissingField { field: "odds".to_string() }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            Error::NotSessionOwner { user_id: "2".to_string() }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            Error::MissingPermission { permission: "Manage Webhooks".to_string() }.kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            Error::MissingPathHandler { league: "XFL".to_string() }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::Database("gone".to_string()).kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = Error::Database("UNIQUE constraint failed: wagers.serial".to_string());
        assert!(!err.user_message().contains("UNIQUE"));

        let channel = Error::ChannelNotAllowed { channel_id: "1".to_string() };
        let permission = Error::MissingPermission { permission: "Manage Webhooks".to_string() };
        assert_ne!(channel.user_message(), permission.user_message());
    }
}
