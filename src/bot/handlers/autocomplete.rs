//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests the caller's own pending wagers for `/cancel` and league codes
//! for `/bet`.

use crate::{
    bot::BotData,
    core::{capper, league::LEAGUES},
    errors::Error,
};
use poise::serenity_prelude as serenity;

/// Discord caps autocomplete at 25 choices
const MAX_CHOICES: usize = 25;

/// Suggests the caller's pending wagers by serial.
///
/// Each choice is labelled with the serial and the card summary so users can
/// tell their bets apart; the value is the serial itself.
///
/// # Arguments
/// * `ctx` - The poise context containing the database connection
/// * `partial` - The partial serial or summary the user has typed so far
///
/// # Returns
/// Up to 25 matching choices, oldest wager first
pub async fn autocomplete_pending_serial(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<serenity::AutocompleteChoice> {
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };
    let db = &ctx.data().database;
    let user_id = ctx.author().id.to_string();

    let Ok(wagers) = capper::pending_wagers(db, &guild_id.to_string(), &user_id).await else {
        return Vec::new();
    };

    let partial_lower = partial.trim().to_lowercase();
    wagers
        .into_iter()
        .filter(|wager| {
            wager.serial.to_string().starts_with(&partial_lower)
                || wager.summary.to_lowercase().contains(&partial_lower)
        })
        .take(MAX_CHOICES)
        .map(|wager| {
            let mut name = format!("{} · {}", wager.serial, wager.summary);
            // Choice names are limited to 100 characters
            if name.chars().count() > 100 {
                name = name.chars().take(99).chain(std::iter::once('…')).collect();
            }
            serenity::AutocompleteChoice::new(name, wager.serial)
        })
        .collect()
}

/// Suggests league codes matching the code or the display name.
#[allow(clippy::unused_async)]
pub async fn autocomplete_league(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    league_choices(partial)
}

fn league_choices(partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();

    LEAGUES
        .iter()
        .filter(|league| {
            league.code.to_lowercase().contains(&partial_lower)
                || league.name.to_lowercase().contains(&partial_lower)
        })
        .map(|league| league.code.to_string())
        .take(MAX_CHOICES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_league_choices_match_code_or_name() {
        assert_eq!(league_choices("nfl"), vec!["NFL".to_string()]);
        assert!(league_choices("").contains(&"HORSE".to_string()));
        assert_eq!(league_choices("golf"), vec!["LIV".to_string()]);
        assert!(league_choices("zzz").is_empty());
    }
}
