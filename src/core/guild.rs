//! Guild configuration business logic
//!
//! Per-guild settings (bet channel allow-list, notify role, voice label
//! channels) and the subscription tier that gates premium features.

use crate::entities::{
    GuildSettings, GuildSubscription, SubscriptionTier, guild_settings, guild_subscription,
};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};

/// Retrieves a guild's settings, if any were ever saved.
pub async fn get_settings(
    db: &DatabaseConnection,
    guild_id: &str,
) -> Result<Option<guild_settings::Model>> {
    GuildSettings::find_by_id(guild_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a guild's settings, creating an empty row on first use.
///
/// # Arguments
/// * `db` - Database connection
/// * `guild_id` - Discord guild id
///
/// # Returns
/// * `Ok(settings)` - Existing or freshly inserted settings
pub async fn get_or_create_settings(
    db: &DatabaseConnection,
    guild_id: &str,
) -> Result<guild_settings::Model> {
    if let Some(settings) = get_settings(db, guild_id).await? {
        return Ok(settings);
    }

    let settings = guild_settings::ActiveModel {
        guild_id: Set(guild_id.to_string()),
        bet_channel_ids: Set(String::new()),
        notify_role_id: Set(None),
        monthly_voice_channel_id: Set(None),
        yearly_voice_channel_id: Set(None),
        running_total: Set(0.0),
        lifetime_total: Set(0.0),
        lifetime_folded_year: Set(None),
    };
    settings.insert(db).await.map_err(Into::into)
}

/// Channels bets may be posted to. Empty when nothing is configured.
pub async fn bet_channels(db: &DatabaseConnection, guild_id: &str) -> Result<Vec<String>> {
    Ok(get_settings(db, guild_id)
        .await?
        .map(|settings| settings.bet_channels())
        .unwrap_or_default())
}

async fn save_bet_channels(
    db: &DatabaseConnection,
    settings: guild_settings::Model,
    channels: &[String],
) -> Result<guild_settings::Model> {
    let mut active: guild_settings::ActiveModel = settings.into();
    active.bet_channel_ids = Set(channels.join(","));
    active.update(db).await.map_err(Into::into)
}

/// Adds a channel to the bet allow-list. Adding twice is a no-op.
pub async fn add_bet_channel(
    db: &DatabaseConnection,
    guild_id: &str,
    channel_id: &str,
) -> Result<guild_settings::Model> {
    let settings = get_or_create_settings(db, guild_id).await?;
    let mut channels = settings.bet_channels();
    if channels.iter().any(|id| id == channel_id) {
        return Ok(settings);
    }
    channels.push(channel_id.to_string());
    save_bet_channels(db, settings, &channels).await
}

/// Removes a channel from the bet allow-list.
///
/// # Returns
/// * `Ok((settings, true))` - The channel was on the list and was removed
/// * `Ok((settings, false))` - The channel wasn't on the list
pub async fn remove_bet_channel(
    db: &DatabaseConnection,
    guild_id: &str,
    channel_id: &str,
) -> Result<(guild_settings::Model, bool)> {
    let settings = get_or_create_settings(db, guild_id).await?;
    let channels = settings.bet_channels();
    let kept: Vec<String> = channels
        .iter()
        .filter(|id| *id != channel_id)
        .cloned()
        .collect();
    if kept.len() == channels.len() {
        return Ok((settings, false));
    }
    Ok((save_bet_channels(db, settings, &kept).await?, true))
}

pub async fn set_notify_role(
    db: &DatabaseConnection,
    guild_id: &str,
    role_id: Option<String>,
) -> Result<guild_settings::Model> {
    let settings = get_or_create_settings(db, guild_id).await?;
    let mut active: guild_settings::ActiveModel = settings.into();
    active.notify_role_id = Set(role_id);
    active.update(db).await.map_err(Into::into)
}

/// Sets the two voice channels renamed with the month and year totals.
pub async fn set_voice_channels(
    db: &DatabaseConnection,
    guild_id: &str,
    monthly_channel_id: Option<String>,
    yearly_channel_id: Option<String>,
) -> Result<guild_settings::Model> {
    let settings = get_or_create_settings(db, guild_id).await?;
    let mut active: guild_settings::ActiveModel = settings.into();
    active.monthly_voice_channel_id = Set(monthly_channel_id);
    active.yearly_voice_channel_id = Set(yearly_channel_id);
    active.update(db).await.map_err(Into::into)
}

/// The guild's billing tier; guilds without a row are on the free tier.
pub async fn subscription_tier(db: &DatabaseConnection, guild_id: &str) -> Result<SubscriptionTier> {
    Ok(GuildSubscription::find_by_id(guild_id.to_string())
        .one(db)
        .await?
        .map_or(SubscriptionTier::Free, |sub| SubscriptionTier::parse(&sub.tier)))
}

pub async fn set_subscription_tier(
    db: &DatabaseConnection,
    guild_id: &str,
    tier: SubscriptionTier,
    now: DateTime<Utc>,
) -> Result<()> {
    let existing = GuildSubscription::find_by_id(guild_id.to_string())
        .one(db)
        .await?;

    if let Some(sub) = existing {
        let mut active: guild_subscription::ActiveModel = sub.into();
        active.tier = Set(tier.as_str().to_string());
        active.updated_at = Set(now);
        active.update(db).await?;
    } else {
        guild_subscription::ActiveModel {
            guild_id: Set(guild_id.to_string()),
            tier: Set(tier.as_str().to_string()),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Ids of every guild on a premium tier.
pub async fn premium_guild_ids(db: &DatabaseConnection) -> Result<Vec<String>> {
    let subscriptions = GuildSubscription::find().all(db).await?;
    Ok(subscriptions
        .into_iter()
        .filter(|sub| SubscriptionTier::parse(&sub.tier).is_premium())
        .map(|sub| sub.guild_id)
        .collect())
}
