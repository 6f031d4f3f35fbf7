//! The `/bet` slip - an interactive message that walks the caller through
//! building a wager.
//!
//! Every component on the slip carries the custom id `<session>:<action>[:<arg>]`.
//! Presses are routed through the session registry, so only the slip's owner
//! can advance it, and each step re-renders the slip from the draft's stage.

use crate::{
    bot::{BotData, log_failure},
    core::{
        draft::{BetDraft, BetType, DraftStage, FormRequest},
        guild,
        league::LEAGUES,
        odds::format_units,
        placement,
        session::SharedDraft,
        surface::{NotificationSurface, PosterIdentity},
    },
    entities::wager,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use tracing::debug;

const SLIP_COLOUR: u32 = 0x0034_98DB;

/// Splits `<session>:<action>[:<arg>]` for this session.
fn parse_custom_id(session_id: u64, custom_id: &str) -> Option<(&str, Option<&str>)> {
    let rest = custom_id.strip_prefix(&format!("{session_id}:"))?;
    Some(match rest.split_once(':') {
        Some((action, arg)) => (action, Some(arg)),
        None => (rest, None),
    })
}

fn prompt(stage: DraftStage) -> &'static str {
    match stage {
        DraftStage::SelectLeague => "Pick a league.",
        DraftStage::SelectSubLeague => "Pick an organization.",
        DraftStage::SelectBetType => "Pick a bet type.",
        DraftStage::SelectPath => "Pick a bet.",
        DraftStage::CollectFields => "Fill in the bet details.",
        DraftStage::Preview => "Pick a channel and units, then confirm.",
        DraftStage::Confirmed => "Bet placed.",
        DraftStage::Cancelled => "Bet slip cancelled.",
        DraftStage::TimedOut => "Bet slip expired.",
    }
}

fn button(session_id: u64, action: &str, label: &str, style: serenity::ButtonStyle) -> serenity::CreateButton {
    serenity::CreateButton::new(format!("{session_id}:{action}"))
        .label(label)
        .style(style)
}

fn string_select(
    session_id: u64,
    action: &str,
    placeholder: &str,
    options: Vec<serenity::CreateSelectMenuOption>,
) -> serenity::CreateActionRow {
    serenity::CreateActionRow::SelectMenu(
        serenity::CreateSelectMenu::new(
            format!("{session_id}:{action}"),
            serenity::CreateSelectMenuKind::String { options },
        )
        .placeholder(placeholder),
    )
}

fn slip_embed(draft: &BetDraft, notice: Option<&str>) -> serenity::CreateEmbed {
    let mut description = prompt(draft.stage()).to_string();
    if let Some(notice) = notice {
        description = format!("❌ {notice}\n\n{description}");
    }

    let mut embed = serenity::CreateEmbed::default()
        .title("🎟️ Bet slip")
        .description(description)
        .color(SLIP_COLOUR);

    if let Some(league) = draft.league() {
        embed = embed.field("League", draft.league_code(), true);
        if league.code != draft.league_code() {
            embed = embed.field("Sport", league.name, true);
        }
    }
    if let Some(path) = draft.path() {
        embed = embed.field("Bet", path.label, true);
    }
    if let Some(preview) = draft.preview() {
        embed = embed
            .field("Pick", &preview.summary, false)
            .thumbnail(&preview.art.entity_image);
    }
    if let Some(channel_id) = draft.channel_id() {
        embed = embed.field("Channel", format!("<#{channel_id}>"), true);
    }
    if let Some(units) = draft.units() {
        embed = embed.field("Units", format!("{units}u"), true);
    }
    if let Some(stake) = draft.stake() {
        embed = embed.field(
            stake.framing.label(),
            format_units(stake.amount).trim_start_matches('+').to_string(),
            true,
        );
    }
    embed
}

fn slip_components(
    session_id: u64,
    draft: &BetDraft,
    min_units: u8,
    max_units: u8,
) -> Vec<serenity::CreateActionRow> {
    let cancel = button(session_id, "cancel", "Cancel", serenity::ButtonStyle::Danger);
    let mut rows = Vec::new();

    match draft.stage() {
        DraftStage::SelectLeague => {
            let options = LEAGUES
                .iter()
                .map(|league| serenity::CreateSelectMenuOption::new(league.name, league.code))
                .collect();
            rows.push(string_select(session_id, "league", "League", options));
            rows.push(serenity::CreateActionRow::Buttons(vec![cancel]));
        }
        DraftStage::SelectSubLeague => {
            let options = draft
                .league()
                .map(|league| league.sub_leagues)
                .unwrap_or_default()
                .iter()
                .map(|sub| serenity::CreateSelectMenuOption::new(sub.name, sub.code))
                .collect();
            rows.push(string_select(session_id, "sub", "Organization", options));
            rows.push(serenity::CreateActionRow::Buttons(vec![cancel]));
        }
        DraftStage::SelectBetType => {
            let mut buttons: Vec<_> = BetType::ALL
                .into_iter()
                .map(|bet_type| {
                    button(
                        session_id,
                        &format!("type:{}", bet_type.id()),
                        bet_type.label(),
                        if bet_type.is_active() {
                            serenity::ButtonStyle::Primary
                        } else {
                            serenity::ButtonStyle::Secondary
                        },
                    )
                })
                .collect();
            buttons.push(cancel);
            rows.push(serenity::CreateActionRow::Buttons(buttons));
        }
        DraftStage::SelectPath => {
            let options = draft
                .path_options()
                .unwrap_or_default()
                .iter()
                .map(|path| serenity::CreateSelectMenuOption::new(path.label, path.id))
                .collect();
            rows.push(string_select(session_id, "path", "Bet", options));
            rows.push(serenity::CreateActionRow::Buttons(vec![cancel]));
        }
        DraftStage::CollectFields => {
            rows.push(serenity::CreateActionRow::Buttons(vec![
                button(session_id, "form", "Fill in bet", serenity::ButtonStyle::Primary),
                cancel,
            ]));
        }
        DraftStage::Preview => {
            let default_channels = draft
                .channel_id()
                .and_then(|id| id.parse::<u64>().ok())
                .filter(|id| *id != 0)
                .map(|id| vec![serenity::ChannelId::new(id)]);
            rows.push(serenity::CreateActionRow::SelectMenu(
                serenity::CreateSelectMenu::new(
                    format!("{session_id}:channel"),
                    serenity::CreateSelectMenuKind::Channel {
                        channel_types: Some(vec![serenity::ChannelType::Text]),
                        default_channels,
                    },
                )
                .placeholder("Channel"),
            ));

            let options = (min_units..=max_units)
                .map(|units| {
                    serenity::CreateSelectMenuOption::new(format!("{units}u"), units.to_string())
                        .default_selection(draft.units() == Some(units))
                })
                .collect();
            rows.push(string_select(session_id, "units", "Units", options));

            rows.push(serenity::CreateActionRow::Buttons(vec![
                button(session_id, "edit", "Edit", serenity::ButtonStyle::Secondary),
                button(session_id, "confirm", "Confirm", serenity::ButtonStyle::Success)
                    .disabled(!draft.can_confirm()),
                cancel,
            ]));
        }
        DraftStage::Confirmed | DraftStage::Cancelled | DraftStage::TimedOut => {}
    }
    rows
}

fn slip_message(
    session_id: u64,
    draft: &BetDraft,
    notice: Option<&str>,
    data: &BotData,
) -> serenity::CreateInteractionResponseMessage {
    serenity::CreateInteractionResponseMessage::new()
        .embed(slip_embed(draft, notice))
        .components(slip_components(
            session_id,
            draft,
            data.config.betting.min_units,
            data.config.betting.max_units,
        ))
}

fn leg_modal(session_id: u64, form: &FormRequest) -> serenity::CreateModal {
    let rows = form
        .fields
        .iter()
        .map(|field| {
            let mut input =
                serenity::CreateInputText::new(serenity::InputTextStyle::Short, field.label, field.id)
                    .required(field.required);
            if let Some(value) = form.prefill.get(field.id) {
                input = input.value(value);
            }
            serenity::CreateActionRow::InputText(input)
        })
        .collect();

    let title: String = form.title.chars().take(45).collect();
    serenity::CreateModal::new(format!("{session_id}:modal"), title).components(rows)
}

fn modal_values(modal: &serenity::ModalInteraction) -> HashMap<String, String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            serenity::ActionRowComponent::InputText(input) => {
                Some((input.custom_id.clone(), input.value.clone().unwrap_or_default()))
            }
            _ => None,
        })
        .collect()
}

/// What a slip step asked the loop to do next.
enum Flow {
    Continue,
    Placed(wager::Model),
    Cancelled,
}

fn poster_identity(press: &serenity::ComponentInteraction) -> PosterIdentity {
    match &press.member {
        Some(member) => PosterIdentity {
            display_name: member.display_name().to_string(),
            avatar_url: Some(member.face()),
        },
        None => PosterIdentity {
            display_name: press.user.name.clone(),
            avatar_url: Some(press.user.face()),
        },
    }
}

/// Applies one component press to the draft.
///
/// The draft is locked only around its own transitions, never across a
/// database or Discord call.
async fn apply_press(
    data: &BotData,
    draft: &SharedDraft,
    press: &serenity::ComponentInteraction,
    action: &str,
    arg: Option<&str>,
) -> Result<Flow> {
    let selected = || match &press.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    };
    let missing = |field: &str| Error::MissingField {
        field: field.to_string(),
    };

    match action {
        "league" => {
            let code = selected().ok_or_else(|| missing("league"))?;
            draft.lock().await.select_league(&code)?;
        }
        "sub" => {
            let code = selected().ok_or_else(|| missing("organization"))?;
            draft.lock().await.select_sub_league(&code)?;
        }
        "type" => {
            draft.lock().await.select_bet_type(arg.unwrap_or_default())?;
        }
        "path" => {
            let path_id = selected().ok_or_else(|| missing("bet"))?;
            draft.lock().await.select_path(&path_id)?;
        }
        "edit" => {
            draft.lock().await.edit()?;
        }
        "channel" => {
            let serenity::ComponentInteractionDataKind::ChannelSelect { values } = &press.data.kind
            else {
                return Err(missing("channel"));
            };
            let channel_id = values.first().ok_or_else(|| missing("channel"))?.to_string();

            let guild_id = press
                .guild_id
                .map(|id| id.to_string())
                .ok_or_else(|| missing("server"))?;
            let allowed = guild::bet_channels(&data.database, &guild_id).await?;
            if !allowed.contains(&channel_id) {
                return Err(Error::ChannelNotAllowed { channel_id });
            }
            let capability = data.surface.channel_capability(&channel_id).await?;
            draft
                .lock()
                .await
                .select_channel(&channel_id, &allowed, capability)?;
        }
        "units" => {
            let raw = selected().ok_or_else(|| missing("units"))?;
            let units = raw.parse::<i64>().map_err(|_| Error::InvalidUnits {
                units: 0,
                min: data.config.betting.min_units,
                max: data.config.betting.max_units,
            })?;
            draft.lock().await.select_units(
                units,
                data.config.betting.min_units,
                data.config.betting.max_units,
            )?;
        }
        "confirm" => {
            let guild_id = draft.lock().await.guild_id().to_string();
            let notify_role_id = guild::get_settings(&data.database, &guild_id)
                .await?
                .and_then(|settings| settings.notify_role_id);
            let poster = poster_identity(press);

            let wager = placement::confirm_slip(
                &data.database,
                data.surface.as_ref(),
                &data.pending,
                &data.serials,
                draft,
                &poster,
                notify_role_id,
            )
            .await?;
            return Ok(Flow::Placed(wager));
        }
        "cancel" => {
            draft.lock().await.cancel();
            return Ok(Flow::Cancelled);
        }
        other => {
            debug!(action = other, "Unknown bet slip action");
        }
    }
    Ok(Flow::Continue)
}

/// Shows the leg form and feeds the submission into the draft.
async fn collect_form(
    ctx: poise::Context<'_, BotData, Error>,
    session_id: u64,
    draft: &SharedDraft,
    press: &serenity::ComponentInteraction,
) -> Result<()> {
    let data = ctx.data();
    let form = draft.lock().await.form();
    let form = match form {
        Ok(form) => form,
        Err(e) => {
            log_failure("bet slip form", &e);
            let message = slip_message(session_id, &*draft.lock().await, Some(&e.user_message()), data);
            press
                .create_response(
                    ctx.serenity_context(),
                    serenity::CreateInteractionResponse::UpdateMessage(message),
                )
                .await?;
            return Ok(());
        }
    };

    press
        .create_response(
            ctx.serenity_context(),
            serenity::CreateInteractionResponse::Modal(leg_modal(session_id, &form)),
        )
        .await?;

    let modal_id = format!("{session_id}:modal");
    let Some(submission) = serenity::ModalInteractionCollector::new(ctx.serenity_context())
        .filter(move |modal| modal.data.custom_id == modal_id)
        .timeout(data.config.betting.session_timeout())
        .await
    else {
        // Dismissed; the slip stays on the form step
        return Ok(());
    };

    // Resolution is in-memory; no I/O under the lock
    let message = {
        let mut draft = draft.lock().await;
        let notice = draft
            .collect_fields(modal_values(&submission), &data.resolver)
            .await
            .inspect_err(|e| log_failure("bet slip form", e))
            .err()
            .map(|e| e.user_message());
        slip_message(session_id, &draft, notice.as_deref(), data)
    };

    submission
        .create_response(
            ctx.serenity_context(),
            serenity::CreateInteractionResponse::UpdateMessage(message),
        )
        .await?;
    Ok(())
}

mod inner {
    #![allow(missing_docs)]

    use super::{Flow, apply_press, collect_form, parse_custom_id, slip_components, slip_embed, slip_message};
    use crate::{
        bot::{BotData, handlers::autocomplete, log_failure},
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Opens a bet slip.
    ///
    /// The slip walks through league, bet and odds, then lets you pick the
    /// channel and units before posting the card.
    #[poise::command(slash_command, guild_only)]
    pub async fn bet(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "League to start with"]
        #[autocomplete = "autocomplete::autocomplete_league"]
        league: Option<String>,
    ) -> Result<()> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let data = ctx.data();
        let session_id = ctx.id();
        let owner_id = ctx.author().id.to_string();
        let (min_units, max_units) = (data.config.betting.min_units, data.config.betting.max_units);

        let shared = data
            .sessions
            .open(session_id, &owner_id, &guild_id.to_string())
            .await;

        let (embed, components) = {
            let mut draft = shared.lock().await;
            let notice = match league.as_deref() {
                Some(code) => draft.select_league(code).err().map(|e| e.user_message()),
                None => None,
            };
            (
                slip_embed(&draft, notice.as_deref()),
                slip_components(session_id, &draft, min_units, max_units),
            )
        };

        let handle = ctx
            .send(
                poise::CreateReply::default()
                    .embed(embed)
                    .components(components)
                    .ephemeral(true),
            )
            .await?;

        loop {
            let prefix = format!("{session_id}:");
            let Some(press) = serenity::ComponentInteractionCollector::new(ctx.serenity_context())
                .filter(move |press| press.data.custom_id.starts_with(&prefix))
                .timeout(data.config.betting.session_timeout())
                .await
            else {
                break;
            };

            let Some((action, arg)) = parse_custom_id(session_id, &press.data.custom_id) else {
                continue;
            };

            let shared = match data
                .sessions
                .checkout(session_id, &press.user.id.to_string())
                .await
            {
                Ok(shared) => shared,
                Err(e @ Error::NotSessionOwner { .. }) => {
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::Message(
                                serenity::CreateInteractionResponseMessage::new()
                                    .content(format!("❌ {}", e.user_message()))
                                    .ephemeral(true),
                            ),
                        )
                        .await?;
                    continue;
                }
                Err(e) => {
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::UpdateMessage(
                                serenity::CreateInteractionResponseMessage::new()
                                    .content(format!("⌛ {}", e.user_message()))
                                    .embeds(Vec::new())
                                    .components(Vec::new()),
                            ),
                        )
                        .await?;
                    return Ok(());
                }
            };
            if action == "form" {
                collect_form(ctx, session_id, &shared, &press).await?;
                continue;
            }

            match apply_press(data, &shared, &press, action, arg).await {
                Ok(Flow::Continue) => {
                    let message = slip_message(session_id, &*shared.lock().await, None, data);
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::UpdateMessage(message),
                        )
                        .await?;
                }
                Ok(Flow::Placed(wager)) => {
                    data.sessions.close(session_id).await;
                    info!(serial = wager.serial, "Bet slip confirmed");
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::UpdateMessage(
                                serenity::CreateInteractionResponseMessage::new()
                                    .content(format!(
                                        "✅ Bet `{}` posted in <#{}>.",
                                        wager.serial, wager.channel_id
                                    ))
                                    .embeds(Vec::new())
                                    .components(Vec::new()),
                            ),
                        )
                        .await?;
                    return Ok(());
                }
                Ok(Flow::Cancelled) => {
                    data.sessions.close(session_id).await;
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::UpdateMessage(
                                serenity::CreateInteractionResponseMessage::new()
                                    .content("Bet slip cancelled.")
                                    .embeds(Vec::new())
                                    .components(Vec::new()),
                            ),
                        )
                        .await?;
                    return Ok(());
                }
                Err(e) => {
                    log_failure(&format!("bet slip {action}"), &e);
                    let message = slip_message(
                        session_id,
                        &*shared.lock().await,
                        Some(&e.user_message()),
                        data,
                    );
                    press
                        .create_response(
                            ctx.serenity_context(),
                            serenity::CreateInteractionResponse::UpdateMessage(message),
                        )
                        .await?;
                }
            }
        }

        // Idle past the timeout
        shared.lock().await.time_out();
        data.sessions.close(session_id).await;
        handle
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content("⌛ Bet slip expired. Start a new one with `/bet`.")
                    .components(Vec::new()),
            )
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_bet_command_suggests_leagues() {
        let command = bet();
        let league = command
            .parameters
            .iter()
            .find(|parameter| parameter.name == "league")
            .unwrap();
        assert!(league.autocomplete_callback.is_some());
    }

    #[test]
    fn test_custom_ids_are_scoped_to_the_session() {
        assert_eq!(parse_custom_id(42, "42:league"), Some(("league", None)));
        assert_eq!(parse_custom_id(42, "42:type:parlay"), Some(("type", Some("parlay"))));
        assert_eq!(parse_custom_id(42, "43:league"), None);
        assert_eq!(parse_custom_id(4, "42:league"), None);
    }

    #[test]
    fn test_every_stage_has_a_prompt() {
        let mut draft = BetDraft::new("u1", "g1");
        assert_eq!(prompt(draft.stage()), "Pick a league.");
        draft.select_league("MMA").ok();
        assert_eq!(prompt(draft.stage()), "Pick an organization.");
        draft.cancel();
        assert_eq!(prompt(draft.stage()), "Bet slip cancelled.");
    }

    #[test]
    fn test_components_follow_stage() {
        let mut draft = BetDraft::new("u1", "g1");
        assert_eq!(slip_components(1, &draft, 1, 3).len(), 2);

        draft.select_league("NFL").ok();
        // Bet type buttons and cancel share a row
        assert_eq!(slip_components(1, &draft, 1, 3).len(), 1);

        draft.cancel();
        assert!(slip_components(1, &draft, 1, 3).is_empty());
    }
}
