//! Bet slip state machine.
//!
//! A [`BetDraft`] walks one user from league selection to a confirmed wager:
//!
//! ```text
//! SelectLeague -> [SelectSubLeague] -> SelectBetType -> SelectPath
//!     -> CollectFields -> Preview (+ channel, units) -> Confirmed
//! ```
//!
//! `Cancelled` and `TimedOut` end the slip without side effects. Every
//! rejected transition leaves the draft exactly as it was.

use super::league::{League, SubLeague};
use super::odds::{Stake, compute_stake};
use super::paths::{FieldSpec, LegFields, PathSpec};
use super::placement::WagerDraft;
use super::resolver::{EntityResolver, PreviewArt};
use super::surface::ChannelCapability;
use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftStage {
    SelectLeague,
    SelectSubLeague,
    SelectBetType,
    SelectPath,
    CollectFields,
    Preview,
    Confirmed,
    Cancelled,
    TimedOut,
}

impl DraftStage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled | Self::TimedOut)
    }
}

/// Kinds of bet a slip can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetType {
    Standard,
    Parlay,
}

impl BetType {
    pub const ALL: [Self; 2] = [Self::Standard, Self::Parlay];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Parlay => "parlay",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Parlay => "Parlay",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Standard)
    }
}

/// Rendered preview of the leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub summary: String,
    pub leg: LegFields,
    pub art: PreviewArt,
}

/// Form the surface should show for the current path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub title: String,
    pub fields: &'static [FieldSpec],
    pub prefill: HashMap<String, String>,
}

/// One user's in-progress bet slip.
#[derive(Debug, Clone)]
pub struct BetDraft {
    owner_id: String,
    guild_id: String,
    stage: DraftStage,
    league: Option<&'static League>,
    sub_league: Option<&'static SubLeague>,
    bet_type: Option<BetType>,
    path: Option<&'static PathSpec>,
    fields: HashMap<String, String>,
    preview: Option<Preview>,
    channel_id: Option<String>,
    units: Option<u8>,
    stake: Option<Stake>,
    last_activity: Instant,
}

impl BetDraft {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            guild_id: guild_id.into(),
            stage: DraftStage::SelectLeague,
            league: None,
            sub_league: None,
            bet_type: None,
            path: None,
            fields: HashMap::new(),
            preview: None,
            channel_id: None,
            units: None,
            stake: None,
            last_activity: Instant::now(),
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    #[must_use]
    pub const fn stage(&self) -> DraftStage {
        self.stage
    }

    #[must_use]
    pub const fn league(&self) -> Option<&'static League> {
        self.league
    }

    #[must_use]
    pub const fn path(&self) -> Option<&'static PathSpec> {
        self.path
    }

    #[must_use]
    pub const fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    #[must_use]
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    #[must_use]
    pub const fn units(&self) -> Option<u8> {
        self.units
    }

    #[must_use]
    pub const fn stake(&self) -> Option<Stake> {
        self.stake
    }

    #[must_use]
    pub const fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    #[must_use]
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() >= timeout
    }

    fn expect_stage(&self, allowed: &[DraftStage], action: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(Error::DraftNotReady { action })
        }
    }

    fn expect_live(&self, action: &'static str) -> Result<()> {
        if self.stage.is_terminal() {
            Err(Error::DraftNotReady { action })
        } else {
            Ok(())
        }
    }

    /// Picks a league, discarding everything chosen after it.
    pub fn select_league(&mut self, code: &str) -> Result<DraftStage> {
        self.expect_live("pick a league")?;
        let league = League::find(code)?;

        self.league = Some(league);
        self.sub_league = None;
        self.bet_type = None;
        self.path = None;
        self.fields.clear();
        self.preview = None;
        self.stake = None;
        self.stage = if league.has_sub_leagues() {
            DraftStage::SelectSubLeague
        } else {
            DraftStage::SelectBetType
        };
        Ok(self.stage)
    }

    pub fn select_sub_league(&mut self, code: &str) -> Result<DraftStage> {
        self.expect_stage(&[DraftStage::SelectSubLeague], "pick an organization")?;
        let league = self.league.ok_or(Error::DraftNotReady {
            action: "pick an organization",
        })?;
        let sub_league = league.sub_league(code)?;

        self.sub_league = Some(sub_league);
        self.stage = DraftStage::SelectBetType;
        Ok(self.stage)
    }

    /// Only `standard` is accepted; declared-but-inactive types are rejected
    /// without touching the draft.
    pub fn select_bet_type(&mut self, id: &str) -> Result<DraftStage> {
        self.expect_stage(&[DraftStage::SelectBetType], "pick a bet type")?;
        let bet_type = BetType::ALL
            .into_iter()
            .find(|bet_type| bet_type.id().eq_ignore_ascii_case(id.trim()))
            .filter(|bet_type| bet_type.is_active())
            .ok_or_else(|| Error::BetTypeUnavailable {
                bet_type: id.trim().to_string(),
            })?;

        self.bet_type = Some(bet_type);
        self.stage = DraftStage::SelectPath;
        Ok(self.stage)
    }

    /// Paths the current league's family offers.
    pub fn path_options(&self) -> Result<&'static [PathSpec]> {
        let league = self.league.ok_or(Error::DraftNotReady {
            action: "pick a bet",
        })?;
        Ok(league.family()?.path_options())
    }

    pub fn select_path(&mut self, path_id: &str) -> Result<DraftStage> {
        self.expect_stage(&[DraftStage::SelectPath], "pick a bet")?;
        let league = self.league.ok_or(Error::DraftNotReady {
            action: "pick a bet",
        })?;
        let path = league.family()?.path(league.code, path_id)?;

        self.path = Some(path);
        self.fields.clear();
        self.preview = None;
        self.stake = None;
        self.stage = DraftStage::CollectFields;
        Ok(self.stage)
    }

    /// The leg form, pre-filled with anything entered before.
    pub fn form(&self) -> Result<FormRequest> {
        self.expect_stage(&[DraftStage::CollectFields], "fill in the bet")?;
        let path = self.path.ok_or(Error::DraftNotReady {
            action: "fill in the bet",
        })?;
        Ok(FormRequest {
            title: format!("{} - {}", self.league_code(), path.label),
            fields: path.fields,
            prefill: self.fields.clone(),
        })
    }

    /// Stores the submitted values, validates them with the path handler and
    /// builds the preview. On validation failure the values are kept so the
    /// form re-opens pre-filled.
    pub async fn collect_fields(
        &mut self,
        values: HashMap<String, String>,
        resolver: &EntityResolver,
    ) -> Result<DraftStage> {
        self.expect_stage(&[DraftStage::CollectFields], "fill in the bet")?;
        let (Some(league), Some(path)) = (self.league, self.path) else {
            return Err(Error::DraftNotReady {
                action: "fill in the bet",
            });
        };
        let family = league.family()?;

        self.fields.extend(values);
        let mut leg = family.validate_fields(path, &self.fields)?;

        let league_code = self.league_code();
        leg.subject = resolver.resolve(league_code, &leg.subject).await.name;
        if let Some(opponent) = leg.opponent.take() {
            leg.opponent = Some(resolver.resolve(league_code, &opponent).await.name);
        }

        let summary = family.build_summary(path, &leg);
        let art = resolver.preview_art(league_code, &leg.subject).await;
        self.preview = Some(Preview { summary, leg, art });
        self.stage = DraftStage::Preview;
        self.recompute_stake();
        Ok(self.stage)
    }

    /// Back to the form with the previous values; channel and units stay.
    pub fn edit(&mut self) -> Result<DraftStage> {
        self.expect_stage(&[DraftStage::Preview], "edit the bet")?;
        self.preview = None;
        self.stake = None;
        self.stage = DraftStage::CollectFields;
        Ok(self.stage)
    }

    pub fn select_channel(
        &mut self,
        channel_id: &str,
        allowed: &[String],
        capability: ChannelCapability,
    ) -> Result<()> {
        self.expect_stage(&[DraftStage::Preview], "pick a channel")?;
        if !allowed.iter().any(|id| id == channel_id) {
            return Err(Error::ChannelNotAllowed {
                channel_id: channel_id.to_string(),
            });
        }
        if let Some(permission) = capability.missing() {
            return Err(Error::MissingPermission {
                permission: permission.to_string(),
            });
        }

        self.channel_id = Some(channel_id.to_string());
        self.recompute_stake();
        Ok(())
    }

    pub fn select_units(&mut self, units: i64, min: u8, max: u8) -> Result<()> {
        self.expect_stage(&[DraftStage::Preview], "pick units")?;
        let units = u8::try_from(units)
            .ok()
            .filter(|u| (min..=max).contains(u))
            .ok_or(Error::InvalidUnits { units, min, max })?;

        self.units = Some(units);
        self.recompute_stake();
        Ok(())
    }

    fn recompute_stake(&mut self) {
        self.stake = match (&self.preview, &self.channel_id, self.units) {
            (Some(preview), Some(_), Some(units)) => Some(compute_stake(preview.leg.odds, units)),
            _ => None,
        };
    }

    #[must_use]
    pub const fn can_confirm(&self) -> bool {
        matches!(self.stage, DraftStage::Preview)
            && self.preview.is_some()
            && self.channel_id.is_some()
            && self.units.is_some()
            && self.stake.is_some()
    }

    /// League code stored on the wager: the organization when one was picked.
    #[must_use]
    pub fn league_code(&self) -> &'static str {
        self.sub_league
            .map(|sub| sub.code)
            .or_else(|| self.league.map(|league| league.code))
            .unwrap_or_default()
    }

    /// Final payload handed to placement.
    pub fn finalize(&self) -> Result<WagerDraft> {
        let (Some(preview), Some(path), Some(channel_id), Some(units), Some(stake)) = (
            self.preview.as_ref(),
            self.path,
            self.channel_id.as_ref(),
            self.units,
            self.stake,
        ) else {
            return Err(Error::DraftNotReady { action: "confirm" });
        };
        if !self.can_confirm() {
            return Err(Error::DraftNotReady { action: "confirm" });
        }

        Ok(WagerDraft {
            guild_id: self.guild_id.clone(),
            user_id: self.owner_id.clone(),
            league: self.league_code().to_string(),
            bet_type: if path.prop { "prop" } else { "standard" }.to_string(),
            path: path.id.to_string(),
            leg: preview.leg.clone(),
            summary: preview.summary.clone(),
            units,
            stake,
            channel_id: channel_id.clone(),
            art: preview.art.clone(),
        })
    }

    pub fn mark_confirmed(&mut self) -> Result<()> {
        if !self.can_confirm() {
            return Err(Error::DraftNotReady { action: "confirm" });
        }
        self.stage = DraftStage::Confirmed;
        Ok(())
    }

    pub fn cancel(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = DraftStage::Cancelled;
        }
    }

    pub fn time_out(&mut self) {
        if !self.stage.is_terminal() {
            self.stage = DraftStage::TimedOut;
        }
    }
}
