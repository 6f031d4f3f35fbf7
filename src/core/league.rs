//! Supported leagues and the family each belongs to.
//!
//! The set is closed: adding a league means adding a row to [`LEAGUES`] and,
//! if it belongs to a new family, a new [`LeagueFamily`] variant.

use crate::errors::{Error, Result};

/// Bet construction strategy shared by a group of leagues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeagueFamily {
    /// Two teams, spreads and totals
    TeamSport,
    /// Named competitors from a roster, e.g. tennis
    RosterIndividual,
    /// Two fighters on a fixed card
    Combat,
    /// Full field of drivers
    Motorsport,
    /// Golf
    Precision,
    /// Horse racing
    Racing,
}

/// One supported league code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct League {
    pub code: &'static str,
    pub name: &'static str,
    pub family: Option<LeagueFamily>,
    /// Organizations a user must pick between, e.g. the MMA promotions
    pub sub_leagues: &'static [SubLeague],
}

/// An organization within a league family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubLeague {
    pub code: &'static str,
    pub name: &'static str,
}

const MMA_ORGS: &[SubLeague] = &[
    SubLeague { code: "UFC", name: "UFC" },
    SubLeague { code: "BELLATOR", name: "Bellator" },
    SubLeague { code: "PFL", name: "PFL" },
];

const fn league(code: &'static str, name: &'static str, family: LeagueFamily) -> League {
    League {
        code,
        name,
        family: Some(family),
        sub_leagues: &[],
    }
}

/// Every league a bet slip can start from.
pub const LEAGUES: &[League] = &[
    league("NFL", "NFL", LeagueFamily::TeamSport),
    league("NBA", "NBA", LeagueFamily::TeamSport),
    league("MLB", "MLB", LeagueFamily::TeamSport),
    league("NHL", "NHL", LeagueFamily::TeamSport),
    league("NCAAF", "College Football", LeagueFamily::TeamSport),
    league("NCAAB", "College Basketball", LeagueFamily::TeamSport),
    league("WNBA", "WNBA", LeagueFamily::TeamSport),
    league("MLS", "MLS", LeagueFamily::TeamSport),
    league("EPL", "Premier League", LeagueFamily::TeamSport),
    league("ATP", "ATP Tennis", LeagueFamily::RosterIndividual),
    league("WTA", "WTA Tennis", LeagueFamily::RosterIndividual),
    League {
        code: "MMA",
        name: "MMA",
        family: Some(LeagueFamily::Combat),
        sub_leagues: MMA_ORGS,
    },
    league("BOXING", "Boxing", LeagueFamily::Combat),
    league("F1", "Formula 1", LeagueFamily::Motorsport),
    league("NASCAR", "NASCAR", LeagueFamily::Motorsport),
    league("INDYCAR", "IndyCar", LeagueFamily::Motorsport),
    league("PGA", "PGA Tour", LeagueFamily::Precision),
    league("LIV", "LIV Golf", LeagueFamily::Precision),
    league("HORSE", "Horse Racing", LeagueFamily::Racing),
];

impl League {
    /// Looks a league up by code, case-insensitively.
    pub fn find(code: &str) -> Result<&'static Self> {
        let code = code.trim();
        LEAGUES
            .iter()
            .find(|league| league.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::UnsupportedLeague {
                code: code.to_string(),
            })
    }

    #[must_use]
    pub const fn has_sub_leagues(&self) -> bool {
        !self.sub_leagues.is_empty()
    }

    pub fn sub_league(&self, code: &str) -> Result<&'static SubLeague> {
        self.sub_leagues
            .iter()
            .find(|sub| sub.code.eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| Error::UnsupportedSubLeague {
                league: self.code.to_string(),
                code: code.trim().to_string(),
            })
    }

    /// The family handler for this league. A supported league without one is
    /// a deployment defect, not a user error.
    pub fn family(&self) -> Result<LeagueFamily> {
        self.family.ok_or_else(|| Error::MissingPathHandler {
            league: self.code.to_string(),
        })
    }
}
