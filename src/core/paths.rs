//! Per-family path handlers.
//!
//! Each [`LeagueFamily`] declares the bet paths it offers, the form fields each
//! path collects, how those fields are validated and how the one-line summary
//! on the card is rendered.

use super::league::LeagueFamily;
use super::odds::Odds;
use crate::errors::{Error, Result};
use std::collections::HashMap;

/// Form field ids shared by every path.
pub mod field {
    pub const SUBJECT: &str = "subject";
    pub const OPPONENT: &str = "opponent";
    pub const LINE: &str = "line";
    pub const ODDS: &str = "odds";
    pub const PROP: &str = "prop";
}

/// One text input on the leg form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub required: bool,
}

/// One selectable bet path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSpec {
    pub id: &'static str,
    pub label: &'static str,
    /// Wagers built from this path are stored with the `prop` category
    pub prop: bool,
    pub fields: &'static [FieldSpec],
}

/// Validated leg values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LegFields {
    pub subject: String,
    pub opponent: Option<String>,
    pub line: Option<String>,
    pub odds: Option<Odds>,
    pub prop: Option<String>,
}

const fn required(id: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        label,
        required: true,
    }
}

const fn optional(id: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        id,
        label,
        required: false,
    }
}

const ODDS: FieldSpec = optional(field::ODDS, "Odds (e.g. -110, +150, EVEN)");

const TEAM_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "moneyline",
        label: "Moneyline",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Team"),
            required(field::OPPONENT, "Opponent"),
            ODDS,
        ],
    },
    PathSpec {
        id: "spread",
        label: "Spread",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Team"),
            required(field::OPPONENT, "Opponent"),
            required(field::LINE, "Spread (e.g. -3.5)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "total",
        label: "Total (Over/Under)",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Team"),
            required(field::OPPONENT, "Opponent"),
            required(field::LINE, "Total (e.g. o45.5)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "player_prop",
        label: "Player Prop",
        prop: true,
        fields: &[
            required(field::SUBJECT, "Player"),
            required(field::PROP, "Prop (e.g. o24.5 points)"),
            optional(field::OPPONENT, "Opponent"),
            ODDS,
        ],
    },
];

const ROSTER_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "match",
        label: "Match Winner",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Player"),
            required(field::OPPONENT, "Opponent"),
            ODDS,
        ],
    },
    PathSpec {
        id: "set_spread",
        label: "Set Spread",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Player"),
            required(field::OPPONENT, "Opponent"),
            required(field::LINE, "Set spread (e.g. -1.5)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "player_prop",
        label: "Player Prop",
        prop: true,
        fields: &[
            required(field::SUBJECT, "Player"),
            required(field::PROP, "Prop (e.g. o9.5 aces)"),
            ODDS,
        ],
    },
];

const COMBAT_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "fight",
        label: "Fight Winner",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Fighter"),
            required(field::OPPONENT, "Opponent"),
            ODDS,
        ],
    },
    PathSpec {
        id: "method",
        label: "Method of Victory",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Fighter"),
            required(field::OPPONENT, "Opponent"),
            required(field::LINE, "Method (KO/TKO, Submission, Decision)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "fight_prop",
        label: "Fight Prop",
        prop: true,
        fields: &[
            required(field::SUBJECT, "Fighter"),
            required(field::OPPONENT, "Opponent"),
            required(field::PROP, "Prop (e.g. fight goes the distance)"),
            ODDS,
        ],
    },
];

const MOTORSPORT_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "outright",
        label: "Race Winner",
        prop: false,
        fields: &[required(field::SUBJECT, "Driver"), ODDS],
    },
    PathSpec {
        id: "head_to_head",
        label: "Head to Head",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Driver"),
            required(field::OPPONENT, "Versus driver"),
            ODDS,
        ],
    },
    PathSpec {
        id: "podium",
        label: "Podium Finish",
        prop: false,
        fields: &[required(field::SUBJECT, "Driver"), ODDS],
    },
];

const PRECISION_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "outright",
        label: "Tournament Winner",
        prop: false,
        fields: &[required(field::SUBJECT, "Golfer"), ODDS],
    },
    PathSpec {
        id: "matchup",
        label: "Matchup",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Golfer"),
            required(field::OPPONENT, "Versus golfer"),
            ODDS,
        ],
    },
    PathSpec {
        id: "top_finish",
        label: "Top Finish",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Golfer"),
            required(field::LINE, "Finish (e.g. Top 10)"),
            ODDS,
        ],
    },
];

const RACING_PATHS: &[PathSpec] = &[
    PathSpec {
        id: "win",
        label: "Win",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Horse"),
            required(field::LINE, "Race (e.g. Belmont R5)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "place",
        label: "Place",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Horse"),
            required(field::LINE, "Race (e.g. Belmont R5)"),
            ODDS,
        ],
    },
    PathSpec {
        id: "show",
        label: "Show",
        prop: false,
        fields: &[
            required(field::SUBJECT, "Horse"),
            required(field::LINE, "Race (e.g. Belmont R5)"),
            ODDS,
        ],
    },
];

fn value<'a>(values: &'a HashMap<String, String>, id: &str) -> Option<&'a str> {
    values
        .get(id)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

impl LeagueFamily {
    /// Paths offered for this family, in display order.
    #[must_use]
    pub const fn path_options(self) -> &'static [PathSpec] {
        match self {
            Self::TeamSport => TEAM_PATHS,
            Self::RosterIndividual => ROSTER_PATHS,
            Self::Combat => COMBAT_PATHS,
            Self::Motorsport => MOTORSPORT_PATHS,
            Self::Precision => PRECISION_PATHS,
            Self::Racing => RACING_PATHS,
        }
    }

    pub fn path(self, league_code: &str, path_id: &str) -> Result<&'static PathSpec> {
        self.path_options()
            .iter()
            .find(|path| path.id == path_id)
            .ok_or_else(|| Error::UnknownPath {
                league: league_code.to_string(),
                path: path_id.to_string(),
            })
    }

    /// Checks every required field is present and non-blank and that odds,
    /// when given, parse.
    pub fn validate_fields(
        self,
        path: &PathSpec,
        values: &HashMap<String, String>,
    ) -> Result<LegFields> {
        for spec in path.fields.iter().filter(|spec| spec.required) {
            if value(values, spec.id).is_none() {
                return Err(Error::MissingField {
                    field: spec.label.to_string(),
                });
            }
        }

        let odds = match value(values, field::ODDS) {
            Some(raw) => Some(Odds::parse(raw).ok_or_else(|| Error::InvalidOdds {
                value: raw.to_string(),
            })?),
            None => None,
        };

        let declared = |id: &str| path.fields.iter().any(|spec| spec.id == id);
        let take = |id: &str| {
            if declared(id) {
                value(values, id).map(ToString::to_string)
            } else {
                None
            }
        };

        Ok(LegFields {
            subject: take(field::SUBJECT).unwrap_or_default(),
            opponent: take(field::OPPONENT),
            line: take(field::LINE),
            odds,
            prop: take(field::PROP),
        })
    }

    /// One-line description of the leg for the card.
    #[must_use]
    pub fn build_summary(self, path: &PathSpec, leg: &LegFields) -> String {
        let subject = leg.subject.as_str();
        let opponent = leg.opponent.as_deref().unwrap_or("TBD");
        let line = leg.line.as_deref().unwrap_or_default();
        let prop = leg.prop.as_deref().unwrap_or_default();

        let body = match (self, path.id) {
            (Self::TeamSport, "moneyline") => format!("{subject} ML vs {opponent}"),
            (Self::TeamSport, "spread") => format!("{subject} {line} vs {opponent}"),
            (Self::TeamSport, "total") => format!("{subject} vs {opponent} {line}"),
            (Self::RosterIndividual, "set_spread") => {
                format!("{subject} {line} sets vs {opponent}")
            }
            (Self::RosterIndividual | Self::Combat, "match" | "fight") => {
                format!("{subject} to beat {opponent}")
            }
            (Self::Combat, "method") => format!("{subject} by {line} vs {opponent}"),
            (Self::Combat, "fight_prop") => format!("{subject} vs {opponent}: {prop}"),
            (Self::Motorsport | Self::Precision, "outright") => format!("{subject} to win"),
            (Self::Motorsport, "head_to_head") | (Self::Precision, "matchup") => {
                format!("{subject} over {opponent}")
            }
            (Self::Motorsport, "podium") => format!("{subject} podium finish"),
            (Self::Precision, "top_finish") => format!("{subject} {line} finish"),
            (Self::Racing, kind) => format!("{subject} to {kind} ({line})"),
            _ if path.prop => match leg.opponent.as_deref() {
                Some(opponent) => format!("{subject} {prop} vs {opponent}"),
                None => format!("{subject} {prop}"),
            },
            _ => subject.to_string(),
        };

        match leg.odds {
            Some(odds) => format!("{body} ({odds})"),
            None => body,
        }
    }
}
