//! American odds parsing and stake computation.
//!
//! Positive odds are framed as "risk U to win U*O/100", so the stake is the
//! units risked. Non-positive odds are framed as "risk the stake to win U",
//! so the stake is `U * |O| / 100`. With no usable odds the stake is U.

use std::fmt;

/// How the stake should be labelled on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeFraming {
    ToRisk,
    ToWin,
}

impl StakeFraming {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ToRisk => "TO RISK",
            Self::ToWin => "TO WIN",
        }
    }
}

/// Stake derived from odds and units at confirmation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stake {
    pub amount: f64,
    pub framing: StakeFraming,
}

/// Validated American odds. `|value| >= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Odds(i32);

impl Odds {
    /// Parses `-110`, `+150`, `150`, `EVEN` or `EV`. Returns `None` for
    /// anything else, including values between -100 and +100.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("even") || trimmed.eq_ignore_ascii_case("ev") {
            return Some(Self(100));
        }

        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let value: i32 = digits.parse().ok()?;
        Self::from_value(value)
    }

    /// Wraps a stored value, rejecting ones that aren't valid American odds.
    #[must_use]
    pub const fn from_value(value: i32) -> Option<Self> {
        if value >= 100 || value <= -100 {
            Some(Self(value))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 100 {
            write!(f, "EVEN")
        } else if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Rounds to cents-of-a-unit so stored stakes compare cleanly.
#[must_use]
pub fn round_units(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes the stake for `units` risked at `odds`.
///
/// Favourites and `EVEN` are framed as "to win"; underdogs and missing odds
/// as "to risk".
#[must_use]
pub fn compute_stake(odds: Option<Odds>, units: u8) -> Stake {
    let units = f64::from(units);
    match odds {
        Some(odds) if odds.value() < 0 || odds.value() == 100 => Stake {
            amount: round_units(units * f64::from(odds.value().abs()) / 100.0),
            framing: StakeFraming::ToWin,
        },
        _ => Stake {
            amount: units,
            framing: StakeFraming::ToRisk,
        },
    }
}

/// Formats a signed unit amount, e.g. `+2.2u` or `-1u`.
#[must_use]
pub fn format_units(value: f64) -> String {
    let rounded = round_units(value);
    let sign = if rounded > 0.0 { "+" } else { "" };
    if rounded.fract() == 0.0 {
        format!("{sign}{rounded:.0}u")
    } else {
        format!("{sign}{rounded}u")
    }
}
