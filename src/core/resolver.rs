//! Entity resolver - normalizes free-text team and player names and finds
//! artwork for the preview card.
//!
//! Lookups are cached. Nothing here can fail: unknown names are title-cased
//! and unknown artwork falls back to the configured placeholder.

use super::cache::KvCache;
use std::time::Duration;

const CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const CACHE_CAPACITY: usize = 2048;

/// Canonical identity for a free-text name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub name: String,
    pub image_url: Option<String>,
}

/// Artwork chosen for a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArt {
    pub entity_image: String,
    pub league_image: String,
}

// (abbreviation, canonical name, aliases)
type TeamRow = (&'static str, &'static str, &'static [&'static str]);

const NFL_TEAMS: &[TeamRow] = &[
    ("ari", "Arizona Cardinals", &["cardinals", "arizona", "ari"]),
    ("atl", "Atlanta Falcons", &["falcons", "atlanta", "atl"]),
    ("bal", "Baltimore Ravens", &["ravens", "baltimore", "bal"]),
    ("buf", "Buffalo Bills", &["bills", "buffalo", "buf"]),
    ("car", "Carolina Panthers", &["panthers", "carolina", "car"]),
    ("chi", "Chicago Bears", &["bears", "chicago", "chi"]),
    ("cin", "Cincinnati Bengals", &["bengals", "cincinnati", "cin"]),
    ("cle", "Cleveland Browns", &["browns", "cleveland", "cle"]),
    ("dal", "Dallas Cowboys", &["cowboys", "dallas", "dal"]),
    ("den", "Denver Broncos", &["broncos", "denver", "den"]),
    ("det", "Detroit Lions", &["lions", "detroit", "det"]),
    ("gb", "Green Bay Packers", &["packers", "green bay", "gb"]),
    ("hou", "Houston Texans", &["texans", "houston", "hou"]),
    ("ind", "Indianapolis Colts", &["colts", "indianapolis", "ind"]),
    ("jax", "Jacksonville Jaguars", &["jaguars", "jags", "jacksonville", "jax"]),
    ("kc", "Kansas City Chiefs", &["chiefs", "kansas city", "kc"]),
    ("lv", "Las Vegas Raiders", &["raiders", "las vegas", "lv"]),
    ("lac", "Los Angeles Chargers", &["chargers", "lac"]),
    ("lar", "Los Angeles Rams", &["rams", "lar"]),
    ("mia", "Miami Dolphins", &["dolphins", "miami", "mia"]),
    ("min", "Minnesota Vikings", &["vikings", "minnesota", "min"]),
    ("ne", "New England Patriots", &["patriots", "pats", "new england", "ne"]),
    ("no", "New Orleans Saints", &["saints", "new orleans", "no"]),
    ("nyg", "New York Giants", &["giants", "nyg"]),
    ("nyj", "New York Jets", &["jets", "nyj"]),
    ("phi", "Philadelphia Eagles", &["eagles", "philadelphia", "philly", "phi"]),
    ("pit", "Pittsburgh Steelers", &["steelers", "pittsburgh", "pit"]),
    ("sf", "San Francisco 49ers", &["49ers", "niners", "san francisco", "sf"]),
    ("sea", "Seattle Seahawks", &["seahawks", "seattle", "sea"]),
    ("tb", "Tampa Bay Buccaneers", &["buccaneers", "bucs", "tampa bay", "tb"]),
    ("ten", "Tennessee Titans", &["titans", "tennessee", "ten"]),
    ("wsh", "Washington Commanders", &["commanders", "washington", "wsh"]),
];

const NBA_TEAMS: &[TeamRow] = &[
    ("atl", "Atlanta Hawks", &["hawks", "atlanta", "atl"]),
    ("bos", "Boston Celtics", &["celtics", "boston", "bos"]),
    ("bkn", "Brooklyn Nets", &["nets", "brooklyn", "bkn"]),
    ("cha", "Charlotte Hornets", &["hornets", "charlotte", "cha"]),
    ("chi", "Chicago Bulls", &["bulls", "chicago", "chi"]),
    ("cle", "Cleveland Cavaliers", &["cavaliers", "cavs", "cleveland", "cle"]),
    ("dal", "Dallas Mavericks", &["mavericks", "mavs", "dallas", "dal"]),
    ("den", "Denver Nuggets", &["nuggets", "denver", "den"]),
    ("det", "Detroit Pistons", &["pistons", "detroit", "det"]),
    ("gs", "Golden State Warriors", &["warriors", "golden state", "gsw", "gs"]),
    ("hou", "Houston Rockets", &["rockets", "houston", "hou"]),
    ("ind", "Indiana Pacers", &["pacers", "indiana", "ind"]),
    ("lac", "LA Clippers", &["clippers", "lac"]),
    ("lal", "Los Angeles Lakers", &["lakers", "lal"]),
    ("mem", "Memphis Grizzlies", &["grizzlies", "memphis", "mem"]),
    ("mia", "Miami Heat", &["heat", "miami", "mia"]),
    ("mil", "Milwaukee Bucks", &["bucks", "milwaukee", "mil"]),
    ("min", "Minnesota Timberwolves", &["timberwolves", "wolves", "minnesota", "min"]),
    ("no", "New Orleans Pelicans", &["pelicans", "new orleans", "nop", "no"]),
    ("ny", "New York Knicks", &["knicks", "new york", "nyk", "ny"]),
    ("okc", "Oklahoma City Thunder", &["thunder", "oklahoma city", "okc"]),
    ("orl", "Orlando Magic", &["magic", "orlando", "orl"]),
    ("phi", "Philadelphia 76ers", &["76ers", "sixers", "philadelphia", "phi"]),
    ("phx", "Phoenix Suns", &["suns", "phoenix", "phx"]),
    ("por", "Portland Trail Blazers", &["trail blazers", "blazers", "portland", "por"]),
    ("sac", "Sacramento Kings", &["kings", "sacramento", "sac"]),
    ("sa", "San Antonio Spurs", &["spurs", "san antonio", "sas", "sa"]),
    ("tor", "Toronto Raptors", &["raptors", "toronto", "tor"]),
    ("utah", "Utah Jazz", &["jazz", "utah", "uta"]),
    ("wsh", "Washington Wizards", &["wizards", "washington", "was", "wsh"]),
];

fn team_table(league: &str) -> Option<(&'static [TeamRow], &'static str)> {
    match league {
        "NFL" => Some((NFL_TEAMS, "nfl")),
        "NBA" => Some((NBA_TEAMS, "nba")),
        _ => None,
    }
}

fn league_image(league: &str) -> Option<String> {
    let slug = match league {
        "NFL" | "NBA" | "MLB" | "NHL" | "WNBA" | "MLS" => league.to_ascii_lowercase(),
        "NCAAF" => "ncaa".to_string(),
        "NCAAB" => "ncaab".to_string(),
        "EPL" => "eng.1".to_string(),
        "PGA" => "pga".to_string(),
        "F1" => "f1".to_string(),
        "UFC" | "MMA" => "ufc".to_string(),
        _ => return None,
    };
    Some(format!(
        "https://a.espncdn.com/i/teamlogos/leagues/500/{slug}.png"
    ))
}

/// Collapses whitespace and capitalises the first letter of each word.
///
/// The rest of each word is kept as typed so names like "LeBron" survive.
#[must_use]
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cached name and artwork lookups.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    cache: KvCache<(String, String), ResolvedEntity>,
    placeholder_image: String,
}

impl EntityResolver {
    #[must_use]
    pub fn new(placeholder_image: impl Into<String>) -> Self {
        Self {
            cache: KvCache::new(CACHE_CAPACITY),
            placeholder_image: placeholder_image.into(),
        }
    }

    fn lookup(league: &str, raw: &str) -> ResolvedEntity {
        let needle = raw.trim().to_lowercase();
        if let Some((teams, sport)) = team_table(league) {
            let hit = teams.iter().find(|(_, name, aliases)| {
                name.eq_ignore_ascii_case(&needle) || aliases.contains(&needle.as_str())
            });
            if let Some((abbr, name, _)) = hit {
                return ResolvedEntity {
                    name: (*name).to_string(),
                    image_url: Some(format!(
                        "https://a.espncdn.com/i/teamlogos/{sport}/500/{abbr}.png"
                    )),
                };
            }
        }

        ResolvedEntity {
            name: normalize_name(raw),
            image_url: None,
        }
    }

    /// Canonical identity for `raw` within `league`.
    pub async fn resolve(&self, league: &str, raw: &str) -> ResolvedEntity {
        let key = (league.to_string(), raw.trim().to_lowercase());
        if let Some(hit) = self.cache.get(&key).await {
            return hit;
        }

        let resolved = Self::lookup(league, raw);
        self.cache.set(key, resolved.clone(), CACHE_TTL).await;
        resolved
    }

    /// Artwork for a preview, degrading to the placeholder.
    pub async fn preview_art(&self, league: &str, subject: &str) -> PreviewArt {
        let entity = self.resolve(league, subject).await;
        PreviewArt {
            entity_image: entity
                .image_url
                .unwrap_or_else(|| self.placeholder_image.clone()),
            league_image: league_image(league).unwrap_or_else(|| self.placeholder_image.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  jon   jones "), "Jon Jones");
        assert_eq!(normalize_name("LeBron James"), "LeBron James");
        assert_eq!(normalize_name("deAndre hopkins"), "DeAndre Hopkins");
        assert_eq!(normalize_name(""), "");
    }

    #[tokio::test]
    async fn test_resolves_team_alias() {
        let resolver = EntityResolver::new("placeholder");
        let eagles = resolver.resolve("NFL", "Philly").await;
        assert_eq!(eagles.name, "Philadelphia Eagles");
        assert_eq!(
            eagles.image_url.as_deref(),
            Some("https://a.espncdn.com/i/teamlogos/nfl/500/phi.png")
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_degrades_to_placeholder() {
        let resolver = EntityResolver::new("placeholder");
        let art = resolver.preview_art("HORSE", "secretariat").await;
        assert_eq!(art.entity_image, "placeholder");
        assert_eq!(art.league_image, "placeholder");
        assert_eq!(resolver.resolve("HORSE", "secretariat").await.name, "Secretariat");
    }
}
