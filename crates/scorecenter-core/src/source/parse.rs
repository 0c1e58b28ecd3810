// JSON response parsing for the ESPN sports API.
//
// Every endpoint nests its payload under `sports[0].leagues`; news is the
// exception and uses a top-level `headlines` array. Entities fall back to their
// primary name when the alternate key (`abbreviation`, `shortName`) is absent.

use chrono::DateTime;
use serde_json::Value;

use super::DataError;
use crate::grouping::{Grouping, ImageHandle, NodeId, Player};
use crate::news::NewsItem;

/// Image attached to every team until real logos are wired up.
pub const TEAM_PLACEHOLDER_IMAGE: &str = "team-placeholder";
/// Image attached to every player until real headshots are wired up.
pub const HEADSHOT_PLACEHOLDER_IMAGE: &str = "headshot-placeholder";

// ---------------------------------------------------------------------------
// Endpoint parsers
// ---------------------------------------------------------------------------

/// `sports[0].leagues[*]` → LEAGUE groupings.
pub fn parse_leagues(body: &str) -> Result<Vec<Grouping>, DataError> {
    let root = parse_root(body)?;
    let leagues = first_sport_leagues(&root)?;
    Ok(leagues
        .iter()
        .map(|obj| {
            let (name, abbreviation) = name_pair(obj, "name", "abbreviation");
            Grouping::league(name, abbreviation)
        })
        .collect())
}

/// `sports[0].leagues[0].teams[*]` → TEAM groupings with location.
pub fn parse_teams(body: &str) -> Result<Vec<Grouping>, DataError> {
    let root = parse_root(body)?;
    let teams = first_league_array(&root, "teams")?;
    Ok(teams
        .iter()
        .map(|obj| {
            let (name, abbreviation) = name_pair(obj, "name", "abbreviation");
            let location = string_field(obj, "location").unwrap_or_default();
            Grouping::team(name, abbreviation, location)
                .with_image(ImageHandle::named(TEAM_PLACEHOLDER_IMAGE))
        })
        .collect())
}

/// `sports[0].leagues[0].athletes[*]` → players belonging to `team`.
pub fn parse_athletes(body: &str, team: NodeId) -> Result<Vec<Player>, DataError> {
    let root = parse_root(body)?;
    let athletes = first_league_array(&root, "athletes")?;
    Ok(athletes
        .iter()
        .map(|obj| {
            let (display_name, short_name) = name_pair(obj, "displayName", "shortName");
            Player {
                display_name,
                short_name,
                position: athlete_position(obj),
                team,
                headshot: Some(ImageHandle::named(HEADSHOT_PLACEHOLDER_IMAGE)),
            }
        })
        .collect())
}

/// Top-level `headlines[*]` → news items. A headline without `headline` or
/// `id` makes the whole response malformed.
pub fn parse_headlines(body: &str) -> Result<Vec<NewsItem>, DataError> {
    let root = parse_root(body)?;
    let headlines = root
        .get("headlines")
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Malformed("missing headlines array".into()))?;

    headlines
        .iter()
        .enumerate()
        .map(|(i, obj)| {
            let headline = string_field(obj, "headline")
                .ok_or_else(|| DataError::Malformed(format!("headline {i} has no `headline`")))?;
            let id = string_field(obj, "id")
                .ok_or_else(|| DataError::Malformed(format!("headline {i} has no `id`")))?;
            let published = string_field(obj, "published")
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok());
            Ok(NewsItem {
                id,
                headline,
                published,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_root(body: &str) -> Result<Value, DataError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DataError::Malformed("empty response body".into()));
    }
    serde_json::from_str(trimmed).map_err(|e| DataError::Malformed(format!("invalid json: {e}")))
}

fn first_sport_leagues(root: &Value) -> Result<&Vec<Value>, DataError> {
    root.get("sports")
        .and_then(Value::as_array)
        .and_then(|sports| sports.first())
        .and_then(|sport| sport.get("leagues"))
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Malformed("missing sports[0].leagues".into()))
}

fn first_league_array<'a>(root: &'a Value, key: &str) -> Result<&'a Vec<Value>, DataError> {
    first_sport_leagues(root)?
        .first()
        .and_then(|league| league.get(key))
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Malformed(format!("missing sports[0].leagues[0].{key}")))
}

/// String value of `key`; numbers are rendered as text (ids are numeric in
/// some feeds).
fn string_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn name_pair(obj: &Value, primary: &str, alternate: &str) -> (String, String) {
    let name = string_field(obj, primary).unwrap_or_default();
    let alt = string_field(obj, alternate).unwrap_or_else(|| name.clone());
    (name, alt)
}

fn athlete_position(obj: &Value) -> String {
    let named = |v: &Value| -> Option<String> {
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => string_field(v, "name").or_else(|| string_field(v, "abbreviation")),
            _ => None,
        }
    };

    obj.get("position")
        .and_then(named)
        .or_else(|| {
            obj.get("positions")
                .and_then(Value::as_array)
                .and_then(|list| list.first())
                .and_then(named)
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
