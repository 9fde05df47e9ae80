//! Content kinds offered by the generators, with their prompt and fallback policy.

use crate::provider::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Request parameters a campaign fallback may be built from
const CAMPAIGN_FALLBACK_KEYS: [&str; 6] = [
    "title",
    "setting",
    "theme",
    "tone",
    "player_count",
    "level_range",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Character,
    Npc,
    Item,
    Quest,
    Encounter,
    World,
    Campaign,
}

impl ContentKind {
    pub const ALL: [ContentKind; 7] = [
        ContentKind::Character,
        ContentKind::Npc,
        ContentKind::Item,
        ContentKind::Quest,
        ContentKind::Encounter,
        ContentKind::World,
        ContentKind::Campaign,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Character => "character",
            ContentKind::Npc => "npc",
            ContentKind::Item => "item",
            ContentKind::Quest => "quest",
            ContentKind::Encounter => "encounter",
            ContentKind::World => "world",
            ContentKind::Campaign => "campaign",
        }
    }

    /// Top-level field every recovered record of this kind must have
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            ContentKind::Character | ContentKind::Npc | ContentKind::Item | ContentKind::World => {
                &["name"]
            }
            ContentKind::Quest | ContentKind::Encounter | ContentKind::Campaign => &["title"],
        }
    }

    fn description(self) -> &'static str {
        match self {
            ContentKind::Character => "a player character with name, race, class, level, ability scores, background and equipment",
            ContentKind::Npc => "a non-player character with name, role, personality, motivation and a secret",
            ContentKind::Item => "a magic or mundane item with name, type, rarity, description and properties",
            ContentKind::Quest => "a quest with title, hook, objectives, complications and rewards",
            ContentKind::Encounter => "an encounter with title, environment, enemies, tactics and treasure",
            ContentKind::World => "a world with name, regions, factions, history and notable locations",
            ContentKind::Campaign => "a campaign outline with title, setting, premise, acts and key NPCs",
        }
    }

    pub fn system_prompt(self) -> String {
        format!(
            "You are a tabletop RPG content generator. Create {}. \
             Respond with a single JSON object only, without markdown fences or commentary.",
            self.description()
        )
    }

    /// System and user messages for one generation
    pub fn build_messages(self, prompt: &str, parameters: &Map<String, Value>) -> Vec<ChatMessage> {
        let mut user = prompt.trim().to_string();
        if !parameters.is_empty() {
            let rendered = Value::Object(parameters.clone()).to_string();
            user.push_str("\n\nParameters: ");
            user.push_str(&rendered);
        }
        vec![ChatMessage::system(self.system_prompt()), ChatMessage::user(user)]
    }

    /// Only campaign generation has a degraded-success path today; other kinds
    /// surface a recovery error on unrecoverable output.
    pub fn supports_fallback(self) -> bool {
        matches!(self, ContentKind::Campaign)
    }

    /// Minimal record assembled from request parameters, when this kind allows one.
    /// Returns `None` when none of the usable parameters were supplied.
    pub fn fallback_from(self, parameters: &Map<String, Value>) -> Option<Map<String, Value>> {
        if !self.supports_fallback() {
            return None;
        }
        let fallback: Map<String, Value> = CAMPAIGN_FALLBACK_KEYS
            .iter()
            .filter_map(|key| {
                parameters
                    .get(*key)
                    .filter(|value| !value.is_null())
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();
        (!fallback.is_empty()).then_some(fallback)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown content kind: {}", s))
    }
}
