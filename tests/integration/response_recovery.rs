//! Integration tests for response recovery on realistic provider output
//!
//! Tests cover:
//! - Chatty wrappers around otherwise valid records
//! - Long records cut off at the token limit
//! - Content-kind required fields and campaign fallback
//! - Failure reporting when nothing is recoverable

use serde_json::{json, Map, Value};
use taleforge::content::ContentKind;
use taleforge::recovery::{recover, RecoveryOptions};

fn options_for(kind: ContentKind, truncated: bool, parameters: &Map<String, Value>) -> RecoveryOptions {
    let mut options = RecoveryOptions::truncated(truncated).require(kind.required_fields().iter().copied());
    options.fallback = kind.fallback_from(parameters);
    options
}

#[test]
fn character_sheet_in_markdown_with_commentary() {
    let raw = r#"Absolutely! Here's a character for your campaign:

```json
{
  "name": "Seraphine Ashvale",
  "race": "Half-Elf",
  "class": "Warlock",
  "level": 5,
  "abilities": {"str": 8, "dex": 14, "con": 12, "int": 13, "wis": 10, "cha": 18},
  "equipment": ["light crossbow", "arcane focus", "leather armor"]
}
```

Let me know if you'd like a backstory!"#;

    let result = recover(raw, &options_for(ContentKind::Character, false, &Map::new())).unwrap();
    assert_eq!(result.tier, 1);
    assert_eq!(result.value["name"], "Seraphine Ashvale");
    assert_eq!(result.value["abilities"]["cha"], 18);
    assert_eq!(result.value["equipment"].as_array().map(Vec::len), Some(3));
}

#[test]
fn unlabelled_fence_is_used_when_no_json_fence_exists() {
    let raw = "```\n{\"name\":\"Ghoul Warren\",\"cr\":3}\n```";
    let result = recover(raw, &RecoveryOptions::default()).unwrap();
    assert_eq!(result.tier, 1);
    assert_eq!(result.value, json!({"name": "Ghoul Warren", "cr": 3}));
}

#[test]
fn truncated_world_keeps_completed_regions() {
    let raw = r#"{"name": "Veyra", "regions": [{"name": "The Ashen Wastes", "danger": "high"}, {"name": "Port Lirel", "danger": "low"}, {"name": "The Gl"#;

    let result = recover(raw, &options_for(ContentKind::World, true, &Map::new())).unwrap();
    assert!(result.tier >= 3);
    let regions = result.value["regions"].as_array().unwrap();
    assert!(regions.len() >= 2);
    assert_eq!(regions[0]["name"], "The Ashen Wastes");
    assert_eq!(regions[1]["danger"], "low");
}

#[test]
fn braces_inside_strings_do_not_confuse_balancing() {
    let raw = r#"{"title": "The {Hidden} Door", "steps": ["find the key", "open the [sealed"#;
    let result = recover(raw, &RecoveryOptions::truncated(true).require(["title"])).unwrap();
    assert_eq!(result.value["title"], "The {Hidden} Door");
    assert_eq!(result.value["steps"][0], "find the key");
}

#[test]
fn quest_missing_its_title_is_not_accepted() {
    let raw = "{\"objective\":\"Recover the ring\"}";
    let err = recover(raw, &options_for(ContentKind::Quest, false, &Map::new())).unwrap_err();
    assert!(err.attempts.iter().all(|a| !a.succeeded));
    assert!(err.to_string().contains("0,1,2,3,4,5"));
}

#[test]
fn campaign_refusal_falls_back_to_form_inputs() {
    let mut parameters = Map::new();
    parameters.insert("title".to_string(), json!("Shadows over Karth"));
    parameters.insert("setting".to_string(), json!("gothic"));
    parameters.insert("player_count".to_string(), json!(4));
    parameters.insert("notes".to_string(), json!("not part of the fallback"));

    let result = recover(
        "I'm sorry, but I can't produce that campaign.",
        &options_for(ContentKind::Campaign, false, &parameters),
    )
    .unwrap();
    assert!(result.is_degraded());
    assert_eq!(
        result.value,
        json!({"title": "Shadows over Karth", "setting": "gothic", "player_count": 4})
    );
}

#[test]
fn npc_refusal_has_no_fallback() {
    let mut parameters = Map::new();
    parameters.insert("name".to_string(), json!("Old Tam"));
    let err = recover(
        "I'm sorry, but I can't do that.",
        &options_for(ContentKind::Npc, false, &parameters),
    )
    .unwrap_err();
    assert_eq!(err.preview, "I'm sorry, but I can't do that.");
}

#[test]
fn long_failure_preview_is_bounded() {
    let raw = "x".repeat(1_000);
    let err = recover(&raw, &RecoveryOptions::default()).unwrap_err();
    assert_eq!(err.preview.chars().count(), 200);
}
