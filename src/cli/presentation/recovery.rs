//! Recover command presentation.

use crate::recovery::{Recovered, TIERS};
use serde_json::json;

fn tier_name(tier: u8) -> &'static str {
    TIERS
        .iter()
        .find(|t| t.tier == tier)
        .map(|t| t.name)
        .unwrap_or("unknown")
}

pub fn format_recovered_text(recovered: &Recovered) -> String {
    let body = serde_json::to_string_pretty(&recovered.value).unwrap_or_else(|_| "null".to_string());
    let mut output = format!(
        "Recovered at tier {} ({})",
        recovered.tier,
        tier_name(recovered.tier)
    );
    if recovered.is_degraded() {
        output.push_str(" [fallback]");
    }
    output.push('\n');
    output.push_str(&body);
    output
}

pub fn format_recovered_json(recovered: &Recovered) -> String {
    let out = json!({
        "tier": recovered.tier,
        "tierName": tier_name(recovered.tier),
        "degraded": recovered.is_degraded(),
        "value": recovered.value,
        "attempts": recovered.attempts,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
