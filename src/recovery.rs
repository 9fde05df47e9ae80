//! Response Recovery
//!
//! Turns free-text provider output into a structured object. The provider is asked
//! for a bare JSON object but regularly wraps it in markdown, embeds it in prose,
//! leaves trailing commas, or stops mid-structure when it hits its token limit.
//! Recovery walks an ordered list of tiers and stops at the first one that yields
//! an acceptable value.

use crate::error::RecoveryError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

mod repair;

/// Raw-text prefix kept on a [`RecoveryError`] for diagnostics
const PREVIEW_CHARS: usize = 200;

/// Input handed to every tier
#[derive(Debug, Clone, Copy)]
pub struct RecoveryInput<'a> {
    pub raw: &'a str,
    /// Provider stopped because of its token limit (`finish_reason == "length"`)
    pub truncated: bool,
    pub fallback: Option<&'a Map<String, Value>>,
}

/// One step in the recovery order
#[derive(Clone, Copy)]
pub struct RecoveryTier {
    pub tier: u8,
    pub name: &'static str,
    pub attempt: fn(&RecoveryInput<'_>) -> Option<Value>,
}

impl std::fmt::Debug for RecoveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryTier")
            .field("tier", &self.tier)
            .field("name", &self.name)
            .finish()
    }
}

/// Tiers in the order they are tried.
pub const TIERS: [RecoveryTier; 6] = [
    RecoveryTier {
        tier: 0,
        name: "direct",
        attempt: parse_direct,
    },
    RecoveryTier {
        tier: 1,
        name: "fenced",
        attempt: parse_fenced,
    },
    RecoveryTier {
        tier: 2,
        name: "braced-span",
        attempt: parse_braced_span,
    },
    RecoveryTier {
        tier: 3,
        name: "syntax-repair",
        attempt: parse_repaired,
    },
    RecoveryTier {
        tier: 4,
        name: "balanced",
        attempt: parse_balanced,
    },
    RecoveryTier {
        tier: 5,
        name: "fallback",
        attempt: synthesize_fallback,
    },
];

/// Record of one tier attempt
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryAttempt {
    pub tier: u8,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

/// Caller-controlled recovery options
#[derive(Debug, Clone, Default)]
pub struct RecoveryOptions {
    pub truncated: bool,
    /// Defaults for fallback synthesis. `None` or an empty map disables tier 5.
    pub fallback: Option<Map<String, Value>>,
    /// Top-level fields a recovered object must carry
    pub required_fields: Vec<String>,
}

impl RecoveryOptions {
    pub fn truncated(truncated: bool) -> Self {
        Self {
            truncated,
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, fallback: Map<String, Value>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn require<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        if self.required_fields.is_empty() {
            return true;
        }
        match value.as_object() {
            Some(object) => self
                .required_fields
                .iter()
                .all(|field| object.contains_key(field)),
            None => false,
        }
    }
}

/// Successfully recovered output
#[derive(Debug, Clone)]
pub struct Recovered {
    pub value: Value,
    /// Tier that produced the value
    pub tier: u8,
    pub attempts: Vec<RecoveryAttempt>,
}

impl Recovered {
    /// Whether the value came from fallback synthesis rather than provider output
    pub fn is_degraded(&self) -> bool {
        self.tier == 5
    }
}

/// Recover a structured value from raw provider text.
pub fn recover(raw: &str, options: &RecoveryOptions) -> Result<Recovered, RecoveryError> {
    let input = RecoveryInput {
        raw,
        truncated: options.truncated,
        fallback: options.fallback.as_ref(),
    };
    let mut attempts = Vec::with_capacity(TIERS.len());

    for tier in TIERS.iter() {
        let Some(value) = (tier.attempt)(&input).filter(|v| options.accepts(v)) else {
            attempts.push(RecoveryAttempt {
                tier: tier.tier,
                succeeded: false,
                output: None,
            });
            continue;
        };

        attempts.push(RecoveryAttempt {
            tier: tier.tier,
            succeeded: true,
            output: Some(value.clone()),
        });
        if tier.tier >= 3 {
            info!(
                tier = tier.tier,
                strategy = tier.name,
                truncated = options.truncated,
                raw_len = raw.len(),
                "Recovered provider output after repair"
            );
        } else {
            debug!(tier = tier.tier, strategy = tier.name, "Recovered provider output");
        }
        return Ok(Recovered {
            value,
            tier: tier.tier,
            attempts,
        });
    }

    let preview: String = raw.chars().take(PREVIEW_CHARS).collect();
    error!(
        raw_len = raw.len(),
        truncated = options.truncated,
        has_fallback = options.fallback.is_some(),
        "All recovery tiers failed"
    );
    Err(RecoveryError { attempts, preview })
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

fn parse_direct(input: &RecoveryInput<'_>) -> Option<Value> {
    serde_json::from_str(input.raw.trim()).ok()
}

fn parse_fenced(input: &RecoveryInput<'_>) -> Option<Value> {
    repair::fenced_block(input.raw).and_then(|block| serde_json::from_str(block).ok())
}

fn parse_braced_span(input: &RecoveryInput<'_>) -> Option<Value> {
    repair::braced_span(input.raw).and_then(parse_object)
}

fn parse_repaired(input: &RecoveryInput<'_>) -> Option<Value> {
    let candidate = repair::repair_candidate(input.raw)?;
    parse_object(&repair::repair_syntax(candidate))
}

fn parse_balanced(input: &RecoveryInput<'_>) -> Option<Value> {
    let balance = |candidate: &str| {
        let repaired = repair::repair_syntax(candidate);
        parse_object(&repair::repair_syntax(&repair::balance_closers(&repaired)))
    };

    // Truncated output keeps more content when the whole tail is closed off;
    // the repair candidate drops the partial trailing element instead.
    if input.truncated {
        if let Some(value) = repair::object_tail(input.raw).and_then(balance) {
            return Some(value);
        }
    }
    repair::repair_candidate(input.raw).and_then(balance)
}

fn synthesize_fallback(input: &RecoveryInput<'_>) -> Option<Value> {
    input
        .fallback
        .filter(|defaults| !defaults.is_empty())
        .map(|defaults| Value::Object(defaults.clone()))
}
