use anyhow::Result;
use chrono::Local;
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::placeholders::extract_placeholders;

/// Delay used for `wait` steps that don't specify one
pub const DEFAULT_WAIT_MS: u64 = 1000;

/// Action tags this version knows how to replay
const KNOWN_ACTIONS: [&str; 5] = ["navigate", "click", "fill", "prompt", "wait"];

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

/// Text field that also accepts `null` (stored for inputs without a value)
/// and plain scalars
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected text, got {}", other))),
    }
}

/// Wait delay in milliseconds. Fractional delays are rounded, `null` means
/// the default.
fn lenient_delay_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(DEFAULT_WAIT_MS),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|ms| ms.is_finite() && *ms >= 0.0)
                    .map(|ms| ms.round() as u64)
            })
            .ok_or_else(|| de::Error::custom(format!("invalid wait delay {}", n))),
        other => Err(de::Error::custom(format!(
            "wait delay must be a number, got {}",
            other
        ))),
    }
}

/// Current local time in the ISO-8601 form used for step and recipe timestamps
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// The action vocabulary shared by the recorder and the replay engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    /// Load a URL in the main frame
    Navigate { url: String },
    /// Click an element; `text` is the element's visible text at capture time
    Click {
        selector: String,
        #[serde(default, deserialize_with = "lenient_text")]
        text: String,
    },
    /// Set the value of an input element
    Fill {
        selector: String,
        #[serde(default, deserialize_with = "lenient_text")]
        value: String,
    },
    /// Operator hint inserted manually during recording
    Prompt { message: String },
    /// Pause replay
    Wait {
        #[serde(
            rename = "delayMs",
            alias = "delay",
            default = "default_wait_ms",
            deserialize_with = "lenient_delay_ms"
        )]
        delay_ms: u64,
    },
    /// A stored step with an action tag this version doesn't know.
    /// Its fields are kept so rewriting the store doesn't lose them.
    #[serde(skip)]
    Unrecognized {
        action: String,
        fields: Map<String, Value>,
    },
}

impl Action {
    /// The `action` tag as it appears in the recipe file
    pub fn name(&self) -> &str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Prompt { .. } => "prompt",
            Action::Wait { .. } => "wait",
            Action::Unrecognized { action, .. } => action.as_str(),
        }
    }

    /// Short human-readable form for console output
    pub fn describe(&self) -> String {
        match self {
            Action::Navigate { url } => format!("navigate {}", url),
            Action::Click { selector, text } if text.is_empty() => format!("click {}", selector),
            Action::Click { selector, text } => format!("click {} ({:?})", selector, text),
            Action::Fill { selector, value } => format!("fill {} = {:?}", selector, value),
            Action::Prompt { message } => format!("prompt {:?}", message),
            Action::Wait { delay_ms } => format!("wait {}ms", delay_ms),
            Action::Unrecognized { action, .. } => format!("{} (unrecognized)", action),
        }
    }
}

/// One recorded step: an action plus its capture time.
///
/// The timestamp is informational only. Position in the recipe is what orders
/// steps, and hand-written steps may omit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: Action,
    pub timestamp: Option<String>,
}

impl Step {
    /// Create a step stamped with the current time
    pub fn now(action: Action) -> Self {
        Self {
            action,
            timestamp: Some(now_timestamp()),
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::now(Action::Navigate { url: url.into() })
    }

    pub fn click(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self::now(Action::Click {
            selector: selector.into(),
            text: text.into(),
        })
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::now(Action::Fill {
            selector: selector.into(),
            value: value.into(),
        })
    }

    pub fn prompt(message: impl Into<String>) -> Self {
        Self::now(Action::Prompt {
            message: message.into(),
        })
    }

    pub fn wait(delay_ms: u64) -> Self {
        Self::now(Action::Wait { delay_ms })
    }

    /// Selector of a fill step, `None` for every other action
    pub fn fill_selector(&self) -> Option<&str> {
        match &self.action {
            Action::Fill { selector, .. } => Some(selector.as_str()),
            _ => None,
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = match &self.action {
            Action::Unrecognized { action, fields } => {
                let mut map = fields.clone();
                map.insert("action".to_string(), Value::String(action.clone()));
                map
            }
            known => match serde_json::to_value(known).map_err(ser::Error::custom)? {
                Value::Object(map) => map,
                other => {
                    return Err(ser::Error::custom(format!(
                        "step action serialized to a non-object: {}",
                        other
                    )))
                }
            },
        };

        if let Some(ref timestamp) = self.timestamp {
            map.insert("timestamp".to_string(), Value::String(timestamp.clone()));
        }

        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = Map::<String, Value>::deserialize(deserializer)?;

        let timestamp = match raw.remove("timestamp") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        let tag = match raw.get("action") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "step action must be a string, got {}",
                    other
                )))
            }
            None => return Err(de::Error::missing_field("action")),
        };

        let action = if KNOWN_ACTIONS.contains(&tag.as_str()) {
            serde_json::from_value(Value::Object(raw)).map_err(de::Error::custom)?
        } else {
            raw.remove("action");
            Action::Unrecognized {
                action: tag,
                fields: raw,
            }
        };

        Ok(Step { action, timestamp })
    }
}

/// Stored form of a recipe. Placeholders are never trusted from disk.
#[derive(Deserialize)]
struct RecipeRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    steps: Vec<Step>,
}

impl From<RecipeRecord> for Recipe {
    fn from(record: RecipeRecord) -> Self {
        Recipe::assemble(record.name, record.description, record.created, record.steps)
    }
}

/// A named, linear sequence of replayable steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecipeRecord")]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub created: String,
    steps: Vec<Step>,
    placeholders: BTreeSet<String>,
}

impl Recipe {
    /// Build a recipe from a canonical step sequence, stamped with the current time
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<Step>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            anyhow::bail!("Recipe name must not be empty");
        }
        Ok(Self::assemble(name, description.into(), now_timestamp(), steps))
    }

    fn assemble(name: String, description: String, created: String, steps: Vec<Step>) -> Self {
        let placeholders = extract_placeholders(&steps);
        Self {
            name,
            description,
            created,
            steps,
            placeholders,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// `{token}` names found in fill values, derived from the steps
    pub fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    /// Fill steps as `(selector, recorded value)`, one entry per selector in
    /// first-seen order, holding the last recorded value
    pub fn fill_fields(&self) -> Vec<(&str, &str)> {
        let mut fields: Vec<(&str, &str)> = Vec::new();
        for step in &self.steps {
            if let Action::Fill { selector, value } = &step.action {
                match fields.iter_mut().find(|(s, _)| *s == selector.as_str()) {
                    Some(entry) => entry.1 = value.as_str(),
                    None => fields.push((selector.as_str(), value.as_str())),
                }
            }
        }
        fields
    }
}
