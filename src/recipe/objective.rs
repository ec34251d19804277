//! Blend objectives and stated taste preferences.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the blend should optimize for, beyond the hard constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Even-handed cup, no dimension favored.
    #[default]
    Balanced,
    /// Best cup quality regardless of cost.
    BestTaste,
    /// Cheapest blend that still matches the preferences.
    LowestCost,
    /// High acidity and fruit, lighter body.
    Bright,
    /// Heavy body, chocolate and roast.
    Bold,
}

impl Objective {
    /// All objectives, in declaration order.
    pub const ALL: [Objective; 5] = [
        Objective::Balanced,
        Objective::BestTaste,
        Objective::LowestCost,
        Objective::Bright,
        Objective::Bold,
    ];

    /// One-line instruction included in the generator prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Objective::Balanced => {
                "Aim for a balanced cup where no single sensory dimension dominates."
            }
            Objective::BestTaste => {
                "Maximize cup quality: favor aromatic, sweet, complex lots even if they cost more."
            }
            Objective::LowestCost => {
                "Minimize ingredient cost per unit while staying close to the stated preferences."
            }
            Objective::Bright => {
                "Favor bright acidity and fruit-forward lots; keep the body light."
            }
            Objective::Bold => {
                "Favor heavy body, chocolate and roast notes; keep acidity low."
            }
        }
    }

    /// Offsets applied to the neutral target before explicit preferences.
    pub(crate) fn bias(&self) -> &'static [(&'static str, f64)] {
        match self {
            Objective::Balanced | Objective::LowestCost => &[],
            Objective::BestTaste => &[("aroma", 1.5), ("sweetness", 1.0)],
            Objective::Bright => &[("acidity", 2.0), ("fruitiness", 2.0), ("body", -1.0)],
            Objective::Bold => &[
                ("body", 2.0),
                ("chocolate", 2.0),
                ("bitterness", 1.0),
                ("acidity", -1.0),
            ],
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Balanced => write!(f, "balanced"),
            Objective::BestTaste => write!(f, "best_taste"),
            Objective::LowestCost => write!(f, "lowest_cost"),
            Objective::Bright => write!(f, "bright"),
            Objective::Bold => write!(f, "bold"),
        }
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "balanced" => Ok(Objective::Balanced),
            "best_taste" | "taste" => Ok(Objective::BestTaste),
            "lowest_cost" | "cost" | "cheap" => Ok(Objective::LowestCost),
            "bright" => Ok(Objective::Bright),
            "bold" => Ok(Objective::Bold),
            other => Err(format!(
                "unknown objective '{}', expected one of: balanced, best_taste, lowest_cost, bright, bold",
                other
            )),
        }
    }
}

/// Stated preferences, keyed by name.
///
/// Keys matching a sensory dimension steer the target profile; every key is
/// passed through to the generator as-is.
pub type Preferences = BTreeMap<String, serde_json::Value>;

/// Maps a preference value onto the 0..=10 scale.
///
/// Numbers are clamped; `"low"`, `"medium"`, `"high"` map to 2.5, 5 and 8.
/// Anything else carries no level.
pub fn preference_level(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 10.0)),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(0.0),
            "low" => Some(2.5),
            "medium" | "mid" => Some(5.0),
            "high" => Some(8.0),
            "max" => Some(10.0),
            other => other.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 10.0)),
        },
        _ => None,
    }
}
