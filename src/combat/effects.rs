//! Effect strings
//!
//! Items and abilities describe what they do with a compact modifier
//! language, e.g. `"skill+2;damage+5"` or `"damage_multiplier:1.5;stamina_cost:10"`.
//!
//! Grammar (clauses separated by `;`, whitespace around clauses ignored):
//! - `stat+N` / `stat-N` - additive integer change to a stat
//! - `stat:N` - assign a stat (later assignments win)
//! - `target_multiplier:F` - scale damage or defense by a float factor
//! - `resource_cost:N` - cost paid when the effect is used
//! - `heal+N` - restore health up to the cap
//!
//! Parsing is all-or-nothing: one bad clause rejects the whole string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stats an effect clause can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Health,
    Skill,
    Luck,
    Stamina,
    Defense,
    /// Flat bonus added to attack damage
    Damage,
}

impl FromStr for Stat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "health" | "hp" => Ok(Stat::Health),
            "skill" => Ok(Stat::Skill),
            "luck" => Ok(Stat::Luck),
            "stamina" => Ok(Stat::Stamina),
            "defense" | "defence" => Ok(Stat::Defense),
            "damage" => Ok(Stat::Damage),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stat::Health => "health",
            Stat::Skill => "skill",
            Stat::Luck => "luck",
            Stat::Stamina => "stamina",
            Stat::Defense => "defense",
            Stat::Damage => "damage",
        };
        write!(f, "{}", s)
    }
}

/// What a `*_multiplier` clause scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierTarget {
    Damage,
    Defense,
}

impl FromStr for MultiplierTarget {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "damage" => Ok(MultiplierTarget::Damage),
            "defense" | "defence" => Ok(MultiplierTarget::Defense),
            _ => Err(()),
        }
    }
}

/// What a `*_cost` clause charges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Stamina,
    Health,
}

impl FromStr for Resource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stamina" => Ok(Resource::Stamina),
            "health" | "hp" => Ok(Resource::Health),
            _ => Err(()),
        }
    }
}

/// One parsed effect clause
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modifier {
    StatDelta { stat: Stat, amount: i32 },
    StatSet { stat: Stat, value: i32 },
    Multiplier { target: MultiplierTarget, factor: f64 },
    FlatCost { resource: Resource, amount: i32 },
    Heal { amount: i32 },
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::StatDelta { stat, amount } => write!(f, "{}{:+}", stat, amount),
            Modifier::StatSet { stat, value } => write!(f, "{}:{}", stat, value),
            Modifier::Multiplier { target, factor } => {
                let target = match target {
                    MultiplierTarget::Damage => "damage",
                    MultiplierTarget::Defense => "defense",
                };
                write!(f, "{}_multiplier:{}", target, factor)
            }
            Modifier::FlatCost { resource, amount } => {
                let resource = match resource {
                    Resource::Stamina => "stamina",
                    Resource::Health => "health",
                };
                write!(f, "{}_cost:{}", resource, amount)
            }
            Modifier::Heal { amount } => write!(f, "heal+{}", amount),
        }
    }
}

/// An effect string that does not follow the grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed effect clause '{clause}': {reason}")]
pub struct MalformedEffectError {
    /// The offending clause as written
    pub clause: String,
    pub reason: String,
}

impl MalformedEffectError {
    pub fn new(clause: &str, reason: impl Into<String>) -> Self {
        Self {
            clause: clause.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse an effect string into its ordered modifiers.
///
/// `None`, `""` and whitespace-only input yield an empty list.
pub fn parse_effects(input: Option<&str>) -> Result<Vec<Modifier>, MalformedEffectError> {
    let Some(input) = input else {
        return Ok(Vec::new());
    };

    input
        .split(';')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(parse_clause)
        .collect()
}

/// Parse a single clause like `skill+2` or `damage_multiplier:1.5`
pub fn parse_clause(clause: &str) -> Result<Modifier, MalformedEffectError> {
    let normalized = clause.trim().to_lowercase();

    if let Some((name, value)) = normalized.split_once(':') {
        return parse_assignment(clause, name.trim(), value.trim());
    }

    let op_pos = normalized
        .find(['+', '-'])
        .ok_or_else(|| MalformedEffectError::new(clause, "expected name+N, name-N or name:N"))?;

    let name = normalized[..op_pos].trim();
    let negative = normalized.as_bytes()[op_pos] == b'-';
    let amount = parse_unsigned(clause, normalized[op_pos + 1..].trim())?;

    if name == "heal" {
        if negative {
            return Err(MalformedEffectError::new(clause, "heal amount cannot be negative"));
        }
        return Ok(Modifier::Heal { amount });
    }

    if name.ends_with("_multiplier") || name.ends_with("_cost") {
        return Err(MalformedEffectError::new(
            clause,
            format!("'{}' takes an assignment (':')", name),
        ));
    }

    let stat = parse_stat(clause, name)?;
    let amount = if negative { -amount } else { amount };
    Ok(Modifier::StatDelta { stat, amount })
}

fn parse_assignment(clause: &str, name: &str, value: &str) -> Result<Modifier, MalformedEffectError> {
    if let Some(target) = name.strip_suffix("_multiplier") {
        let target: MultiplierTarget = target.parse().map_err(|_| {
            MalformedEffectError::new(clause, format!("unknown multiplier target '{}'", target))
        })?;
        let factor: f64 = value
            .parse()
            .map_err(|_| MalformedEffectError::new(clause, format!("invalid factor '{}'", value)))?;
        if !factor.is_finite() || factor < 0.0 {
            return Err(MalformedEffectError::new(
                clause,
                "factor must be a non-negative number",
            ));
        }
        return Ok(Modifier::Multiplier { target, factor });
    }

    if let Some(resource) = name.strip_suffix("_cost") {
        let resource: Resource = resource.parse().map_err(|_| {
            MalformedEffectError::new(clause, format!("unknown resource '{}'", resource))
        })?;
        let amount = parse_unsigned(clause, value)?;
        return Ok(Modifier::FlatCost { resource, amount });
    }

    if name == "heal" {
        return Err(MalformedEffectError::new(clause, "heal takes the form heal+N"));
    }

    let stat = parse_stat(clause, name)?;
    let value: i32 = value
        .parse()
        .map_err(|_| MalformedEffectError::new(clause, format!("invalid value '{}'", value)))?;
    Ok(Modifier::StatSet { stat, value })
}

fn parse_stat(clause: &str, name: &str) -> Result<Stat, MalformedEffectError> {
    if name.is_empty() {
        return Err(MalformedEffectError::new(clause, "missing stat name"));
    }
    name.parse()
        .map_err(|_| MalformedEffectError::new(clause, format!("unknown stat '{}'", name)))
}

fn parse_unsigned(clause: &str, digits: &str) -> Result<i32, MalformedEffectError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedEffectError::new(
            clause,
            format!("invalid amount '{}'", digits),
        ));
    }
    digits
        .parse()
        .map_err(|_| MalformedEffectError::new(clause, format!("amount '{}' out of range", digits)))
}
