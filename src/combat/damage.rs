//! Damage calculation
//!
//! A hit's damage is computed as:
//! 1. `(base + bonus) × damage multiplier × special multiplier`
//! 2. × critical multiplier on a critical hit
//! 3. − defender defense (scaled by the defender's defense multiplier)
//! 4. floored at the minimum hit damage
//! 5. halved (rounded down, same floor) when the defender is defending
//!
//! Fractions are rounded down at each step that produces one.

use serde::{Deserialize, Serialize};

use super::effects::{parse_effects, Modifier, MultiplierTarget, Stat};
use crate::error::{ContentRef, GameError};

/// Combat-only modifiers gathered from weapons, armor, passive combat
/// abilities and in-fight buffs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatModifiers {
    /// Flat damage added to every hit
    pub damage_bonus: i32,
    pub damage_multiplier: f64,
    pub defense_multiplier: f64,
}

impl Default for CombatModifiers {
    fn default() -> Self {
        Self {
            damage_bonus: 0,
            damage_multiplier: 1.0,
            defense_multiplier: 1.0,
        }
    }
}

impl CombatModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one modifier. Returns false when it is not a combat modifier.
    ///
    /// Multipliers use assignment semantics like `stat:N` clauses.
    pub fn apply(&mut self, modifier: &Modifier) -> bool {
        match *modifier {
            Modifier::StatDelta {
                stat: Stat::Damage,
                amount,
            } => self.damage_bonus = self.damage_bonus.saturating_add(amount),
            Modifier::StatSet {
                stat: Stat::Damage,
                value,
            } => self.damage_bonus = value,
            Modifier::Multiplier {
                target: MultiplierTarget::Damage,
                factor,
            } => self.damage_multiplier = factor,
            Modifier::Multiplier {
                target: MultiplierTarget::Defense,
                factor,
            } => self.defense_multiplier = factor,
            _ => return false,
        }
        true
    }

    pub fn apply_all<'a>(&mut self, modifiers: impl IntoIterator<Item = &'a Modifier>) {
        for modifier in modifiers {
            self.apply(modifier);
        }
    }

    /// Parse an authored effect string and apply its combat clauses
    pub fn apply_effect(&mut self, effect: Option<&str>, source: ContentRef) -> Result<(), GameError> {
        let modifiers = parse_effects(effect).map_err(|e| GameError::malformed(source, e))?;
        self.apply_all(&modifiers);
        Ok(())
    }

    /// Defense after the defense multiplier, never negative
    pub fn scaled_defense(&self, defense: i32) -> i32 {
        ((defense.max(0) as f64) * self.defense_multiplier).floor() as i32
    }
}

/// Everything needed to turn a landed attack into damage
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub base_damage: i32,
    pub modifiers: CombatModifiers,
    /// Extra factor for special attacks (1.0 for ordinary attacks)
    pub special_multiplier: f64,
    /// Set on a critical hit
    pub critical_multiplier: Option<f64>,
    /// Defender defense, already scaled
    pub defense: i32,
    pub defending: bool,
}

/// Result of a damage calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    /// Damage before defense and defending
    pub raw_damage: i32,
    /// Damage that lands on the defender
    pub final_damage: i32,
    pub critical: bool,
    /// Whether defending halved the damage
    pub mitigated: bool,
}

impl Hit {
    /// Calculate damage; a landed hit never deals less than `min_damage`
    pub fn resolve(&self, min_damage: i32) -> DamageResult {
        let min_damage = min_damage.max(0);
        let mut raw = self.base_damage.saturating_add(self.modifiers.damage_bonus).max(0) as f64
            * self.modifiers.damage_multiplier
            * self.special_multiplier;
        if let Some(crit) = self.critical_multiplier {
            raw *= crit;
        }
        let raw_damage = raw.floor() as i32;

        let mut final_damage = (raw_damage - self.defense.max(0)).max(min_damage);
        if self.defending {
            final_damage = (final_damage / 2).max(min_damage);
        }

        DamageResult {
            raw_damage,
            final_damage,
            critical: self.critical_multiplier.is_some(),
            mitigated: self.defending,
        }
    }
}
