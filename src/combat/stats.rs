//! Effective stat aggregation
//!
//! Builds the numbers combat uses from, in this fixed order:
//! 1. the character's base stats
//! 2. archetype flat bonuses
//! 3. equipped weapon, then armor effect strings
//! 4. learned PASSIVE_STAT abilities, in ability id order
//!
//! `stat+N` adds to whatever the stat holds at that point; `stat:N`
//! overwrites it, so the last source to assign a stat decides its value.
//! Clauses that do not name a base stat (damage, multipliers, costs, heals)
//! are combat hints and are skipped here.

use serde::Serialize;

use super::damage::CombatModifiers;
use super::effects::{parse_effects, Modifier, Stat};
use crate::error::{ContentRef, GameError};
use crate::models::{Ability, AbilityKind, Archetype, Character, Item};

/// The stats combat reads every round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveStats {
    /// Health cap; bonuses never change it
    pub max_health: i32,
    pub skill: i32,
    pub luck: i32,
    pub stamina: i32,
    pub defense: i32,
}

impl EffectiveStats {
    /// Start from a character's base stats
    pub fn base(character: &Character) -> Self {
        let s = &character.stats;
        Self {
            max_health: s.max_health,
            skill: s.skill,
            luck: s.luck,
            stamina: s.stamina,
            defense: s.defense,
        }
    }

    pub fn get(&self, stat: Stat) -> Option<i32> {
        match stat {
            Stat::Skill => Some(self.skill),
            Stat::Luck => Some(self.luck),
            Stat::Stamina => Some(self.stamina),
            Stat::Defense => Some(self.defense),
            Stat::Health | Stat::Damage => None,
        }
    }

    fn slot_mut(&mut self, stat: Stat) -> Option<&mut i32> {
        match stat {
            Stat::Skill => Some(&mut self.skill),
            Stat::Luck => Some(&mut self.luck),
            Stat::Stamina => Some(&mut self.stamina),
            Stat::Defense => Some(&mut self.defense),
            Stat::Health | Stat::Damage => None,
        }
    }

    /// Apply one modifier. Returns false when it does not target a base stat.
    pub fn apply(&mut self, modifier: &Modifier) -> bool {
        match *modifier {
            Modifier::StatDelta { stat, amount } => match self.slot_mut(stat) {
                Some(slot) => {
                    *slot = slot.saturating_add(amount);
                    true
                }
                None => false,
            },
            Modifier::StatSet { stat, value } => match self.slot_mut(stat) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn apply_all<'a>(&mut self, modifiers: impl IntoIterator<Item = &'a Modifier>) {
        for modifier in modifiers {
            self.apply(modifier);
        }
    }

    fn apply_effect(&mut self, effect: Option<&str>, source: ContentRef) -> Result<(), GameError> {
        let modifiers = parse_effects(effect).map_err(|e| GameError::malformed(source, e))?;
        self.apply_all(&modifiers);
        Ok(())
    }
}

/// Everything that contributes to a character's effective stats
#[derive(Debug, Clone, Copy)]
pub struct StatSources<'a> {
    pub character: &'a Character,
    pub archetype: Option<&'a Archetype>,
    pub weapon: Option<&'a Item>,
    pub armor: Option<&'a Item>,
    /// Learned abilities; only PASSIVE_STAT ones are applied
    pub abilities: &'a [Ability],
}

/// Combine all stat sources into effective stats.
///
/// Fails with a content error when any applied effect string is malformed;
/// nothing partially parsed is applied.
pub fn compute_effective_stats(sources: StatSources<'_>) -> Result<EffectiveStats, GameError> {
    let mut stats = EffectiveStats::base(sources.character);

    if let Some(archetype) = sources.archetype {
        let b = &archetype.bonuses;
        stats.skill = stats.skill.saturating_add(b.skill);
        stats.luck = stats.luck.saturating_add(b.luck);
        stats.stamina = stats.stamina.saturating_add(b.stamina);
        stats.defense = stats.defense.saturating_add(b.defense);
    }

    for item in [sources.weapon, sources.armor].into_iter().flatten() {
        stats.apply_effect(item.effect.as_deref(), ContentRef::Item(item.id))?;
    }

    let mut passives: Vec<&Ability> = sources
        .abilities
        .iter()
        .filter(|a| a.kind == AbilityKind::PassiveStat)
        .collect();
    passives.sort_by_key(|a| a.id);
    for ability in passives {
        stats.apply_effect(ability.effect.as_deref(), ContentRef::Ability(ability.id))?;
    }

    Ok(stats)
}

/// A character's equipment, archetype and learned abilities, loaded once
/// per request
#[derive(Debug, Clone, Default)]
pub struct Loadout {
    pub archetype: Option<Archetype>,
    pub weapon: Option<Item>,
    pub armor: Option<Item>,
    pub abilities: Vec<Ability>,
}

impl Loadout {
    pub fn sources<'a>(&'a self, character: &'a Character) -> StatSources<'a> {
        StatSources {
            character,
            archetype: self.archetype.as_ref(),
            weapon: self.weapon.as_ref(),
            armor: self.armor.as_ref(),
            abilities: &self.abilities,
        }
    }

    pub fn effective_stats(&self, character: &Character) -> Result<EffectiveStats, GameError> {
        compute_effective_stats(self.sources(character))
    }

    /// Combat modifiers from weapon, armor and PASSIVE_COMBAT_MODIFIER
    /// abilities, in that order
    pub fn combat_modifiers(&self) -> Result<CombatModifiers, GameError> {
        let mut modifiers = CombatModifiers::new();
        for item in [self.weapon.as_ref(), self.armor.as_ref()].into_iter().flatten() {
            modifiers.apply_effect(item.effect.as_deref(), ContentRef::Item(item.id))?;
        }

        let mut passives: Vec<&Ability> = self
            .abilities
            .iter()
            .filter(|a| a.kind == AbilityKind::PassiveCombatModifier)
            .collect();
        passives.sort_by_key(|a| a.id);
        for ability in passives {
            modifiers.apply_effect(ability.effect.as_deref(), ContentRef::Ability(ability.id))?;
        }

        Ok(modifiers)
    }

    pub fn armed(&self) -> bool {
        self.weapon.is_some()
    }
}
