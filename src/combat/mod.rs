//! Combat system module
//!
//! Implements turn-based one-on-one fights between a character and an enemy:
//! - Effect strings on items and abilities, parsed into typed modifiers
//! - Effective stat aggregation from base stats and every bonus source
//! - Opposed d20 checks for hits, critical hits and defending
//! - Telegraphed enemy special attacks that charge before landing
//! - Combat state persistence with one active fight per character

pub mod dice;
mod damage;
mod effects;
mod resolver;
mod state;
mod stats;

pub use damage::{CombatModifiers, DamageResult, Hit};
pub use dice::{Dice, DieRoller, OpposedCheck, RollDetail, ScriptedDice};
pub use effects::{parse_clause, parse_effects, MalformedEffectError, Modifier, MultiplierTarget, Resource, Stat};
pub use resolver::{
    ActionOutcome, ActionResolver, Actor, CombatConfig, ConsumableEffect, EnemyResolution,
    EnemyState, OutcomeTag, PlayerAction, PlayerMove, PlayerResolution, PlayerState,
};
pub use state::{
    play_round, CombatManager, CombatStart, CombatView, EnemySummary, Resolution, RoundContext,
    RoundReport, RoundResult,
};
pub use stats::{compute_effective_stats, EffectiveStats, Loadout, StatSources};
