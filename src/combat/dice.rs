//! Dice rolling
//!
//! Opposed checks roll one uniform die per side (a d20 by default).
//! The roller is a trait so combat can run on a seeded generator in
//! production and on a scripted sequence in tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Source of die results
pub trait DieRoller {
    /// Roll one die with `sides` faces, returning a value in `1..=sides`
    fn roll(&mut self, sides: u32) -> u32;
}

/// Uniform dice backed by a seedable generator
#[derive(Debug, Clone)]
pub struct Dice {
    rng: StdRng,
    seed: Option<u64>,
}

impl Dice {
    /// Deterministic dice: the same seed always replays the same rolls
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Dice seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            seed: None,
        }
    }

    /// Seeded when a seed is configured, entropy otherwise
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl DieRoller for Dice {
    fn roll(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Dice that return a fixed script of values, clamped to the die size.
///
/// Once the script runs out every roll returns 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    values: VecDeque<u32>,
}

impl ScriptedDice {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Number of scripted values not yet consumed
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl DieRoller for ScriptedDice {
    fn roll(&mut self, sides: u32) -> u32 {
        self.values.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }
}

/// One side of an opposed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollDetail {
    /// The raw die result
    pub die: u32,
    /// Skill added to the die
    pub modifier: i32,
    pub total: i32,
}

impl RollDetail {
    pub fn new(die: u32, modifier: i32) -> Self {
        Self {
            die,
            modifier,
            total: i32::try_from(die).unwrap_or(i32::MAX).saturating_add(modifier),
        }
    }
}

/// Result of an opposed check: attacker and defender each roll die + skill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpposedCheck {
    pub attacker: RollDetail,
    pub defender: RollDetail,
}

impl OpposedCheck {
    /// Roll an opposed check with independent draws for each side
    pub fn roll<D: DieRoller + ?Sized>(
        dice: &mut D,
        sides: u32,
        attacker_skill: i32,
        defender_skill: i32,
    ) -> Self {
        let attacker = RollDetail::new(dice.roll(sides), attacker_skill);
        let defender = RollDetail::new(dice.roll(sides), defender_skill);
        Self { attacker, defender }
    }

    /// Attacker total must strictly exceed defender total
    pub fn hit(&self) -> bool {
        self.attacker.total > self.defender.total
    }

    /// How far the attacker beat the defender (negative on a miss)
    pub fn margin(&self) -> i32 {
        self.attacker.total.saturating_sub(self.defender.total)
    }

    /// A hit whose margin reaches `critical_margin`
    pub fn critical(&self, critical_margin: i32) -> bool {
        self.hit() && self.margin() >= critical_margin
    }
}
