//! Engine error types
//!
//! Every failure an engine operation can report, grouped by how callers
//! treat them:
//! - Input: the request itself is malformed
//! - NotFound: the named character, content or combat does not exist
//! - Precondition: the request is well formed but not allowed right now
//! - Content: authored data (effect strings) is broken
//! - Internal: storage or serialization failures

use std::fmt;

use thiserror::Error;

use crate::combat::MalformedEffectError;

/// Coarse classification of a [`GameError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Precondition,
    NotFound,
    Content,
    Internal,
}

/// Authored content that carries an effect string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRef {
    Item(i64),
    Ability(i64),
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentRef::Item(id) => write!(f, "item {}", id),
            ContentRef::Ability(id) => write!(f, "ability {}", id),
        }
    }
}

/// Errors returned by combat and progression operations
#[derive(Debug, Error)]
pub enum GameError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("invalid ability id: {0}")]
    InvalidAbilityId(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("character {0} is not in combat")]
    NoActiveCombat(i64),

    #[error("character {character_id} is already fighting enemy {enemy_id}")]
    CombatAlreadyActive { character_id: i64, enemy_id: i64 },

    #[error("character {0} has been defeated")]
    CharacterDefeated(i64),

    #[error("story node {0} has no combat")]
    NodeHasNoCombat(i64),

    #[error("item {0} is not available")]
    ItemNotAvailable(i64),

    #[error("ability {0} has not been learned")]
    AbilityNotLearned(i64),

    #[error("ability {0} cannot be used as a combat action")]
    AbilityNotUsable(i64),

    #[error("not enough stamina: need {needed}, have {available}")]
    InsufficientStamina { needed: i32, available: i32 },

    #[error("not enough health: need more than {needed}, have {available}")]
    InsufficientHealth { needed: i32, available: i32 },

    #[error("no talent points available")]
    NoTalentPoints,

    #[error("stat '{0}' cannot be trained")]
    StatNotTrainable(String),

    #[error("level {required} required, character is level {level}")]
    LevelTooLow { required: u32, level: u32 },

    #[error("missing prerequisite abilities: {0:?}")]
    PrerequisitesNotMet(Vec<i64>),

    #[error("ability costs {cost} talent points, {available} available")]
    InsufficientTalentPoints { cost: u32, available: u32 },

    #[error("ability {0} is already learned")]
    AlreadyLearned(i64),

    #[error("ability {0} is not available to this archetype")]
    ArchetypeNotAllowed(i64),

    #[error("an archetype has already been selected")]
    ArchetypeAlreadySelected,

    #[error("malformed effect on {content}: {error}")]
    MalformedEffect {
        content: ContentRef,
        error: MalformedEffectError,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GameError {
    /// Create a not found error
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Attach the owning content to an effect parse failure
    pub fn malformed(content: ContentRef, error: MalformedEffectError) -> Self {
        Self::MalformedEffect { content, error }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidAction(_)
            | GameError::InvalidItemId(_)
            | GameError::InvalidAbilityId(_)
            | GameError::StatNotTrainable(_) => ErrorKind::Input,
            GameError::NotFound { .. } => ErrorKind::NotFound,
            GameError::NoActiveCombat(_)
            | GameError::CombatAlreadyActive { .. }
            | GameError::CharacterDefeated(_)
            | GameError::NodeHasNoCombat(_)
            | GameError::ItemNotAvailable(_)
            | GameError::AbilityNotLearned(_)
            | GameError::AbilityNotUsable(_)
            | GameError::InsufficientStamina { .. }
            | GameError::InsufficientHealth { .. }
            | GameError::NoTalentPoints
            | GameError::LevelTooLow { .. }
            | GameError::PrerequisitesNotMet(_)
            | GameError::InsufficientTalentPoints { .. }
            | GameError::AlreadyLearned(_)
            | GameError::ArchetypeNotAllowed(_)
            | GameError::ArchetypeAlreadySelected => ErrorKind::Precondition,
            GameError::MalformedEffect { .. } => ErrorKind::Content,
            GameError::Database(_) | GameError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidAction(_) => "invalid_action",
            GameError::InvalidItemId(_) => "invalid_item_id",
            GameError::InvalidAbilityId(_) => "invalid_ability_id",
            GameError::NotFound { .. } => "not_found",
            GameError::NoActiveCombat(_) => "no_active_combat",
            GameError::CombatAlreadyActive { .. } => "combat_already_active",
            GameError::CharacterDefeated(_) => "character_defeated",
            GameError::NodeHasNoCombat(_) => "node_has_no_combat",
            GameError::ItemNotAvailable(_) => "item_not_available",
            GameError::AbilityNotLearned(_) => "ability_not_learned",
            GameError::AbilityNotUsable(_) => "ability_not_usable",
            GameError::InsufficientStamina { .. } => "insufficient_stamina",
            GameError::InsufficientHealth { .. } => "insufficient_health",
            GameError::NoTalentPoints => "no_talent_points",
            GameError::StatNotTrainable(_) => "stat_not_trainable",
            GameError::LevelTooLow { .. } => "level_too_low",
            GameError::PrerequisitesNotMet(_) => "prerequisites_not_met",
            GameError::InsufficientTalentPoints { .. } => "insufficient_talent_points",
            GameError::AlreadyLearned(_) => "already_learned",
            GameError::ArchetypeNotAllowed(_) => "archetype_not_allowed",
            GameError::ArchetypeAlreadySelected => "archetype_already_selected",
            GameError::MalformedEffect { .. } => "malformed_effect",
            GameError::Database(_) => "database_error",
            GameError::Serialization(_) => "serialization_error",
        }
    }
}
