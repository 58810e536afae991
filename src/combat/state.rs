//! Combat state tracking
//!
//! Each character has at most one active combat, stored as a row keyed by
//! the character id. A round is one player action followed, unless the
//! enemy has fallen, by one automatic enemy action:
//!
//! ```text
//! NotInCombat --start--> InCombat <--> EnemyCharging
//!                           |              |
//!                           +--> Victory / Defeat (row deleted)
//! ```
//!
//! Rounds for the same character are serialized by a per-character lock and
//! each runs inside one transaction, so a failed action leaves no trace.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::damage::CombatModifiers;
use super::dice::DieRoller;
use super::effects::Modifier;
use super::resolver::{
    ActionOutcome, ActionResolver, CombatConfig, EnemyState, PlayerAction, PlayerMove, PlayerState,
};
use super::stats::{EffectiveStats, Loadout};
use crate::error::GameError;
use crate::locks::CharacterLocks;
use crate::models::{
    store, ActiveCombat, Character, CharacterId, CombatOutcome, CombatPhase, Enemy, EnemyId,
    ItemId, NodeId,
};
use crate::progression::{ProgressionManager, XpAward};
use crate::story;

/// The enemy as shown to the player
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemySummary {
    pub id: EnemyId,
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    /// Name of the special attack being charged, if any
    pub charging: Option<String>,
    pub charge_turns: u32,
}

/// Current state of a character's fight
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatView {
    pub phase: CombatPhase,
    pub round: u32,
    pub node_id: Option<NodeId>,
    pub enemy: EnemySummary,
    pub player_stamina: i32,
    pub buffs: Vec<Modifier>,
    pub started_at: String,
    pub last_action_at: String,
}

impl CombatView {
    pub fn new(combat: &ActiveCombat, enemy: &Enemy) -> Self {
        let charging = if combat.is_enemy_charging() {
            enemy.special_attack.as_ref().map(|s| s.name.clone())
        } else {
            None
        };
        Self {
            phase: combat.phase(),
            round: combat.round,
            node_id: combat.node_id,
            enemy: EnemySummary {
                id: enemy.id,
                name: enemy.name.clone(),
                health: combat.enemy_health,
                max_health: enemy.health,
                charging,
                charge_turns: combat.enemy_charge_turns,
            },
            player_stamina: combat.player_stamina,
            buffs: combat.buffs.clone(),
            started_at: combat.started_at.clone(),
            last_action_at: combat.last_action_at.clone(),
        }
    }
}

/// Result of starting (or resuming) a combat
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatStart {
    pub combat: CombatView,
    /// True when the same fight was already running
    pub resumed: bool,
}

/// How a finished combat changed the character
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub outcome: CombatOutcome,
    /// Story node the character moves to
    pub next_node_id: Option<NodeId>,
    /// Set on victory
    pub xp: Option<XpAward>,
}

/// Everything one round produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReport {
    pub round: u32,
    pub phase: CombatPhase,
    /// Player outcome first, then the enemy's (absent after a victory)
    pub outcomes: Vec<ActionOutcome>,
    pub character: Character,
    /// Present while the fight goes on
    pub combat: Option<CombatView>,
    /// Present once the fight is over
    pub resolution: Option<Resolution>,
}

/// Per-round inputs that do not change during the round
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub enemy: &'a Enemy,
    /// Effective stats without in-fight buffs
    pub stats: EffectiveStats,
    /// Combat modifiers without in-fight buffs
    pub modifiers: CombatModifiers,
    pub armed: bool,
}

impl<'a> RoundContext<'a> {
    pub fn new(enemy: &'a Enemy, loadout: &Loadout, character: &Character) -> Result<Self, GameError> {
        Ok(Self {
            enemy,
            stats: loadout.effective_stats(character)?,
            modifiers: loadout.combat_modifiers()?,
            armed: loadout.armed(),
        })
    }

    fn player(&self, character: &Character, combat: &ActiveCombat) -> PlayerState {
        let mut stats = self.stats;
        stats.apply_all(&combat.buffs);
        let mut modifiers = self.modifiers;
        modifiers.apply_all(&combat.buffs);
        PlayerState {
            stats,
            health: character.stats.health,
            stamina: combat.player_stamina,
            modifiers,
            armed: self.armed,
        }
    }

    fn enemy_state(&self, combat: &ActiveCombat) -> EnemyState<'a> {
        EnemyState {
            template: self.enemy,
            health: combat.enemy_health,
            charge_turns: combat.enemy_charge_turns,
        }
    }
}

/// What [`play_round`] did to the character and combat
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub outcomes: Vec<ActionOutcome>,
    pub phase: CombatPhase,
    pub consumed_item: Option<ItemId>,
}

/// Play one round in memory.
///
/// On error neither `character` nor `combat` has been touched. A character
/// already at 0 health loses without acting.
pub fn play_round(
    resolver: &ActionResolver,
    ctx: &RoundContext<'_>,
    action: PlayerMove<'_>,
    character: &mut Character,
    combat: &mut ActiveCombat,
    dice: &mut dyn DieRoller,
) -> Result<RoundResult, GameError> {
    if character.is_defeated() {
        return Ok(RoundResult {
            outcomes: Vec::new(),
            phase: CombatPhase::Defeat,
            consumed_item: None,
        });
    }

    let player = ctx.player(character, combat);
    let resolution =
        resolver.resolve_player_action(action, &player, &ctx.enemy_state(combat), dice)?;

    combat.round += 1;
    combat.damage_enemy(resolution.enemy_damage);
    combat.player_stamina -= resolution.stamina_spent;
    combat.buffs.extend(resolution.buffs.iter().copied());
    character.take_damage(resolution.health_spent);
    character.heal(resolution.healed);
    if let Some(item_id) = resolution.consumed_item {
        if let Some(quantity) = character.inventory.get_mut(&item_id) {
            *quantity = quantity.saturating_sub(1);
        }
        character.inventory.retain(|_, quantity| *quantity > 0);
    }

    let mut outcomes = vec![resolution.outcome];
    if combat.enemy_health <= 0 {
        return Ok(RoundResult {
            outcomes,
            phase: CombatPhase::Victory,
            consumed_item: resolution.consumed_item,
        });
    }

    // A defend during any charge turn braces for the special attack
    let was_charging = combat.is_enemy_charging();
    let player = ctx.player(character, combat);
    let enemy_turn = resolver.resolve_enemy_action(
        &ctx.enemy_state(combat),
        &player,
        action.is_defend() || combat.defended_while_charging,
        dice,
    );
    character.take_damage(enemy_turn.player_damage);
    combat.enemy_charge_turns = enemy_turn.charge_turns;
    combat.defended_while_charging = combat.is_enemy_charging()
        && (combat.defended_while_charging || (was_charging && action.is_defend()));
    outcomes.push(enemy_turn.outcome);

    let phase = if character.is_defeated() {
        CombatPhase::Defeat
    } else {
        combat.phase()
    };

    Ok(RoundResult {
        outcomes,
        phase,
        consumed_item: resolution.consumed_item,
    })
}

/// Manages active combats for all characters
pub struct CombatManager {
    pool: SqlitePool,
    resolver: ActionResolver,
    progression: Arc<ProgressionManager>,
    locks: Arc<CharacterLocks>,
    dice: Mutex<Box<dyn DieRoller + Send>>,
}

impl CombatManager {
    pub fn new(
        pool: SqlitePool,
        config: CombatConfig,
        progression: Arc<ProgressionManager>,
        locks: Arc<CharacterLocks>,
        dice: Box<dyn DieRoller + Send>,
    ) -> Self {
        Self {
            pool,
            resolver: ActionResolver::new(config),
            progression,
            locks,
            dice: Mutex::new(dice),
        }
    }

    /// Start the combat bound to a story node.
    ///
    /// Starting the fight that is already running resumes it; starting any
    /// other fight while one is active fails. Defeated characters cannot
    /// start fights.
    pub async fn start(
        &self,
        character_id: CharacterId,
        node_id: NodeId,
    ) -> Result<CombatStart, GameError> {
        let _guard = self.locks.lock(character_id).await;
        let mut tx = self.pool.begin().await?;

        let mut character = store::load_character(&mut tx, character_id).await?;
        let (_, enemy_id) = story::combat_at(&mut tx, node_id).await?;
        if character.is_defeated() {
            return Err(GameError::CharacterDefeated(character_id));
        }

        if let Some(existing) = store::load_active_combat(&mut tx, character_id).await? {
            if existing.enemy_id == enemy_id && existing.node_id == Some(node_id) {
                let enemy = store::load_enemy(&mut tx, existing.enemy_id).await?;
                return Ok(CombatStart {
                    combat: CombatView::new(&existing, &enemy),
                    resumed: true,
                });
            }
            return Err(GameError::CombatAlreadyActive {
                character_id,
                enemy_id: existing.enemy_id,
            });
        }

        let enemy = store::load_enemy(&mut tx, enemy_id).await?;
        let loadout = store::load_loadout(&mut tx, &character).await?;
        let stats = loadout.effective_stats(&character)?;

        let combat = ActiveCombat::new(character_id, &enemy, Some(node_id), stats.stamina);
        if !store::insert_active_combat(&mut tx, &combat).await? {
            return Err(GameError::CombatAlreadyActive {
                character_id,
                enemy_id,
            });
        }
        character.current_node_id = Some(node_id);
        store::save_character(&mut tx, &character).await?;
        tx.commit().await?;

        info!(
            character_id,
            node_id,
            enemy = %enemy.name,
            "Combat started"
        );

        Ok(CombatStart {
            combat: CombatView::new(&combat, &enemy),
            resumed: false,
        })
    }

    /// Current fight of a character
    pub async fn view(&self, character_id: CharacterId) -> Result<CombatView, GameError> {
        let mut conn = self.pool.acquire().await?;
        let Some(combat) = store::load_active_combat(&mut conn, character_id).await? else {
            // Report unknown characters as such
            store::load_character(&mut conn, character_id).await?;
            return Err(GameError::NoActiveCombat(character_id));
        };
        let enemy = store::load_enemy(&mut conn, combat.enemy_id).await?;
        Ok(CombatView::new(&combat, &enemy))
    }

    /// Play one round of the character's active combat
    pub async fn act(
        &self,
        character_id: CharacterId,
        action: PlayerAction,
    ) -> Result<RoundReport, GameError> {
        let report = {
            let _guard = self.locks.lock(character_id).await;
            self.act_locked(character_id, action).await
        };
        if matches!(&report, Ok(r) if r.resolution.is_some()) {
            self.locks.prune();
        }
        report
    }

    async fn act_locked(
        &self,
        character_id: CharacterId,
        action: PlayerAction,
    ) -> Result<RoundReport, GameError> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now().to_rfc3339();
        if !store::touch_active_combat(&mut tx, character_id, &now).await? {
            store::load_character(&mut tx, character_id).await?;
            return Err(GameError::NoActiveCombat(character_id));
        }
        let mut combat = store::load_active_combat(&mut tx, character_id)
            .await?
            .ok_or(GameError::NoActiveCombat(character_id))?;
        combat.last_action_at = now;

        let mut character = store::load_character(&mut tx, character_id).await?;
        let enemy = store::load_enemy(&mut tx, combat.enemy_id).await?;
        let loadout = store::load_loadout(&mut tx, &character).await?;

        let item = match action {
            PlayerAction::UseItem(item_id) => {
                if character.quantity_of(item_id) == 0 {
                    return Err(GameError::ItemNotAvailable(item_id));
                }
                Some(store::load_item(&mut tx, item_id).await?)
            }
            _ => None,
        };

        let player_move = match action {
            PlayerAction::Attack => PlayerMove::Attack,
            PlayerAction::Defend => PlayerMove::Defend,
            PlayerAction::UseItem(item_id) => PlayerMove::UseItem {
                item: item.as_ref().ok_or(GameError::ItemNotAvailable(item_id))?,
                held: character.quantity_of(item_id),
            },
            PlayerAction::UseAbility(ability_id) => {
                let ability = loadout
                    .abilities
                    .iter()
                    .find(|a| a.id == ability_id)
                    .ok_or(GameError::AbilityNotLearned(ability_id))?;
                PlayerMove::UseAbility(ability)
            }
        };

        let ctx = RoundContext::new(&enemy, &loadout, &character)?;
        let round = {
            let mut dice = self.dice.lock();
            play_round(
                &self.resolver,
                &ctx,
                player_move,
                &mut character,
                &mut combat,
                &mut **dice,
            )?
        };

        debug!(
            character_id,
            round = combat.round,
            action = action.name(),
            enemy_health = combat.enemy_health,
            player_health = character.stats.health,
            "Combat round resolved"
        );

        let outcome = match round.phase {
            CombatPhase::Victory => Some(CombatOutcome::Victory),
            CombatPhase::Defeat => Some(CombatOutcome::Defeat),
            _ => None,
        };

        let resolution = match outcome {
            Some(outcome) => {
                store::delete_active_combat(&mut tx, character_id).await?;

                let xp = match outcome {
                    CombatOutcome::Victory => {
                        Some(self.progression.award_victory(&mut character, &enemy))
                    }
                    CombatOutcome::Defeat => None,
                };

                let next_node_id = match combat.node_id {
                    Some(node_id) => story::find_node(&mut tx, node_id)
                        .await?
                        .and_then(|node| node.next_node(outcome)),
                    None => None,
                };
                if next_node_id.is_some() {
                    character.current_node_id = next_node_id;
                }

                Some(Resolution {
                    outcome,
                    next_node_id,
                    xp,
                })
            }
            None => {
                store::update_active_combat(&mut tx, &combat).await?;
                None
            }
        };

        store::save_character(&mut tx, &character).await?;
        tx.commit().await?;

        if let Some(resolution) = &resolution {
            info!(
                character_id,
                enemy = %enemy.name,
                outcome = ?resolution.outcome,
                rounds = combat.round,
                next_node = ?resolution.next_node_id,
                "Combat resolved"
            );
        }

        Ok(RoundReport {
            round: combat.round,
            phase: round.phase,
            outcomes: round.outcomes,
            combat: resolution
                .is_none()
                .then(|| CombatView::new(&combat, &enemy)),
            character,
            resolution,
        })
    }
}
