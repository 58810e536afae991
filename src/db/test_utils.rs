//! Shared test utilities for database operations
//!
//! `test_pool()` creates an in-memory database with the full schema;
//! `fixture_pool()` additionally loads a small, fixed set of content and
//! one character so store, combat and progression tests share the same
//! world.

use sqlx::SqlitePool;

use super::Database;

/// Create an in-memory test database pool with full schema
///
/// Uses Database::new(None) so tests run against the same schema
/// as production.
pub async fn test_pool() -> SqlitePool {
    let db = Database::new(None)
        .await
        .expect("Failed to create test database");
    db.pool().clone()
}

/// In-memory database loaded with [`fixture`] content
pub async fn fixture_pool() -> SqlitePool {
    let pool = test_pool().await;
    fixture::load(&pool).await;
    pool
}

pub mod fixture {
    //! Fixed test world
    //!
    //! - Ada (HERO): default stats, Iron Sword equipped (skill+2), two
    //!   healing draughts, one bottled fury, one cursed tonic
    //! - Cave Goblin at CAVE_NODE: 3 health, skill 5, no special attack
    //! - Morcos Ogre at OGRE_NODE: 60 health, skill 12, charges 1 turn then
    //!   strikes for 2.5x
    //! - CAMP_NODE has no enemy

    use std::collections::BTreeMap;

    use sqlx::SqlitePool;

    use crate::models::{
        store, Ability, AbilityKind, Archetype, Character, Enemy, Item, ItemKind, SpecialAttack,
        StatBonuses,
    };
    use crate::story::{self, StoryNode};

    pub const HERO: i64 = 1;

    pub const SWORD: i64 = 1;
    pub const POTION: i64 = 2;
    pub const FURY: i64 = 3;
    pub const CURSED: i64 = 4;
    pub const SHIELD: i64 = 5;

    pub const WARDEN: i64 = 1;

    pub const POWER_STRIKE: i64 = 1;
    pub const IRON_SKIN: i64 = 2;
    pub const BERSERK: i64 = 3;
    pub const HEX: i64 = 4;

    pub const OGRE: i64 = 1;
    pub const GOBLIN: i64 = 2;

    pub const CAVE_NODE: i64 = 10;
    pub const OGRE_NODE: i64 = 20;
    pub const CAMP_NODE: i64 = 30;

    pub fn ogre() -> Enemy {
        Enemy {
            id: OGRE,
            name: "Morcos Ogre".to_string(),
            health: 60,
            skill: 12,
            damage: 6,
            xp_reward: 50,
            special_attack: Some(SpecialAttack {
                name: "Crushing Blow".to_string(),
                damage_multiplier: 2.5,
                charge_turns: 1,
                telegraph_text: "The ogre raises its club high above its head...".to_string(),
                execute_text: "The club comes crashing down!".to_string(),
            }),
        }
    }

    pub fn goblin() -> Enemy {
        Enemy {
            id: GOBLIN,
            name: "Cave Goblin".to_string(),
            health: 3,
            skill: 5,
            damage: 3,
            xp_reward: 20,
            special_attack: None,
        }
    }

    pub fn warden() -> Archetype {
        Archetype {
            id: WARDEN,
            name: "Warden".to_string(),
            bonuses: StatBonuses {
                health: 10,
                skill: 1,
                luck: 0,
                stamina: 0,
                defense: 1,
            },
            starting_ability_ids: vec![POWER_STRIKE],
            learnable_ability_ids: vec![IRON_SKIN, BERSERK],
        }
    }

    fn item(id: i64, name: &str, kind: ItemKind, effect: &str, usable: bool) -> Item {
        Item {
            id,
            name: name.to_string(),
            kind,
            effect: Some(effect.to_string()),
            usable,
        }
    }

    fn ability(
        id: i64,
        name: &str,
        kind: AbilityKind,
        effect: &str,
        level_requirement: u32,
        prerequisites: Vec<i64>,
    ) -> Ability {
        Ability {
            id,
            name: name.to_string(),
            kind,
            effect: Some(effect.to_string()),
            talent_point_cost: 1,
            level_requirement,
            prerequisites,
            allowed_archetype_ids: None,
        }
    }

    pub fn hero() -> Character {
        let mut hero = Character::new(HERO, "Ada", 100);
        hero.weapon_id = Some(SWORD);
        hero.inventory = BTreeMap::from([(POTION, 2), (FURY, 1), (CURSED, 1)]);
        hero
    }

    pub async fn load(pool: &SqlitePool) {
        let mut conn = pool.acquire().await.expect("acquire connection");

        store::insert_archetype(&mut conn, &warden()).await.unwrap();

        let abilities = [
            ability(
                POWER_STRIKE,
                "Power Strike",
                AbilityKind::ActiveCombatAction,
                "damage_multiplier:1.5;stamina_cost:5",
                1,
                vec![],
            ),
            ability(IRON_SKIN, "Iron Skin", AbilityKind::PassiveStat, "defense+2", 1, vec![POWER_STRIKE]),
            ability(
                BERSERK,
                "Berserk",
                AbilityKind::PassiveCombatModifier,
                "damage+2",
                3,
                vec![],
            ),
            ability(HEX, "Hex", AbilityKind::PassiveStat, "luck+x", 1, vec![]),
        ];
        for a in &abilities {
            store::insert_ability(&mut conn, a).await.unwrap();
        }

        let items = [
            item(SWORD, "Iron Sword", ItemKind::Weapon, "skill+2", false),
            item(POTION, "Healing Draught", ItemKind::Potion, "heal+20", true),
            item(FURY, "Bottled Fury", ItemKind::Potion, "damage+3", true),
            item(CURSED, "Cursed Tonic", ItemKind::Potion, "heal+5;wisdom+1", true),
            item(SHIELD, "Oak Shield", ItemKind::Armor, "defense+1", false),
        ];
        for i in &items {
            store::insert_item(&mut conn, i).await.unwrap();
        }

        store::insert_enemy(&mut conn, &ogre()).await.unwrap();
        store::insert_enemy(&mut conn, &goblin()).await.unwrap();

        let nodes = [
            StoryNode {
                id: CAVE_NODE,
                title: "The goblin cave".to_string(),
                enemy_id: Some(GOBLIN),
                victory_node_id: Some(CAVE_NODE + 1),
                defeat_node_id: Some(CAVE_NODE + 2),
            },
            StoryNode {
                id: OGRE_NODE,
                title: "The ogre's bridge".to_string(),
                enemy_id: Some(OGRE),
                victory_node_id: Some(OGRE_NODE + 1),
                defeat_node_id: Some(OGRE_NODE + 2),
            },
            StoryNode {
                id: CAMP_NODE,
                title: "Camp".to_string(),
                enemy_id: None,
                victory_node_id: None,
                defeat_node_id: None,
            },
        ];
        for n in &nodes {
            story::insert_node(&mut conn, n).await.unwrap();
        }

        store::insert_character(&mut conn, &hero()).await.unwrap();
    }
}
