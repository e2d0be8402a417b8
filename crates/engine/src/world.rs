use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

pub const REPUTATION_MIN: i32 = -100;
pub const REPUTATION_MAX: i32 = 100;

/// Reserved actor id for the single modeled player actor.
pub const PLAYER_ACTOR: &str = "player";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FlagValue {
    pub fn truthy(&self) -> bool {
        match self {
            FlagValue::Bool(value) => *value,
            FlagValue::Number(value) => *value != 0.0,
            FlagValue::Text(value) => !value.is_empty(),
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            FlagValue::Number(value) => *value,
            FlagValue::Bool(true) => 1.0,
            FlagValue::Bool(false) => 0.0,
            FlagValue::Text(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomOverrides {
    #[serde(default)]
    pub disabled_hotspots: BTreeSet<String>,
    #[serde(default)]
    pub custom_flags: BTreeMap<String, FlagValue>,
}

/// The single mutable record of game progress. Mutated only through
/// script-command execution and dialogue bookkeeping; presentation code
/// reads it via the `Game` query surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    current_room: String,
    position: Point,
    facing: Facing,
    inventory: Vec<String>,
    flags: BTreeMap<String, FlagValue>,
    reputation: i32,
    visited_rooms: BTreeSet<String>,
    solved_puzzles: BTreeSet<String>,
    visited_dialogue_nodes: BTreeSet<String>,
    selected_choices: BTreeSet<String>,
    room_overrides: BTreeMap<String, RoomOverrides>,
}

impl WorldState {
    pub fn new(start_room: &str, position: Point) -> Self {
        let mut visited_rooms = BTreeSet::new();
        visited_rooms.insert(start_room.to_string());
        Self {
            current_room: start_room.to_string(),
            position,
            facing: Facing::default(),
            inventory: Vec::new(),
            flags: BTreeMap::new(),
            reputation: 0,
            visited_rooms,
            solved_puzzles: BTreeSet::new(),
            visited_dialogue_nodes: BTreeSet::new(),
            selected_choices: BTreeSet::new(),
            room_overrides: BTreeMap::new(),
        }
    }

    pub fn current_room(&self) -> &str {
        &self.current_room
    }

    pub fn set_current_room(&mut self, room: &str) {
        self.current_room = room.to_string();
        self.visited_rooms.insert(room.to_string());
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn set_facing(&mut self, facing: Facing) {
        self.facing = facing;
    }

    pub fn inventory(&self) -> &[String] {
        &self.inventory
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|held| held == item)
    }

    pub fn give_item(&mut self, item: &str) -> bool {
        if self.has_item(item) {
            return false;
        }
        self.inventory.push(item.to_string());
        true
    }

    pub fn take_item(&mut self, item: &str) -> bool {
        let before = self.inventory.len();
        self.inventory.retain(|held| held != item);
        self.inventory.len() != before
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    pub fn set_flag(&mut self, name: &str, value: FlagValue) {
        self.flags.insert(name.to_string(), value);
    }

    /// Incrementing an absent or non-numeric flag initializes it to the
    /// increment amount.
    pub fn increment_flag(&mut self, name: &str, amount: f64) {
        let next = match self.flags.get(name) {
            Some(FlagValue::Number(current)) => current + amount,
            _ => amount,
        };
        self.flags.insert(name.to_string(), FlagValue::Number(next));
    }

    pub fn reputation(&self) -> i32 {
        self.reputation
    }

    pub fn adjust_reputation(&mut self, delta: i32) {
        self.reputation = self
            .reputation
            .saturating_add(delta)
            .clamp(REPUTATION_MIN, REPUTATION_MAX);
    }

    pub fn has_visited(&self, room: &str) -> bool {
        self.visited_rooms.contains(room)
    }

    pub fn solved_puzzles(&self) -> &BTreeSet<String> {
        &self.solved_puzzles
    }

    pub fn is_solved(&self, puzzle: &str) -> bool {
        self.solved_puzzles.contains(puzzle)
    }

    pub fn mark_puzzle_solved(&mut self, puzzle: &str) -> bool {
        self.solved_puzzles.insert(puzzle.to_string())
    }

    pub fn record_dialogue_visit(&mut self, tree: &str, node: &str) {
        self.visited_dialogue_nodes.insert(format!("{tree}:{node}"));
    }

    pub fn has_visited_dialogue_node(&self, tree: &str, node: &str) -> bool {
        self.visited_dialogue_nodes
            .contains(&format!("{tree}:{node}"))
    }

    pub fn record_choice_selected(&mut self, tree: &str, node: &str, choice: &str) {
        self.selected_choices
            .insert(format!("{tree}:{node}:{choice}"));
    }

    pub fn was_choice_selected(&self, tree: &str, node: &str, choice: &str) -> bool {
        self.selected_choices
            .contains(&format!("{tree}:{node}:{choice}"))
    }

    pub fn disable_hotspot(&mut self, room: &str, hotspot: &str) {
        self.room_overrides
            .entry(room.to_string())
            .or_default()
            .disabled_hotspots
            .insert(hotspot.to_string());
    }

    pub fn enable_hotspot(&mut self, room: &str, hotspot: &str) {
        if let Some(overrides) = self.room_overrides.get_mut(room) {
            overrides.disabled_hotspots.remove(hotspot);
        }
    }

    pub fn is_hotspot_disabled(&self, room: &str, hotspot: &str) -> bool {
        self.room_overrides
            .get(room)
            .is_some_and(|overrides| overrides.disabled_hotspots.contains(hotspot))
    }

    pub fn set_room_flag(&mut self, room: &str, name: &str, value: FlagValue) {
        self.room_overrides
            .entry(room.to_string())
            .or_default()
            .custom_flags
            .insert(name.to_string(), value);
    }

    pub fn room_flag(&self, room: &str, name: &str) -> Option<&FlagValue> {
        self.room_overrides
            .get(room)
            .and_then(|overrides| overrides.custom_flags.get(name))
    }
}
