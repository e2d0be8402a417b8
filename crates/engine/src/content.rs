use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::check_condition_str;
use crate::dialogue::{validate_tree, DialogueTree};
use crate::geometry::{Point, Polygon};
use crate::script::{visit_commands, ScriptCommand};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content validation failed: {}", issues.join("; "))]
    Invalid { issues: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub area: Polygon,
    /// Where the player walks to before the interaction fires.
    pub interaction_point: Point,
    #[serde(default)]
    pub cursor_hint: Option<String>,
    #[serde(default)]
    pub on_look: Vec<ScriptCommand>,
    #[serde(default)]
    pub on_use: Vec<ScriptCommand>,
    #[serde(default)]
    pub use_with_item: BTreeMap<String, Vec<ScriptCommand>>,
    /// Condition source; empty means always visible.
    #[serde(default)]
    pub visible_when: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub id: String,
    pub target_room: String,
    /// Player spawn in the target room; defaults to the walkable centroid.
    #[serde(default)]
    pub spawn: Option<Point>,
    pub trigger: Polygon,
    #[serde(default)]
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub background: String,
    pub walkable: Polygon,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub on_enter: Vec<ScriptCommand>,
    #[serde(default)]
    pub on_exit: Vec<ScriptCommand>,
}

impl Room {
    pub fn hotspot(&self, id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|hotspot| hotspot.id == id)
    }

    pub fn exit(&self, id: &str) -> Option<&Exit> {
        self.exits.iter().find(|exit| exit.id == id)
    }
}

/// Immutable template data for one game: rooms, items, and per-character
/// dialogue trees. Loaded once at startup and never mutated; all mutable
/// progress lives in `WorldState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameContent {
    pub start_room: String,
    pub start_position: Point,
    #[serde(default)]
    rooms: BTreeMap<String, Room>,
    #[serde(default)]
    items: BTreeMap<String, Item>,
    #[serde(default)]
    dialogues: BTreeMap<String, Vec<DialogueTree>>,
}

impl GameContent {
    pub fn new(start_room: &str, start_position: Point) -> Self {
        Self {
            start_room: start_room.to_string(),
            start_position,
            rooms: BTreeMap::new(),
            items: BTreeMap::new(),
            dialogues: BTreeMap::new(),
        }
    }

    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    /// Trees for one character are kept sorted by descending priority so
    /// selection is a linear scan.
    pub fn add_dialogue(&mut self, tree: DialogueTree) {
        let trees = self.dialogues.entry(tree.character.clone()).or_default();
        trees.push(tree);
        trees.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn dialogue_trees(&self, character: &str) -> &[DialogueTree] {
        self.dialogues
            .get(character)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dialogue_tree(&self, character: &str, tree_id: &str) -> Option<&DialogueTree> {
        self.dialogue_trees(character)
            .iter()
            .find(|tree| tree.id == tree_id)
    }

    fn check_commands(&self, location: &str, commands: &[ScriptCommand], issues: &mut Vec<String>) {
        visit_commands(commands, &mut |command| match command {
            ScriptCommand::GoToRoom { room, .. } => {
                if !self.rooms.contains_key(room) {
                    issues.push(format!("{location}: goToRoom targets unknown room '{room}'"));
                }
            }
            ScriptCommand::GiveItem { item } | ScriptCommand::TakeItem { item } => {
                if !self.items.contains_key(item) {
                    issues.push(format!("{location}: references unknown item '{item}'"));
                }
            }
            ScriptCommand::StartDialogue { character, .. } => {
                if !self.dialogues.contains_key(character) {
                    issues.push(format!(
                        "{location}: startDialogue targets unknown character '{character}'"
                    ));
                }
            }
            ScriptCommand::If { condition, .. } => {
                if let Err(error) = check_condition_str(condition) {
                    issues.push(format!("{location}: bad condition '{condition}': {error}"));
                }
            }
            _ => {}
        });
    }

    fn check_condition(&self, location: &str, source: &str, issues: &mut Vec<String>) {
        if let Err(error) = check_condition_str(source) {
            issues.push(format!("{location}: bad condition '{source}': {error}"));
        }
    }

    /// Every structural problem in the content, as human-readable messages.
    /// An empty list means the content is safe to run.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.rooms.contains_key(&self.start_room) {
            issues.push(format!("unknown start room '{}'", self.start_room));
        }

        for room in self.rooms.values() {
            let room_label = format!("room '{}'", room.id);
            self.check_commands(&format!("{room_label} onEnter"), &room.on_enter, &mut issues);
            self.check_commands(&format!("{room_label} onExit"), &room.on_exit, &mut issues);

            for hotspot in &room.hotspots {
                let label = format!("{room_label} hotspot '{}'", hotspot.id);
                self.check_condition(&label, &hotspot.visible_when, &mut issues);
                self.check_commands(&format!("{label} onLook"), &hotspot.on_look, &mut issues);
                self.check_commands(&format!("{label} onUse"), &hotspot.on_use, &mut issues);
                for (item, commands) in &hotspot.use_with_item {
                    if !self.items.contains_key(item) {
                        issues.push(format!("{label}: useWithItem keys unknown item '{item}'"));
                    }
                    self.check_commands(&format!("{label} useWithItem '{item}'"), commands, &mut issues);
                }
            }

            for exit in &room.exits {
                let label = format!("{room_label} exit '{}'", exit.id);
                if !self.rooms.contains_key(&exit.target_room) {
                    issues.push(format!(
                        "{label}: unknown target room '{}'",
                        exit.target_room
                    ));
                }
                self.check_condition(&label, &exit.condition, &mut issues);
            }
        }

        for trees in self.dialogues.values() {
            for tree in trees {
                let label = format!("dialogue tree '{}'", tree.id);
                self.check_condition(&label, &tree.available_when, &mut issues);
                issues.extend(validate_tree(tree));
                for node in tree.nodes.values() {
                    let node_label = format!("{label} node '{}'", node.id);
                    self.check_commands(&format!("{node_label} onEnter"), &node.on_enter, &mut issues);
                    self.check_commands(&format!("{node_label} onExit"), &node.on_exit, &mut issues);
                    for choice in &node.choices {
                        let choice_label = format!("{node_label} choice '{}'", choice.id);
                        self.check_condition(&choice_label, &choice.condition, &mut issues);
                        self.check_commands(&choice_label, &choice.commands, &mut issues);
                    }
                }
            }
        }

        issues
    }

    /// Consuming validation gate; `Game::new` refuses unvalidated content.
    pub fn into_validated(self) -> Result<Self, ContentError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(self)
        } else {
            Err(ContentError::Invalid { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .expect("square")
    }

    fn bare_room(id: &str) -> Room {
        Room {
            id: id.to_string(),
            background: format!("{id}.png"),
            walkable: square(),
            hotspots: Vec::new(),
            exits: Vec::new(),
            on_enter: Vec::new(),
            on_exit: Vec::new(),
        }
    }

    #[test]
    fn valid_content_produces_no_issues() {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        content.add_room(bare_room("harbor"));
        assert!(content.validate().is_empty());
        assert!(content.into_validated().is_ok());
    }

    #[test]
    fn missing_start_room_is_reported() {
        let content = GameContent::new("harbor", Point::new(50.0, 50.0));
        let issues = content.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("start room"));
        assert!(issues[0].contains("harbor"));
    }

    #[test]
    fn dangling_exit_target_is_reported() {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        let mut room = bare_room("harbor");
        room.exits.push(Exit {
            id: "door".to_string(),
            target_room: "celar".to_string(),
            spawn: Some(Point::new(10.0, 10.0)),
            trigger: square(),
            condition: String::new(),
        });
        content.add_room(room);

        let issues = content.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("exit 'door'"));
        assert!(issues[0].contains("celar"));
    }

    #[test]
    fn nested_script_references_are_checked() {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        let mut room = bare_room("harbor");
        room.on_enter.push(ScriptCommand::If {
            condition: "flag(\"ready\")".to_string(),
            then: vec![ScriptCommand::GiveItem {
                item: "lantern".to_string(),
            }],
            otherwise: Vec::new(),
        });
        content.add_room(room);

        let issues = content.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("unknown item 'lantern'"));

        content.add_item(Item {
            id: "lantern".to_string(),
            name: "Lantern".to_string(),
            icon: "lantern.png".to_string(),
        });
        assert!(content.validate().is_empty());
    }

    #[test]
    fn bad_condition_sources_are_reported() {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        let mut room = bare_room("harbor");
        room.hotspots.push(Hotspot {
            id: "crate".to_string(),
            area: square(),
            interaction_point: Point::new(20.0, 20.0),
            cursor_hint: None,
            on_look: Vec::new(),
            on_use: Vec::new(),
            use_with_item: BTreeMap::new(),
            visible_when: "flag(".to_string(),
        });
        content.add_room(room);

        let issues = content.validate();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("hotspot 'crate'"));
        assert!(issues[0].contains("bad condition"));
    }

    #[test]
    fn dialogue_trees_sort_by_descending_priority() {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        content.add_room(bare_room("harbor"));
        content.add_dialogue(DialogueTree::new("small_talk", "captain", "start", 0));
        content.add_dialogue(DialogueTree::new("urgent", "captain", "start", 10));

        let trees = content.dialogue_trees("captain");
        assert_eq!(trees[0].id, "urgent");
        assert_eq!(trees[1].id, "small_talk");
    }
}
