use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::condition::eval_condition_str;
use crate::content::GameContent;
use crate::events::{ChoicePreview, EngineEvent};
use crate::script::{ExecContext, Interpreter, ScriptCommand};

/// Target sentinel that ends the conversation instead of naming a node.
pub const END_NODE: &str = "end";

#[derive(Debug, Error, PartialEq)]
pub enum DialogueError {
    #[error("character '{0}' has no dialogue trees")]
    UnknownCharacter(String),
    #[error("character '{character}' has no dialogue node '{node}'")]
    UnknownNode { character: String, node: String },
    #[error("cannot open a dialogue while a script is running")]
    ScriptRunning,
    #[error("no dialogue is active")]
    NotActive,
    #[error("dialogue is not presenting choices")]
    NotPresentingChoices,
    #[error("no selectable choice '{0}'")]
    UnknownChoice(String),
    #[error("dialogue is not waiting to advance")]
    NotAdvanceable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueChoice {
    pub id: String,
    pub text: String,
    pub target: String,
    #[serde(default)]
    pub condition: String,
    /// Selectable at most once per playthrough.
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub commands: Vec<ScriptCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: String,
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub choices: Vec<DialogueChoice>,
    #[serde(default)]
    pub on_enter: Vec<ScriptCommand>,
    #[serde(default)]
    pub on_exit: Vec<ScriptCommand>,
    /// Ends the conversation after the node is acknowledged.
    #[serde(default)]
    pub terminal: bool,
}

impl DialogueNode {
    /// A plain spoken line that advances to `next` (or `"end"`).
    pub fn line(id: &str, speaker: &str, text: &str, next: &str) -> Self {
        Self {
            id: id.to_string(),
            speaker: speaker.to_string(),
            text: text.to_string(),
            next: Some(next.to_string()),
            choices: Vec::new(),
            on_enter: Vec::new(),
            on_exit: Vec::new(),
            terminal: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTree {
    pub id: String,
    pub character: String,
    pub start: String,
    /// Higher priority wins during automatic tree selection.
    pub priority: i32,
    #[serde(default)]
    pub available_when: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, DialogueNode>,
}

impl DialogueTree {
    pub fn new(id: &str, character: &str, start: &str, priority: i32) -> Self {
        Self {
            id: id.to_string(),
            character: character.to_string(),
            start: start.to_string(),
            priority,
            available_when: String::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: DialogueNode) {
        self.nodes.insert(node.id.clone(), node);
    }
}

/// Structural checks for one tree. Runs as part of content validation;
/// the runner still degrades gracefully if bad data slips through.
pub fn validate_tree(tree: &DialogueTree) -> Vec<String> {
    let mut issues = Vec::new();
    let label = format!("dialogue tree '{}'", tree.id);

    if !tree.nodes.contains_key(&tree.start) {
        issues.push(format!(
            "{label}: start node '{}' does not exist",
            tree.start
        ));
    }

    for node in tree.nodes.values() {
        let node_label = format!("{label} node '{}'", node.id);

        if let Some(next) = &node.next {
            if next != END_NODE && !tree.nodes.contains_key(next) {
                issues.push(format!("{node_label}: next targets unknown node '{next}'"));
            }
            if !node.choices.is_empty() {
                issues.push(format!(
                    "{node_label}: has both next and choices, pick one"
                ));
            }
        }

        for choice in &node.choices {
            if choice.target != END_NODE && !tree.nodes.contains_key(&choice.target) {
                issues.push(format!(
                    "{node_label} choice '{}': targets unknown node '{}'",
                    choice.id, choice.target
                ));
            }
        }

        if node.next.is_none() && node.choices.is_empty() && !node.terminal {
            issues.push(format!("{node_label}: no way to leave the node"));
        }
    }

    issues
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    NodeActive,
    ChoicesPresented,
}

#[derive(Debug)]
enum Step {
    Run(Vec<ScriptCommand>),
    Present(String),
    Goto(String),
    Finish,
}

#[derive(Debug)]
struct ActiveDialogue {
    character: String,
    tree: String,
    node: String,
}

/// Drives one conversation at a time. Node and choice scripts run on the
/// runner's own interpreter so a suspended room script never interleaves
/// with dialogue effects.
#[derive(Debug, Default)]
pub struct DialogueRunner {
    interpreter: Interpreter,
    steps: VecDeque<Step>,
    phase: Phase,
    active: Option<ActiveDialogue>,
}

impl DialogueRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some() || self.interpreter.is_running()
    }

    pub fn awaiting_choice(&self) -> bool {
        self.phase == Phase::ChoicesPresented
    }

    pub fn reset(&mut self) {
        self.interpreter.reset();
        self.steps.clear();
        self.phase = Phase::Idle;
        self.active = None;
    }

    /// Opens a conversation with `character`. With no explicit start node,
    /// picks the highest-priority tree whose `available_when` passes,
    /// falling back to the highest-priority tree overall; with one, enters
    /// the highest-priority tree containing that node at that node.
    pub fn start(
        &mut self,
        character: &str,
        start_node: Option<&str>,
        ctx: &mut ExecContext<'_>,
    ) -> Result<(), DialogueError> {
        let trees = ctx.content.dialogue_trees(character);
        if trees.is_empty() {
            return Err(DialogueError::UnknownCharacter(character.to_string()));
        }

        let selected = match start_node {
            Some(node_id) => trees
                .iter()
                .find(|candidate| candidate.nodes.contains_key(node_id))
                .ok_or_else(|| DialogueError::UnknownNode {
                    character: character.to_string(),
                    node: node_id.to_string(),
                })?,
            None => trees
                .iter()
                .find(|candidate| eval_condition_str(&candidate.available_when, ctx.state))
                .unwrap_or(&trees[0]),
        };
        let entry = start_node.unwrap_or(selected.start.as_str()).to_string();

        self.reset();
        self.active = Some(ActiveDialogue {
            character: character.to_string(),
            tree: selected.id.clone(),
            node: entry.clone(),
        });
        self.steps.push_back(Step::Goto(entry));
        self.pump(ctx);
        Ok(())
    }

    /// Acknowledges the current node when it presents no choices.
    pub fn advance(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), DialogueError> {
        if self.active.is_none() {
            return Err(DialogueError::NotActive);
        }
        if self.phase != Phase::NodeActive || self.interpreter.is_running() {
            return Err(DialogueError::NotAdvanceable);
        }

        let (exit_commands, destination) = {
            let node = self.current_node(ctx.content).ok_or(DialogueError::NotActive)?;
            let destination = match (&node.next, node.terminal) {
                (Some(next), _) => next.clone(),
                (None, true) => END_NODE.to_string(),
                (None, false) => {
                    warn!(node = %node.id, "node has no exit, ending conversation");
                    END_NODE.to_string()
                }
            };
            (node.on_exit.clone(), destination)
        };

        self.phase = Phase::Idle;
        self.steps.push_back(Step::Run(exit_commands));
        self.steps.push_back(Step::Goto(destination));
        self.pump(ctx);
        Ok(())
    }

    /// Commits one of the presented choices: exit commands, then choice
    /// commands, then the target node.
    pub fn select_choice(
        &mut self,
        choice_id: &str,
        ctx: &mut ExecContext<'_>,
    ) -> Result<(), DialogueError> {
        if self.active.is_none() {
            return Err(DialogueError::NotActive);
        }
        if self.phase != Phase::ChoicesPresented {
            return Err(DialogueError::NotPresentingChoices);
        }

        let (tree, node_id) = {
            let active = self.active.as_ref().ok_or(DialogueError::NotActive)?;
            (active.tree.clone(), active.node.clone())
        };
        let (exit_commands, choice) = {
            let node = self.current_node(ctx.content).ok_or(DialogueError::NotActive)?;
            let choice = node
                .choices
                .iter()
                .find(|choice| {
                    choice.id == choice_id && choice_is_selectable(choice, &tree, &node_id, ctx)
                })
                .ok_or_else(|| DialogueError::UnknownChoice(choice_id.to_string()))?
                .clone();
            (node.on_exit.clone(), choice)
        };

        ctx.state.record_choice_selected(&tree, &node_id, &choice.id);
        self.phase = Phase::Idle;
        self.steps.push_back(Step::Run(exit_commands));
        self.steps.push_back(Step::Run(choice.commands));
        self.steps.push_back(Step::Goto(choice.target));
        self.pump(ctx);
        Ok(())
    }

    pub fn take_walk_request(&mut self) -> Option<crate::script::WalkRequest> {
        self.interpreter.take_walk_request()
    }

    pub fn signal_text_dismissed(&mut self, ctx: &mut ExecContext<'_>) {
        self.interpreter.signal_text_dismissed(ctx);
        self.pump(ctx);
    }

    pub fn signal_walk_complete(&mut self, actor: &str, ctx: &mut ExecContext<'_>) {
        self.interpreter.signal_walk_complete(actor, ctx);
        self.pump(ctx);
    }

    pub fn tick(&mut self, dt: f32, ctx: &mut ExecContext<'_>) {
        self.interpreter.tick(dt, ctx);
        self.pump(ctx);
    }

    fn current_node<'a>(&self, content: &'a GameContent) -> Option<&'a DialogueNode> {
        let active = self.active.as_ref()?;
        content
            .dialogue_tree(&active.character, &active.tree)?
            .nodes
            .get(&active.node)
    }

    fn pump(&mut self, ctx: &mut ExecContext<'_>) {
        loop {
            // Conversations cannot nest.
            if self.interpreter.take_dialogue_request().is_some() {
                warn!("startDialogue inside a dialogue script, skipping");
                self.interpreter.signal_dialogue_ended(ctx);
            }
            if self.interpreter.is_running() {
                return;
            }
            let Some(step) = self.steps.pop_front() else {
                return;
            };
            match step {
                Step::Run(commands) => {
                    self.interpreter.run_commands(commands, ctx);
                }
                Step::Goto(target) => {
                    if target == END_NODE {
                        self.steps.push_back(Step::Finish);
                        continue;
                    }
                    let Some(active) = self.active.as_mut() else {
                        return;
                    };
                    active.node = target.clone();
                    let Some(node) = self.current_node(ctx.content).cloned() else {
                        warn!(node = %target, "dialogue target node missing, ending conversation");
                        self.steps.clear();
                        self.steps.push_back(Step::Finish);
                        continue;
                    };
                    let tree = match self.active.as_ref() {
                        Some(active) => active.tree.clone(),
                        None => return,
                    };
                    ctx.state.record_dialogue_visit(&tree, &node.id);
                    self.steps.push_back(Step::Run(node.on_enter.clone()));
                    self.steps.push_back(Step::Present(node.id.clone()));
                }
                Step::Present(node_id) => {
                    let Some(node) = self.current_node(ctx.content).cloned() else {
                        warn!(node = %node_id, "dialogue node missing at presentation, ending");
                        self.steps.clear();
                        self.steps.push_back(Step::Finish);
                        continue;
                    };
                    let tree = match self.active.as_ref() {
                        Some(active) => active.tree.clone(),
                        None => return,
                    };
                    ctx.bus.emit(EngineEvent::DialogueNodeEntered {
                        tree: tree.clone(),
                        node: node.id.clone(),
                        speaker: node.speaker.clone(),
                        text: node.text.clone(),
                    });

                    let selectable: Vec<ChoicePreview> = node
                        .choices
                        .iter()
                        .filter(|choice| choice_is_selectable(choice, &tree, &node.id, ctx))
                        .map(|choice| ChoicePreview {
                            id: choice.id.clone(),
                            text: choice.text.clone(),
                        })
                        .collect();

                    if selectable.is_empty() {
                        self.phase = Phase::NodeActive;
                    } else {
                        ctx.bus.emit(EngineEvent::DialogueChoicesReady {
                            choices: selectable,
                        });
                        self.phase = Phase::ChoicesPresented;
                    }
                    return;
                }
                Step::Finish => {
                    if let Some(active) = self.active.take() {
                        ctx.bus.emit(EngineEvent::DialogueEnded { tree: active.tree });
                    }
                    self.phase = Phase::Idle;
                    self.steps.clear();
                    return;
                }
            }
        }
    }
}

fn choice_is_selectable(
    choice: &DialogueChoice,
    tree: &str,
    node: &str,
    ctx: &ExecContext<'_>,
) -> bool {
    if choice.once && ctx.state.was_choice_selected(tree, node, &choice.id) {
        return false;
    }
    eval_condition_str(&choice.condition, ctx.state)
}
