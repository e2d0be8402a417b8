use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::action::{ActionQueue, PlayerAction, PlayerMotion};
use crate::condition::eval_condition_str;
use crate::content::{ContentError, Exit, GameContent, Hotspot};
use crate::dialogue::{DialogueError, DialogueRunner};
use crate::events::{EngineEvent, EventBus};
use crate::geometry::Point;
use crate::nav;
use crate::save::{SaveBank, SaveLoadResult, SlotSummary};
use crate::script::{ExecContext, Interpreter, PendingWait, ScriptCommand};
use crate::world::{Facing, FlagValue, WorldState, PLAYER_ACTOR};

/// Player reaction when a selected item has no effect on the target.
pub const CANT_USE_LINE: &str = "I can't use that.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Look,
    Use,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub save_path: PathBuf,
    /// Player movement in pixels per second.
    pub walk_speed: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("saves/pointclick.json"),
            walk_speed: 140.0,
        }
    }
}

enum ClickPlan {
    Interact {
        walk_to: Point,
        commands: Vec<ScriptCommand>,
    },
    UseExit {
        walk_to: Point,
        exit: String,
    },
    Ground(Point),
}

/// The whole runtime behind one value: content templates, mutable world
/// state, two interpreters (room effects and dialogue), the click queue,
/// and persistence. Single-threaded; callers push input, call `tick` once
/// per frame, and drain events.
#[derive(Debug)]
pub struct Game {
    content: GameContent,
    state: WorldState,
    bus: EventBus,
    effects: Interpreter,
    dialogue: DialogueRunner,
    queue: ActionQueue,
    motion: PlayerMotion,
    selected_item: Option<String>,
    save_bank: SaveBank,
    walk_speed: f32,
}

impl Game {
    /// Refuses structurally broken content; the returned game has already
    /// run the start room's enter script.
    pub fn new(content: GameContent, config: GameConfig) -> Result<Self, ContentError> {
        let content = content.into_validated()?;
        let state = WorldState::new(&content.start_room, content.start_position);
        let mut game = Self {
            state,
            bus: EventBus::new(),
            effects: Interpreter::new(),
            dialogue: DialogueRunner::new(),
            queue: ActionQueue::new(),
            motion: PlayerMotion::new(),
            selected_item: None,
            save_bank: SaveBank::new(config.save_path),
            walk_speed: config.walk_speed,
            content,
        };

        let enter = game
            .content
            .room(game.state.current_room())
            .map(|room| room.on_enter.clone())
            .unwrap_or_default();
        game.effects.run_commands(
            enter,
            &mut ExecContext {
                content: &game.content,
                state: &mut game.state,
                bus: &mut game.bus,
            },
        );
        game.service();
        Ok(game)
    }

    // ---- input ----

    /// Routes a click in room space. Ignored while a script or dialogue is
    /// running. Hotspots win over exits, exits over plain ground.
    pub fn click_at(&mut self, point: Point, verb: Verb) {
        if self.is_script_running() {
            debug!(x = point.x, y = point.y, "click ignored while a script is running");
            return;
        }

        let plan = self.plan_click(point, verb);
        self.motion.cancel();
        match plan {
            ClickPlan::Interact { walk_to, commands } => {
                self.queue.replace(vec![
                    PlayerAction::WalkTo(walk_to),
                    PlayerAction::RunScript { commands },
                ]);
            }
            ClickPlan::UseExit { walk_to, exit } => {
                self.queue.replace(vec![
                    PlayerAction::WalkTo(walk_to),
                    PlayerAction::ChangeRoom { exit },
                ]);
            }
            ClickPlan::Ground(target) => {
                self.queue.replace(vec![PlayerAction::WalkTo(target)]);
            }
        }
        self.process_queue();
    }

    fn plan_click(&mut self, point: Point, verb: Verb) -> ClickPlan {
        let room_id = self.state.current_room().to_string();
        let Some(room) = self.content.room(&room_id) else {
            return ClickPlan::Ground(point);
        };

        if let Some(hotspot) = room
            .hotspots
            .iter()
            .find(|hotspot| hotspot.area.contains(point) && self.hotspot_is_active(&room_id, hotspot))
        {
            let commands = match (verb, self.selected_item.clone()) {
                (Verb::Look, _) => hotspot.on_look.clone(),
                (Verb::Use, Some(item)) => {
                    self.selected_item = None;
                    match hotspot.use_with_item.get(&item) {
                        Some(commands) => commands.clone(),
                        None => vec![ScriptCommand::Thought {
                            text: CANT_USE_LINE.to_string(),
                        }],
                    }
                }
                (Verb::Use, None) => hotspot.on_use.clone(),
            };
            return ClickPlan::Interact {
                walk_to: hotspot.interaction_point,
                commands,
            };
        }

        if let Some(exit) = room.exits.iter().find(|exit| {
            exit.trigger.contains(point) && eval_condition_str(&exit.condition, &self.state)
        }) {
            return ClickPlan::UseExit {
                walk_to: exit.trigger.centroid(),
                exit: exit.id.clone(),
            };
        }

        ClickPlan::Ground(point)
    }

    pub fn select_item(&mut self, item: &str) {
        if self.state.has_item(item) {
            self.selected_item = Some(item.to_string());
        } else {
            warn!(item, "cannot select an item the player does not hold");
        }
    }

    pub fn clear_selected_item(&mut self) {
        self.selected_item = None;
    }

    pub fn acknowledge_text(&mut self) {
        self.effects.signal_text_dismissed(&mut ExecContext {
            content: &self.content,
            state: &mut self.state,
            bus: &mut self.bus,
        });
        self.dialogue.signal_text_dismissed(&mut ExecContext {
            content: &self.content,
            state: &mut self.state,
            bus: &mut self.bus,
        });
        self.service();
        self.process_queue();
    }

    /// Completion signal for a presentation-driven walk (NPCs). The player
    /// walk completes through `tick`.
    pub fn signal_walk_complete(&mut self, actor: &str) {
        self.effects.signal_walk_complete(
            actor,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.dialogue.signal_walk_complete(
            actor,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.service();
        self.process_queue();
    }

    // ---- dialogue ----

    /// Opens a conversation, optionally at an explicit node. Rejected while
    /// a script is running; the suspended script's waits stay exclusive.
    pub fn start_dialogue(
        &mut self,
        character: &str,
        start_node: Option<&str>,
    ) -> Result<(), DialogueError> {
        if self.is_script_running() {
            return Err(DialogueError::ScriptRunning);
        }
        let result = self.dialogue.start(
            character,
            start_node,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.service();
        result
    }

    pub fn select_choice(&mut self, choice_id: &str) -> Result<(), DialogueError> {
        let result = self.dialogue.select_choice(
            choice_id,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.service();
        result
    }

    pub fn advance_dialogue(&mut self) -> Result<(), DialogueError> {
        let result = self.dialogue.advance(&mut ExecContext {
            content: &self.content,
            state: &mut self.state,
            bus: &mut self.bus,
        });
        self.service();
        result
    }

    // ---- frame driver ----

    pub fn tick(&mut self, dt: f32) {
        if self.motion.is_walking() {
            let before = self.state.position();
            if let Some(step) = self.motion.advance(self.walk_speed * dt) {
                if (step.position.x - before.x).abs() > f32::EPSILON {
                    self.state.set_facing(if step.position.x < before.x {
                        Facing::Left
                    } else {
                        Facing::Right
                    });
                }
                self.state.set_position(step.position);
                if step.arrived {
                    self.signal_walk_complete(PLAYER_ACTOR);
                }
            }
        }

        self.effects.tick(
            dt,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.dialogue.tick(
            dt,
            &mut ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            },
        );
        self.service();
        self.process_queue();
    }

    /// Resolves cross-component requests until none remain: script-driven
    /// player walks, dialogue starts from room scripts, and dialogue-end
    /// waits.
    fn service(&mut self) {
        loop {
            if let Some(request) = self
                .effects
                .take_walk_request()
                .or_else(|| self.dialogue.take_walk_request())
            {
                if request.actor == PLAYER_ACTOR {
                    self.begin_player_walk(request.to);
                }
                continue;
            }

            if let Some(request) = self.effects.take_dialogue_request() {
                if self.dialogue.is_active() {
                    warn!(
                        character = %request.character,
                        "startDialogue while a dialogue is active, skipping"
                    );
                    self.effects.signal_dialogue_ended(&mut ExecContext {
                        content: &self.content,
                        state: &mut self.state,
                        bus: &mut self.bus,
                    });
                } else if let Err(error) = self.dialogue.start(
                    &request.character,
                    request.node.as_deref(),
                    &mut ExecContext {
                        content: &self.content,
                        state: &mut self.state,
                        bus: &mut self.bus,
                    },
                ) {
                    warn!(%error, "startDialogue failed, resuming script");
                    self.effects.signal_dialogue_ended(&mut ExecContext {
                        content: &self.content,
                        state: &mut self.state,
                        bus: &mut self.bus,
                    });
                }
                continue;
            }

            if !self.dialogue.is_busy()
                && self.effects.pending_wait() == Some(&PendingWait::DialogueEnded)
            {
                self.effects.signal_dialogue_ended(&mut ExecContext {
                    content: &self.content,
                    state: &mut self.state,
                    bus: &mut self.bus,
                });
                continue;
            }

            return;
        }
    }

    fn process_queue(&mut self) {
        while !self.is_script_running() && !self.motion.is_walking() {
            let Some(action) = self.queue.pop() else {
                return;
            };
            match action {
                PlayerAction::WalkTo(target) => {
                    self.begin_player_walk(target);
                }
                PlayerAction::RunScript { commands } => {
                    self.effects.run_commands(
                        commands,
                        &mut ExecContext {
                            content: &self.content,
                            state: &mut self.state,
                            bus: &mut self.bus,
                        },
                    );
                    self.service();
                }
                PlayerAction::ChangeRoom { exit } => {
                    let Some(exit) = self
                        .content
                        .room(self.state.current_room())
                        .and_then(|room| room.exit(&exit))
                        .cloned()
                    else {
                        warn!(%exit, "queued exit no longer exists, dropping");
                        continue;
                    };
                    self.effects.run_commands(
                        vec![ScriptCommand::GoToRoom {
                            room: exit.target_room,
                            spawn: exit.spawn,
                        }],
                        &mut ExecContext {
                            content: &self.content,
                            state: &mut self.state,
                            bus: &mut self.bus,
                        },
                    );
                    self.service();
                }
            }
        }
    }

    fn begin_player_walk(&mut self, to: Point) {
        let path = match self.content.room(self.state.current_room()) {
            Some(room) => nav::find_path(self.state.position(), to, &room.walkable),
            None => vec![self.state.position(), to],
        };
        self.bus.emit(EngineEvent::WalkRequested {
            actor: PLAYER_ACTOR.to_string(),
            to: path[path.len() - 1],
        });
        self.motion.begin(path);
    }

    // ---- persistence ----

    pub fn save_to_slot(&self, slot: u32, label: &str) -> SaveLoadResult<()> {
        self.save_bank.save_to_slot(slot, label, &self.state)
    }

    /// Replaces the world state wholesale and resets every piece of
    /// transient execution state. On failure the running game is untouched.
    pub fn load_from_slot(&mut self, slot: u32) -> SaveLoadResult<()> {
        let state = self.save_bank.load_from_slot(slot)?;
        if self.content.room(state.current_room()).is_none() {
            return Err(format!(
                "validation failed at slots[{slot}].state.current_room: unknown room '{}'",
                state.current_room()
            ));
        }

        self.state = state;
        self.effects.reset();
        self.dialogue.reset();
        self.queue.clear();
        self.motion.cancel();
        self.selected_item = None;
        self.bus = EventBus::new();
        self.bus.emit(EngineEvent::RoomChanged {
            room: self.state.current_room().to_string(),
            spawn: self.state.position(),
        });
        info!(slot, "loaded game");
        Ok(())
    }

    pub fn delete_slot(&self, slot: u32) -> SaveLoadResult<bool> {
        self.save_bank.delete_slot(slot)
    }

    pub fn enumerate_slots(&self) -> SaveLoadResult<Vec<SlotSummary>> {
        self.save_bank.enumerate_slots()
    }

    // ---- queries ----

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.bus.drain()
    }

    pub fn is_script_running(&self) -> bool {
        self.effects.is_running() || self.dialogue.is_busy()
    }

    pub fn is_dialogue_active(&self) -> bool {
        self.dialogue.is_active()
    }

    pub fn awaiting_choice(&self) -> bool {
        self.dialogue.awaiting_choice()
    }

    pub fn is_player_walking(&self) -> bool {
        self.motion.is_walking()
    }

    pub fn current_room(&self) -> &str {
        self.state.current_room()
    }

    pub fn player_position(&self) -> Point {
        self.state.position()
    }

    pub fn player_facing(&self) -> Facing {
        self.state.facing()
    }

    pub fn inventory(&self) -> &[String] {
        self.state.inventory()
    }

    pub fn selected_item(&self) -> Option<&str> {
        self.selected_item.as_deref()
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.state.flag(name)
    }

    pub fn reputation(&self) -> i32 {
        self.state.reputation()
    }

    pub fn is_solved(&self, puzzle: &str) -> bool {
        self.state.is_solved(puzzle)
    }

    pub fn has_visited(&self, room: &str) -> bool {
        self.state.has_visited(room)
    }

    /// Visible, enabled hotspot under `point` in the current room.
    pub fn hotspot_at(&self, point: Point) -> Option<&Hotspot> {
        let room_id = self.state.current_room();
        let room = self.content.room(room_id)?;
        room.hotspots
            .iter()
            .find(|hotspot| hotspot.area.contains(point) && self.hotspot_is_active(room_id, hotspot))
    }

    /// Usable exit under `point` in the current room.
    pub fn exit_at(&self, point: Point) -> Option<&Exit> {
        let room = self.content.room(self.state.current_room())?;
        room.exits.iter().find(|exit| {
            exit.trigger.contains(point) && eval_condition_str(&exit.condition, &self.state)
        })
    }

    pub fn is_hotspot_enabled(&self, hotspot_id: &str) -> bool {
        let room_id = self.state.current_room();
        self.content
            .room(room_id)
            .and_then(|room| room.hotspot(hotspot_id))
            .is_some_and(|hotspot| self.hotspot_is_active(room_id, hotspot))
    }

    fn hotspot_is_active(&self, room_id: &str, hotspot: &Hotspot) -> bool {
        !self.state.is_hotspot_disabled(room_id, &hotspot.id)
            && eval_condition_str(&hotspot.visible_when, &self.state)
    }
}
