use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::condition::eval_condition_str;
use crate::content::GameContent;
use crate::events::{EngineEvent, EventBus};
use crate::geometry::Point;
use crate::world::{Facing, FlagValue, WorldState, PLAYER_ACTOR};

/// The closed command vocabulary scripts are written in. Serialized with an
/// explicit tag so authored content stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum ScriptCommand {
    Say { speaker: String, text: String },
    Narrate { text: String },
    Thought { text: String },
    SetFlag { flag: String, value: FlagValue },
    IncFlag { flag: String, amount: f64 },
    GiveItem { item: String },
    TakeItem { item: String },
    EnableHotspot {
        #[serde(default)]
        room: Option<String>,
        hotspot: String,
    },
    DisableHotspot {
        #[serde(default)]
        room: Option<String>,
        hotspot: String,
    },
    Teleport { to: Point },
    Walk {
        #[serde(default)]
        actor: Option<String>,
        to: Point,
    },
    Face { facing: Facing },
    GoToRoom {
        room: String,
        #[serde(default)]
        spawn: Option<Point>,
    },
    PlayMusic { track: String },
    StopMusic,
    PlaySound { sound: String },
    Wait { seconds: f32 },
    Animate { actor: String, animation: String },
    StartDialogue {
        character: String,
        #[serde(default)]
        node: Option<String>,
    },
    If {
        condition: String,
        then: Vec<ScriptCommand>,
        #[serde(default)]
        otherwise: Vec<ScriptCommand>,
    },
    FadeIn { seconds: f32 },
    FadeOut { seconds: f32 },
    MarkPuzzleSolved { puzzle: String },
    AdjustReputation { delta: i32 },
}

/// Depth-first visit over a command list, descending into both `If` arms.
pub fn visit_commands(commands: &[ScriptCommand], visit: &mut dyn FnMut(&ScriptCommand)) {
    for command in commands {
        visit(command);
        if let ScriptCommand::If {
            then, otherwise, ..
        } = command
        {
            visit_commands(then, visit);
            visit_commands(otherwise, visit);
        }
    }
}

/// Why the interpreter is currently suspended. Each variant resumes only on
/// its matching signal.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWait {
    TextDismissal,
    WalkDone { actor: String },
    Timer { remaining: f32 },
    DialogueEnded,
}

/// A `StartDialogue` the interpreter encountered; the facade opens the
/// conversation and resolves the wait when it ends.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub character: String,
    pub node: Option<String>,
}

/// A `Walk` the interpreter suspended on. Player walks are driven by the
/// facade's pathfinding, which emits the walk event itself; NPC walks are
/// resolved by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkRequest {
    pub actor: String,
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq)]
enum DrainAction {
    SwitchRoom { room: String, spawn: Point },
}

#[derive(Debug)]
struct Frame {
    commands: Vec<ScriptCommand>,
    index: usize,
    on_drain: Option<DrainAction>,
}

/// Mutable surroundings a script executes against.
pub struct ExecContext<'a> {
    pub content: &'a GameContent,
    pub state: &'a mut WorldState,
    pub bus: &'a mut EventBus,
}

/// Runs command lists strictly in order over an explicit frame stack.
/// Suspends on text display, walks, timers, and dialogue; everything else
/// executes synchronously. Bad data references are logged and skipped so a
/// script always drains.
#[derive(Debug, Default)]
pub struct Interpreter {
    frames: Vec<Frame>,
    pending: Option<PendingWait>,
    dialogue_request: Option<DialogueRequest>,
    walk_request: Option<WalkRequest>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some() || !self.frames.is_empty()
    }

    pub fn pending_wait(&self) -> Option<&PendingWait> {
        self.pending.as_ref()
    }

    pub fn take_dialogue_request(&mut self) -> Option<DialogueRequest> {
        self.dialogue_request.take()
    }

    pub fn take_walk_request(&mut self) -> Option<WalkRequest> {
        self.walk_request.take()
    }

    /// Discards all frames and waits. Used when a save is loaded.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.pending = None;
        self.dialogue_request = None;
        self.walk_request = None;
    }

    /// Pushes a command list and executes until it suspends or drains.
    pub fn run_commands(&mut self, commands: Vec<ScriptCommand>, ctx: &mut ExecContext<'_>) {
        if !commands.is_empty() {
            self.frames.push(Frame {
                commands,
                index: 0,
                on_drain: None,
            });
        }
        self.run(ctx);
    }

    pub fn signal_text_dismissed(&mut self, ctx: &mut ExecContext<'_>) {
        if self.pending == Some(PendingWait::TextDismissal) {
            self.pending = None;
            self.run(ctx);
        }
    }

    pub fn signal_walk_complete(&mut self, actor: &str, ctx: &mut ExecContext<'_>) {
        let matches = matches!(
            &self.pending,
            Some(PendingWait::WalkDone { actor: waiting }) if waiting == actor
        );
        if matches {
            self.pending = None;
            self.run(ctx);
        }
    }

    pub fn signal_dialogue_ended(&mut self, ctx: &mut ExecContext<'_>) {
        if self.pending == Some(PendingWait::DialogueEnded) {
            self.pending = None;
            self.run(ctx);
        }
    }

    pub fn tick(&mut self, dt: f32, ctx: &mut ExecContext<'_>) {
        if let Some(PendingWait::Timer { remaining }) = &mut self.pending {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.pending = None;
                self.run(ctx);
            }
        }
    }

    fn run(&mut self, ctx: &mut ExecContext<'_>) {
        while self.pending.is_none() {
            let Some(frame) = self.frames.last_mut() else {
                return;
            };
            if frame.index >= frame.commands.len() {
                let drained = self.frames.pop();
                if let Some(Frame {
                    on_drain: Some(DrainAction::SwitchRoom { room, spawn }),
                    ..
                }) = drained
                {
                    self.switch_room(&room, spawn, ctx);
                }
                continue;
            }
            let command = frame.commands[frame.index].clone();
            frame.index += 1;
            self.execute(command, ctx);
        }
    }

    fn switch_room(&mut self, room: &str, spawn: Point, ctx: &mut ExecContext<'_>) {
        let Some(target) = ctx.content.room(room) else {
            warn!(room, "room vanished between exit and enter, staying put");
            return;
        };
        ctx.state.set_current_room(room);
        ctx.state.set_position(spawn);
        ctx.bus.emit(EngineEvent::RoomChanged {
            room: room.to_string(),
            spawn,
        });
        if !target.on_enter.is_empty() {
            self.frames.push(Frame {
                commands: target.on_enter.clone(),
                index: 0,
                on_drain: None,
            });
        }
    }

    fn execute(&mut self, command: ScriptCommand, ctx: &mut ExecContext<'_>) {
        match command {
            ScriptCommand::Say { speaker, text } => {
                ctx.bus.emit(EngineEvent::Say { speaker, text });
                self.pending = Some(PendingWait::TextDismissal);
            }
            ScriptCommand::Narrate { text } => {
                ctx.bus.emit(EngineEvent::Narrate { text });
                self.pending = Some(PendingWait::TextDismissal);
            }
            ScriptCommand::Thought { text } => {
                ctx.bus.emit(EngineEvent::Thought { text });
                self.pending = Some(PendingWait::TextDismissal);
            }
            ScriptCommand::SetFlag { flag, value } => {
                ctx.state.set_flag(&flag, value);
            }
            ScriptCommand::IncFlag { flag, amount } => {
                ctx.state.increment_flag(&flag, amount);
            }
            ScriptCommand::GiveItem { item } => {
                if ctx.content.item(&item).is_none() {
                    warn!(%item, "giveItem references unknown item, skipping");
                    return;
                }
                if ctx.state.give_item(&item) {
                    ctx.bus.emit(EngineEvent::ItemAdded { item });
                }
            }
            ScriptCommand::TakeItem { item } => {
                if ctx.content.item(&item).is_none() {
                    warn!(%item, "takeItem references unknown item, skipping");
                    return;
                }
                if ctx.state.take_item(&item) {
                    ctx.bus.emit(EngineEvent::ItemRemoved { item });
                }
            }
            ScriptCommand::EnableHotspot { room, hotspot } => {
                if let Some(room) = self.resolve_hotspot_room(room, &hotspot, ctx) {
                    ctx.state.enable_hotspot(&room, &hotspot);
                }
            }
            ScriptCommand::DisableHotspot { room, hotspot } => {
                if let Some(room) = self.resolve_hotspot_room(room, &hotspot, ctx) {
                    ctx.state.disable_hotspot(&room, &hotspot);
                }
            }
            ScriptCommand::Teleport { to } => {
                ctx.state.set_position(to);
            }
            ScriptCommand::Walk { actor, to } => {
                let actor = actor.unwrap_or_else(|| PLAYER_ACTOR.to_string());
                if actor != PLAYER_ACTOR {
                    ctx.bus.emit(EngineEvent::WalkRequested {
                        actor: actor.clone(),
                        to,
                    });
                }
                self.walk_request = Some(WalkRequest {
                    actor: actor.clone(),
                    to,
                });
                self.pending = Some(PendingWait::WalkDone { actor });
            }
            ScriptCommand::Face { facing } => {
                ctx.state.set_facing(facing);
            }
            ScriptCommand::GoToRoom { room, spawn } => {
                let Some(target) = ctx.content.room(&room) else {
                    warn!(%room, "goToRoom targets unknown room, skipping");
                    return;
                };
                let spawn = spawn.unwrap_or_else(|| target.walkable.centroid());
                let exit_commands = ctx
                    .content
                    .room(ctx.state.current_room())
                    .map(|current| current.on_exit.clone())
                    .unwrap_or_default();
                self.frames.push(Frame {
                    commands: exit_commands,
                    index: 0,
                    on_drain: Some(DrainAction::SwitchRoom { room, spawn }),
                });
            }
            ScriptCommand::PlayMusic { track } => {
                ctx.bus.emit(EngineEvent::MusicStarted { track });
            }
            ScriptCommand::StopMusic => {
                ctx.bus.emit(EngineEvent::MusicStopped);
            }
            ScriptCommand::PlaySound { sound } => {
                ctx.bus.emit(EngineEvent::SoundRequested { sound });
            }
            ScriptCommand::Wait { seconds } => {
                if seconds > 0.0 {
                    self.pending = Some(PendingWait::Timer { remaining: seconds });
                }
            }
            ScriptCommand::Animate { actor, animation } => {
                ctx.bus.emit(EngineEvent::AnimateRequested { actor, animation });
            }
            ScriptCommand::StartDialogue { character, node } => {
                if ctx.content.dialogue_trees(&character).is_empty() {
                    warn!(%character, "startDialogue targets unknown character, skipping");
                    return;
                }
                self.dialogue_request = Some(DialogueRequest { character, node });
                self.pending = Some(PendingWait::DialogueEnded);
            }
            ScriptCommand::If {
                condition,
                then,
                otherwise,
            } => {
                let branch = if eval_condition_str(&condition, ctx.state) {
                    then
                } else {
                    otherwise
                };
                if !branch.is_empty() {
                    self.frames.push(Frame {
                        commands: branch,
                        index: 0,
                        on_drain: None,
                    });
                }
            }
            ScriptCommand::FadeIn { seconds } => {
                ctx.bus.emit(EngineEvent::FadeIn { seconds });
            }
            ScriptCommand::FadeOut { seconds } => {
                ctx.bus.emit(EngineEvent::FadeOut { seconds });
            }
            ScriptCommand::MarkPuzzleSolved { puzzle } => {
                if ctx.state.mark_puzzle_solved(&puzzle) {
                    ctx.bus.emit(EngineEvent::PuzzleSolved { puzzle });
                }
            }
            ScriptCommand::AdjustReputation { delta } => {
                ctx.state.adjust_reputation(delta);
                ctx.bus.emit(EngineEvent::ReputationChanged {
                    reputation: ctx.state.reputation(),
                });
            }
        }
    }

    fn resolve_hotspot_room(
        &self,
        room: Option<String>,
        hotspot: &str,
        ctx: &ExecContext<'_>,
    ) -> Option<String> {
        let room = room.unwrap_or_else(|| ctx.state.current_room().to_string());
        let Some(definition) = ctx.content.room(&room) else {
            warn!(%room, hotspot, "hotspot toggle in unknown room, skipping");
            return None;
        };
        if definition.hotspot(hotspot).is_none() {
            warn!(%room, hotspot, "hotspot toggle on unknown hotspot, skipping");
            return None;
        }
        Some(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Hotspot, Item, Room};
    use crate::geometry::Polygon;
    use std::collections::BTreeMap;

    fn square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .expect("square")
    }

    fn room_with_scripts(id: &str, on_enter: Vec<ScriptCommand>, on_exit: Vec<ScriptCommand>) -> Room {
        Room {
            id: id.to_string(),
            background: format!("{id}.png"),
            walkable: square(),
            hotspots: vec![Hotspot {
                id: "crate".to_string(),
                area: square(),
                interaction_point: Point::new(20.0, 20.0),
                cursor_hint: None,
                on_look: Vec::new(),
                on_use: Vec::new(),
                use_with_item: BTreeMap::new(),
                visible_when: String::new(),
            }],
            exits: Vec::new(),
            on_enter,
            on_exit,
        }
    }

    fn two_room_content() -> GameContent {
        let mut content = GameContent::new("harbor", Point::new(50.0, 50.0));
        content.add_room(room_with_scripts(
            "harbor",
            Vec::new(),
            vec![ScriptCommand::SetFlag {
                flag: "left_harbor".to_string(),
                value: FlagValue::Bool(true),
            }],
        ));
        content.add_room(room_with_scripts(
            "cellar",
            vec![ScriptCommand::SetFlag {
                flag: "entered_cellar".to_string(),
                value: FlagValue::Bool(true),
            }],
            Vec::new(),
        ));
        content.add_item(Item {
            id: "lantern".to_string(),
            name: "Lantern".to_string(),
            icon: "lantern.png".to_string(),
        });
        content
    }

    struct Fixture {
        content: GameContent,
        state: WorldState,
        bus: EventBus,
        interpreter: Interpreter,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                content: two_room_content(),
                state: WorldState::new("harbor", Point::new(50.0, 50.0)),
                bus: EventBus::new(),
                interpreter: Interpreter::new(),
            }
        }

        fn run(&mut self, commands: Vec<ScriptCommand>) {
            let mut ctx = ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            };
            self.interpreter.run_commands(commands, &mut ctx);
        }

        fn acknowledge(&mut self) {
            let mut ctx = ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            };
            self.interpreter.signal_text_dismissed(&mut ctx);
        }

        fn walk_done(&mut self, actor: &str) {
            let mut ctx = ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            };
            self.interpreter.signal_walk_complete(actor, &mut ctx);
        }

        fn tick(&mut self, dt: f32) {
            let mut ctx = ExecContext {
                content: &self.content,
                state: &mut self.state,
                bus: &mut self.bus,
            };
            self.interpreter.tick(dt, &mut ctx);
        }
    }

    fn set_flag(flag: &str, value: f64) -> ScriptCommand {
        ScriptCommand::SetFlag {
            flag: flag.to_string(),
            value: FlagValue::Number(value),
        }
    }

    #[test]
    fn commands_execute_strictly_in_order() {
        let mut fixture = Fixture::new();
        fixture.run(vec![set_flag("a", 1.0), set_flag("a", 2.0)]);
        assert_eq!(fixture.state.flag("a"), Some(&FlagValue::Number(2.0)));
        assert!(!fixture.interpreter.is_running());
    }

    #[test]
    fn text_suspends_until_dismissed() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::Narrate {
                text: "The fog rolls in.".to_string(),
            },
            set_flag("after_text", 1.0),
        ]);

        assert!(fixture.interpreter.is_running());
        assert_eq!(fixture.state.flag("after_text"), None);

        fixture.acknowledge();
        assert_eq!(
            fixture.state.flag("after_text"),
            Some(&FlagValue::Number(1.0))
        );
        assert!(!fixture.interpreter.is_running());
    }

    #[test]
    fn walk_wait_resolves_only_for_matching_actor() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::Walk {
                actor: Some("captain".to_string()),
                to: Point::new(80.0, 80.0),
            },
            set_flag("after_walk", 1.0),
        ]);

        fixture.walk_done("player");
        assert!(fixture.interpreter.is_running());

        fixture.walk_done("captain");
        assert_eq!(
            fixture.state.flag("after_walk"),
            Some(&FlagValue::Number(1.0))
        );
    }

    #[test]
    fn player_walk_surfaces_a_request_without_emitting_the_event() {
        let mut fixture = Fixture::new();
        fixture.run(vec![ScriptCommand::Walk {
            actor: None,
            to: Point::new(80.0, 80.0),
        }]);

        let request = fixture.interpreter.take_walk_request().expect("walk request");
        assert_eq!(request.actor, PLAYER_ACTOR);
        // The walk driver emits WalkRequested after pathfinding.
        assert!(!fixture
            .bus
            .drain()
            .iter()
            .any(|event| matches!(event, EngineEvent::WalkRequested { .. })));

        fixture.walk_done(PLAYER_ACTOR);
        assert!(!fixture.interpreter.is_running());
    }

    #[test]
    fn timer_waits_elapse_through_ticks() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::Wait { seconds: 1.0 },
            set_flag("after_wait", 1.0),
        ]);

        fixture.tick(0.4);
        assert!(fixture.interpreter.is_running());
        fixture.tick(0.7);
        assert_eq!(
            fixture.state.flag("after_wait"),
            Some(&FlagValue::Number(1.0))
        );
    }

    #[test]
    fn if_branches_and_false_without_else_is_noop() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::If {
                condition: "has_item(\"lantern\")".to_string(),
                then: vec![set_flag("lit", 1.0)],
                otherwise: vec![set_flag("dark", 1.0)],
            },
            ScriptCommand::If {
                condition: "flag(\"nothing\")".to_string(),
                then: vec![set_flag("ghost", 1.0)],
                otherwise: Vec::new(),
            },
        ]);

        assert_eq!(fixture.state.flag("dark"), Some(&FlagValue::Number(1.0)));
        assert_eq!(fixture.state.flag("lit"), None);
        assert_eq!(fixture.state.flag("ghost"), None);
        assert!(!fixture.interpreter.is_running());
    }

    #[test]
    fn go_to_room_runs_exit_then_switch_then_enter() {
        let mut fixture = Fixture::new();
        fixture.run(vec![ScriptCommand::GoToRoom {
            room: "cellar".to_string(),
            spawn: Some(Point::new(10.0, 10.0)),
        }]);

        assert_eq!(fixture.state.current_room(), "cellar");
        assert_eq!(fixture.state.position(), Point::new(10.0, 10.0));
        assert_eq!(
            fixture.state.flag("left_harbor"),
            Some(&FlagValue::Bool(true))
        );
        assert_eq!(
            fixture.state.flag("entered_cellar"),
            Some(&FlagValue::Bool(true))
        );

        let events = fixture.bus.drain();
        assert!(events
            .iter()
            .any(|event| matches!(event, EngineEvent::RoomChanged { room, .. } if room == "cellar")));
    }

    #[test]
    fn unknown_references_are_skipped_and_execution_continues() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::GiveItem {
                item: "chainsaw".to_string(),
            },
            ScriptCommand::GoToRoom {
                room: "moon".to_string(),
                spawn: None,
            },
            set_flag("survived", 1.0),
        ]);

        assert!(!fixture.state.has_item("chainsaw"));
        assert_eq!(fixture.state.current_room(), "harbor");
        assert_eq!(
            fixture.state.flag("survived"),
            Some(&FlagValue::Number(1.0))
        );
    }

    #[test]
    fn give_item_is_idempotent_and_emits_once() {
        let mut fixture = Fixture::new();
        fixture.run(vec![
            ScriptCommand::GiveItem {
                item: "lantern".to_string(),
            },
            ScriptCommand::GiveItem {
                item: "lantern".to_string(),
            },
        ]);

        let added = fixture
            .bus
            .drain()
            .into_iter()
            .filter(|event| matches!(event, EngineEvent::ItemAdded { .. }))
            .count();
        assert_eq!(added, 1);
        assert_eq!(fixture.state.inventory().len(), 1);
    }

    #[test]
    fn start_dialogue_suspends_and_surfaces_a_request() {
        let mut fixture = Fixture::new();
        let mut tree = crate::dialogue::DialogueTree::new("intro", "captain", "start", 0);
        tree.add_node(crate::dialogue::DialogueNode::line(
            "start",
            "captain",
            "Ahoy.",
            "end",
        ));
        fixture.content.add_dialogue(tree);

        fixture.run(vec![
            ScriptCommand::StartDialogue {
                character: "captain".to_string(),
                node: None,
            },
            set_flag("after_dialogue", 1.0),
        ]);

        let request = fixture
            .interpreter
            .take_dialogue_request()
            .expect("dialogue request");
        assert_eq!(request.character, "captain");
        assert!(fixture.interpreter.is_running());
        assert_eq!(fixture.state.flag("after_dialogue"), None);

        let mut ctx = ExecContext {
            content: &fixture.content,
            state: &mut fixture.state,
            bus: &mut fixture.bus,
        };
        fixture.interpreter.signal_dialogue_ended(&mut ctx);
        assert_eq!(
            fixture.state.flag("after_dialogue"),
            Some(&FlagValue::Number(1.0))
        );
    }

    #[test]
    fn command_serialization_round_trips() {
        let commands = vec![
            ScriptCommand::Say {
                speaker: "captain".to_string(),
                text: "Ahoy.".to_string(),
            },
            ScriptCommand::If {
                condition: "reputation >= 0".to_string(),
                then: vec![ScriptCommand::Wait { seconds: 0.5 }],
                otherwise: Vec::new(),
            },
        ];
        let json = serde_json::to_string(&commands).expect("serialize");
        let restored: Vec<ScriptCommand> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, commands);
    }
}
