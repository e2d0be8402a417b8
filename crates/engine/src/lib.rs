pub mod action;
pub mod condition;
pub mod content;
pub mod dialogue;
pub mod events;
pub mod game;
pub mod geometry;
pub mod nav;
pub mod save;
pub mod script;
pub mod world;

pub use action::{ActionQueue, PlayerAction, PlayerMotion, WalkStep};
pub use condition::{check_condition_str, eval_condition_str, Condition, ConditionError};
pub use content::{ContentError, Exit, GameContent, Hotspot, Item, Room};
pub use dialogue::{
    validate_tree, DialogueChoice, DialogueError, DialogueNode, DialogueRunner, DialogueTree,
    END_NODE,
};
pub use events::{ChoicePreview, EngineEvent, EventBus};
pub use game::{Game, GameConfig, Verb, CANT_USE_LINE};
pub use geometry::{
    interpolate_path, path_length, PathPosition, Point, Polygon, PolygonError,
};
pub use nav::find_path;
pub use save::{SaveBank, SaveLoadResult, SaveRecord, SlotSummary, SAVE_FORMAT_VERSION};
pub use script::{
    DialogueRequest, ExecContext, Interpreter, PendingWait, ScriptCommand, WalkRequest,
};
pub use world::{Facing, FlagValue, WorldState, PLAYER_ACTOR, REPUTATION_MAX, REPUTATION_MIN};
