use crate::geometry::Point;

/// Everything the presentation layer needs to know about, in the order it
/// happened. The engine never blocks on these; callers drain them once per
/// frame and render however they like.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Say { speaker: String, text: String },
    Narrate { text: String },
    Thought { text: String },
    ItemAdded { item: String },
    ItemRemoved { item: String },
    RoomChanged { room: String, spawn: Point },
    FadeIn { seconds: f32 },
    FadeOut { seconds: f32 },
    WalkRequested { actor: String, to: Point },
    AnimateRequested { actor: String, animation: String },
    SoundRequested { sound: String },
    MusicStarted { track: String },
    MusicStopped,
    PuzzleSolved { puzzle: String },
    ReputationChanged { reputation: i32 },
    DialogueNodeEntered {
        tree: String,
        node: String,
        speaker: String,
        text: String,
    },
    DialogueChoicesReady { choices: Vec<ChoicePreview> },
    DialogueEnded { tree: String },
}

/// A filtered, selectable choice as shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoicePreview {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct EventBus {
    pending: Vec<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: EngineEvent) {
        self.pending.push(event);
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
