//! Headless demo: builds a tiny two-room adventure and autoplays it,
//! logging every engine event. Run with RUST_LOG=debug for the internals.

use std::collections::BTreeMap;
use std::path::PathBuf;

use pointclick::{
    DialogueChoice, DialogueError, DialogueNode, DialogueTree, EngineEvent, Exit, FlagValue, Game,
    GameConfig, GameContent, Hotspot, Item, Point, Polygon, Room, ScriptCommand, Verb, END_NODE,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_DT: f32 = 1.0 / 60.0;
const MAX_FRAMES: u32 = 5000;

fn main() {
    init_tracing();
    info!("=== Pointclick Demo ===");

    let content = build_content();
    let config = GameConfig {
        save_path: PathBuf::from("saves/demo.json"),
        walk_speed: 600.0,
    };
    let mut game = match Game::new(content, config) {
        Ok(game) => game,
        Err(err) => {
            error!(error = %err, "content_rejected");
            std::process::exit(1);
        }
    };
    run_until_idle(&mut game);

    info!("--- looking at the barrel ---");
    game.click_at(Point::new(478.0, 212.0), Verb::Look);
    run_until_idle(&mut game);

    info!("--- picking up the crowbar ---");
    game.click_at(Point::new(92.0, 258.0), Verb::Use);
    run_until_idle(&mut game);

    info!("--- talking to the captain ---");
    game.click_at(Point::new(320.0, 120.0), Verb::Use);
    run_until_idle(&mut game);

    info!("--- prying open the crate ---");
    game.select_item("crowbar");
    game.click_at(Point::new(560.0, 280.0), Verb::Use);
    run_until_idle(&mut game);

    if let Err(err) = game.save_to_slot(1, "crate opened") {
        warn!(error = %err, "save_failed");
    }
    match game.enumerate_slots() {
        Ok(slots) => {
            for slot in slots {
                info!(slot = slot.slot, label = %slot.label, "save_slot");
            }
        }
        Err(err) => warn!(error = %err, "enumerate_failed"),
    }

    info!("--- heading down to the cellar ---");
    game.click_at(Point::new(620.0, 180.0), Verb::Use);
    run_until_idle(&mut game);
    info!(room = game.current_room(), "arrived");

    info!("--- rewinding to the save ---");
    match game.load_from_slot(1) {
        Ok(()) => {
            run_until_idle(&mut game);
            info!(
                room = game.current_room(),
                reputation = game.reputation(),
                inventory = ?game.inventory(),
                "restored"
            );
        }
        Err(err) => warn!(error = %err, "load_failed"),
    }

    info!("=== Demo complete ===");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Ticks the engine until the player is idle, feeding back the inputs a
/// human would provide: dismissing text and taking the first open choice.
fn run_until_idle(game: &mut Game) {
    for _ in 0..MAX_FRAMES {
        game.tick(FRAME_DT);

        let mut saw_text = false;
        let mut first_choice = None;
        for event in game.drain_events() {
            log_event(&event);
            match event {
                EngineEvent::Say { .. } | EngineEvent::Narrate { .. } | EngineEvent::Thought { .. } => {
                    saw_text = true;
                }
                EngineEvent::DialogueChoicesReady { choices } => {
                    first_choice = choices.first().map(|choice| choice.id.clone());
                }
                _ => {}
            }
        }

        if let Some(choice) = first_choice {
            if let Err(err) = game.select_choice(&choice) {
                warn!(error = %err, "choice_rejected");
            }
        } else if saw_text {
            game.acknowledge_text();
        } else if game.is_dialogue_active() && !game.awaiting_choice() {
            if let Err(err) = game.advance_dialogue() {
                if err != DialogueError::NotAdvanceable {
                    warn!(error = %err, "advance_rejected");
                }
            }
        }

        if !game.is_script_running() && !game.is_player_walking() {
            return;
        }
    }
    warn!("demo never settled, giving up");
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Say { speaker, text } => info!("{speaker}: \"{text}\""),
        EngineEvent::Narrate { text } => info!("[narrator] {text}"),
        EngineEvent::Thought { text } => info!("(thinks) {text}"),
        EngineEvent::DialogueNodeEntered { speaker, text, .. } => info!("{speaker}: \"{text}\""),
        EngineEvent::DialogueChoicesReady { choices } => {
            for (index, choice) in choices.iter().enumerate() {
                info!("  {}. {}", index + 1, choice.text);
            }
        }
        other => info!(?other, "event"),
    }
}

fn rect(x: f32, y: f32, w: f32, h: f32) -> Polygon {
    match Polygon::new(vec![
        Point::new(x, y),
        Point::new(x + w, y),
        Point::new(x + w, y + h),
        Point::new(x, y + h),
    ]) {
        Ok(polygon) => polygon,
        Err(err) => {
            error!(error = %err, "bad demo polygon");
            std::process::exit(1);
        }
    }
}

fn thought(text: &str) -> ScriptCommand {
    ScriptCommand::Thought {
        text: text.to_string(),
    }
}

fn narrate(text: &str) -> ScriptCommand {
    ScriptCommand::Narrate {
        text: text.to_string(),
    }
}

fn build_content() -> GameContent {
    let mut content = GameContent::new("harbor", Point::new(320.0, 300.0));

    let mut crate_scripts = BTreeMap::new();
    crate_scripts.insert(
        "crowbar".to_string(),
        vec![
            narrate("The lid creaks open. A lantern sits inside."),
            ScriptCommand::GiveItem {
                item: "lantern".to_string(),
            },
            ScriptCommand::MarkPuzzleSolved {
                puzzle: "crate_opened".to_string(),
            },
            ScriptCommand::SetFlag {
                flag: "crate_open".to_string(),
                value: FlagValue::Bool(true),
            },
        ],
    );

    content.add_room(Room {
        id: "harbor".to_string(),
        background: "harbor.png".to_string(),
        walkable: rect(40.0, 160.0, 580.0, 180.0),
        hotspots: vec![
            Hotspot {
                id: "barrel".to_string(),
                area: rect(450.0, 180.0, 60.0, 60.0),
                interaction_point: Point::new(440.0, 250.0),
                cursor_hint: Some("look".to_string()),
                on_look: vec![thought("Smells like it lost an argument with the sea.")],
                on_use: vec![thought("I'm not sticking my hand in there.")],
                use_with_item: BTreeMap::new(),
                visible_when: String::new(),
            },
            Hotspot {
                id: "crowbar".to_string(),
                area: rect(70.0, 240.0, 50.0, 40.0),
                interaction_point: Point::new(110.0, 290.0),
                cursor_hint: Some("take".to_string()),
                on_look: vec![thought("A crowbar. The universal key.")],
                on_use: vec![
                    narrate("You pick up the crowbar."),
                    ScriptCommand::GiveItem {
                        item: "crowbar".to_string(),
                    },
                    ScriptCommand::DisableHotspot {
                        room: None,
                        hotspot: "crowbar".to_string(),
                    },
                ],
                use_with_item: BTreeMap::new(),
                visible_when: String::new(),
            },
            Hotspot {
                id: "crate".to_string(),
                area: rect(540.0, 250.0, 60.0, 60.0),
                interaction_point: Point::new(530.0, 310.0),
                cursor_hint: Some("open".to_string()),
                on_look: vec![thought("Nailed shut. I'd need something to pry it.")],
                on_use: vec![thought("It won't budge bare-handed.")],
                use_with_item: crate_scripts,
                visible_when: String::new(),
            },
            Hotspot {
                id: "captain".to_string(),
                area: rect(290.0, 90.0, 60.0, 90.0),
                interaction_point: Point::new(320.0, 200.0),
                cursor_hint: Some("talk".to_string()),
                on_look: vec![thought("The captain. Salt in human form.")],
                on_use: vec![ScriptCommand::StartDialogue {
                    character: "captain".to_string(),
                    node: None,
                }],
                use_with_item: BTreeMap::new(),
                visible_when: String::new(),
            },
        ],
        exits: vec![Exit {
            id: "cellar_stairs".to_string(),
            target_room: "cellar".to_string(),
            spawn: Some(Point::new(100.0, 120.0)),
            trigger: rect(600.0, 160.0, 40.0, 60.0),
            condition: "has_item(\"lantern\")".to_string(),
        }],
        on_enter: vec![narrate("Gulls wheel over the harbor.")],
        on_exit: Vec::new(),
    });

    content.add_room(Room {
        id: "cellar".to_string(),
        background: "cellar.png".to_string(),
        walkable: rect(40.0, 60.0, 400.0, 160.0),
        hotspots: Vec::new(),
        exits: vec![Exit {
            id: "stairs_up".to_string(),
            target_room: "harbor".to_string(),
            spawn: Some(Point::new(600.0, 200.0)),
            trigger: rect(40.0, 60.0, 40.0, 60.0),
            condition: String::new(),
        }],
        on_enter: vec![narrate("The lantern pushes the dark back a few feet.")],
        on_exit: Vec::new(),
    });

    content.add_item(Item {
        id: "crowbar".to_string(),
        name: "Crowbar".to_string(),
        icon: "crowbar.png".to_string(),
    });
    content.add_item(Item {
        id: "lantern".to_string(),
        name: "Lantern".to_string(),
        icon: "lantern.png".to_string(),
    });

    content.add_dialogue(captain_intro());
    content
}

fn captain_intro() -> DialogueTree {
    let mut tree = DialogueTree::new("intro", "captain", "greeting", 0);
    tree.add_node(DialogueNode {
        id: "greeting".to_string(),
        speaker: "Captain".to_string(),
        text: "You again. Make it quick.".to_string(),
        next: None,
        choices: vec![
            DialogueChoice {
                id: "ask_work".to_string(),
                text: "Any work going?".to_string(),
                target: "work".to_string(),
                condition: String::new(),
                once: true,
                commands: vec![ScriptCommand::AdjustReputation { delta: 5 }],
            },
            DialogueChoice {
                id: "ask_cellar".to_string(),
                text: "What's down those stairs?".to_string(),
                target: "cellar_talk".to_string(),
                condition: String::new(),
                once: true,
                commands: Vec::new(),
            },
            DialogueChoice {
                id: "leave".to_string(),
                text: "Nothing. Carry on.".to_string(),
                target: END_NODE.to_string(),
                condition: String::new(),
                once: false,
                commands: Vec::new(),
            },
        ],
        on_enter: Vec::new(),
        on_exit: Vec::new(),
        terminal: false,
    });
    tree.add_node(DialogueNode::line(
        "work",
        "Captain",
        "Open that crate on the dock and we'll talk.",
        "greeting",
    ));
    tree.add_node(DialogueNode::line(
        "cellar_talk",
        "Captain",
        "Storage. Pitch black. Take a light or take a fall.",
        "greeting",
    ));
    tree
}
