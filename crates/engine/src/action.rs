use std::collections::VecDeque;

use crate::geometry::{interpolate_path, path_length, Point};
use crate::script::ScriptCommand;

/// One queued consequence of a click. Hotspot and exit clicks enqueue a
/// walk followed by their effect; ground clicks enqueue just the walk.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    WalkTo(Point),
    RunScript { commands: Vec<ScriptCommand> },
    ChangeRoom { exit: String },
}

/// FIFO of pending player actions. A new click replaces the whole queue;
/// an interrupted interaction's effect never fires.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: VecDeque<PlayerAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, actions: Vec<PlayerAction>) {
        self.pending.clear();
        self.pending.extend(actions);
    }

    pub fn pop(&mut self) -> Option<PlayerAction> {
        self.pending.pop_front()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkStep {
    pub position: Point,
    pub arrived: bool,
}

/// Playback state for the single in-flight player walk. Distance accrues
/// each tick and positions come from path interpolation, so movement speed
/// is independent of frame rate.
#[derive(Debug, Default)]
pub struct PlayerMotion {
    path: Vec<Point>,
    total_length: f32,
    traveled: f32,
}

impl PlayerMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, path: Vec<Point>) {
        self.total_length = path_length(&path);
        self.traveled = 0.0;
        self.path = path;
    }

    pub fn is_walking(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn destination(&self) -> Option<Point> {
        self.path.last().copied()
    }

    pub fn cancel(&mut self) {
        self.path.clear();
        self.total_length = 0.0;
        self.traveled = 0.0;
    }

    /// Moves `distance` further along the path. Returns `None` when no walk
    /// is active.
    pub fn advance(&mut self, distance: f32) -> Option<WalkStep> {
        if self.path.is_empty() {
            return None;
        }
        self.traveled += distance;
        let sample = interpolate_path(&self.path, self.traveled);
        let arrived = sample.finished || self.traveled >= self.total_length;
        let step = WalkStep {
            position: sample.position,
            arrived,
        };
        if arrived {
            self.cancel();
        }
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_click_replaces_queued_actions() {
        let mut queue = ActionQueue::new();
        queue.replace(vec![
            PlayerAction::WalkTo(Point::new(10.0, 10.0)),
            PlayerAction::RunScript {
                commands: Vec::new(),
            },
        ]);
        queue.replace(vec![PlayerAction::WalkTo(Point::new(90.0, 90.0))]);

        assert_eq!(
            queue.pop(),
            Some(PlayerAction::WalkTo(Point::new(90.0, 90.0)))
        );
        assert!(queue.pop().is_none());
    }

    #[test]
    fn motion_advances_toward_destination_and_arrives() {
        let mut motion = PlayerMotion::new();
        motion.begin(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
        assert!(motion.is_walking());
        assert_eq!(motion.destination(), Some(Point::new(100.0, 0.0)));

        let step = motion.advance(40.0).expect("walking");
        assert!(!step.arrived);
        assert!((step.position.x - 40.0).abs() < 0.001);

        let step = motion.advance(70.0).expect("walking");
        assert!(step.arrived);
        assert_eq!(step.position, Point::new(100.0, 0.0));
        assert!(!motion.is_walking());
    }

    #[test]
    fn zero_length_walk_arrives_immediately() {
        let mut motion = PlayerMotion::new();
        motion.begin(vec![Point::new(5.0, 5.0), Point::new(5.0, 5.0)]);
        let step = motion.advance(1.0).expect("walking");
        assert!(step.arrived);
        assert_eq!(step.position, Point::new(5.0, 5.0));
    }

    #[test]
    fn advance_without_walk_is_none() {
        let mut motion = PlayerMotion::new();
        assert!(motion.advance(10.0).is_none());
    }
}
