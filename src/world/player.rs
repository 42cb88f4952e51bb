//! Player model
//!
//! A player is a position that moves itself: between direction changes the
//! position is extrapolated from the last snapshot, so nobody has to tick
//! every player every frame. Writes snapshot the extrapolated position
//! before changing course.

use std::rc::Rc;

use glam::Vec3;

use crate::core::Clock;

/// One player in the world, server- or client-side.
pub struct Player {
    last_position: Vec3,
    direction: Option<Vec3>,
    orientation_y: f32,
    speed: f32,
    last_change: f64,
    clock: Rc<dyn Clock>,
}

impl Player {
    /// Create a stationary player at `position`
    pub fn new(position: Vec3, speed: f32, clock: Rc<dyn Clock>) -> Self {
        let last_change = clock.seconds();
        Self {
            last_position: position,
            direction: None,
            orientation_y: 0.0,
            speed,
            last_change,
            clock,
        }
    }

    /// Current position, extrapolated from the last change
    pub fn position(&self) -> Vec3 {
        match self.direction {
            Some(direction) => {
                let elapsed = (self.clock.seconds() - self.last_change) as f32;
                self.last_position + direction * self.speed * elapsed
            }
            None => self.last_position,
        }
    }

    /// Absolutely reposition this player (authoritative corrections)
    pub fn set_position(&mut self, position: Vec3) {
        self.last_position = position;
        self.last_change = self.clock.seconds();
    }

    /// Movement direction, `None` when standing still
    pub fn direction(&self) -> Option<Vec3> {
        self.direction
    }

    /// Change course. The position extrapolated so far is snapshotted so
    /// the new direction continues from where the player actually is.
    pub fn set_direction(&mut self, direction: Option<Vec3>) {
        self.last_position = self.position();
        self.last_change = self.clock.seconds();
        self.direction = direction;
    }

    /// Movement speed in units per second
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Heading in degrees around the vertical axis
    pub fn orientation_y(&self) -> f32 {
        self.orientation_y
    }

    /// Turn the player's heading
    pub fn set_orientation_y(&mut self, degrees: f32) {
        self.orientation_y = degrees;
    }
}
