//! Local drone command source for the headless client.
//!
//! Real builds feed poses from the flight controller; without one the client
//! flies a circle so remote peers have something to interpolate.

use drone_shared::Pose;
use rand::Rng;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

/// Circular flight path with a random starting phase and altitude bob.
pub struct FlightPath {
    radius: f32,
    altitude: f32,
    angular_speed: f32,
    phase: f32,
    started: Instant,
    next_sequence: u32,
}

impl FlightPath {
    pub fn new(radius: f32, altitude: f32, lap_time: Duration) -> Self {
        let phase = rand::thread_rng().gen_range(0.0..TAU);
        Self::with_phase(radius, altitude, lap_time, phase)
    }

    pub fn with_phase(radius: f32, altitude: f32, lap_time: Duration, phase: f32) -> Self {
        let lap = lap_time.as_secs_f32().max(f32::EPSILON);
        Self {
            radius,
            altitude,
            angular_speed: TAU / lap,
            phase,
            started: Instant::now(),
            next_sequence: 1,
        }
    }

    /// Pose after `elapsed` seconds of flight. Yaw follows the tangent and the
    /// drone banks into the turn; angles are in radians.
    pub fn pose_at(&self, elapsed: f32) -> Pose {
        let angle = self.phase + self.angular_speed * elapsed;
        Pose {
            x: self.radius * angle.cos(),
            y: self.altitude + (angle * 2.0).sin(),
            z: self.radius * angle.sin(),
            yaw: angle + TAU / 4.0,
            pitch: 0.0,
            roll: -0.2,
        }
    }

    /// Current pose plus a sequence number for logging.
    pub fn sample(&mut self) -> (u32, Pose) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        (sequence, self.pose_at(self.started.elapsed().as_secs_f32()))
    }
}
