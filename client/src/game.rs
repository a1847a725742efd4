use crate::replication::ReplicationTable;
use drone_shared::{PlayerId, Pose};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default distance the render clock trails the estimated server clock.
pub const DEFAULT_INTERPOLATION_DELAY: Duration = Duration::from_millis(100);

/// Estimate of the server clock built from the timestamps of received snapshots.
///
/// The estimate is anchored to the newest server time seen and advanced with
/// the local monotonic clock. A late datagram never pulls it backwards.
#[derive(Debug, Clone)]
pub struct ServerClock {
    anchor: Option<(f64, Instant)>,
    delay: f64,
}

impl ServerClock {
    pub fn new(interpolation_delay: Duration) -> Self {
        Self {
            anchor: None,
            delay: interpolation_delay.as_secs_f64(),
        }
    }

    pub fn observe(&mut self, server_time: f64) {
        self.observe_at(server_time, Instant::now());
    }

    pub fn observe_at(&mut self, server_time: f64, at: Instant) {
        let behind = match self.now_at(at) {
            Some(estimate) => server_time > estimate,
            None => true,
        };
        if behind {
            self.anchor = Some((server_time, at));
        }
    }

    pub fn now(&self) -> Option<f64> {
        self.now_at(Instant::now())
    }

    pub fn now_at(&self, at: Instant) -> Option<f64> {
        self.anchor.map(|(server_time, anchored)| {
            server_time + at.saturating_duration_since(anchored).as_secs_f64()
        })
    }

    /// Server time at which remote players should be drawn.
    pub fn render_time(&self) -> Option<f64> {
        self.render_time_at(Instant::now())
    }

    pub fn render_time_at(&self, at: Instant) -> Option<f64> {
        self.now_at(at).map(|now| now - self.delay)
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPOLATION_DELAY)
    }
}

/// Resolves one pose per remote player per frame.
///
/// When a player's buffer has no bracket for the render time the last pose
/// handed out is held, never extrapolated and never reset to the origin.
#[derive(Debug, Default)]
pub struct RemoteView {
    last_rendered: HashMap<PlayerId, Pose>,
}

impl RemoteView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poses for every tracked player except `local_id`, in id order.
    pub fn resolve(
        &mut self,
        table: &ReplicationTable,
        local_id: PlayerId,
        render_time: Option<f64>,
    ) -> Vec<(PlayerId, Pose)> {
        let mut result = Vec::new();

        for id in table.ids() {
            if id == local_id {
                continue;
            }
            let Some(buffer) = table.get(id) else {
                continue;
            };

            let interpolated = render_time.and_then(|t| buffer.interpolate(t));
            let pose = match (interpolated, self.last_rendered.get(&id)) {
                (Some(pose), _) => pose,
                (None, Some(held)) => *held,
                (None, None) => match buffer.newest() {
                    Some(snapshot) => snapshot.pose(),
                    None => continue,
                },
            };

            self.last_rendered.insert(id, pose);
            result.push((id, pose));
        }

        self.last_rendered.retain(|id, _| table.get(*id).is_some());
        result
    }

    pub fn last_rendered(&self, id: PlayerId) -> Option<&Pose> {
        self.last_rendered.get(&id)
    }
}
