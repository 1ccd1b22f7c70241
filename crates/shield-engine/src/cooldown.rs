//! Clip cooldown gate.

use std::time::{Duration, Instant};

/// Gate state at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    InCooldown,
}

/// Refractory window between two recorded clips.
///
/// `Idle --(trigger)--> InCooldown --(elapsed > cooldown)--> Idle`. Owned by
/// the orchestrator alone.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger: None,
        }
    }

    pub fn state(&self, now: Instant) -> GateState {
        match self.last_trigger {
            Some(at) if now.saturating_duration_since(at) <= self.cooldown => GateState::InCooldown,
            _ => GateState::Idle,
        }
    }

    /// Try to start a new cooldown window at `now`.
    ///
    /// Returns `true` (and records `now`) only when the gate is idle.
    pub fn try_trigger(&mut self, now: Instant) -> bool {
        if self.state(now) == GateState::InCooldown {
            return false;
        }
        self.last_trigger = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_window() {
        let t0 = Instant::now();
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        assert_eq!(gate.state(t0), GateState::Idle);

        assert!(gate.try_trigger(t0));
        assert_eq!(gate.state(t0), GateState::InCooldown);

        assert!(!gate.try_trigger(t0 + Duration::from_secs(5)));
        assert_eq!(gate.state(t0 + Duration::from_secs(5)), GateState::InCooldown);

        // the window restarts from the new trigger
        assert!(gate.try_trigger(t0 + Duration::from_secs(11)));
        assert!(!gate.try_trigger(t0 + Duration::from_secs(20)));
        assert!(gate.try_trigger(t0 + Duration::from_secs(22)));
    }

    #[test]
    fn test_exact_cooldown_is_still_blocked() {
        let t0 = Instant::now();
        let mut gate = CooldownGate::new(Duration::from_secs(10));
        gate.try_trigger(t0);

        assert!(!gate.try_trigger(t0 + Duration::from_secs(10)));
        assert!(gate.try_trigger(t0 + Duration::from_millis(10_001)));
    }
}
