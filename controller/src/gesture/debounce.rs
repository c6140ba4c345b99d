//! Edge-triggered, cooldown-gated action firing.
//!
//! One `ActionCooldown` exists per discrete action kind.  The trigger
//! predicate is fed every frame; an action fires at most once per
//! continuous true-run, and two fires are always separated by strictly more
//! than the cooldown.

use tracing::trace;

/// Discrete actions guarded by a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    LeftClick,
    RightClick,
    DoubleClick,
}

impl ActionKind {
    /// String representation for IPC and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftClick => "left-click",
            Self::RightClick => "right-click",
            Self::DoubleClick => "double-click",
        }
    }
}

/// Refractory state for one action kind.
#[derive(Debug, Clone)]
pub struct ActionCooldown {
    pub kind: ActionKind,
    /// True while the trigger has stayed true since the last fire.
    armed: bool,
    /// Time of the last fire in seconds; `None` means never (−∞).
    last_fired_at: Option<f64>,
}

impl ActionCooldown {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            armed: false,
            last_fired_at: None,
        }
    }

    /// Feed this frame's trigger value.  Returns true when the action fires.
    ///
    /// The fire is recorded before the caller dispatches it, so a failed
    /// dispatch still consumes the cooldown window.
    pub fn update(&mut self, triggered: bool, now_s: f64, cooldown_s: f64) -> bool {
        if !triggered {
            self.armed = false;
            return false;
        }
        if self.armed {
            return false;
        }
        let cooled = match self.last_fired_at {
            Some(last) => now_s - last > cooldown_s,
            None => true,
        };
        if !cooled {
            trace!(action = self.kind.as_str(), "suppressed by cooldown");
            return false;
        }
        self.armed = true;
        self.last_fired_at = Some(now_s);
        true
    }

    /// Force the trigger low (no hand, mode forced to idle).
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn last_fired_at(&self) -> Option<f64> {
        self.last_fired_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 32.0;

    /// Drive `frames` consecutive frames with the same trigger value,
    /// returning the number of fires and the time after the last frame.
    fn drive(c: &mut ActionCooldown, start: f64, frames: usize, triggered: bool) -> (usize, f64) {
        let mut fires = 0;
        let mut t = start;
        for _ in 0..frames {
            if c.update(triggered, t, 0.5) {
                fires += 1;
            }
            t += FRAME;
        }
        (fires, t)
    }

    #[test]
    fn test_new_is_disarmed() {
        let c = ActionCooldown::new(ActionKind::LeftClick);
        assert!(!c.is_armed());
        assert!(c.last_fired_at().is_none());
    }

    #[test]
    fn test_single_fire_per_run() {
        for k in [1, 2, 5, 40, 200] {
            let mut c = ActionCooldown::new(ActionKind::LeftClick);
            let (fires, t) = drive(&mut c, 0.0, k, true);
            assert_eq!(fires, 1, "run of {} frames should fire once", k);
            let (fires, _) = drive(&mut c, t, 3, false);
            assert_eq!(fires, 0);
            assert!(!c.is_armed());
        }
    }

    #[test]
    fn test_second_run_after_cooldown_fires() {
        let mut c = ActionCooldown::new(ActionKind::RightClick);
        assert!(c.update(true, 0.0, 0.5));
        assert!(!c.update(false, 0.25, 0.5));
        assert!(c.update(true, 0.75, 0.5));
    }

    #[test]
    fn test_second_run_inside_cooldown_suppressed() {
        let mut c = ActionCooldown::new(ActionKind::RightClick);
        assert!(c.update(true, 0.0, 0.5));
        assert!(!c.update(false, 0.125, 0.5));
        assert!(!c.update(true, 0.25, 0.5));
        assert!(!c.is_armed(), "suppressed run stays disarmed");
    }

    #[test]
    fn test_cooldown_equality_excluded() {
        let mut c = ActionCooldown::new(ActionKind::DoubleClick);
        assert!(c.update(true, 1.0, 0.5));
        c.update(false, 1.25, 0.5);
        assert!(!c.update(true, 1.5, 0.5), "Δt == cooldown must not fire");
        assert!(c.update(true, 1.5625, 0.5), "Δt > cooldown fires");
    }

    #[test]
    fn test_long_run_fires_when_cooldown_expires_mid_run() {
        let mut c = ActionCooldown::new(ActionKind::LeftClick);
        assert!(c.update(true, 0.0, 0.5));
        c.update(false, 0.125, 0.5);
        // New run starts inside the cooldown and keeps going past it.
        assert!(!c.update(true, 0.25, 0.5));
        assert!(!c.update(true, 0.5, 0.5));
        assert!(c.update(true, 0.625, 0.5));
        assert!(!c.update(true, 0.75, 0.5));
    }

    #[test]
    fn test_disarm_allows_refire_after_cooldown() {
        let mut c = ActionCooldown::new(ActionKind::LeftClick);
        assert!(c.update(true, 0.0, 0.5));
        c.disarm();
        assert!(!c.is_armed());
        assert!(c.update(true, 1.0, 0.5));
        assert_eq!(c.last_fired_at(), Some(1.0));
    }

    #[test]
    fn test_action_kind_as_str() {
        assert_eq!(ActionKind::LeftClick.as_str(), "left-click");
        assert_eq!(ActionKind::RightClick.as_str(), "right-click");
        assert_eq!(ActionKind::DoubleClick.as_str(), "double-click");
    }
}
