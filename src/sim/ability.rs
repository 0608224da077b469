//! Single-slot timed ability (e.g. archery "Focus")
//!
//! Lifecycle: Idle -> Active (fixed duration) -> Cooldown (fixed duration) -> Idle.
//! Durations are measured in unscaled time so a slow-motion effect does not
//! stretch its own duration.

use super::timers::Timer;

#[derive(Debug, Clone, Copy, PartialEq)]
enum AbilityPhase {
    Idle,
    Active(Timer),
    Cooldown(Timer),
}

/// Lifecycle edges reported by `Ability::advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityTransition {
    /// Effect ended, cooldown started
    Expired,
    /// Cooldown finished, ability usable again
    Ready,
}

#[derive(Debug, Clone)]
pub struct Ability {
    duration_ms: f32,
    cooldown_ms: f32,
    /// Time scale applied while active
    effect_scale: f32,
    phase: AbilityPhase,
}

impl Ability {
    pub fn new(duration_ms: f32, cooldown_ms: f32, effect_scale: f32) -> Self {
        Self {
            duration_ms,
            cooldown_ms,
            effect_scale,
            phase: AbilityPhase::Idle,
        }
    }

    /// Try to activate. Returns false (and does nothing) if active or cooling down.
    pub fn activate(&mut self) -> bool {
        if self.phase != AbilityPhase::Idle {
            return false;
        }
        self.phase = AbilityPhase::Active(Timer::new(self.duration_ms));
        true
    }

    /// Advance by an unscaled delta. Leftover time carries into the next phase.
    pub fn advance(&mut self, raw_dt: f32) -> Option<AbilityTransition> {
        match &mut self.phase {
            AbilityPhase::Idle => None,
            AbilityPhase::Active(timer) => {
                if !timer.advance(raw_dt) {
                    return None;
                }
                let carry = timer.overshoot();
                let mut cooldown = Timer::new(self.cooldown_ms);
                if cooldown.advance(carry) {
                    // Cooldown shorter than the overshoot: skip straight to idle
                    self.phase = AbilityPhase::Idle;
                } else {
                    self.phase = AbilityPhase::Cooldown(cooldown);
                }
                Some(AbilityTransition::Expired)
            }
            AbilityPhase::Cooldown(timer) => {
                if timer.advance(raw_dt) {
                    self.phase = AbilityPhase::Idle;
                    Some(AbilityTransition::Ready)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, AbilityPhase::Active(_))
    }

    pub fn on_cooldown(&self) -> bool {
        matches!(self.phase, AbilityPhase::Cooldown(_))
    }

    pub fn is_ready(&self) -> bool {
        self.phase == AbilityPhase::Idle
    }

    /// Time scale the clock should run at right now
    pub fn time_scale(&self) -> f32 {
        if self.is_active() { self.effect_scale } else { 1.0 }
    }

    /// Remaining cooldown as a fraction (1.0 = just started, 0.0 = ready)
    pub fn cooldown_fraction(&self) -> f32 {
        match &self.phase {
            AbilityPhase::Cooldown(timer) => 1.0 - timer.progress(),
            _ => 0.0,
        }
    }

    /// Back to idle, used when a session restarts
    pub fn reset(&mut self) {
        self.phase = AbilityPhase::Idle;
    }
}
