//! Entity model and the homogeneous entity container
//!
//! Every moving or fading object in every minigame is an `Entity`: shared
//! kinematics plus a tagged `EntityKind` payload. Velocities are px/ms.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Stable entity handle, unique within one `EntitySet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Liveness of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Live,
    /// Used up by a correct input
    Consumed,
    /// Left its window, ran out of life, or was discarded
    Expired,
}

/// Sinusoidal offset layered on top of a linear trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    /// Radians per unit of the driving coordinate
    pub freq: f32,
    pub amp: f32,
    pub phase: f32,
}

impl Oscillation {
    pub fn offset(&self, at: f32) -> f32 {
        (at * self.freq + self.phase).sin() * self.amp
    }
}

/// Archery target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bird {
    /// +1 flies right, -1 flies left
    pub direction: f32,
    pub size_scale: f32,
    pub oscillation: Oscillation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoteKind {
    Tap,
    /// Tail length in px
    Hold { length: f32 },
}

/// Falling rhythm note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub lane: usize,
    pub kind: NoteKind,
    /// Head passed the line while the lane key was held
    pub holding: bool,
    /// Scheduled song time the head reaches the hit line (ms)
    pub hit_time_ms: f64,
}

impl Note {
    pub fn length(&self) -> f32 {
        match self.kind {
            NoteKind::Tap => 0.0,
            NoteKind::Hold { length } => length,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self.kind, NoteKind::Hold { .. })
    }
}

/// Directional prompt travelling outward from the ring centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Required key (lowercase)
    pub key: char,
}

/// Which cursor(s) charge a pot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PotMode {
    Mouse,
    Keys,
    /// Needs both cursors inside at once
    Hybrid,
}

/// Pitch-pot target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pot {
    pub mode: PotMode,
    /// 0..=100
    pub charge: f32,
    pub completed: bool,
}

/// Short-lived visual particle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// 1.0 at spawn, expired at 0
    pub life: f32,
    /// Life lost per ms
    pub decay: f32,
    /// Downward acceleration (px/ms²)
    pub gravity: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Bird(Bird),
    Note(Note),
    Prompt(Prompt),
    Pot(Pot),
    Particle(Particle),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Session time at spawn (ms)
    pub spawned_at: f64,
    pub pos: Vec2,
    pub vel: Vec2,
    pub status: Status,
    pub kind: EntityKind,
}

impl Entity {
    pub fn is_live(&self) -> bool {
        self.status == Status::Live
    }

    /// Advance kinematics by `dt` ms
    pub fn update(&mut self, dt: f32) {
        if !self.is_live() {
            return;
        }

        match &mut self.kind {
            EntityKind::Pot(pot) if pot.completed => return,
            EntityKind::Particle(p) => {
                self.vel.y += p.gravity * dt;
                p.life -= p.decay * dt;
                if p.life <= 0.0 {
                    p.life = 0.0;
                    self.status = Status::Expired;
                }
            }
            _ => {}
        }

        self.pos += self.vel * dt;
    }

    /// Position to draw at: base trajectory plus any oscillation
    pub fn render_pos(&self) -> Vec2 {
        match &self.kind {
            EntityKind::Bird(bird) => {
                Vec2::new(self.pos.x, self.pos.y + bird.oscillation.offset(self.pos.x))
            }
            _ => self.pos,
        }
    }

    pub fn is_finite(&self) -> bool {
        let payload_ok = match &self.kind {
            EntityKind::Pot(pot) => pot.charge.is_finite(),
            EntityKind::Particle(p) => p.life.is_finite(),
            _ => true,
        };
        self.pos.is_finite() && self.vel.is_finite() && payload_ok
    }

    pub fn bird(&self) -> Option<&Bird> {
        match &self.kind {
            EntityKind::Bird(b) => Some(b),
            _ => None,
        }
    }

    pub fn note(&self) -> Option<&Note> {
        match &self.kind {
            EntityKind::Note(n) => Some(n),
            _ => None,
        }
    }

    pub fn note_mut(&mut self) -> Option<&mut Note> {
        match &mut self.kind {
            EntityKind::Note(n) => Some(n),
            _ => None,
        }
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        match &self.kind {
            EntityKind::Prompt(p) => Some(p),
            _ => None,
        }
    }

    pub fn pot(&self) -> Option<&Pot> {
        match &self.kind {
            EntityKind::Pot(p) => Some(p),
            _ => None,
        }
    }

    pub fn pot_mut(&mut self) -> Option<&mut Pot> {
        match &mut self.kind {
            EntityKind::Pot(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_particle(&self) -> bool {
        matches!(self.kind, EntityKind::Particle(_))
    }
}

/// Owns all entities of one session, in spawn order
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entities: Vec<Entity>,
    next_id: u32,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live entity and return its id
    pub fn spawn(&mut self, kind: EntityKind, pos: Vec2, vel: Vec2, now: f64) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(Entity {
            id,
            spawned_at: now,
            pos,
            vel,
            status: Status::Live,
            kind,
        });
        id
    }

    /// Advance every live entity by `dt` ms
    pub fn update(&mut self, dt: f32) {
        for entity in &mut self.entities {
            entity.update(dt);
        }
    }

    /// Remove entities that are no longer live or match `exit`.
    /// Returns how many were removed.
    pub fn prune(&mut self, mut exit: impl FnMut(&Entity) -> bool) -> usize {
        let before = self.entities.len();
        self.entities.retain(|e| e.is_live() && !exit(e));
        before - self.entities.len()
    }

    /// Drop entities whose state went non-finite and report them
    pub fn quarantine_non_finite(&mut self) -> Vec<EntityId> {
        let bad: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|e| !e.is_finite())
            .map(|e| e.id)
            .collect();
        if !bad.is_empty() {
            self.entities.retain(|e| e.is_finite());
        }
        bad
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Mark an entity consumed; it disappears on the next prune
    pub fn consume(&mut self, id: EntityId) -> bool {
        self.set_status(id, Status::Consumed)
    }

    pub fn expire(&mut self, id: EntityId) -> bool {
        self.set_status(id, Status::Expired)
    }

    fn set_status(&mut self, id: EntityId, status: Status) -> bool {
        match self.get_mut(id) {
            Some(e) if e.is_live() => {
                e.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn live(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_live())
    }

    /// Live entities excluding particles
    pub fn targets(&self) -> impl Iterator<Item = &Entity> {
        self.live().filter(|e| !e.is_particle())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove everything; ids keep increasing so stale handles never alias
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
