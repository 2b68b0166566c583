use crate::api::types::PuckId;
use crate::components::puck::PuckBody;

/// Ordered puck storage using a flat Vec.
/// Insertion order is drop order, which keeps per-tick iteration deterministic.
pub struct PuckArena {
    pucks: Vec<PuckBody>,
    next_id: u32,
}

impl PuckArena {
    pub fn new() -> Self {
        Self {
            pucks: Vec::with_capacity(64),
            next_id: 1,
        }
    }

    /// Generate the next unique puck ID. Ids are never reused within a session.
    pub fn next_id(&mut self) -> PuckId {
        let id = PuckId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a puck to the arena.
    pub fn spawn(&mut self, puck: PuckBody) {
        self.pucks.push(puck);
    }

    /// Get a reference to a puck by ID.
    pub fn get(&self, id: PuckId) -> Option<&PuckBody> {
        self.pucks.iter().find(|p| p.id == id)
    }

    /// Get a mutable reference to a puck by ID.
    pub fn get_mut(&mut self, id: PuckId) -> Option<&mut PuckBody> {
        self.pucks.iter_mut().find(|p| p.id == id)
    }

    /// Iterate over all pucks in drop order.
    pub fn iter(&self) -> impl Iterator<Item = &PuckBody> {
        self.pucks.iter()
    }

    /// Iterate over all pucks mutably, in drop order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PuckBody> {
        self.pucks.iter_mut()
    }

    pub fn as_slice(&self) -> &[PuckBody] {
        &self.pucks
    }

    /// Number of pucks on the board.
    pub fn len(&self) -> usize {
        self.pucks.len()
    }

    /// Whether the board has no pucks.
    pub fn is_empty(&self) -> bool {
        self.pucks.is_empty()
    }

    /// Remove every puck, returning them so the caller can free their bodies.
    /// The id counter keeps running.
    pub fn drain(&mut self) -> Vec<PuckBody> {
        std::mem::take(&mut self.pucks)
    }
}

impl Default for PuckArena {
    fn default() -> Self {
        Self::new()
    }
}
