//! Injected id-generation capability for configuration entities.
//! Keeps id creation out of process-wide state so tests and fixture
//! builders can produce reproducible configurations.

use uuid::Uuid;

pub trait MappingIdGen {
    fn next_id(&mut self) -> Uuid;
}

/// Production default: random v4 UUIDs.
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen;

impl MappingIdGen for UuidIdGen {
    fn next_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Monotonic sequence starting at `start`; deterministic output for
/// tests and reproducible fixtures.
#[derive(Clone, Debug)]
pub struct SequenceIdGen {
    next: u128,
}

impl SequenceIdGen {
    pub fn new(start: u128) -> Self {
        Self { next: start }
    }
}

impl MappingIdGen for SequenceIdGen {
    fn next_id(&mut self) -> Uuid {
        let id = Uuid::from_u128(self.next);
        self.next += 1;
        id
    }
}
