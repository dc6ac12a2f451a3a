//! Resource Arithmetic
//!
//! Integer arithmetic over the single fungible resource the scheduler
//! manages (memory). Capacity fractions elsewhere are floats; quantities
//! here are always integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use tracing::warn;

/// A quantity of cluster memory, in allocation units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Resource {
    pub memory: u64,
}

impl Resource {
    pub const fn new(memory: u64) -> Self {
        Self { memory }
    }

    /// The zero sentinel. A heartbeat that grants nothing returns this.
    pub const fn none() -> Self {
        Self { memory: 0 }
    }

    pub fn is_none(&self) -> bool {
        self.memory == 0
    }

    pub fn greater_than(&self, other: Resource) -> bool {
        self.memory > other.memory
    }
}

impl Add for Resource {
    type Output = Resource;

    fn add(self, rhs: Resource) -> Resource {
        Resource {
            memory: self.memory.saturating_add(rhs.memory),
        }
    }
}

impl AddAssign for Resource {
    fn add_assign(&mut self, rhs: Resource) {
        self.memory = self.memory.saturating_add(rhs.memory);
    }
}

impl Sub for Resource {
    type Output = Resource;

    fn sub(self, rhs: Resource) -> Resource {
        Resource {
            memory: self.memory.saturating_sub(rhs.memory),
        }
    }
}

impl SubAssign for Resource {
    fn sub_assign(&mut self, rhs: Resource) {
        self.memory = self.memory.saturating_sub(rhs.memory);
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory: {}", self.memory)
    }
}

/// Ceiling division. A zero divisor yields 0 rather than a fault.
pub fn divide_and_ceil(a: u64, b: u64) -> u64 {
    if b == 0 {
        warn!(a, "divide_and_ceil called with zero divisor");
        return 0;
    }
    a.div_ceil(b)
}
