//! Identity types for the pipeline graph.
//!
//! IDs are newtypes over `u32` that double as indices into the pipeline's
//! process and edge storage, giving O(1) lookup without hashing names on the
//! hot path.

use std::fmt;

/// Index into `Pipeline::slots`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProcessId(pub u32);

impl ProcessId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessId({})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index into `Pipeline::edges`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId({})", self.0)
    }
}

/// Compact port address. High 20 bits = process index, low 12 bits = port index
/// within the process's declaration order. Supports up to ~1M processes with
/// [`PortAddr::MAX_PORTS`] ports each.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddr(pub u32);

impl PortAddr {
    const PORT_BITS: u32 = 12;
    const PORT_MASK: u32 = (1 << Self::PORT_BITS) - 1;

    /// Ports a single process may declare.
    pub const MAX_PORTS: usize = 1 << Self::PORT_BITS;

    pub fn new(process: ProcessId, port_index: u16) -> Self {
        debug_assert!(port_index < (1 << Self::PORT_BITS) as u16);
        Self((process.0 << Self::PORT_BITS) | (port_index as u32 & Self::PORT_MASK))
    }

    #[inline]
    pub fn process(self) -> ProcessId {
        ProcessId(self.0 >> Self::PORT_BITS)
    }

    #[inline]
    pub fn port_index(self) -> u16 {
        (self.0 & Self::PORT_MASK) as u16
    }
}

impl fmt::Debug for PortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PortAddr(process={}, port={})",
            self.process().0,
            self.port_index()
        )
    }
}
