//! Port descriptors for the process system.
//!
//! Each process declares its ports (inputs/outputs) once, at construction, into
//! a [`PortSet`]. The pipeline uses these declarations to validate connections
//! and to route datums.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::PortAddr;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Type tag used for connection-time checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

/// What a delegate failure does to an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// The process fails and the run aborts.
    Fatal,
    /// An `Error` datum carrying the message is pushed on this port.
    Forward,
    /// Logged and dropped.
    Discard,
}

/// Descriptor for a single declared port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub name: String,
    pub direction: PortDirection,
    pub required: bool,
    pub type_tag: TypeTag,
    /// Only meaningful for outputs.
    pub error_policy: ErrorPolicy,
}

impl PortDescriptor {
    pub fn input(name: impl Into<String>, type_tag: TypeTag, required: bool) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            required,
            type_tag,
            error_policy: ErrorPolicy::Forward,
        }
    }

    /// Required outputs default to `Fatal`, optional ones to `Forward`.
    pub fn output(name: impl Into<String>, type_tag: TypeTag, required: bool) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            required,
            type_tag,
            error_policy: if required {
                ErrorPolicy::Fatal
            } else {
                ErrorPolicy::Forward
            },
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

/// Ordered set of ports declared by one process. Insertion order is kept for
/// diagnostics and is the port index used in [`PortAddr`](crate::pipeline::PortAddr).
#[derive(Debug, Clone, Default)]
pub struct PortSet {
    owner: String,
    ports: Vec<PortDescriptor>,
}

impl PortSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ports: Vec::new(),
        }
    }

    /// Register a port. Fails with `DuplicatePort` if the name is taken, in
    /// either direction, and with `TooManyPorts` past [`PortAddr::MAX_PORTS`].
    pub fn declare(&mut self, port: PortDescriptor) -> PipelineResult<u16> {
        if self.ports.iter().any(|p| p.name == port.name) {
            return Err(PipelineError::DuplicatePort {
                process: self.owner.clone(),
                port: port.name,
            });
        }
        let index = u16::try_from(self.ports.len())
            .ok()
            .filter(|&i| usize::from(i) < PortAddr::MAX_PORTS)
            .ok_or_else(|| PipelineError::TooManyPorts {
                process: self.owner.clone(),
                limit: PortAddr::MAX_PORTS,
            })?;
        self.ports.push(port);
        Ok(index)
    }

    pub fn declare_input(
        &mut self,
        name: &str,
        type_tag: TypeTag,
        required: bool,
    ) -> PipelineResult<u16> {
        self.declare(PortDescriptor::input(name, type_tag, required))
    }

    pub fn declare_output(
        &mut self,
        name: &str,
        type_tag: TypeTag,
        required: bool,
    ) -> PipelineResult<u16> {
        self.declare(PortDescriptor::output(name, type_tag, required))
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&PortDescriptor> {
        self.ports.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports.iter()
    }

    /// Index of the port called `name` with the given direction.
    pub fn find(&self, name: &str, direction: PortDirection) -> Option<u16> {
        self.ports
            .iter()
            .position(|p| p.name == name && p.direction == direction)
            .and_then(|i| u16::try_from(i).ok())
    }

    pub fn inputs(&self) -> impl Iterator<Item = (u16, &PortDescriptor)> {
        self.indexed(PortDirection::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (u16, &PortDescriptor)> {
        self.indexed(PortDirection::Output)
    }

    pub fn has_inputs(&self) -> bool {
        self.ports.iter().any(PortDescriptor::is_input)
    }

    pub fn has_outputs(&self) -> bool {
        self.ports.iter().any(PortDescriptor::is_output)
    }

    fn indexed(&self, direction: PortDirection) -> impl Iterator<Item = (u16, &PortDescriptor)> {
        self.ports
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.direction == direction)
            .filter_map(|(i, p)| Some((u16::try_from(i).ok()?, p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: TypeTag = TypeTag::from_static("image");

    #[test]
    fn test_declare_preserves_order() {
        let mut ports = PortSet::new("seg");
        assert_eq!(ports.declare_input("image", IMAGE, true).unwrap(), 0);
        assert_eq!(ports.declare_output("mask", IMAGE, true).unwrap(), 1);

        let names: Vec<_> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["image", "mask"]);
        assert!(ports.has_inputs());
        assert!(ports.has_outputs());
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let mut ports = PortSet::new("seg");
        ports.declare_input("image", IMAGE, true).unwrap();
        let err = ports.declare_output("image", IMAGE, false).unwrap_err();
        assert_eq!(
            err,
            PipelineError::DuplicatePort {
                process: "seg".into(),
                port: "image".into(),
            }
        );
        assert_eq!(ports.len(), 1);
    }

    #[test]
    fn test_port_limit() {
        let mut ports = PortSet::new("wide");
        for i in 0..PortAddr::MAX_PORTS {
            ports
                .declare_output(&format!("out{}", i), IMAGE, false)
                .unwrap();
        }
        let err = ports.declare_output("one_more", IMAGE, false).unwrap_err();
        assert_eq!(
            err,
            PipelineError::TooManyPorts {
                process: "wide".into(),
                limit: PortAddr::MAX_PORTS,
            }
        );
        assert_eq!(ports.len(), PortAddr::MAX_PORTS);
    }

    #[test]
    fn test_find_respects_direction() {
        let mut ports = PortSet::new("p");
        ports.declare_input("in", IMAGE, true).unwrap();
        ports.declare_output("out", IMAGE, false).unwrap();
        assert_eq!(ports.find("in", PortDirection::Input), Some(0));
        assert_eq!(ports.find("in", PortDirection::Output), None);
        assert_eq!(ports.find("out", PortDirection::Output), Some(1));
    }

    #[test]
    fn test_default_error_policies() {
        let required = PortDescriptor::output("a", IMAGE, true);
        let optional = PortDescriptor::output("b", IMAGE, false);
        assert_eq!(required.error_policy, ErrorPolicy::Fatal);
        assert_eq!(optional.error_policy, ErrorPolicy::Forward);
        let discard = optional.with_error_policy(ErrorPolicy::Discard);
        assert_eq!(discard.error_policy, ErrorPolicy::Discard);
    }
}
