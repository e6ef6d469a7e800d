//! Daemon internals, split out of the binary so they can be tested.

pub mod daemon;
pub mod ingress;
pub mod launcher;
