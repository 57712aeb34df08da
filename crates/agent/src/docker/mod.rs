//! Docker module: bollard-backed container runtime access.

pub mod client;
pub mod container;
pub mod event;
pub mod inventory;
pub mod preflight;

pub use client::{DockerClient, RuntimeError};
pub use container::{ContainerFilter, Inspection, LogOptions};
pub use event::RuntimeEvent;
pub use inventory::{ContainerInfo, PortMapping};
