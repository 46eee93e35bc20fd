//! Shared domain types for the protobuilder container runtime.
//!
//! The runtime crate drives containers through the [`ContainerEngine`] trait
//! defined here, so the lifecycle logic can be exercised against a fake
//! engine without a Docker daemon.

pub mod container;
pub mod engine;
pub mod error;
pub mod execution;
pub mod image;

pub use container::{ContainerHandle, ContainerSpec, ContainerSummary, PortMapping, VolumeBind};
pub use engine::{ContainerEngine, ContainerFilter};
pub use error::EngineError;
pub use execution::{
    CommandChain, ExecOutput, ExecutionRequest, ExecutionResult, ExecutionStatus, ExitEvent,
};
pub use image::ImageCatalog;
