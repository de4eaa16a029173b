//! Arc Seeker - adaptive combat decisions for voxel-world agents

pub mod actuator;
pub mod brain;
pub mod collective;
pub mod core;
pub mod decision;
pub mod experience;
pub mod orchestrator;
pub mod perception;
pub mod world;

pub use crate::core::{AgentId, Result, SeekerConfig, SeekerError};
pub use orchestrator::{HeuristicInference, InferenceChannel, Orchestrator, RemoteInference};
