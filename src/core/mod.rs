pub mod config;
pub mod error;
pub mod types;

pub use config::SeekerConfig;
pub use error::{Result, SeekerError};
pub use types::{AgentId, AgentKind, AgentState, FactionId, ItemCategory, Millis, Stance};
