pub mod ast;
pub mod config;
pub mod context;
pub mod dialogue_acts;
pub mod error;
pub mod policy;
pub mod refinement;
pub mod session;
pub mod slot_bag;
pub mod state;

// Re-export the pieces a dialogue loop needs most
pub use config::{DialogueConfig, DialogueEnv};
pub use context::{get_context_info, tag_context_for_agent, ContextInfo};
pub use error::{DialogueError, Result};
pub use session::DialogueSession;
