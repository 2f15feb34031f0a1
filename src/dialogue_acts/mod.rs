//! Handlers for each kind of agent or user turn. Agent-side `make_*`
//! functions build an `AgentReply`; user-side handlers build the next
//! `DialogueState`. Either returns `Ok(None)` when it does not apply.

pub mod action_confirm;
pub mod action_results;
pub mod aggregation_results;
pub mod common;
pub mod coref_questions;
pub mod empty_search;
pub mod initial_request;
pub mod list_proposal;
pub mod recommendation;
pub mod refinement;
pub mod search_questions;
pub mod slot_fill;

pub use action_confirm::*;
pub use action_results::*;
pub use aggregation_results::*;
pub use common::*;
pub use coref_questions::*;
pub use empty_search::*;
pub use initial_request::*;
pub use list_proposal::*;
pub use recommendation::*;
pub use refinement::*;
pub use search_questions::*;
pub use slot_fill::*;
