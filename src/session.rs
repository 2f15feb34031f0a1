use tracing::{debug, info_span};
use uuid::Uuid;

use crate::ast::DialogueState;
use crate::config::DialogueEnv;
use crate::context::{get_context_info, AgentProposal, ContextInfo};
use crate::error::Result;
use crate::policy::initial_state;
use crate::state::AgentReply;

/// One conversation: the persisted state plus whatever the agent proposed
/// in its last turn. The proposal lives for exactly one user turn.
#[derive(Debug, Clone)]
pub struct DialogueSession {
    pub id: Uuid,
    env: DialogueEnv,
    state: Option<DialogueState>,
    aux: Option<AgentProposal>,
}

impl DialogueSession {
    pub fn new(env: DialogueEnv) -> Self {
        Self { id: Uuid::new_v4(), env, state: None, aux: None }
    }

    /// A session opened on the configured initial function, if any.
    pub fn with_initial_state(env: DialogueEnv) -> Result<Self> {
        let mut session = Self::new(env);
        session.state = initial_state(&session.env)?;
        Ok(session)
    }

    /// Resumes a persisted conversation. Proposals are never persisted.
    pub fn resume(env: DialogueEnv, state: DialogueState) -> Self {
        Self { state: Some(state), ..Self::new(env) }
    }

    pub fn state(&self) -> Option<&DialogueState> {
        self.state.as_ref()
    }

    pub fn aux(&self) -> Option<&AgentProposal> {
        self.aux.as_ref()
    }

    /// Context for the next user turn, carrying the agent's proposal.
    pub fn context(&self) -> Result<Option<ContextInfo>> {
        let Some(state) = &self.state else { return Ok(None) };
        let ctx = get_context_info(&self.env, state.clone())?;
        Ok(Some(ctx.with_aux(self.aux.clone())))
    }

    /// Commits the agent's reply: its state and its proposal together.
    pub fn apply_agent_turn(&mut self, reply: AgentReply) {
        let _span = info_span!("dialogue_turn", session = %self.id, act = %reply.state.dialogue_act).entered();
        debug!(end = reply.end, "agent turn");
        self.aux = reply.aux().cloned();
        self.state = Some(reply.state);
    }

    /// Commits the state computed from a user turn. The agent's proposal
    /// has been answered and is dropped.
    pub fn apply_user_turn(&mut self, state: DialogueState) {
        let _span = info_span!("dialogue_turn", session = %self.id, act = %state.dialogue_act).entered();
        debug!(history = state.history.len(), "user turn");
        self.aux = None;
        self.state = Some(state);
    }

    pub fn to_json(&self) -> Result<Option<String>> {
        self.state.as_ref().map(DialogueState::to_json).transpose()
    }
}
