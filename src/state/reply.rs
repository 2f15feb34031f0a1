use std::sync::Arc;

use crate::ast::{DialogueAct, DialogueState, Type};
use crate::context::{get_context_info, get_context_phrases, AgentProposal, ContextInfo, ContextPhrase, ContextTag};
use crate::error::{DialogueError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReplyOptions {
    /// Overrides whether the reply closes the current task.
    pub end: Option<bool>,
    /// The next user turn is taken verbatim, not parsed.
    pub raw: bool,
    pub num_results: usize,
}

/// An agent turn ready for generation: the state after it, and the context
/// the user will answer from.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub state: DialogueState,
    pub context: Arc<ContextInfo>,
    pub context_phrases: Vec<ContextPhrase>,
    pub expect: Option<Type>,
    pub end: bool,
    pub raw: bool,
    pub num_results: usize,
}

impl AgentReply {
    pub fn aux(&self) -> Option<&AgentProposal> {
        self.context.aux.as_ref()
    }
}

pub fn make_agent_reply(
    ctx: &ContextInfo,
    state: DialogueState,
    aux: Option<AgentProposal>,
    expect: Option<Type>,
    options: AgentReplyOptions,
) -> Result<AgentReply> {
    let act = state.dialogue_act.clone();
    if !act.is_agent() {
        return Err(DialogueError::UnexpectedDialogueAct(act.to_string()));
    }

    let context = Arc::new(get_context_info(ctx.env(), state.clone())?.with_aux(aux));
    let mut context_phrases = vec![
        ContextPhrase::new(ContextTag::SysAny, &context),
        ContextPhrase::new(ContextTag::for_agent_act(&act), &context),
    ];
    context_phrases.extend(get_context_phrases(&context)?);

    // a reply ends the task when nothing is left to execute
    let end = options.end.unwrap_or_else(|| {
        state.history.iter().all(|item| item.results.is_some())
            && (act.is_recommendation()
                || matches!(
                    act,
                    DialogueAct::SysActionSuccess
                        | DialogueAct::SysActionError
                        | DialogueAct::SysEnd
                        | DialogueAct::SysDisplayResult
                ))
    });

    Ok(AgentReply {
        state,
        context,
        context_phrases,
        expect,
        end,
        raw: options.raw,
        num_results: options.num_results,
    })
}
