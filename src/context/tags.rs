use serde::{Serialize, Serializer};
use std::fmt;

use super::info::ContextInfo;
use crate::ast::DialogueAct;
use crate::error::{DialogueError, Result};

/// Identifier the generation grammar uses to pick templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextTag {
    Init,
    End,
    Greet,
    Reinit,
    Cancel,
    LearnMore,
    ConfirmAction,
    IncompleteActionAfterSearch,
    CompletedActionSuccess,
    CompletedActionError,
    EmptySearchCommand,
    DisplayNonlistResult,
    AggregationQuestion,
    SingleResultSearchCommand,
    SearchCommand,
    CompleteSearchCommand,

    Multidomain,
    WithAction,
    IncompleteAction,
    WithoutAction,
    WithResult,
    WithTableResult,
    WithAggregationResult,
    ForRelatedQuestion,
    WithResultQuestion,
    WithResultArgminmax,
    WithResultNoquestion,
    WithResultAndAction,
    WithoutProjection,

    CurrentStatement,
    CurrentQuery,
    NextStatement,
    NextQuery,
    NextAction,

    /// Matches every agent turn.
    SysAny,
    /// Main tag of an agent turn, e.g. `sys_recommend_many`.
    Sys(String),
}

impl ContextTag {
    pub fn name(&self) -> &str {
        match self {
            ContextTag::Init => "init",
            ContextTag::End => "end",
            ContextTag::Greet => "greet",
            ContextTag::Reinit => "reinit",
            ContextTag::Cancel => "cancel",
            ContextTag::LearnMore => "learn_more",
            ContextTag::ConfirmAction => "confirm_action",
            ContextTag::IncompleteActionAfterSearch => "incomplete_action_after_search",
            ContextTag::CompletedActionSuccess => "completed_action_success",
            ContextTag::CompletedActionError => "completed_action_error",
            ContextTag::EmptySearchCommand => "empty_search_command",
            ContextTag::DisplayNonlistResult => "display_nonlist_result",
            ContextTag::AggregationQuestion => "aggregation_question",
            ContextTag::SingleResultSearchCommand => "single_result_search_command",
            ContextTag::SearchCommand => "search_command",
            ContextTag::CompleteSearchCommand => "complete_search_command",
            ContextTag::Multidomain => "multidomain",
            ContextTag::WithAction => "with_action",
            ContextTag::IncompleteAction => "incomplete_action",
            ContextTag::WithoutAction => "without_action",
            ContextTag::WithResult => "with_result",
            ContextTag::WithTableResult => "with_table_result",
            ContextTag::WithAggregationResult => "with_aggregation_result",
            ContextTag::ForRelatedQuestion => "for_related_question",
            ContextTag::WithResultQuestion => "with_result_question",
            ContextTag::WithResultArgminmax => "with_result_argminmax",
            ContextTag::WithResultNoquestion => "with_result_noquestion",
            ContextTag::WithResultAndAction => "with_result_and_action",
            ContextTag::WithoutProjection => "without_projection",
            ContextTag::CurrentStatement => "current_statement",
            ContextTag::CurrentQuery => "current_query",
            ContextTag::NextStatement => "next_statement",
            ContextTag::NextQuery => "next_query",
            ContextTag::NextAction => "next_action",
            ContextTag::SysAny => "sys_any",
            ContextTag::Sys(name) => name,
        }
    }

    /// Main tag for the agent act of a reply.
    pub fn for_agent_act(act: &DialogueAct) -> Self {
        let name = act.as_str();
        let main = match act {
            DialogueAct::SysGenericSearchQuestion => "sys_search_question",
            DialogueAct::SysSearchQuestion => name,
            _ if name.ends_with("_question") => &name[..name.len() - "_question".len()],
            _ if name.starts_with("sys_recommend_") && *act != DialogueAct::SysRecommendOne => "sys_recommend_many",
            _ => name,
        };
        ContextTag::Sys(main.to_string())
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx_{}", self.name())
    }
}

impl Serialize for ContextTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The contexts the agent can reply from, given the user's last act.
///
/// Never empty: an act the agent cannot reply to is an error.
pub fn tag_context_for_agent(ctx: &ContextInfo) -> Result<Vec<ContextTag>> {
    use ContextTag::*;

    let act = &ctx.state.dialogue_act;
    match act {
        DialogueAct::End => Ok(vec![End]),
        DialogueAct::Greet => {
            if !ctx.state.history.is_empty() {
                return Err(DialogueError::malformed_state("greet with a non-empty history"));
            }
            Ok(vec![Greet])
        }
        DialogueAct::Reinit => Ok(vec![Reinit]),
        DialogueAct::Cancel => Ok(vec![Cancel]),
        DialogueAct::ActionQuestion => Ok(vec![CompletedActionSuccess]),
        DialogueAct::LearnMore => {
            ctx.require_results()?;
            Ok(vec![LearnMore])
        }
        DialogueAct::Execute | DialogueAct::AskRecommend => {
            if let Some(next_info) = &ctx.next_info {
                // nothing to take from the current results
                if next_info.chain_parameter.is_none() || next_info.chain_parameter_filled {
                    return Ok(if next_info.is_complete {
                        vec![ConfirmAction]
                    } else {
                        vec![IncompleteActionAfterSearch]
                    });
                }
            }

            let result_info = ctx.require_result_info()?;
            if result_info.has_error {
                return Ok(vec![CompletedActionError]);
            }

            if !result_info.is_table {
                let should_have_result = ctx.current_function.as_ref().map(|f| f.has_outputs()).unwrap_or(false);
                return Ok(if result_info.has_empty_result && should_have_result {
                    vec![EmptySearchCommand]
                } else {
                    vec![CompletedActionSuccess]
                });
            }

            if result_info.has_empty_result {
                return Ok(vec![EmptySearchCommand]);
            }

            if !result_info.is_list {
                return Ok(vec![DisplayNonlistResult]);
            }

            if result_info.is_question {
                if result_info.is_aggregation {
                    Ok(vec![AggregationQuestion])
                } else if result_info.arg_min_max_field.is_some() || result_info.has_single_result {
                    Ok(vec![SingleResultSearchCommand, CompleteSearchCommand])
                } else if result_info.has_large_result {
                    Ok(vec![SearchCommand, CompleteSearchCommand])
                } else {
                    Ok(vec![CompleteSearchCommand])
                }
            } else if result_info.has_single_result {
                Ok(vec![SingleResultSearchCommand, CompleteSearchCommand])
            } else if result_info.has_large_result && *act != DialogueAct::AskRecommend {
                Ok(vec![SearchCommand, CompleteSearchCommand])
            } else {
                Ok(vec![CompleteSearchCommand])
            }
        }
        other => Err(DialogueError::UnexpectedDialogueAct(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_tag_for_agent_acts() {
        let tag = |act: DialogueAct| ContextTag::for_agent_act(&act).to_string();
        assert_eq!(tag(DialogueAct::SysGenericSearchQuestion), "ctx_sys_search_question");
        assert_eq!(tag(DialogueAct::SysSearchQuestion), "ctx_sys_search_question");
        assert_eq!(tag(DialogueAct::SysActionErrorQuestion), "ctx_sys_action_error");
        assert_eq!(tag(DialogueAct::SysRecommendOne), "ctx_sys_recommend_one");
        assert_eq!(tag(DialogueAct::SysRecommendThree), "ctx_sys_recommend_many");
        assert_eq!(tag(DialogueAct::SysSlotFill), "ctx_sys_slot_fill");
    }
}
