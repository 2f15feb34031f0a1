use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::expression::Statement;
use super::value::Value;
use crate::error::Result;

/// Lifecycle of a history item. Ordered: `Proposed < Accepted < Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirm {
    Proposed,
    Accepted,
    Confirmed,
}

/// Kind of turn a state represents. User acts drive the agent reply, `Sys*`
/// acts describe what the agent just said.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DialogueAct {
    Init,
    Execute,
    AskRecommend,
    ActionQuestion,
    LearnMore,
    Cancel,
    End,
    Greet,
    Reinit,
    SysInit,
    SysGreet,
    SysSearchQuestion,
    SysGenericSearchQuestion,
    SysSlotFill,
    SysEmptySearch,
    SysProposeRefinedQuery,
    SysRecommendOne,
    SysRecommendTwo,
    SysRecommendThree,
    SysRecommendFour,
    SysConfirmAction,
    SysActionSuccess,
    SysActionError,
    SysActionErrorQuestion,
    SysDisplayResult,
    SysAnythingElse,
    SysLearnMoreWhat,
    SysRecordCommand,
    SysEnd,
    /// Unknown tag, kept verbatim so it survives a round-trip.
    Other(String),
}

impl DialogueAct {
    pub fn as_str(&self) -> &str {
        match self {
            DialogueAct::Init => "init",
            DialogueAct::Execute => "execute",
            DialogueAct::AskRecommend => "ask_recommend",
            DialogueAct::ActionQuestion => "action_question",
            DialogueAct::LearnMore => "learn_more",
            DialogueAct::Cancel => "cancel",
            DialogueAct::End => "end",
            DialogueAct::Greet => "greet",
            DialogueAct::Reinit => "reinit",
            DialogueAct::SysInit => "sys_init",
            DialogueAct::SysGreet => "sys_greet",
            DialogueAct::SysSearchQuestion => "sys_search_question",
            DialogueAct::SysGenericSearchQuestion => "sys_generic_search_question",
            DialogueAct::SysSlotFill => "sys_slot_fill",
            DialogueAct::SysEmptySearch => "sys_empty_search",
            DialogueAct::SysProposeRefinedQuery => "sys_propose_refined_query",
            DialogueAct::SysRecommendOne => "sys_recommend_one",
            DialogueAct::SysRecommendTwo => "sys_recommend_two",
            DialogueAct::SysRecommendThree => "sys_recommend_three",
            DialogueAct::SysRecommendFour => "sys_recommend_four",
            DialogueAct::SysConfirmAction => "sys_confirm_action",
            DialogueAct::SysActionSuccess => "sys_action_success",
            DialogueAct::SysActionError => "sys_action_error",
            DialogueAct::SysActionErrorQuestion => "sys_action_error_question",
            DialogueAct::SysDisplayResult => "sys_display_result",
            DialogueAct::SysAnythingElse => "sys_anything_else",
            DialogueAct::SysLearnMoreWhat => "sys_learn_more_what",
            DialogueAct::SysRecordCommand => "sys_record_command",
            DialogueAct::SysEnd => "sys_end",
            DialogueAct::Other(s) => s,
        }
    }

    pub fn is_agent(&self) -> bool {
        self.as_str().starts_with("sys_")
    }

    pub fn is_recommendation(&self) -> bool {
        matches!(
            self,
            DialogueAct::SysRecommendOne
                | DialogueAct::SysRecommendTwo
                | DialogueAct::SysRecommendThree
                | DialogueAct::SysRecommendFour
        )
    }
}

impl From<String> for DialogueAct {
    fn from(s: String) -> Self {
        match s.as_str() {
            "init" => DialogueAct::Init,
            "execute" => DialogueAct::Execute,
            "ask_recommend" => DialogueAct::AskRecommend,
            "action_question" => DialogueAct::ActionQuestion,
            "learn_more" => DialogueAct::LearnMore,
            "cancel" => DialogueAct::Cancel,
            "end" => DialogueAct::End,
            "greet" => DialogueAct::Greet,
            "reinit" => DialogueAct::Reinit,
            "sys_init" => DialogueAct::SysInit,
            "sys_greet" => DialogueAct::SysGreet,
            "sys_search_question" => DialogueAct::SysSearchQuestion,
            "sys_generic_search_question" => DialogueAct::SysGenericSearchQuestion,
            "sys_slot_fill" => DialogueAct::SysSlotFill,
            "sys_empty_search" => DialogueAct::SysEmptySearch,
            "sys_propose_refined_query" => DialogueAct::SysProposeRefinedQuery,
            "sys_recommend_one" => DialogueAct::SysRecommendOne,
            "sys_recommend_two" => DialogueAct::SysRecommendTwo,
            "sys_recommend_three" => DialogueAct::SysRecommendThree,
            "sys_recommend_four" => DialogueAct::SysRecommendFour,
            "sys_confirm_action" => DialogueAct::SysConfirmAction,
            "sys_action_success" => DialogueAct::SysActionSuccess,
            "sys_action_error" => DialogueAct::SysActionError,
            "sys_action_error_question" => DialogueAct::SysActionErrorQuestion,
            "sys_display_result" => DialogueAct::SysDisplayResult,
            "sys_anything_else" => DialogueAct::SysAnythingElse,
            "sys_learn_more_what" => DialogueAct::SysLearnMoreWhat,
            "sys_record_command" => DialogueAct::SysRecordCommand,
            "sys_end" => DialogueAct::SysEnd,
            _ => DialogueAct::Other(s),
        }
    }
}

impl From<&str> for DialogueAct {
    fn from(s: &str) -> Self {
        DialogueAct::from(s.to_string())
    }
}

impl From<DialogueAct> for String {
    fn from(act: DialogueAct) -> Self {
        act.as_str().to_string()
    }
}

impl fmt::Display for DialogueAct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One result row, keyed by output parameter name (`id` when the function has one).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultItem {
    pub value: BTreeMap<String, Value>,
}

impl ResultItem {
    pub fn new(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self { value: values.into_iter().collect() }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }

    pub fn id(&self) -> Option<&Value> {
        self.value.get("id")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultList {
    pub results: Vec<ResultItem>,
    /// Total count as reported by the executor; may not be a number.
    pub count: Value,
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ResultList {
    pub fn new(results: Vec<ResultItem>) -> Self {
        let count = Value::Number(results.len() as f64);
        Self { results, count, more: false, error: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueHistoryItem {
    pub stmt: Statement,
    /// `None` until executed.
    pub results: Option<ResultList>,
    pub confirm: Confirm,
}

impl DialogueHistoryItem {
    pub fn new(stmt: Statement, confirm: Confirm) -> Self {
        Self { stmt, results: None, confirm }
    }

    pub fn is_executed(&self) -> bool {
        self.results.is_some()
    }
}

/// The persisted conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueState {
    pub policy: String,
    pub dialogue_act: DialogueAct,
    pub dialogue_act_param: Option<Vec<String>>,
    pub history: Vec<DialogueHistoryItem>,
}

impl DialogueState {
    pub fn new(
        policy: impl Into<String>,
        dialogue_act: DialogueAct,
        dialogue_act_param: Option<Vec<String>>,
        history: Vec<DialogueHistoryItem>,
    ) -> Self {
        Self { policy: policy.into(), dialogue_act, dialogue_act_param, history }
    }

    pub fn first_proposed_idx(&self) -> Option<usize> {
        self.history.iter().position(|item| item.confirm == Confirm::Proposed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
