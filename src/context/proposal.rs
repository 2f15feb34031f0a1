use serde::{Deserialize, Serialize};

use crate::ast::{Expression, Invocation, ResultItem, Type};
use crate::slot_bag::SlotBag;

/// A single result offered by the agent, optionally with an action to
/// perform on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub top_result: ResultItem,
    pub info: Option<SlotBag>,
    pub action: Option<Invocation>,
    #[serde(default)]
    pub has_learn_more: bool,
    #[serde(default)]
    pub has_anything_else: bool,
}

impl Recommendation {
    pub fn new(top_result: ResultItem, info: Option<SlotBag>, action: Option<Invocation>) -> Self {
        Self { top_result, info, action, has_learn_more: false, has_anything_else: false }
    }

    /// Type of the `id` of the recommended result.
    pub fn id_type(&self) -> Option<Type> {
        self.top_result.id().map(|id| id.get_type())
    }
}

/// Two to four results offered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListProposal {
    pub results: Vec<ResultItem>,
    pub info: Option<SlotBag>,
    pub action: Option<Invocation>,
    #[serde(default)]
    pub has_learn_more: bool,
}

impl ListProposal {
    pub fn id_type(&self) -> Option<Type> {
        self.results.first().and_then(ResultItem::id).map(|id| id.get_type())
    }

    pub fn contains_id(&self, name: &crate::ast::Value) -> bool {
        self.results.iter().any(|r| r.id() == Some(name))
    }
}

/// What the agent put on the table in its last turn. Only the user turn
/// immediately after may look at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentProposal {
    Recommendation(Recommendation),
    ListProposal(ListProposal),
    /// The search came back empty; carries the parameter the agent asked
    /// the user to change, if any.
    EmptySearch(Option<String>),
    RefinedQuery(Expression),
    ActionSuccess(SlotBag),
    ActionError,
}

impl AgentProposal {
    pub fn as_recommendation(&self) -> Option<&Recommendation> {
        match self {
            AgentProposal::Recommendation(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list_proposal(&self) -> Option<&ListProposal> {
        match self {
            AgentProposal::ListProposal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_refined_query(&self) -> Option<&Expression> {
        match self {
            AgentProposal::RefinedQuery(e) => Some(e),
            _ => None,
        }
    }
}
