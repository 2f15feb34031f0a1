use tracing::debug;

use super::common::{
    add_parameters_from_context, is_simple_filter_expression, is_valid_search_question, FilterSlot, ParamSlot,
};
use crate::ast::manip::{check_filter, get_invocation, last_query};
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueState, Expression, Filter, Invocation, Value};
use crate::context::ContextInfo;
use crate::error::{DialogueError, Result};
use crate::refinement::{query_refinement, refine_filter_to_answer_question};
use crate::state::{add_query, add_query_and_action, make_agent_reply, make_simple_state, AgentReply, AgentReplyOptions};

/// What the user said when asked to narrow a search down.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAnswer {
    /// A bare value for the single question asked.
    Value(Value),
    Filter(Filter),
    DontCare,
}

/// The questions are filterable outputs of the current query, and the
/// current filter leaves all of them open.
pub fn is_good_search_question(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<bool> {
    let Some(current) = ctx.current() else { return Ok(false) };
    let Some(query) = last_query(&current.stmt, ctx.registry())? else { return Ok(false) };
    if !is_valid_search_question(&*ctx.registry().resolve(query)?, questions) {
        return Ok(false);
    }
    let Some(filter) = current.stmt.expression.find_filter() else { return Ok(false) };
    Ok(!questions.iter().any(|q| filter.uses_param(&q.name)))
}

/// "Do you want X or Y?": two values of the same parameter, both present
/// among the current results, every one of which carries that parameter.
pub fn check_filter_pair_for_disjunctive_question(ctx: &ContextInfo, f1: &FilterSlot, f2: &FilterSlot) -> Option<ParamSlot> {
    let (Filter::Atom { name: n1, value: v1, .. }, Filter::Atom { name: n2, value: v2, .. }) = (&f1.filter, &f2.filter) else {
        return None;
    };
    let current_function = ctx.current_function.as_ref()?;
    if !current_function.is_list
        || !is_same_function(current_function, &f1.function)
        || !is_same_function(&f1.function, &f2.function)
    {
        return None;
    }
    if n1 != n2 || v1.get_type() != v2.get_type() || v1 == v2 {
        return None;
    }
    let slot = ParamSlot::new(&f1.function, n1)?;
    if !f1.function.argument(n1)?.filterable() {
        return None;
    }

    let (mut good1, mut good2) = (false, false);
    for result in ctx.results()? {
        let value = result.get(n1)?;
        good1 = good1 || value == v1;
        good2 = good2 || value == v2;
        if good1 && good2 {
            return Some(slot);
        }
    }
    None
}

pub fn make_search_question(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<Option<AgentReply>> {
    if !is_good_search_question(ctx, questions)? {
        debug!("search question not applicable");
        return Ok(None);
    }

    let reply = match questions {
        [] => {
            let state = make_simple_state(ctx, DialogueAct::SysGenericSearchQuestion, None);
            make_agent_reply(ctx, state, None, None, AgentReplyOptions::default())?
        }
        [question] => {
            let state = make_simple_state(ctx, DialogueAct::SysSearchQuestion, Some(vec![question.name.clone()]));
            make_agent_reply(ctx, state, None, Some(question.ty.clone()), AgentReplyOptions::default())?
        }
        _ => {
            let names = questions.iter().map(|q| q.name.clone()).collect();
            let state = make_simple_state(ctx, DialogueAct::SysSearchQuestion, Some(names));
            make_agent_reply(ctx, state, None, None, AgentReplyOptions::default())?
        }
    };
    Ok(Some(reply))
}

/// Whether `table` constrains one of the parameters asked about.
pub fn is_query_answer_valid_for_question(table: &Expression, questions: &[String]) -> bool {
    fn answers(filter: &Filter, questions: &[String]) -> bool {
        match filter {
            Filter::Atom { name, .. } | Filter::DontCare { name } => questions.contains(name),
            Filter::Not(inner) => answers(inner, questions),
            Filter::And(operands) | Filter::Or(operands) => operands.iter().any(|f| answers(f, questions)),
            Filter::External { filter, .. } => answers(filter, questions),
            _ => false,
        }
    }
    let mut expr = Some(table);
    while let Some(e) = expr {
        if let Expression::Filter { filter, .. } = e {
            if answers(filter, questions) {
                return true;
            }
        }
        expr = e.inner();
    }
    false
}

/// The user answered with a full search, optionally with the action to run
/// on its result.
pub fn precise_search_question_answer(
    ctx: &ContextInfo,
    answer_table: &Expression,
    answer_action: Option<&Invocation>,
) -> Result<Option<DialogueState>> {
    if let Some(questions) = &ctx.state.dialogue_act_param {
        if !is_query_answer_valid_for_question(answer_table, questions) {
            debug!("answer does not address {:?}", questions);
            return Ok(None);
        }
    }
    let Expression::Filter { filter: answer_filter, .. } = answer_table else { return Ok(None) };
    let current_function = ctx.require_current_function()?;
    if !is_same_function(&*ctx.registry().resolve(answer_table)?, current_function) {
        return Ok(None);
    }
    // TODO push the filter down through projections and sorts of the answer
    if !is_simple_filter_expression(answer_table) {
        return Ok(None);
    }

    let mut action = answer_action.cloned();
    if let (Some(answer_action), Some(next_function)) = (answer_action, &ctx.next_function) {
        if !is_same_function(&*ctx.registry().resolve_invocation(answer_action)?, next_function) {
            return Ok(None);
        }
        let (next, next_info) = ctx.require_next()?;
        // the chain parameter is only filled once the results are shown
        if let Some(chain) = &next_info.chain_parameter {
            if !next_info.chain_parameter_filled && answer_action.param(chain).is_some() {
                debug!("answer fills chain parameter {}", chain);
                return Ok(None);
            }
        }
        action = Some(add_parameters_from_context(answer_action, get_invocation(next)?));
    }

    let current = ctx.require_current()?;
    let Some(new_table) = query_refinement(
        &current.stmt.expression,
        Some(answer_filter),
        Some(refine_filter_to_answer_question),
        None,
        ctx.registry(),
    )?
    else {
        return Ok(None);
    };
    match action {
        Some(action) => add_query_and_action(ctx, DialogueAct::Execute, new_table, action, Confirm::Accepted).map(Some),
        None => add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some),
    }
}

/// The user answered the single question asked with just a value, a
/// filter on it, or "I don't care".
pub fn imprecise_search_question_answer(ctx: &ContextInfo, answer: &SearchAnswer) -> Result<Option<DialogueState>> {
    let Some([question]) = ctx.state.dialogue_act_param.as_deref() else {
        debug!("imprecise answer needs exactly one question");
        return Ok(None);
    };
    let current_function = ctx.require_current_function()?;

    let answer_filter = match answer {
        SearchAnswer::DontCare => Filter::dont_care(question.clone()),
        SearchAnswer::Value(value) => {
            let Some(arg) = current_function.argument(question) else { return Ok(None) };
            if !arg.ty.is_assignable(value) {
                return Ok(None);
            }
            Filter::eq(question.clone(), value.clone())
        }
        SearchAnswer::Filter(filter) => {
            if answered_param(filter)? != question.as_str() {
                return Ok(None);
            }
            filter.clone()
        }
    };

    let table_function = ctx.current_table_function.as_ref().unwrap_or(current_function);
    if !check_filter(&answer_filter, table_function) {
        debug!("answer {} does not type-check", answer_filter);
        return Ok(None);
    }

    let current = ctx.require_current()?;
    let Some(new_table) = query_refinement(
        &current.stmt.expression,
        Some(&answer_filter),
        Some(refine_filter_to_answer_question),
        None,
        ctx.registry(),
    )?
    else {
        return Ok(None);
    };
    add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some)
}

/// Parameter an imprecise filter answer is about: a single atom or
/// don't-care, its negation, or two alternatives for the same parameter.
fn answered_param(filter: &Filter) -> Result<&str> {
    match filter {
        Filter::Atom { name, .. } | Filter::DontCare { name } => Ok(name),
        Filter::Not(inner) => match inner.as_ref() {
            Filter::Atom { name, .. } | Filter::DontCare { name } => Ok(name),
            other => Err(DialogueError::malformed_expression(format!("unexpected negated answer {}", other))),
        },
        Filter::And(operands) | Filter::Or(operands) => match operands.as_slice() {
            [Filter::Atom { name: n1, value: v1, .. }, Filter::Atom { name: n2, value: v2, .. }]
                if n1 == n2 && v1.get_type() == v2.get_type() =>
            {
                Ok(n1)
            }
            _ => Err(DialogueError::malformed_expression(format!("unexpected compound answer {}", filter))),
        },
        other => Err(DialogueError::malformed_expression(format!("unexpected answer {}", other))),
    }
}
