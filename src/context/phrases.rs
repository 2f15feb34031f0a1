use serde::Serialize;
use std::sync::Arc;

use super::info::{is_user_asking_result_question, ContextInfo, ContextKey};
use super::tags::ContextTag;
use crate::ast::manip::last_query;
use crate::ast::Expression;
use crate::error::Result;

#[derive(Debug, Clone)]
pub enum PhraseValue {
    Context(Arc<ContextInfo>),
    /// A piece of the current or pending statement, for confirmations.
    Expression(Expression),
}

/// One entry the generator indexes by tag.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPhrase {
    pub tag: ContextTag,
    #[serde(skip)]
    pub value: PhraseValue,
    pub key: ContextKey,
    pub priority: i32,
}

impl ContextPhrase {
    pub fn new(tag: ContextTag, ctx: &Arc<ContextInfo>) -> Self {
        Self { tag, value: PhraseValue::Context(ctx.clone()), key: ctx.key.clone(), priority: 0 }
    }

    pub fn expression(tag: ContextTag, ctx: &ContextInfo, expression: Expression) -> Self {
        Self { tag, value: PhraseValue::Expression(expression), key: ctx.key.clone(), priority: 0 }
    }

    pub fn context(&self) -> Option<&Arc<ContextInfo>> {
        match &self.value {
            PhraseValue::Context(ctx) => Some(ctx),
            PhraseValue::Expression(_) => None,
        }
    }
}

/// Phrases describing `ctx` beyond its main tag: the statements involved,
/// then flags about the pending action and the current result.
pub fn get_context_phrases(ctx: &Arc<ContextInfo>) -> Result<Vec<ContextPhrase>> {
    let registry = ctx.registry();
    let mut phrases = Vec::new();

    if let Some(current) = ctx.current() {
        phrases.push(ContextPhrase::expression(ContextTag::CurrentStatement, ctx, current.stmt.expression.clone()));
        if let Some(query) = last_query(&current.stmt, registry)? {
            phrases.push(ContextPhrase::expression(ContextTag::CurrentQuery, ctx, query.clone()));
        }
    }
    if let Some(next) = ctx.next() {
        phrases.push(ContextPhrase::expression(ContextTag::NextStatement, ctx, next.stmt.expression.clone()));
        if let Some(query) = last_query(&next.stmt, registry)? {
            phrases.push(ContextPhrase::expression(ContextTag::NextQuery, ctx, query.clone()));
        }
        let last = next.stmt.last();
        if registry.resolve(last)?.is_action() {
            phrases.push(ContextPhrase::expression(ContextTag::NextAction, ctx, last.clone()));
        }
    }

    if ctx.is_multi_domain {
        phrases.push(ContextPhrase::new(ContextTag::Multidomain, ctx));
    }

    match &ctx.next_info {
        Some(next_info) => {
            phrases.push(ContextPhrase::new(ContextTag::WithAction, ctx));
            if !next_info.is_complete {
                phrases.push(ContextPhrase::new(ContextTag::IncompleteAction, ctx));
            }
        }
        None => {
            if ctx.result_info.as_ref().map(|info| info.is_table).unwrap_or(false) {
                phrases.push(ContextPhrase::new(ContextTag::WithoutAction, ctx));
            }
        }
    }

    let Some(result_info) = &ctx.result_info else { return Ok(phrases) };
    // No separate error-result phrase: failed actions are covered by their own tags.
    if result_info.has_empty_result {
        return Ok(phrases);
    }

    phrases.push(ContextPhrase::new(ContextTag::WithResult, ctx));
    if result_info.is_table && !result_info.is_aggregation {
        phrases.push(ContextPhrase::new(ContextTag::WithTableResult, ctx));
    }
    if result_info.is_aggregation {
        phrases.push(ContextPhrase::new(ContextTag::WithAggregationResult, ctx));
    }

    if can_have_related_question(ctx)? {
        phrases.push(ContextPhrase::new(ContextTag::ForRelatedQuestion, ctx));
    }
    if is_user_asking_result_question(ctx)? {
        phrases.push(ContextPhrase::new(ContextTag::WithResultQuestion, ctx));
    } else {
        if result_info.arg_min_max_field.is_some() {
            phrases.push(ContextPhrase::new(ContextTag::WithResultArgminmax, ctx));
        } else {
            phrases.push(ContextPhrase::new(ContextTag::WithResultNoquestion, ctx));
        }
        if ctx.next_info.is_some() {
            phrases.push(ContextPhrase::new(ContextTag::WithResultAndAction, ctx));
        }
        if result_info.projection.is_none() {
            phrases.push(ContextPhrase::new(ContextTag::WithoutProjection, ctx));
        }
    }
    Ok(phrases)
}

fn can_have_related_question(ctx: &ContextInfo) -> Result<bool> {
    let Some(current) = ctx.current() else { return Ok(false) };
    let Some(query) = last_query(&current.stmt, ctx.registry())? else { return Ok(false) };
    Ok(!ctx.registry().resolve(query)?.related().is_empty())
}
