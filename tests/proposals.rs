mod common;

use common::*;
use transaction_dialogue::ast::{Confirm, DialogueAct, Expression, Filter, Type, Value};
use transaction_dialogue::context::AgentProposal;
use transaction_dialogue::dialogue_acts::{
    check_action_for_recommendation, check_list_proposal, empty_search_change_phrase, list_proposal_learn_more_reply,
    make_empty_search_error, make_list_proposal_reply, make_recommendation, make_recommendation_reply,
    make_refinement_proposal, negative_proposal_reply, positive_list_proposal_reply, positive_proposal_reply,
    positive_recommendation_reply, recommendation_cancel_reply, recommendation_search_question_reply,
};
use transaction_dialogue::state::AgentReply;
use transaction_dialogue::ContextInfo;

fn thai_filter() -> Filter {
    Filter::eq("cuisine", Value::string("thai"))
}

fn cheap() -> Filter {
    Filter::eq("price", Value::Enum("cheap".into()))
}

/// The context the user answers from: the agent's state plus its proposal.
fn user_turn(reply: &AgentReply) -> ContextInfo {
    context(reply.state.clone()).with_aux(reply.aux().cloned())
}

#[test]
fn test_list_proposal_pick_and_book() {
    let rows = restaurant_rows();
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants(), rows.clone())]));

    // 1. "There's Thai Basil, Taco Bell and Lotus"
    let proposal = check_list_proposal(&ctx, &rows[..3], None, false).unwrap().expect("plain search");
    let reply = make_list_proposal_reply(&ctx, &proposal).unwrap().expect("three results");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysRecommendThree);
    assert_eq!(reply.num_results, 3);
    assert!(reply.end);

    // too many to list
    let five = check_list_proposal(&ctx, &rows, None, false).unwrap().unwrap();
    assert!(make_list_proposal_reply(&ctx, &five).unwrap().is_none());

    // 2. "Lotus sounds good"
    let ctx = user_turn(&reply);
    let lotus = restaurant_id("r3", "Lotus");
    let picked = positive_list_proposal_reply(&ctx, &lotus, None, false).unwrap().expect("listed");
    assert_eq!(last_filter(&picked), Some(Filter::eq("id", lotus.clone())));
    assert!(positive_list_proposal_reply(&ctx, &lotus, None, true).unwrap().is_none());

    // 3. "Book Lotus"
    let booked = positive_list_proposal_reply(&ctx, &lotus, Some(&reservation()), false).unwrap().unwrap();
    assert_eq!(booked.history.len(), 2);
    let invocation = booked.history[1].stmt.expression.invocation().unwrap();
    assert_eq!(invocation.param("restaurant"), Some(&lotus));
    assert!(invocation.param("book_time").map(Value::is_undefined).unwrap_or(false));

    // 4. Not one of the listed
    let nonna = restaurant_id("r5", "Nonna");
    assert!(positive_list_proposal_reply(&ctx, &nonna, None, false).unwrap().is_none());
    assert!(list_proposal_learn_more_reply(&ctx, &nonna).unwrap().is_none());
    assert!(list_proposal_learn_more_reply(&ctx, &lotus).unwrap().is_some());
}

#[test]
fn test_list_proposal_with_action_proposes_it() {
    let rows = restaurant_rows();
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants(), rows.clone())]));
    let mut proposal = check_list_proposal(&ctx, &rows[..2], None, false).unwrap().unwrap();
    proposal.action = Some(reservation());

    let reply = make_list_proposal_reply(&ctx, &proposal).unwrap().unwrap();
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysRecommendTwo);
    assert!(!reply.end);
    assert_eq!(reply.state.history.len(), 2);
    assert_eq!(reply.state.history[1].confirm, Confirm::Proposed);
}

#[test]
fn test_recommendation_accept_and_reject() {
    let thai_rows = vec![restaurant_row("r1", "Thai Basil", "thai", 4.5), restaurant_row("r3", "Lotus", "thai", 4.0)];
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants_where(thai_filter()), thai_rows)]));
    let thai_basil = restaurant_id("r1", "Thai Basil");

    // 1. Only the top result can be recommended
    assert!(make_recommendation(&ctx, &restaurant_id("r3", "Lotus")).unwrap().is_none());
    let rec = make_recommendation(&ctx, &thai_basil).unwrap().expect("top result");
    let rec = check_action_for_recommendation(&rec, &reservation(), ctx.registry()).unwrap().expect("takes a restaurant");

    // 2. "How about Thai Basil? Want me to book it?"
    let reply = make_recommendation_reply(&ctx, &rec).unwrap().unwrap();
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysRecommendOne);
    assert!(!reply.end);
    let proposed = &reply.state.history[1];
    assert_eq!(proposed.confirm, Confirm::Proposed);
    assert_eq!(proposed.stmt.expression.invocation().unwrap().param("restaurant"), Some(&thai_basil));

    // 3. "Yes please"
    let ctx = user_turn(&reply);
    let accepted = positive_recommendation_reply(&ctx, None, None).unwrap().expect("action proposed");
    assert_eq!(accepted.dialogue_act, DialogueAct::Execute);
    assert_eq!(accepted.history.len(), 2);
    assert_eq!(accepted.history[1].confirm, Confirm::Accepted);
    assert_eq!(accepted.history[1].stmt.expression.invocation().unwrap().param("restaurant"), Some(&thai_basil));

    // naming a different place is not an acceptance
    assert!(positive_recommendation_reply(&ctx, None, Some(&restaurant_id("r3", "Lotus"))).unwrap().is_none());

    // 4. "No thanks" drops a proposal, but not an accepted action
    assert_eq!(recommendation_cancel_reply(&ctx, true).map(|s| s.dialogue_act), Some(DialogueAct::Cancel));
    assert!(recommendation_cancel_reply(&context(accepted), true).is_none());
}

#[test]
fn test_question_about_recommendation() {
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants(), restaurant_rows())]));
    let rec = make_recommendation(&ctx, &restaurant_id("r1", "Thai Basil")).unwrap().unwrap();
    let reply = make_recommendation_reply(&ctx, &rec).unwrap().unwrap();
    assert!(reply.end);

    // "What's their address?"
    let ctx = user_turn(&reply);
    let questions = vec![("address".to_string(), Some(Type::String))];
    let next = recommendation_search_question_reply(&ctx, &questions).unwrap().expect("address is an output");
    match &next.history[1].stmt.expression {
        Expression::Projection { expression, args, .. } => {
            assert_eq!(args, &vec!["address".to_string()]);
            assert_eq!(**expression, restaurants_where(Filter::eq("id", restaurant_id("r1", "Thai Basil"))));
        }
        other => panic!("Expected Projection, got {:?}", other),
    }

    // asked as the wrong type
    let wrong = vec![("address".to_string(), Some(Type::Number))];
    assert!(recommendation_search_question_reply(&ctx, &wrong).unwrap().is_none());
}

#[test]
fn test_refinement_proposal() {
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants_where(thai_filter()), restaurant_rows())]));

    // 1. "How about cheap ones?"
    let reply = make_refinement_proposal(&ctx, &restaurants_where(cheap())).unwrap().expect("a refinement");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysProposeRefinedQuery);
    let refined = restaurants_where(Filter::And(vec![thai_filter(), cheap()]));
    assert_eq!(reply.state.history[1].stmt.expression, refined);
    assert_eq!(reply.state.history[1].confirm, Confirm::Proposed);
    assert_eq!(reply.aux(), Some(&AgentProposal::RefinedQuery(refined.clone())));

    // proposing what is already there
    assert!(make_refinement_proposal(&ctx, &restaurants_where(thai_filter())).unwrap().is_none());

    // 2. "Sure"
    let ctx = user_turn(&reply);
    let yes = positive_proposal_reply(&ctx).unwrap().unwrap();
    assert_eq!(yes.history.len(), 2);
    assert_eq!(yes.history[1].stmt.expression, refined);
    assert_eq!(yes.history[1].confirm, Confirm::Accepted);

    // 3. "No, moderate ones"
    let cheap_one = restaurants_where(cheap());
    let moderate = restaurants_where(Filter::eq("price", Value::Enum("moderate".into())));
    let no = negative_proposal_reply(&ctx, Some(&cheap_one), Some(&moderate)).unwrap().expect("a change");
    let filter = last_filter(&no).unwrap();
    let clauses = filter.conjuncts();
    assert!(clauses.contains(&&thai_filter()));
    assert!(clauses.contains(&&Filter::eq("price", Value::Enum("moderate".into()))));
    assert!(clauses.contains(&&Filter::negate(cheap())));
}

#[test]
fn test_empty_search_recovery() {
    let search = restaurants_where(Filter::And(vec![thai_filter(), cheap()]));
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(search, vec![])]));

    // 1. "Nothing found. Another cuisine?"
    let reply = make_empty_search_error(&ctx, None, Some("cuisine")).unwrap().expect("cuisine caused it");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysEmptySearch);
    assert_eq!(reply.expect, Some(Type::String));
    assert_eq!(reply.aux(), Some(&AgentProposal::EmptySearch(Some("cuisine".into()))));
    assert!(make_empty_search_error(&ctx, None, Some("rating")).unwrap().is_none());
    assert!(make_empty_search_error(&ctx, None, Some("phone")).unwrap().is_none());

    // 2. "Mexican then"
    let ctx = user_turn(&reply);
    let mexican = restaurants_where(Filter::eq("cuisine", Value::string("mexican")));
    let next = empty_search_change_phrase(&ctx, &mexican).unwrap().expect("changes cuisine");
    assert_eq!(
        last_filter(&next),
        Some(Filter::And(vec![cheap(), Filter::eq("cuisine", Value::string("mexican"))]))
    );

    // changing something else than what was asked
    let moderate = restaurants_where(Filter::eq("price", Value::Enum("moderate".into())));
    assert!(empty_search_change_phrase(&ctx, &moderate).unwrap().is_none());
}
