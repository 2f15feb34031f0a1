mod common;

use common::*;
use transaction_dialogue::ast::{Confirm, DialogueAct, DialogueState, Expression, Filter, Value};
use transaction_dialogue::context::AgentProposal;
use transaction_dialogue::dialogue_acts::{imprecise_search_question_answer, make_recommendation, make_recommendation_reply, SearchAnswer};
use transaction_dialogue::policy::{initial_state, interpret_answer};
use transaction_dialogue::{DialogueConfig, DialogueError, DialogueSession};

fn seven_pm() -> Value {
    Value::Date("2026-10-20T19:00:00Z".into())
}

fn answer(state: &DialogueState, value: Value) -> Option<DialogueState> {
    interpret_answer(&env(), state, &value).expect("well-formed state")
}

fn answer_act(state: &DialogueState, value: Value) -> Option<DialogueAct> {
    answer(state, value).map(|next| next.dialogue_act)
}

#[test]
fn test_yes_no_on_proposals() {
    let thai = restaurants_where(Filter::eq("cuisine", Value::string("thai")));
    let proposal = state(
        DialogueAct::SysProposeRefinedQuery,
        None,
        vec![executed(restaurants(), restaurant_rows()), item(thai.clone(), Confirm::Proposed)],
    );

    // 1. "Yes" leaves only the accepted proposal to run
    let yes = answer(&proposal, Value::Boolean(true)).expect("a proposal to accept");
    assert_eq!(yes.dialogue_act, DialogueAct::Execute);
    assert_eq!(yes.history.len(), 1);
    assert_eq!(yes.history[0].stmt.expression, thai);
    assert_eq!(yes.history[0].confirm, Confirm::Accepted);

    // 2. "No" keeps the executed search
    let no = answer(&proposal, Value::Boolean(false)).unwrap();
    assert_eq!(no.dialogue_act, DialogueAct::Cancel);
    assert_eq!(no.history.len(), 1);
}

#[test]
fn test_yes_no_on_agent_acts() {
    let search = || vec![executed(restaurants(), restaurant_rows())];

    let record = state(DialogueAct::SysRecordCommand, None, search());
    assert_eq!(answer_act(&record, Value::string("anything")), Some(DialogueAct::End));

    let anything_else = state(DialogueAct::SysAnythingElse, None, search());
    assert_eq!(answer_act(&anything_else, Value::Boolean(true)), Some(DialogueAct::Reinit));
    assert_eq!(answer_act(&anything_else, Value::Boolean(false)), Some(DialogueAct::End));

    let recommend = state(DialogueAct::SysRecommendOne, None, search());
    assert_eq!(answer_act(&recommend, Value::Boolean(true)), Some(DialogueAct::LearnMore));
    assert_eq!(answer_act(&recommend, Value::Boolean(false)), Some(DialogueAct::Cancel));

    let display = state(DialogueAct::SysDisplayResult, None, search());
    assert_eq!(answer_act(&display, Value::Boolean(false)), Some(DialogueAct::Cancel));
    assert_eq!(answer_act(&display, Value::Boolean(true)), None);

    let empty = state(DialogueAct::SysEmptySearch, None, vec![executed(restaurants(), vec![])]);
    assert_eq!(answer_act(&empty, Value::Boolean(true)), None);
}

#[test]
fn test_values_for_questions() {
    // 1. Slot fill
    let booking = Expression::Invocation(
        reservation().with_param("restaurant", restaurant_id("r1", "Thai Basil")).with_param("book_time", Value::Undefined),
    );
    let slot_fill = state(
        DialogueAct::SysSlotFill,
        Some(vec!["book_time"]),
        vec![executed(restaurants(), restaurant_rows()), item(booking, Confirm::Accepted)],
    );
    let filled = answer(&slot_fill, seven_pm()).expect("a date fits");
    assert_eq!(filled.history[1].stmt.expression.invocation().unwrap().param("book_time"), Some(&seven_pm()));

    // 2. Search question
    let question = state(
        DialogueAct::SysSearchQuestion,
        Some(vec!["cuisine"]),
        vec![executed(restaurants(), restaurant_rows())],
    );
    let narrowed = answer(&question, Value::string("thai")).unwrap();
    assert_eq!(last_filter(&narrowed), Some(Filter::eq("cuisine", Value::string("thai"))));

    // same as parsing "thai" as the answer
    let ctx = context(question.clone());
    let parsed = imprecise_search_question_answer(&ctx, &SearchAnswer::Value(Value::string("thai"))).unwrap();
    assert_eq!(parsed, Some(narrowed));

    // 3. Confirmation
    let confirm = state(
        DialogueAct::SysConfirmAction,
        None,
        vec![
            executed(restaurants(), restaurant_rows()),
            item(
                Expression::Invocation(
                    reservation().with_param("restaurant", restaurant_id("r1", "Thai Basil")).with_param("book_time", seven_pm()),
                ),
                Confirm::Accepted,
            ),
        ],
    );
    let go = answer(&confirm, Value::Boolean(true)).unwrap();
    assert_eq!(go.history[1].confirm, Confirm::Confirmed);
    assert_eq!(answer_act(&confirm, Value::Boolean(false)), Some(DialogueAct::Cancel));
}

#[test]
fn test_initial_state() {
    assert!(initial_state(&env()).unwrap().is_none());

    let config = DialogueConfig { initial_function: Some("com.yelp:make_reservation".into()), ..DialogueConfig::default() };
    let init = initial_state(&env_with(config)).unwrap().expect("configured");
    assert_eq!(init.dialogue_act, DialogueAct::Init);
    assert_eq!(init.history.len(), 1);
    let invocation = init.history[0].stmt.expression.invocation().unwrap();
    assert!(invocation.param("restaurant").unwrap().is_undefined());
    assert!(invocation.param("book_time").unwrap().is_undefined());
    assert!(invocation.param("party_size").is_none());

    let config = DialogueConfig { initial_function: Some("org.example:missing".into()), ..DialogueConfig::default() };
    match initial_state(&env_with(config)) {
        Err(DialogueError::UnknownFunction(name)) => assert_eq!(name, "org.example:missing"),
        other => panic!("Expected UnknownFunction, got {:?}", other),
    }
}

#[test]
fn test_session_keeps_proposal_for_one_turn() {
    let mut session = DialogueSession::resume(env(), state(DialogueAct::Execute, None, vec![executed(restaurants(), restaurant_rows())]));
    assert!(session.aux().is_none());

    // 1. Agent recommends
    let ctx = session.context().unwrap().expect("resumed");
    let rec = make_recommendation(&ctx, &restaurant_id("r1", "Thai Basil")).unwrap().unwrap();
    let reply = make_recommendation_reply(&ctx, &rec).unwrap().unwrap();
    session.apply_agent_turn(reply);
    assert_eq!(session.state().map(|s| &s.dialogue_act), Some(&DialogueAct::SysRecommendOne));
    assert!(matches!(session.aux(), Some(AgentProposal::Recommendation(_))));

    // 2. The user's context sees it
    let ctx = session.context().unwrap().unwrap();
    assert!(matches!(ctx.aux, Some(AgentProposal::Recommendation(_))));

    // 3. After the user's turn it is gone
    let learn_more = answer(session.state().unwrap(), Value::Boolean(true)).unwrap();
    session.apply_user_turn(learn_more);
    assert!(session.aux().is_none());
    assert!(session.context().unwrap().unwrap().aux.is_none());

    // 4. Persisted form carries the state only
    let json = session.to_json().unwrap().unwrap();
    assert_eq!(DialogueState::from_json(&json).unwrap().dialogue_act, DialogueAct::LearnMore);
}

#[test]
fn test_empty_session() {
    let session = DialogueSession::new(env());
    assert!(session.state().is_none());
    assert!(session.context().unwrap().is_none());
    assert!(session.to_json().unwrap().is_none());

    let config = DialogueConfig { initial_function: Some("imdb:play_trailer".into()), ..DialogueConfig::default() };
    let session = DialogueSession::with_initial_state(env_with(config)).unwrap();
    assert_eq!(session.state().map(|s| s.dialogue_act.clone()), Some(DialogueAct::Init));
}

#[tokio::test]
async fn test_sessions_run_on_separate_tasks() {
    let handles: Vec<_> = ["thai", "mexican"]
        .into_iter()
        .map(|cuisine| {
            tokio::spawn(async move {
                let question = state(
                    DialogueAct::SysSearchQuestion,
                    Some(vec!["cuisine"]),
                    vec![executed(restaurants(), restaurant_rows())],
                );
                let mut session = DialogueSession::resume(env(), question);
                let next = answer(session.state().unwrap(), Value::string(cuisine)).unwrap();
                session.apply_user_turn(next);
                (session.id, session.state().and_then(last_filter))
            })
        })
        .collect();

    let mut ids = Vec::new();
    for (handle, cuisine) in handles.into_iter().zip(["thai", "mexican"]) {
        let (id, filter) = handle.await.unwrap();
        assert_eq!(filter, Some(Filter::eq("cuisine", Value::string(cuisine))));
        ids.push(id);
    }
    assert_ne!(ids[0], ids[1]);
}
