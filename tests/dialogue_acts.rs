mod common;

use common::*;
use transaction_dialogue::ast::{
    Confirm, DialogueAct, Expression, Filter, Invocation, ResultItem, ResultList, Statement, Type, Value,
};
use transaction_dialogue::dialogue_acts::{
    action_confirm_accept_phrase, action_confirm_change_param, action_confirm_reject_phrase, action_error_change_param,
    action_success_question, add_initial_dont_care, adjust_statements_for_initial_request,
    check_action_error_message, check_filter_pair_for_disjunctive_question, imprecise_search_question_answer,
    imprecise_slot_fill_answer, initial_request, make_action_confirmation_phrase, make_action_error_phrase,
    make_action_success_phrase, make_count_aggregation_reply, make_other_aggregation_reply, make_search_question,
    make_slot_fill_question, precise_search_question_answer, precise_slot_fill_answer, start_new_request, FilterSlot,
    ParamAnswer, ParamSlot, SearchAnswer,
};
use transaction_dialogue::context::AgentProposal;
use transaction_dialogue::slot_bag::SlotBag;
use transaction_dialogue::{get_context_info, DialogueConfig};

fn slot(function: &str, name: &str) -> ParamSlot {
    let function = env().registry.function(function).expect("known function");
    ParamSlot::new(&function, name).expect("known argument")
}

fn cheap() -> Filter {
    Filter::eq("price", Value::Enum("cheap".into()))
}

fn seven_pm() -> Value {
    Value::Date("2026-10-20T19:00:00Z".into())
}

fn booking(book_time: Value) -> Invocation {
    reservation()
        .with_param("restaurant", restaurant_id("r1", "Thai Basil"))
        .with_param("book_time", book_time)
}

fn pending(book_time: Value) -> Vec<transaction_dialogue::ast::DialogueHistoryItem> {
    vec![
        executed(restaurants(), restaurant_rows()),
        item(Expression::Invocation(booking(book_time)), Confirm::Accepted),
    ]
}

#[test]
fn test_search_question_and_imprecise_answer() {
    // 1. Cheap places: ask about cuisine
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants_where(cheap()), restaurant_rows())]));
    let reply = make_search_question(&ctx, &[slot(RESTAURANT, "cuisine")]).unwrap().expect("cuisine is open");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysSearchQuestion);
    assert_eq!(reply.state.dialogue_act_param, Some(vec!["cuisine".to_string()]));
    assert_eq!(reply.expect, Some(Type::String));

    // price is already constrained
    assert!(make_search_question(&ctx, &[slot(RESTAURANT, "price")]).unwrap().is_none());

    // 2. "Mexican"
    let ctx = context(reply.state);
    let next = imprecise_search_question_answer(&ctx, &SearchAnswer::Value(Value::string("mexican")))
        .unwrap()
        .expect("answer fits the question");
    assert_eq!(next.dialogue_act, DialogueAct::Execute);
    assert_eq!(next.history.len(), 2);
    assert_eq!(next.history[1].confirm, Confirm::Accepted);
    let filter = last_filter(&next).unwrap();
    let clauses = filter.conjuncts();
    assert!(clauses.contains(&&Filter::eq("cuisine", Value::string("mexican"))));
    assert!(clauses.contains(&&cheap()));

    // 3. A number is not a cuisine
    assert_eq!(imprecise_search_question_answer(&ctx, &SearchAnswer::Value(Value::Number(3.0))).unwrap(), None);

    // 4. "Any cuisine"
    let next = imprecise_search_question_answer(&ctx, &SearchAnswer::DontCare).unwrap().unwrap();
    assert!(last_filter(&next).unwrap().conjuncts().contains(&&Filter::dont_care("cuisine")));
}

#[test]
fn test_answer_conflicting_with_context_is_rejected() {
    let italian = restaurants_where(Filter::eq("cuisine", Value::string("italian")));
    let ctx = context(state(
        DialogueAct::SysSearchQuestion,
        Some(vec!["cuisine"]),
        vec![executed(italian, vec![restaurant_row("r5", "Nonna", "italian", 4.2)])],
    ));
    let next = imprecise_search_question_answer(&ctx, &SearchAnswer::Value(Value::string("mexican"))).unwrap();
    assert_eq!(next, None);
}

#[test]
fn test_precise_search_answer() {
    let ctx = context(state(
        DialogueAct::SysSearchQuestion,
        Some(vec!["cuisine"]),
        vec![executed(restaurants_where(cheap()), restaurant_rows())],
    ));

    let answer = restaurants_where(Filter::eq("cuisine", Value::string("thai")));
    let next = precise_search_question_answer(&ctx, &answer, None).unwrap().expect("answers cuisine");
    assert_eq!(
        last_filter(&next),
        Some(Filter::And(vec![cheap(), Filter::eq("cuisine", Value::string("thai"))]))
    );

    // does not address the question
    let off_topic = restaurants_where(Filter::eq("address", Value::string("Main St")));
    assert_eq!(precise_search_question_answer(&ctx, &off_topic, None).unwrap(), None);
}

#[test]
fn test_disjunctive_question_needs_both_values_in_results() {
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(restaurants(), restaurant_rows())]));
    let function = env().registry.function(RESTAURANT).unwrap();
    let offer = |value: &str| FilterSlot { function: function.clone(), filter: Filter::eq("cuisine", Value::string(value)) };

    let question = check_filter_pair_for_disjunctive_question(&ctx, &offer("thai"), &offer("mexican"));
    assert_eq!(question.map(|q| q.name), Some("cuisine".to_string()));
    assert!(check_filter_pair_for_disjunctive_question(&ctx, &offer("thai"), &offer("lao")).is_none());
    assert!(check_filter_pair_for_disjunctive_question(&ctx, &offer("thai"), &offer("thai")).is_none());
}

#[test]
fn test_slot_fill_question_and_answers() {
    let ctx = context(state(DialogueAct::Execute, None, pending(Value::Undefined)));

    // 1. Ask for the time
    let reply = make_slot_fill_question(&ctx, &[slot("com.yelp:make_reservation", "book_time")])
        .unwrap()
        .expect("book_time is unset");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysSlotFill);
    assert_eq!(reply.expect, Some(Type::Date));
    assert!(!reply.raw);

    // free text is taken verbatim; the chain parameter is never asked
    let raw = make_slot_fill_question(&ctx, &[slot("com.yelp:make_reservation", "special_request")]).unwrap().unwrap();
    assert!(raw.raw);
    assert!(make_slot_fill_question(&ctx, &[slot("com.yelp:make_reservation", "restaurant")]).unwrap().is_none());

    // 2. "7pm"
    let ctx = context(reply.state);
    let next = imprecise_slot_fill_answer(&ctx, &ParamAnswer::Value(seven_pm())).unwrap().expect("a date fits");
    assert_eq!(next.dialogue_act, DialogueAct::Execute);
    assert_eq!(next.history.len(), 2);
    let invocation = next.history[1].stmt.expression.invocation().unwrap();
    assert_eq!(invocation.param("book_time"), Some(&seven_pm()));
    assert_eq!(invocation.param("restaurant"), Some(&restaurant_id("r1", "Thai Basil")));

    // 3. Wrong type or wrong parameter
    assert_eq!(imprecise_slot_fill_answer(&ctx, &ParamAnswer::Value(Value::Number(7.0))).unwrap(), None);
    let named = ParamAnswer::Named("party_size".into(), Value::Number(4.0));
    assert_eq!(imprecise_slot_fill_answer(&ctx, &named).unwrap(), None);

    // 4. "Book it for 7pm, by the window"
    let answer = reservation()
        .with_param("book_time", seven_pm())
        .with_param("special_request", Value::string("by the window"));
    let next = precise_slot_fill_answer(&ctx, &answer).unwrap().expect("answers book_time");
    let invocation = next.history[1].stmt.expression.invocation().unwrap();
    assert_eq!(invocation.param("special_request"), Some(&Value::string("by the window")));
}

#[test]
fn test_action_confirmation() {
    let ctx = context(state(DialogueAct::Execute, None, pending(seven_pm())));

    // 1. "Book Thai Basil at 7pm?"
    let reply = make_action_confirmation_phrase(&ctx, &booking(seven_pm())).unwrap().expect("complete action");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysConfirmAction);
    assert!(!reply.end);
    assert!(make_action_confirmation_phrase(&ctx, &booking(Value::Date("2026-10-21T19:00:00Z".into())))
        .unwrap()
        .is_none());

    // 2. "Yes"
    let ctx = context(reply.state);
    let accepted = action_confirm_accept_phrase(&ctx).unwrap();
    assert_eq!(accepted.dialogue_act, DialogueAct::Execute);
    assert_eq!(accepted.dialogue_act_param, None);
    assert_eq!(accepted.history.len(), 2);
    assert_eq!(accepted.history[1].confirm, Confirm::Confirmed);
    assert_eq!(accepted.history[1].stmt.expression, Expression::Invocation(booking(seven_pm())));

    // 3. "No"
    let rejected = action_confirm_reject_phrase(&ctx);
    assert_eq!(rejected.dialogue_act, DialogueAct::Cancel);
    assert_eq!(rejected.history, ctx.state.history);

    // 4. "For four people"
    let changed = action_confirm_change_param(&ctx, &slot("com.yelp:make_reservation", "party_size"), Value::Number(4.0))
        .unwrap()
        .expect("party size can change");
    let invocation = changed.history[1].stmt.expression.invocation().unwrap();
    assert_eq!(invocation.param("party_size"), Some(&Value::Number(4.0)));
    assert_eq!(changed.history[1].confirm, Confirm::Accepted);

    // the restaurant can only change by picking another result
    let other = restaurant_id("r3", "Lotus");
    assert!(action_confirm_change_param(&ctx, &slot("com.yelp:make_reservation", "restaurant"), other)
        .unwrap()
        .is_none());
}

#[test]
fn test_incomplete_action_is_not_confirmed() {
    let ctx = context(state(DialogueAct::Execute, None, pending(Value::Undefined)));
    assert!(make_action_confirmation_phrase(&ctx, &booking(Value::Undefined)).unwrap().is_none());
}

#[test]
fn test_action_success() {
    let done = executed(
        Expression::Invocation(booking(seven_pm())),
        vec![ResultItem::new([("reservation_id".to_string(), Value::string("XK42"))])],
    );
    let history = vec![executed(restaurants(), restaurant_rows()), done];
    let ctx = context(state(DialogueAct::Execute, None, history));

    // 1. "Your table is booked"
    let reply = make_action_success_phrase(&ctx, None).unwrap().expect("current is an action");
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysActionSuccess);
    assert!(reply.end);
    assert!(matches!(reply.aux(), Some(AgentProposal::ActionSuccess(info)) if info.is_empty()));

    // 2. "... your confirmation number is XK42"
    let mut info = SlotBag::new(Some("com.yelp:make_reservation".into()));
    info.set("reservation_id", Value::string("XK42"));
    assert!(make_action_success_phrase(&ctx, Some(&info)).unwrap().is_some());
    info.set("reservation_id", Value::string("ZZ99"));
    assert!(make_action_success_phrase(&ctx, Some(&info)).unwrap().is_none());

    // 3. "What's the confirmation number?"
    let asked = action_success_question(&ctx, &[slot("com.yelp:make_reservation", "reservation_id")])
        .unwrap()
        .expect("an output");
    assert_eq!(asked.dialogue_act, DialogueAct::ActionQuestion);
    assert_eq!(asked.dialogue_act_param, Some(vec!["reservation_id".to_string()]));
    assert!(action_success_question(&ctx, &[slot("com.yelp:make_reservation", "book_time")]).unwrap().is_none());
}

#[test]
fn test_action_error_and_retry() {
    let mut failed = executed(Expression::Invocation(booking(seven_pm())), vec![]);
    failed.results = Some(ResultList { error: Some(Value::Enum("no_tables".into())), ..ResultList::new(vec![]) });
    let history = vec![executed(restaurants(), restaurant_rows()), failed];
    let ctx = context(state(DialogueAct::Execute, None, history));

    // 1. The description must match what happened
    assert!(check_action_error_message(&ctx, "no_tables", &booking(seven_pm())).unwrap());
    assert!(!check_action_error_message(&ctx, "closed", &booking(seven_pm())).unwrap());
    let elsewhere = reservation().with_param("restaurant", restaurant_id("r3", "Lotus"));
    assert!(!check_action_error_message(&ctx, "no_tables", &elsewhere).unwrap());

    // 2. "Sorry, no tables. Another time?"
    let reply = make_action_error_phrase(&ctx, &[slot("com.yelp:make_reservation", "book_time")]).unwrap().unwrap();
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysActionErrorQuestion);
    assert_eq!(reply.expect, Some(Type::Date));
    assert_eq!(reply.aux(), Some(&AgentProposal::ActionError));

    // 3. "8pm then"
    let ctx = context(reply.state);
    let eight_pm = Value::Date("2026-10-20T20:00:00Z".into());
    let retry = action_error_change_param(&ctx, &ParamAnswer::Value(eight_pm.clone())).unwrap().unwrap();
    assert_eq!(retry.dialogue_act, DialogueAct::Execute);
    assert_eq!(retry.history.len(), 3);
    let invocation = retry.history[2].stmt.expression.invocation().unwrap();
    assert_eq!(invocation.param("book_time"), Some(&eight_pm));
    assert_eq!(invocation.param("restaurant"), Some(&restaurant_id("r1", "Thai Basil")));

    let wrong_type = ParamAnswer::Value(Value::string("later"));
    assert_eq!(action_error_change_param(&ctx, &wrong_type).unwrap(), None);
}

#[test]
fn test_aggregation_replies() {
    let aggregate = |operator: &str, field: &str| Expression::Aggregation {
        expression: Box::new(restaurants_where(cheap())),
        field: field.into(),
        operator: operator.into(),
    };

    // 1. Average rating
    let row = ResultItem::new([("rating".to_string(), Value::Number(4.1))]);
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(aggregate("avg", "rating"), vec![row])]));
    let reply = make_other_aggregation_reply(&ctx, "avg", "rating", &Value::Number(4.1)).unwrap().unwrap();
    assert_eq!(reply.state.dialogue_act, DialogueAct::SysDisplayResult);
    assert_eq!(reply.num_results, 1);
    assert!(make_other_aggregation_reply(&ctx, "avg", "rating", &Value::Number(3.0)).unwrap().is_none());
    assert!(make_other_aggregation_reply(&ctx, "max", "rating", &Value::Number(4.1)).unwrap().is_none());

    // 2. Count
    let row = ResultItem::new([("count".to_string(), Value::Number(12.0))]);
    let ctx = context(state(DialogueAct::Execute, None, vec![executed(aggregate("count", "*"), vec![row])]));
    assert!(make_count_aggregation_reply(&ctx, &Value::Number(12.0)).unwrap().is_some());
    assert!(make_count_aggregation_reply(&ctx, &Value::Number(11.0)).unwrap().is_none());
}

#[test]
fn test_initial_request_splits_actions() {
    let env = env();
    let registry = env.registry.as_ref();

    // 1. "Book a table at 7pm for two": the restaurant search goes first
    let stmt = Statement::new(Expression::Invocation(
        reservation().with_param("book_time", seven_pm()).with_param("party_size", Value::Number(2.0)),
    ));
    let statements = adjust_statements_for_initial_request(&stmt, registry).unwrap().expect("splittable");
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].expression, restaurants());
    let action = statements[1].expression.invocation().unwrap();
    assert_eq!(action.param("book_time"), Some(&seven_pm()));
    assert_eq!(action.param("party_size"), None);

    // 2. Naming the restaurant directly is not an initial request
    let named = Statement::new(Expression::Invocation(booking(seven_pm())));
    assert_eq!(adjust_statements_for_initial_request(&named, registry).unwrap(), None);

    // 3. Auto-confirmed actions stay chained to their search
    let play = Statement::new(Expression::Invocation(Invocation::new("imdb", "play_trailer")));
    let statements = adjust_statements_for_initial_request(&play, registry).unwrap().unwrap();
    match &statements[..] {
        [only] => match &only.expression {
            Expression::Chain(steps) => {
                assert_eq!(steps[0], movies());
                assert_eq!(steps[1].invocation().unwrap().param("movie"), Some(&Value::VarRef("id".into())));
            }
            other => panic!("Expected Chain, got {:?}", other),
        },
        other => panic!("Expected one statement, got {:?}", other),
    }

    // 4. A search piped into a confirmed action is split, the id left open
    let thai = restaurants_where(Filter::eq("cuisine", Value::string("thai")));
    let piped = Statement::new(Expression::Chain(vec![
        thai.clone(),
        Expression::Invocation(reservation().with_param("restaurant", Value::VarRef("id".into()))),
    ]));
    let statements = adjust_statements_for_initial_request(&piped, registry).unwrap().unwrap();
    assert_eq!(statements[0].expression, thai);
    assert!(statements[1].expression.invocation().unwrap().param("restaurant").unwrap().is_undefined());

    // only the id can flow into the action
    let other_ref = Statement::new(Expression::Chain(vec![
        thai,
        Expression::Invocation(reservation().with_param("special_request", Value::VarRef("address".into()))),
    ]));
    assert_eq!(adjust_statements_for_initial_request(&other_ref, registry).unwrap(), None);

    // 5. Picking a result by id up front
    let by_id = Statement::new(restaurants_where(Filter::eq("id", restaurant_id("r1", "Thai Basil"))));
    assert_eq!(adjust_statements_for_initial_request(&by_id, registry).unwrap(), None);
}

#[test]
fn test_initial_and_new_requests() {
    let env = env();
    let stmt = Statement::new(restaurants_where(cheap()));
    let first = initial_request(&env, &stmt).unwrap().unwrap();
    assert_eq!(first.dialogue_act, DialogueAct::Execute);
    assert_eq!(first.history.len(), 1);
    assert_eq!(first.history[0].confirm, Confirm::Accepted);

    // strict multidomain: a new request has to switch devices
    let strict = env_with(DialogueConfig { strict_multidomain: true, ..DialogueConfig::default() });
    let history = vec![executed(restaurants(), restaurant_rows())];
    let ctx = get_context_info(&strict, state(DialogueAct::Execute, None, history.clone())).unwrap();
    assert!(start_new_request(&ctx, &stmt).unwrap().is_none());
    let switched = start_new_request(&ctx, &Statement::new(movies())).unwrap().unwrap();
    assert_eq!(switched.history.len(), 2);
    assert_eq!(switched.history[1].stmt.expression, movies());

    let ctx = context(state(DialogueAct::Execute, None, history));
    assert!(start_new_request(&ctx, &stmt).unwrap().is_some());
}

#[test]
fn test_initial_dont_care() {
    let env = env();
    let registry = env.registry.as_ref();
    let function = registry.function(RESTAURANT).unwrap();
    let dont_care = |name: &str| FilterSlot { function: function.clone(), filter: Filter::dont_care(name) };

    let stmt = Statement::new(restaurants_where(cheap()));
    let with_any_cuisine = add_initial_dont_care(&stmt, &dont_care("cuisine"), registry).unwrap().unwrap();
    assert_eq!(
        with_any_cuisine.expression,
        restaurants_where(Filter::And(vec![cheap(), Filter::dont_care("cuisine")]))
    );

    let bare = Statement::new(restaurants());
    let any = add_initial_dont_care(&bare, &dont_care("cuisine"), registry).unwrap().unwrap();
    assert_eq!(any.expression, restaurants_where(Filter::dont_care("cuisine")));

    // already constrained, or not filterable
    assert!(add_initial_dont_care(&stmt, &dont_care("price"), registry).unwrap().is_none());
    assert!(add_initial_dont_care(&stmt, &dont_care("phone"), registry).unwrap().is_none());
}
