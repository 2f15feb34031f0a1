//! Restaurant and movie fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use transaction_dialogue::ast::{
    ArgumentDef, Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Expression, Filter, FunctionDef,
    FunctionType, InMemorySchemaRegistry, Invocation, ResultItem, ResultList, Statement, Type, Value,
};
use transaction_dialogue::config::POLICY_NAME;
use transaction_dialogue::{get_context_info, ContextInfo, DialogueConfig, DialogueEnv};

pub const RESTAURANT: &str = "com.yelp:restaurant";
pub const MOVIE: &str = "imdb:movie";

fn function(class: &str, name: &str, function_type: FunctionType, is_list: bool, args: Vec<ArgumentDef>) -> FunctionDef {
    FunctionDef {
        class: class.to_string(),
        name: name.to_string(),
        function_type,
        is_list,
        is_monitorable: false,
        args,
        annotations: Default::default(),
    }
}

pub fn functions() -> Vec<FunctionDef> {
    let restaurant = function(
        "com.yelp",
        "restaurant",
        FunctionType::Query,
        true,
        vec![
            ArgumentDef::output("id", Type::Entity(RESTAURANT.into())),
            ArgumentDef::output("cuisine", Type::String),
            ArgumentDef::output("price", Type::Enum(vec!["cheap".into(), "moderate".into(), "expensive".into()])),
            ArgumentDef::output("rating", Type::Number),
            ArgumentDef::output("address", Type::String),
            ArgumentDef::output("phone", Type::String).with_annotation("filterable", json!(false)),
        ],
    );
    let make_reservation = function(
        "com.yelp",
        "make_reservation",
        FunctionType::Action,
        false,
        vec![
            ArgumentDef::input("restaurant", Type::Entity(RESTAURANT.into()), true),
            ArgumentDef::input("book_time", Type::Date, true),
            ArgumentDef::input("party_size", Type::Number, false).with_annotation("default", json!({ "Number": 2.0 })),
            ArgumentDef::input("special_request", Type::String, false)
                .with_annotation("string_values", json!("tt:long_free_text")),
            ArgumentDef::output("reservation_id", Type::String),
        ],
    );
    let movie = function(
        "imdb",
        "movie",
        FunctionType::Query,
        true,
        vec![
            ArgumentDef::output("id", Type::Entity(MOVIE.into())),
            ArgumentDef::output("genre", Type::String),
            ArgumentDef::output("year", Type::Number),
        ],
    );
    let mut play_trailer = function(
        "imdb",
        "play_trailer",
        FunctionType::Action,
        false,
        vec![ArgumentDef::input("movie", Type::Entity(MOVIE.into()), true)],
    );
    play_trailer.annotations.insert("confirm".into(), json!("auto"));

    vec![restaurant, make_reservation, movie, play_trailer]
}

pub fn env() -> DialogueEnv {
    env_with(DialogueConfig::default())
}

pub fn env_with(config: DialogueConfig) -> DialogueEnv {
    DialogueEnv::new(Arc::new(InMemorySchemaRegistry::new(functions())), config)
}

pub fn restaurant_id(id: &str, name: &str) -> Value {
    Value::entity(id, RESTAURANT, Some(name))
}

pub fn restaurant_row(id: &str, name: &str, cuisine: &str, rating: f64) -> ResultItem {
    ResultItem::new([
        ("id".to_string(), restaurant_id(id, name)),
        ("cuisine".to_string(), Value::string(cuisine)),
        ("rating".to_string(), Value::Number(rating)),
        ("address".to_string(), Value::string(format!("{} Main St", name))),
    ])
}

/// Five restaurants: two thai, two mexican, one italian.
pub fn restaurant_rows() -> Vec<ResultItem> {
    vec![
        restaurant_row("r1", "Thai Basil", "thai", 4.5),
        restaurant_row("r2", "Taco Bell", "mexican", 3.0),
        restaurant_row("r3", "Lotus", "thai", 4.0),
        restaurant_row("r4", "El Farolito", "mexican", 4.7),
        restaurant_row("r5", "Nonna", "italian", 4.2),
    ]
}

pub fn restaurants() -> Expression {
    Expression::Invocation(Invocation::new("com.yelp", "restaurant"))
}

pub fn restaurants_where(filter: Filter) -> Expression {
    Expression::filter(restaurants(), filter)
}

pub fn reservation() -> Invocation {
    Invocation::new("com.yelp", "make_reservation")
}

pub fn movies() -> Expression {
    Expression::Invocation(Invocation::new("imdb", "movie"))
}

pub fn item(expression: Expression, confirm: Confirm) -> DialogueHistoryItem {
    DialogueHistoryItem::new(Statement::new(expression), confirm)
}

pub fn executed(expression: Expression, rows: Vec<ResultItem>) -> DialogueHistoryItem {
    DialogueHistoryItem {
        stmt: Statement::new(expression),
        results: Some(ResultList::new(rows)),
        confirm: Confirm::Confirmed,
    }
}

pub fn state(act: DialogueAct, param: Option<Vec<&str>>, history: Vec<DialogueHistoryItem>) -> DialogueState {
    let param = param.map(|names| names.into_iter().map(str::to_string).collect());
    DialogueState::new(POLICY_NAME, act, param, history)
}

pub fn context(state: DialogueState) -> ContextInfo {
    get_context_info(&env(), state).expect("well-formed state")
}

/// The filter of the last query of the last item.
pub fn last_filter(state: &DialogueState) -> Option<Filter> {
    state.history.last().and_then(|item| item.stmt.expression.find_filter().cloned())
}
