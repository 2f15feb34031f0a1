use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use transaction_dialogue::ast::{DialogueState, InMemorySchemaRegistry, Value};
use transaction_dialogue::context::{get_context_info, get_context_phrases, tag_context_for_agent};
use transaction_dialogue::policy::interpret_answer;
use transaction_dialogue::{DialogueConfig, DialogueEnv};

const USAGE: &str = "usage: dialogue-inspect <config.json> <schema.json> <state.json> [--answer <json value>]";

struct Args {
    config: String,
    schema: String,
    state: String,
    answer: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut answer = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--answer" => answer = Some(args.next().context("--answer needs a value")?),
            "-h" | "--help" => bail!(USAGE),
            _ => positional.push(arg),
        }
    }
    let [config, schema, state]: [String; 3] = positional.try_into().map_err(|_| anyhow::anyhow!(USAGE))?;
    Ok(Args { config, schema, state, answer })
}

/// Plain JSON booleans, numbers and strings are accepted besides the tagged
/// `Value` form.
fn parse_answer(json: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(json) {
        return Ok(value);
    }
    match serde_json::from_str::<serde_json::Value>(json).context("answer is not JSON")? {
        serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_json::Value::Number(n) => Ok(Value::Number(n.as_f64().context("answer out of range")?)),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        other => bail!("cannot use {} as an answer", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let args = parse_args()?;

    let config_json = tokio::fs::read_to_string(&args.config).await.with_context(|| format!("reading {}", args.config))?;
    let schema_json = tokio::fs::read_to_string(&args.schema).await.with_context(|| format!("reading {}", args.schema))?;
    let state_json = tokio::fs::read_to_string(&args.state).await.with_context(|| format!("reading {}", args.state))?;

    let config = DialogueConfig::from_json_str(&config_json).context("parsing config")?;
    let registry = InMemorySchemaRegistry::from_json_str(&schema_json).context("parsing schema")?;
    let state = DialogueState::from_json(&state_json).context("parsing dialogue state")?;
    tracing::info!(functions = registry.len(), act = %state.dialogue_act, "loaded");

    let env = DialogueEnv::new(Arc::new(registry), config);
    let ctx = Arc::new(get_context_info(&env, state.clone()).context("building context")?);

    println!("key: {}", serde_json::to_string(&ctx.key)?);
    let tags = tag_context_for_agent(&ctx).context("tagging context")?;
    println!("tags: {}", tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "));
    let phrases = get_context_phrases(&ctx).context("collecting context phrases")?;
    println!("phrases: {}", phrases.iter().map(|p| p.tag.to_string()).collect::<Vec<_>>().join(" "));

    if let Some(answer) = &args.answer {
        let answer = parse_answer(answer)?;
        match interpret_answer(&env, &state, &answer).context("interpreting answer")? {
            Some(next) => println!("{}", next.to_json()?),
            None => println!("answer {} does not apply", answer),
        }
    }
    Ok(())
}
