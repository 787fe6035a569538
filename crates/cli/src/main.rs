use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use funcmesh_api::prepare_invocation;
use funcmesh_engine::{CapabilityType, StubFactory, UntypedConsumer, UntypedFunction, UntypedProducer};
use funcmesh_types::CapabilityShape;
use funcmesh_util::{LayeredProperties, Properties, default_config_path, expand_tilde, load_properties, redact_sensitive};
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();
    let properties = Arc::new(load_cli_properties(&matches)?);
    let factory = StubFactory::from_properties(properties).context("failed to build HTTP client")?;

    match matches.subcommand() {
        Some(("resolve", sub)) => run_resolve(&factory, sub),
        Some(("invoke", sub)) => run_invoke(&factory, sub).await,
        Some(("sign", sub)) => run_sign(&factory, sub),
        _ => bail!("expected a subcommand: resolve, invoke or sign"),
    }
}

fn init_tracing() {
    let raw = std::env::var("RUST_LOG").ok();
    let _ = log_subscriber(log_filter(raw.as_deref())).try_init();
}

/// Directives from `RUST_LOG`, falling back to `info` when unset or unparsable.
fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).finish()
}

fn build_cli() -> Command {
    let shape_arg = Arg::new("shape")
        .long("shape")
        .short('s')
        .action(ArgAction::Set)
        .default_value("function")
        .help("Calling convention: function, producer or consumer");
    let data_arg = Arg::new("data")
        .long("data")
        .short('d')
        .action(ArgAction::Set)
        .help("JSON argument sent as the request body");

    Command::new("funcmesh")
        .about("Resolve, call and inspect remote capabilities")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .action(ArgAction::Set)
                .help("Path to a YAML or JSON properties file"),
        )
        .arg(
            Arg::new("property")
                .long("property")
                .short('p')
                .global(true)
                .action(ArgAction::Append)
                .help("Override a property, as key=value"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the resolved endpoint of each capability")
                .arg(Arg::new("names").required(true).num_args(1..).action(ArgAction::Append)),
        )
        .subcommand(
            Command::new("invoke")
                .about("Call a capability and print the decoded response")
                .arg(Arg::new("name").required(true))
                .arg(shape_arg.clone())
                .arg(data_arg.clone()),
        )
        .subcommand(
            Command::new("sign")
                .about("Print the request a call would send, without sending it")
                .arg(Arg::new("name").required(true))
                .arg(shape_arg)
                .arg(data_arg),
        )
}

/// Properties from the config file, with `--property` overrides layered on top.
fn load_cli_properties(matches: &ArgMatches) -> Result<LayeredProperties> {
    let path: PathBuf = matches
        .get_one::<String>("config")
        .map(|raw| expand_tilde(raw))
        .unwrap_or_else(default_config_path);
    let file = load_properties(&path).with_context(|| format!("failed to load properties from {}", path.display()))?;
    debug!(path = %path.display(), "loaded properties file");

    let mut overrides = Properties::new();
    for raw in matches.get_many::<String>("property").into_iter().flatten() {
        overrides.apply_override(raw)?;
    }
    Ok(LayeredProperties::new().with_layer(Arc::new(file)).with_layer(Arc::new(overrides)))
}

fn run_resolve(factory: &StubFactory, matches: &ArgMatches) -> Result<()> {
    let resolutions: Vec<Value> = matches
        .get_many::<String>("names")
        .into_iter()
        .flatten()
        .map(|name| factory.resolver().explain(name).to_json())
        .collect();
    println!("{}", serde_json::to_string_pretty(&resolutions)?);
    Ok(())
}

fn parse_shape(matches: &ArgMatches) -> Result<CapabilityShape> {
    let raw = matches.get_one::<String>("shape").map(String::as_str).unwrap_or("function");
    raw.parse::<CapabilityShape>().map_err(anyhow::Error::msg)
}

fn parse_data(matches: &ArgMatches) -> Result<Option<Value>> {
    matches
        .get_one::<String>("data")
        .map(|raw| serde_json::from_str(raw).context("--data must be valid JSON"))
        .transpose()
}

fn required_name(matches: &ArgMatches) -> Result<&str> {
    matches.get_one::<String>("name").map(String::as_str).context("missing capability name")
}

async fn run_invoke(factory: &StubFactory, matches: &ArgMatches) -> Result<()> {
    let name = required_name(matches)?;
    let shape = parse_shape(matches)?;
    let data = parse_data(matches)?;

    let reply = match shape {
        CapabilityShape::Function => {
            let stub: UntypedFunction = factory.make_stub(name);
            stub.call(&data.unwrap_or(Value::Null)).await?
        }
        CapabilityShape::Producer => {
            if data.is_some() {
                bail!("producers take no input; drop --data");
            }
            let stub: UntypedProducer = factory.make_stub(name);
            stub.get().await?
        }
        CapabilityShape::Consumer => {
            let stub: UntypedConsumer = factory.make_stub(name);
            stub.accept(&data.unwrap_or(Value::Null)).await?;
            None
        }
    };
    println!("{}", serde_json::to_string_pretty(&reply.unwrap_or(Value::Null))?);
    Ok(())
}

fn run_sign(factory: &StubFactory, matches: &ArgMatches) -> Result<()> {
    let name = required_name(matches)?;
    let shape = parse_shape(matches)?;
    let data = parse_data(matches)?.unwrap_or(Value::Null);

    let endpoint = match shape {
        CapabilityShape::Function => factory.make_stub::<UntypedFunction>(name).endpoint().clone(),
        CapabilityShape::Producer => factory.make_stub::<UntypedProducer>(name).endpoint().clone(),
        CapabilityShape::Consumer => factory.make_stub::<UntypedConsumer>(name).endpoint().clone(),
    };
    let invocation = prepare_invocation(name, shape, endpoint, Some(&data))?;
    let headers = factory.dispatcher().request_headers(&invocation)?;

    let mut headers_out = serde_json::Map::new();
    for (header, value) in &headers {
        let line = format!("{}: {}", header.as_str(), value.to_str().unwrap_or(""));
        let redacted = redact_sensitive(&line);
        let out_value = redacted.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("").to_string();
        headers_out.insert(header.as_str().to_string(), Value::String(out_value));
    }
    let body = invocation.payload.as_deref().map(String::from_utf8_lossy);
    let out = json!({
        "method": invocation.method.as_str(),
        "url": invocation.endpoint.url,
        "authMode": invocation.endpoint.auth_mode,
        "headers": headers_out,
        "body": body,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
