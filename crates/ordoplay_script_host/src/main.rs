// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line host for `OrdoPlay` scripts.
//!
//! Loads a script document, binds it to a stand-in host object with the
//! usual engine singletons and dispatches one event to it.
//!
//! ```text
//! ordoplay_script_host <script.ron> [event] [settings.ron]
//! ```

use ordoplay_script::config::ConfigError;
use ordoplay_script::nodes::events::READY_EVENT;
use ordoplay_script::{
    EngineConfig, ExecutionError, HostSingletons, ObjectRef, Script, ScriptError, ScriptInstance,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "ordoplay_script=debug,ordoplay_script_host=info";

/// Object ID given to the host object scripts attach to
const OWNER_ID: u64 = 1000;

#[derive(Debug, thiserror::Error)]
enum HostError {
    #[error("usage: ordoplay_script_host <script.ron> [event] [settings.ron]")]
    Usage,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

struct HostArgs {
    script: PathBuf,
    event: String,
    settings: Option<PathBuf>,
}

impl HostArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, HostError> {
        let script = args.next().map(PathBuf::from).ok_or(HostError::Usage)?;
        let event = args.next().unwrap_or_else(|| READY_EVENT.to_string());
        let settings = args.next().map(PathBuf::from);
        if args.next().is_some() {
            return Err(HostError::Usage);
        }
        Ok(Self {
            script,
            event,
            settings,
        })
    }
}

fn engine_singletons() -> HostSingletons {
    HostSingletons::new()
        .with("Engine", ObjectRef::new(1, "Engine"))
        .with("OS", ObjectRef::new(2, "OS"))
        .with("Input", ObjectRef::new(3, "Input"))
}

fn run(args: HostArgs) -> Result<usize, HostError> {
    let config = match &args.settings {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let script = Script::load(&args.script)?;
    tracing::info!(
        "Loaded script '{}' with {} graph(s) and {} function(s)",
        script.metadata().name,
        script.graph_count(),
        script.function_names().len()
    );

    let owner = ObjectRef::new(OWNER_ID, script.metadata().base_type.clone());
    let instance = ScriptInstance::new(&script, owner, Rc::new(engine_singletons()), config);
    drop(script);

    Ok(instance.dispatch(&args.event)?)
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OrdoPlay script host v{}", env!("CARGO_PKG_VERSION"));

    let result = HostArgs::parse(std::env::args().skip(1)).and_then(|args| {
        let event = args.event.clone();
        run(args).map(|count| (event, count))
    });

    match result {
        Ok((event, 0)) => {
            tracing::warn!("No event node handles '{event}'");
            ExitCode::SUCCESS
        }
        Ok((event, count)) => {
            tracing::info!("Dispatched '{event}' to {count} entry point(s)");
            ExitCode::SUCCESS
        }
        Err(HostError::Usage) => {
            eprintln!("{}", HostError::Usage);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("Script host failed: {e}");
            ExitCode::FAILURE
        }
    }
}
