//! Interactive chat against an inline-agent endpoint.
//!
//! Usage:
//!   INLINE_AGENT_URL=http://localhost:8080 cargo run --example chat
//!   cargo run --example chat -- --url http://localhost:8080 --trace-level standard
//!   cargo run --example chat -- --config agent.json --session-id chat-1 --sessions-dir .sessions
//!   cargo run --example chat --features bedrock -- --bedrock --region us-east-1
//!
//! Type "exit" / "quit" to leave, "file:<path>" to attach a file,
//! "clear files" to drop attachments.

use std::io;

use clap::Parser;
use inline_agent::{
    chat::run_chat, ActionGroup, Agent, AgentConfig, AgentRuntime, Args, FileSessionStore,
    FnHandler, HttpAgentRuntime, NoSessionStore, ParamSpec, SessionStore, ToolDef, ToolError, ToolRegistry,
    TraceLevel, Verbosity,
};
use serde_json::json;

#[derive(Parser)]
#[command(name = "chat", about = "Chat with an inline agent")]
struct Cli {
    /// Endpoint base URL
    #[arg(long, env = "INLINE_AGENT_URL")]
    url: Option<String>,

    /// Call InvokeInlineAgent through the AWS SDK instead of --url
    #[cfg(feature = "bedrock")]
    #[arg(long)]
    bedrock: bool,

    /// AWS region for --bedrock; defaults to the provider chain
    #[cfg(feature = "bedrock")]
    #[arg(long)]
    region: Option<String>,

    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<String>,

    /// Foundation model id
    #[arg(long)]
    model: Option<String>,

    /// Agent instruction
    #[arg(long, short = 'i')]
    instruction: Option<String>,

    /// Max remote calls per message
    #[arg(long)]
    max_turns: Option<usize>,

    /// quiet, normal, verbose or debug
    #[arg(long, default_value = "normal")]
    verbosity: Verbosity,

    /// none, minimal, standard, detailed or raw
    #[arg(long)]
    trace_level: Option<TraceLevel>,

    /// Let the remote agent run code on attached files
    #[arg(long)]
    code_interpreter: bool,

    /// Session to continue
    #[arg(long)]
    session_id: Option<String>,

    /// Persist sessions as JSON files in this directory
    #[arg(long)]
    sessions_dir: Option<String>,
}

fn demo_tools() -> ToolRegistry {
    ToolRegistry::new()
        .add(
            ToolDef::new(
                "get_time",
                FnHandler::new(|_: &Args| {
                    Ok(json!({ "time": chrono::Utc::now().to_rfc3339() }))
                }),
            )
            .doc("Get the current UTC time."),
        )
        .add_group(
            ActionGroup::new("MathActions", "Basic arithmetic").tool(
                ToolDef::new(
                    "divide",
                    FnHandler::new(|args: &Args| {
                        let divisor = args.f64("b")?;
                        if divisor == 0.0 {
                            return Err(ToolError::Failed("division by zero".into()));
                        }
                        let result = args.f64("a")? / divisor;
                        Ok(json!({ "result": result }))
                    }),
                )
                .doc("Divide two numbers.\n:param a: Dividend\n:param b: Divisor")
                .param(ParamSpec::number("a"))
                .param(ParamSpec::number("b")),
            ),
        )
}

/// Pick the runtime and describe it for the banner.
async fn build_runtime(cli: &Cli) -> (Box<dyn AgentRuntime>, String) {
    #[cfg(feature = "bedrock")]
    {
        if cli.bedrock {
            let runtime = match cli.region {
                Some(ref region) => {
                    inline_agent::BedrockAgentRuntime::with_region(region.clone()).await
                }
                None => inline_agent::BedrockAgentRuntime::from_env().await,
            };
            let region = cli.region.as_deref().unwrap_or("default region");
            return (Box::new(runtime), format!("bedrock ({region})"));
        }
    }

    let Some(ref url) = cli.url else {
        eprintln!("error: --url or INLINE_AGENT_URL is required");
        std::process::exit(1);
    };
    let mut runtime = HttpAgentRuntime::new(url);
    if let Ok(key) = std::env::var("INLINE_AGENT_API_KEY") {
        runtime = runtime.with_api_key(key);
    }
    (Box::new(runtime), url.clone())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.verbosity.filter_directive().into()),
        )
        .with_target(false)
        .init();

    let (runtime, endpoint) = build_runtime(&cli).await;

    let mut config = match cli.config {
        Some(ref path) => AgentConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        }),
        None => AgentConfig::default(),
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(instruction) = cli.instruction {
        config.instruction = instruction;
    }
    if let Some(max_turns) = cli.max_turns {
        config.max_turns = max_turns;
    }
    if let Some(level) = cli.trace_level {
        config.trace_level = level;
    }
    config.enable_code_interpreter |= cli.code_interpreter;
    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    eprintln!("inline-agent chat");
    eprintln!("endpoint: {endpoint}");
    eprintln!("model: {}", config.model);
    eprintln!("---");

    let mut agent = Agent::new(runtime, demo_tools(), config);
    let store: Box<dyn SessionStore> = match cli.sessions_dir {
        Some(dir) => Box::new(FileSessionStore::new(dir)),
        None => Box::new(NoSessionStore),
    };

    let stdin = io::stdin();
    match run_chat(
        &mut agent,
        store.as_ref(),
        cli.session_id,
        stdin.lock(),
        io::stdout(),
    )
    .await
    {
        Ok(session) => eprintln!("bye. (session {}, {} messages)", session.id, session.messages),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
