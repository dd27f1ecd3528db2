//! liveosc CLI - The `liveosc` command.
//!
//! Drives Ableton Live through AbletonOSC from the terminal. Every tool the
//! session knows can be called once (`liveosc tool`) or fed as JSON lines
//! on stdin (`liveosc serve`), which is how an assistant front end talks to it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use liveosc_core::arrangement;
use liveosc_core::osc;
use liveosc_core::{tool_catalogue, Config, ConnectOutcome, Session, Transport};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// liveosc - Ableton Live remote control over OSC
#[derive(Parser, Debug)]
#[command(name = "liveosc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate patterns and arrangements and place them in Ableton Live", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host where AbletonOSC listens
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port where AbletonOSC listens
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Local port for replies from Live
    #[arg(long, global = true)]
    listen_port: Option<u16>,

    /// Seed for reproducible patterns
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Never contact Live
    #[arg(long, global = true)]
    offline: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a commented default config file
    Init,

    /// Check whether Live answers
    Ping,

    /// Call one tool and print its result
    Tool {
        /// Tool name, see `liveosc tools`
        name: String,

        /// Tool parameters as a JSON object
        #[arg(long, value_name = "JSON")]
        params: Option<String>,
    },

    /// Read `{"tool": ..., "params": {...}}` lines from stdin, answer one line each
    Serve,

    /// Send a raw OSC message and print the reply
    Query {
        /// OSC address, e.g. /live/song/get/tempo
        path: String,

        /// Arguments; numbers and true/false are typed automatically
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Print every message that arrives in the capture window
        #[arg(long)]
        raw: bool,
    },

    /// List genre templates
    Genres,

    /// Print an arrangement for a genre without touching Live
    Arrange {
        genre: String,

        /// Target length in minutes
        #[arg(long, default_value_t = 3.0)]
        minutes: f64,

        /// Tempo in BPM (defaults to the genre's tempo)
        #[arg(long)]
        tempo: Option<f64>,

        /// Key, e.g. Am or F#m
        #[arg(long)]
        key: Option<String>,
    },

    /// Print the tool catalogue as JSON
    Tools,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    if let Commands::Init = args.command {
        return init_config(args.config.as_deref());
    }

    let config = load_config(&args)?;
    match args.command {
        Commands::Init => Ok(()),
        Commands::Ping => ping(config, args.offline),
        Commands::Tool { name, params } => run_tool(config, args.offline, &name, params.as_deref()),
        Commands::Serve => serve(config, args.offline),
        Commands::Query { path, args: tokens, raw } => query(&config, &path, &tokens, raw),
        Commands::Genres => {
            for genre in arrangement::list_genres() {
                println!("{}", genre);
            }
            Ok(())
        }
        Commands::Arrange {
            genre,
            minutes,
            tempo,
            key,
        } => {
            if arrangement::template(&genre).is_none() {
                log::warn!("Unknown genre '{}', using edm", genre);
            }
            let plan = arrangement::generate_from_template(&genre, minutes, tempo, key.as_deref());
            println!("{}", plan.describe());
            Ok(())
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tool_catalogue())?);
            Ok(())
        }
    }
}

/// Info by default, debug with `--verbose`; `RUST_LOG` wins over both.
fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn init_config(path: Option<&std::path::Path>) -> Result<()> {
    let path = match path {
        Some(path) => {
            Config::write_default_config_file(path)
                .with_context(|| format!("Failed to write config: {}", path.display()))?;
            path.to_path_buf()
        }
        None => Config::create_default_config_file().context("Failed to write config")?,
    };
    println!("Wrote {}", path.display());
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::load_or_default(),
    };
    if let Some(host) = &args.host {
        config.endpoint.remote_host = host.clone();
    }
    if let Some(port) = args.port {
        config.endpoint.remote_port = port;
    }
    if let Some(port) = args.listen_port {
        config.endpoint.listen_port = port;
    }
    if args.seed.is_some() {
        config.generation.seed = args.seed;
    }
    Ok(config)
}

fn open_session(config: Config, offline: bool) -> Session {
    if offline {
        return Session::offline(config);
    }
    let mut session = Session::new(config);
    match session.connect() {
        ConnectOutcome::Connected { tempo } => match tempo {
            Some(tempo) => log::info!("Connected to Live ({} BPM)", tempo),
            None => log::info!("Connected to Live"),
        },
        ConnectOutcome::AlreadyConnected { .. } => {}
        ConnectOutcome::Offline { reason } => {
            log::warn!("Working offline: {}", reason);
        }
    }
    session
}

fn ping(config: Config, offline: bool) -> Result<()> {
    let remote = config.endpoint().remote_addr();
    let session = open_session(config, offline);
    if session.is_online() {
        println!("Live is answering at {} ({} BPM)", remote, session.project().tempo);
        Ok(())
    } else {
        anyhow::bail!("No reply from Live at {}", remote)
    }
}

fn parse_params(params: Option<&str>) -> Result<Value> {
    match params {
        Some(text) => serde_json::from_str(text).context("--params must be a JSON object"),
        None => Ok(json!({})),
    }
}

fn run_tool(config: Config, offline: bool, name: &str, params: Option<&str>) -> Result<()> {
    let params = parse_params(params)?;
    let mut session = open_session(config, offline);
    println!("{}", session.call_tool(name, &params));
    Ok(())
}

/// One request per line. Replies are JSON so multi-line results stay on one line.
fn handle_line(session: &mut Session, line: &str) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return json!({ "result": format!("[ERR] invalid request: {}", e) }),
    };
    let Some(tool) = request.get("tool").and_then(Value::as_str) else {
        return json!({ "result": "[ERR] request has no \"tool\"" });
    };
    let params = request.get("params").cloned().unwrap_or_else(|| json!({}));
    json!({ "tool": tool, "result": session.call_tool(tool, &params) })
}

fn serve(config: Config, offline: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Interrupted, shutting down");
        flag.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let mut session = open_session(config, offline);

    // stdin blocks, so it is read on its own thread and polled with a timeout
    // to notice Ctrl-C.
    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("liveosc-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    log::info!("Serving tool calls on stdin (Ctrl-C to stop)");
    let mut stdout = io::stdout();
    while running.load(Ordering::SeqCst) {
        let line = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&mut session, &line);
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }

    session.disconnect();
    log::info!("Stopped");
    Ok(())
}

fn query(config: &Config, path: &str, tokens: &[String], raw: bool) -> Result<()> {
    let args: Vec<_> = tokens.iter().map(|t| osc::parse_arg(t)).collect();
    let transport = Transport::with_stale_grace(config.endpoint(), config.timeouts.stale_grace());
    transport.start().context("Failed to open OSC socket")?;

    if raw {
        let captured = transport.query_raw(path, args, config.timeouts.raw_capture())?;
        if captured.is_empty() {
            println!("(no messages)");
        }
        for (addr, args) in captured {
            println!("{} {}", addr, osc::format_args(&args));
        }
    } else {
        match transport.query(path, args, config.timeouts.query())? {
            Some(reply) => println!("{} {}", path, osc::format_args(&reply)),
            None => println!("(no reply within {:?})", config.timeouts.query()),
        }
    }
    transport.stop();
    Ok(())
}
