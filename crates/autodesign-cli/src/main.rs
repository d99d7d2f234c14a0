use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use autodesign_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use autodesign_contracts::events::EventWriter;
use autodesign_contracts::images::{GeneratedImage, ImageId};
use autodesign_contracts::session::{AppMode, AspectRatio, MIN_PROMPT_CHARS, UPLOADING_MESSAGE};
use autodesign_engine::config::{ClientConfig, ProviderKind};
use autodesign_engine::{ActionOutcome, PendingRequest, RequestClient, Session};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "autodesign",
    version,
    about = "Generate and refine automotive concept images"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive design session.
    Chat(ChatArgs),
    /// Generate one concept image from a prompt.
    Generate(GenerateArgs),
    /// Refine an existing image with an instruction.
    Refine(RefineArgs),
}

#[derive(Debug, Clone, Args)]
struct ClientArgs {
    #[arg(long)]
    provider: Option<ProviderKind>,
    #[arg(long)]
    generate_model: Option<String>,
    #[arg(long)]
    refine_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    /// Directory that receives each newly active image.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value_t = AspectRatio::Landscape)]
    aspect_ratio: AspectRatio,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value_t = AspectRatio::Landscape)]
    aspect_ratio: AspectRatio,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    client: ClientArgs,
}

#[derive(Debug, Parser)]
struct RefineArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    instruction: String,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    client: ClientArgs,
}

const LOADING_TICK: Duration = Duration::from_millis(400);

fn main() {
    init_logging();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("autodesign error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Refine(args) => run_refine(args),
    }
}

fn build_session(args: &ClientArgs) -> Result<Session> {
    let config = apply_client_args(ClientConfig::from_env()?, args);
    debug!(?config, "resolved client config");
    let client = RequestClient::from_config(&config)?;
    Ok(attach_events(Session::new(client), args))
}

fn apply_client_args(mut config: ClientConfig, args: &ClientArgs) -> ClientConfig {
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(model) = &args.generate_model {
        config.generate_model = Some(model.clone());
    }
    if let Some(model) = &args.refine_model {
        config.refine_model = Some(model.clone());
    }
    config
}

fn attach_events(session: Session, args: &ClientArgs) -> Session {
    match &args.events {
        Some(path) => session.with_events(EventWriter::for_new_session(path)),
        None => session,
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let session = build_session(&args.client)?;
    generate_once(session, &args)
}

fn generate_once(mut session: Session, args: &GenerateArgs) -> Result<i32> {
    session.set_aspect_ratio(args.aspect_ratio);
    session.set_prompt(args.prompt.clone());
    let outcome = session.start_generate();
    finish_one_shot(&session, outcome, &args.out)
}

fn run_refine(args: RefineArgs) -> Result<i32> {
    let session = build_session(&args.client)?;
    refine_once(session, &args)
}

fn refine_once(mut session: Session, args: &RefineArgs) -> Result<i32> {
    if let ActionOutcome::Failed(message) = session.upload_image(Some(&args.image)) {
        eprintln!("{message}");
        return Ok(1);
    }
    session.set_prompt(args.instruction.clone());
    let outcome = session.start_refine();
    finish_one_shot(&session, outcome, &args.out)
}

fn finish_one_shot(session: &Session, outcome: ActionOutcome, out: &Path) -> Result<i32> {
    match outcome {
        ActionOutcome::Completed(_) => {
            let Some(image) = session.active_image() else {
                bail!("completed action left no active image");
            };
            write_image(out, image)?;
            if let Some(caption) = session.last_caption() {
                println!("{caption}");
            }
            println!("{}", out.display());
            Ok(0)
        }
        ActionOutcome::Failed(message) => {
            eprintln!("{message}");
            Ok(1)
        }
        ActionOutcome::Skipped => {
            eprintln!("Prompt must be at least {MIN_PROMPT_CHARS} characters.");
            Ok(1)
        }
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut session = build_session(&args.client)?;
    session.set_aspect_ratio(args.aspect_ratio);
    if let Some(out) = &args.out {
        fs::create_dir_all(out).with_context(|| format!("failed creating {}", out.display()))?;
    }

    let client = session.client();
    println!(
        "Autodesign chat started ({} | generate: {} | refine: {}). Type /help for commands.",
        client.provider_name(),
        client.generate_model(),
        client.refine_model()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("[{}] > ", session.mode());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "quit" {
            break;
        }
        handle_intent(&mut session, &intent, args.out.as_deref())?;
    }
    Ok(())
}

fn handle_intent(session: &mut Session, intent: &Intent, out_dir: Option<&Path>) -> Result<()> {
    match intent.action.as_str() {
        "noop" | "quit" => {}
        "help" => {
            println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            println!("Plain text sets the prompt and submits it in the current mode.");
        }
        "set_mode" => match intent.arg_str("mode").map(str::parse::<AppMode>) {
            Some(Ok(mode)) => {
                session.set_mode(mode);
                println!("Mode set to {mode}");
            }
            Some(Err(err)) => println!("{err}"),
            None => println!("/mode requires generate or refine"),
        },
        "set_aspect_ratio" => {
            match intent
                .arg_str("aspect_ratio")
                .map(str::parse::<AspectRatio>)
            {
                Some(Ok(ratio)) => {
                    session.set_aspect_ratio(ratio);
                    println!("Aspect ratio set to {ratio}");
                }
                Some(Err(err)) => println!("{err}"),
                None => println!("/ratio requires one of {}", aspect_ratio_choices()),
            }
        }
        "set_prompt" => {
            session.set_prompt(intent.arg_str("prompt").unwrap_or_default());
            println!("Prompt set ({} chars)", session.prompt().trim().chars().count());
        }
        "submit" => {
            if let Some(prompt) = &intent.prompt {
                session.set_prompt(prompt.clone());
            }
            submit_in_background(session, out_dir)?;
        }
        "upload_image" => {
            let Some(path) = intent.arg_str("path") else {
                println!("/upload requires a path");
                return Ok(());
            };
            println!("{UPLOADING_MESSAGE}");
            let outcome = session.upload_image(Some(Path::new(path)));
            report_outcome(session, &outcome, out_dir)?;
        }
        "select_image" => {
            let Some(raw) = intent.arg_str("image") else {
                println!("/select requires a history number or image id");
                return Ok(());
            };
            match resolve_selection(session, raw) {
                Some(id) if session.select_image(&id) => println!("Active image: {id}"),
                _ => println!("No history entry matches '{raw}'"),
            }
        }
        "show_history" => {
            if session.history_len() == 0 {
                println!("History is empty.");
            }
            for line in history_lines(session) {
                println!("{line}");
            }
        }
        "show_status" => {
            for line in status_lines(session) {
                println!("{line}");
            }
        }
        "save_image" => {
            let Some(path) = intent.arg_str("path") else {
                println!("/save requires a path");
                return Ok(());
            };
            match session.active_image() {
                Some(image) => {
                    let path = Path::new(path);
                    write_image(path, image)?;
                    println!("Saved {}", path.display());
                }
                None => println!("No active image to save."),
            }
        }
        "unknown" => {
            let command = intent.arg_str("command").unwrap_or_default();
            println!("Unknown command: /{command}. Type /help for commands.");
        }
        other => debug!(action = other, "unhandled chat intent"),
    }
    Ok(())
}

/// Runs the current mode's request on a worker thread while the prompt shows
/// the loading message.
fn submit_in_background(session: &mut Session, out_dir: Option<&Path>) -> Result<()> {
    let pending = match session.mode() {
        AppMode::Generate => session.begin_generate(),
        AppMode::Refine => session.begin_refine(),
    };
    let Some(pending) = pending else {
        println!("{}", skipped_reason(session));
        return Ok(());
    };

    let client = session.client();
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let result = pending.execute(&client);
        let _ = tx.send((pending, result));
    });

    if let Some(message) = session.loading_message() {
        print!("{message}");
        io::stdout().flush()?;
    }
    let (pending, result): (PendingRequest, _) = loop {
        match rx.recv_timeout(LOADING_TICK) {
            Ok(done) => break done,
            Err(RecvTimeoutError::Timeout) => {
                print!(".");
                io::stdout().flush()?;
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                bail!("request worker stopped before reporting a result");
            }
        }
    };
    println!();
    let _ = worker.join();

    let outcome = session.complete(pending, result);
    report_outcome(session, &outcome, out_dir)
}

fn skipped_reason(session: &Session) -> String {
    if session.is_loading() {
        return "A request is already running.".to_string();
    }
    if session.mode() == AppMode::Refine && session.active_image().is_none() {
        return "Nothing to refine yet. Generate, /upload or /select an image first.".to_string();
    }
    format!("Prompt must be at least {MIN_PROMPT_CHARS} characters.")
}

fn report_outcome(
    session: &Session,
    outcome: &ActionOutcome,
    out_dir: Option<&Path>,
) -> Result<()> {
    match outcome {
        ActionOutcome::Completed(id) => {
            let Some(image) = session.active_image() else {
                return Ok(());
            };
            println!("Active image: {id} ({})", image.prompt());
            if let Some(caption) = session.last_caption().filter(|_| !image.is_upload()) {
                println!("Model says: {caption}");
            }
            if let Some(dir) = out_dir {
                let path = dir.join(image_file_name(image));
                write_image(&path, image)?;
                println!("Wrote {}", path.display());
            }
        }
        ActionOutcome::Failed(message) => println!("Error: {message}"),
        ActionOutcome::Skipped => println!("{}", skipped_reason(session)),
    }
    Ok(())
}

/// `N` is a 1-based position in `/history`; anything else is an image id.
fn resolve_selection(session: &Session, raw: &str) -> Option<ImageId> {
    if let Ok(position) = raw.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| session.history_entry(index))
            .map(|image| image.id().clone());
    }
    let id = ImageId::new(raw);
    session
        .history()
        .any(|image| image.id() == &id)
        .then_some(id)
}

fn history_lines(session: &Session) -> Vec<String> {
    let active = session.active_image().map(|image| image.id());
    session
        .history()
        .enumerate()
        .map(|(index, image)| {
            let marker = if Some(image.id()) == active { "*" } else { " " };
            format!("{marker}{:>3}. {}  {}", index + 1, image.id(), image.prompt())
        })
        .collect()
}

fn status_lines(session: &Session) -> Vec<String> {
    let mut lines = vec![
        format!("mode: {}", session.mode()),
        format!("aspect ratio: {}", session.aspect_ratio()),
        format!("prompt: {:?}", session.prompt()),
        format!(
            "active image: {}",
            session
                .active_image()
                .map(|image| format!("{} ({})", image.id(), image.prompt()))
                .unwrap_or_else(|| "none".to_string())
        ),
        format!("history: {} image(s)", session.history_len()),
    ];
    if let Some(error) = session.last_error() {
        lines.push(format!("last error: {error}"));
    }
    lines
}

fn aspect_ratio_choices() -> String {
    AspectRatio::ALL
        .iter()
        .map(|ratio| ratio.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn image_file_name(image: &GeneratedImage) -> String {
    let stem: String = image
        .id()
        .as_str()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '-' })
        .collect();
    format!("{stem}.{}", image.payload().file_extension())
}

fn write_image(path: &Path, image: &GeneratedImage) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    fs::write(path, image.payload().bytes())
        .with_context(|| format!("failed writing {}", path.display()))?;
    info!(image_id = %image.id(), path = %path.display(), "image written");
    Ok(())
}
