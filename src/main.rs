use ahamai_core::{Message, MessageRenderer, Segment};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

mod app;
mod config;
mod handler;
mod stream;
mod tui;
mod ui;

use app::App;
use config::Config;
use stream::StreamEvent;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "ahamai")]
#[command(about = "Terminal chat client with interactive quizzes, flashcards and image grids")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a saved assistant reply and print its segments as JSON
    Render {
        /// File with the reply text, or - for stdin
        file: PathBuf,
        /// Feed the text in chunks of this many characters, like a stream
        #[arg(long)]
        chunk: Option<usize>,
    },
    /// Store custom instructions in the config file (empty text clears them)
    Instructions {
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|_| Config::new()),
    };

    match cli.command {
        Some(Commands::Render { file, chunk }) => {
            init_logging(None, cli.verbose)?;
            render_file(&config, &file, chunk)
        }
        Some(Commands::Instructions { text }) => {
            init_logging(None, cli.verbose)?;
            match &cli.config {
                Some(path) => {
                    let mut config = config;
                    config.set_custom_instructions(&text);
                    config.save_to(path)
                }
                None => Config::save_custom_instructions(&text),
            }
        }
        None => {
            init_logging(Some(&config.log_path()?), cli.verbose)?;
            run_tui(config).await
        }
    }
}

/// Logs go to `log_file` when given; the terminal UI owns the screen
fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stderr);
        }
    }

    builder.init();
    Ok(())
}

async fn run_tui(config: Config) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tick = Duration::from_millis(config.tick_ms);
    let mut app = App::new(config, tx);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(tick);

    log::info!("ahamai v{} started", env!("CARGO_PKG_VERSION"));
    let result = event_loop(&mut terminal, &mut app, &mut events, &mut rx).await;

    tui::restore()?;
    result
}

async fn event_loop(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    rx: &mut mpsc::UnboundedReceiver<StreamEvent>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(event) = rx.recv() => app.handle_stream_event(event),
            else => break,
        }
    }
    Ok(())
}

fn render_file(config: &Config, file: &Path, chunk: Option<usize>) -> Result<()> {
    let mut text = String::new();
    if file == Path::new("-") {
        std::io::stdin().read_to_string(&mut text)?;
    } else {
        text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {:?}", file))?;
    }

    let renderer = MessageRenderer::new(config.render.clone());
    let mut message = Message::assistant();

    if let Some(size) = chunk.filter(|size| *size > 0) {
        let ends = text
            .char_indices()
            .map(|(i, _)| i)
            .skip(size)
            .step_by(size);
        for end in ends {
            renderer.render(&mut message, &text[..end]);
        }
    }
    renderer.render(&mut message, &text);
    renderer.finish(&mut message);

    let segments: Vec<serde_json::Value> = message
        .segments()
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => serde_json::json!({ "type": "text", "text": text }),
            Segment::Widget { id, .. } => serde_json::json!({
                "type": "widget",
                "id": id.0,
                "widget": message.widget(*id),
            }),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}
