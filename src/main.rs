mod api;
mod app;
mod config;
mod history;
mod images;
mod storage;
mod theme;
mod ui;

use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::{Client, RenderedPart};
use app::App;
use config::AppConfig;
use history::PromptHistory;
use images::ImageFormat;
use storage::{FileStore, Store, KEY_API_CREDENTIAL};

#[derive(Parser, Debug)]
#[command(name = "gazou")]
#[command(author = "Kei Nakamura")]
#[command(version = "0.1.0")]
#[command(about = "A terminal client for multimodal image chat (OpenRouter / Gemini)")]
struct Args {
    /// Generate once from the command line and exit (requires --image)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Image file to attach (repeat for several)
    #[arg(short, long)]
    image: Vec<PathBuf>,

    /// API key for this invocation (overrides the stored credential)
    #[arg(long)]
    api_key: Option<String>,

    /// Directory downloaded images are written to
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Headless one-shot mode
    if args.prompt.is_some() {
        return run_once(args).await;
    }

    // Run TUI
    run_tui().await
}

/// One-shot generation without the TUI: encode, submit, print text, save
/// returned images.
async fn run_once(args: Args) -> Result<()> {
    let mut store: Box<dyn Store> = Box::new(FileStore::open_default()?);
    let config = AppConfig::load().unwrap_or_default();

    let prompt = args
        .prompt
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    let credential = args
        .api_key
        .or_else(|| store.get(KEY_API_CREDENTIAL))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if !app::is_ready(&credential, args.image.len(), &prompt) {
        anyhow::bail!("an API key, at least one image, and a prompt are required");
    }

    let mut encoded = Vec::new();
    for path in &args.image {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .ok_or_else(|| {
                anyhow::anyhow!("{}: {}", images::NOT_AN_IMAGE, path.display())
            })?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?;
        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
        encoded.push((format.mime_type().to_string(), payload));
    }

    // The prompt is recorded before the request goes out, same as in the TUI.
    let mut history = PromptHistory::load(store.as_ref());
    history.record(&prompt, chrono::Utc::now().timestamp_millis(), store.as_mut());
    store.set(KEY_API_CREDENTIAL, &credential);

    let client = Client::new();
    let response = client.generate(&credential, &prompt, &encoded).await?;
    let parts = api::interpret_response(response)?;

    let dir = args.output.unwrap_or_else(|| config.resolve_downloads_dir());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Could not create {}", dir.display()))?;

    for part in parts {
        match part {
            RenderedPart::Text(text) => println!("{}", text),
            RenderedPart::Image { url, filename } => {
                let saved = client.download(&url, &dir, &filename).await?;
                println!("Saved {}", saved.display());
                let _ = notify("gazou", &format!("Saved {}", saved.display()));
            }
        }
    }

    Ok(())
}

async fn run_tui() -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state
    let mut app = App::new()?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    // Handle key and catch any errors to prevent crashes
                    if let Err(e) = app.handle_key(key) {
                        app.status_message = Some(format!("Error: {}", e));
                    }
                }
            }
        }

        // Drain task completions and advance the busy indicator
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("image-x-generic")
        .show()?;
    Ok(())
}
