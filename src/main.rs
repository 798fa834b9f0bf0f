use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::info;

use pulsedash::config::{Overrides, Settings};
use pulsedash::source::{HistoryPoller, HttpHistorySource};
use pulsedash::stream::{SharedCredential, StreamRegistry, WebSocketConnector};
use pulsedash::{events, logging, ui, App};

#[derive(Parser, Debug)]
#[command(name = "pulsedash")]
#[command(about = "Terminal dashboard for live operational metrics")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket endpoint for live metrics (ws:// or wss://)
    #[arg(long)]
    ws_url: Option<String>,

    /// Base URL of the history API
    #[arg(long)]
    api_url: Option<String>,

    /// Authentication token
    #[arg(long)]
    token: Option<String>,

    /// How the token is presented to the stream: message, query or both
    #[arg(long)]
    handshake: Option<String>,

    /// Metrics to show initially (e.g., "cpu,memory")
    #[arg(short, long, value_delimiter = ',')]
    metrics: Option<Vec<String>>,

    /// Time window: 5m, 15m or 60m
    #[arg(long)]
    range: Option<String>,

    /// Reconnect attempts before a stream gives up
    #[arg(long)]
    max_retries: Option<u32>,

    /// First reconnect delay (e.g., "1s", "500ms")
    #[arg(long)]
    base_delay: Option<String>,

    /// Longest reconnect delay (e.g., "10s")
    #[arg(long)]
    max_delay: Option<String>,

    /// History refresh interval (e.g., "30s")
    #[arg(short, long)]
    refresh: Option<String>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            ws_url: self.ws_url.clone(),
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            handshake: self.handshake.clone(),
            metrics: self.metrics.clone(),
            range: self.range.clone(),
            max_retries: self.max_retries,
            base_delay: self.base_delay.clone(),
            max_delay: self.max_delay.clone(),
            refresh: self.refresh.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref(), &args.overrides())?;

    let _guard = logging::init_file_logging(&settings.log_file, &settings.log_level)?;
    info!(ws_url = %settings.ws_url, api_url = %settings.api_url, "Starting pulsedash");

    // Streams and polling run on the runtime while the TUI owns the main thread
    let rt = tokio::runtime::Runtime::new()?;
    let _enter = rt.enter();

    let credential = SharedCredential::new(settings.token());
    let registry = StreamRegistry::new(
        settings.stream_config()?,
        Arc::new(WebSocketConnector::new(settings.connect_timeout)),
        Arc::new(credential.clone()),
    );

    let source = HttpHistorySource::builder()
        .endpoint(settings.api_url.clone())
        .timeout(settings.history.timeout)
        .credentials(Arc::new(credential.clone()))
        .build()
        .context("Failed to build history client")?;
    let description = format!("History: {}", settings.api_url);
    let poller = HistoryPoller::new(Arc::new(source))
        .interval(settings.history.interval)
        .stale_time(settings.history.stale_time)
        .start();

    let app = App::new(
        registry,
        poller,
        credential,
        settings.selection(),
        settings.range,
        description,
    );

    let result = run_tui(app);
    info!("Exiting");
    result
}

/// Run the TUI until the user quits
fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app);

    if app.running {
        app.quit();
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 14;

    while app.running {
        app.tick();

        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered =
                    ratatui::layout::Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
                        .intersection(area);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Metric bar
                Constraint::Min(8),    // Metric cards
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_metrics(frame, app, chunks[1]);
            ui::dashboard::render(frame, app, chunks[2]);
            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    Ok(())
}
