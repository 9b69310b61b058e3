use clap::Parser;
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fleetwatch_core::{LogDraft, LogLevel, NdjsonDecoder, ProtocolError, UpdateMessage};
use fleetwatch_monitor::config::{Args, MonitorConfig};
use fleetwatch_monitor::logging::init_logging;
use fleetwatch_monitor::ui::{handle_input, render_ui, App, UiRequest};
use fleetwatch_monitor::{ChannelSink, Monitor, MonitorHandle, TracingSink, WebSocketTransport};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

const REDRAW_INTERVAL: Duration = Duration::from_millis(1_000);
const STDIN_CHUNK: usize = 8 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = MonitorConfig::from_args(args)?;
    let _log_guard = init_logging(&config.log_dir, config.log_stdout && config.headless);
    info!(url = %config.url, headless = config.headless, "fleetwatch_start");

    let transport = WebSocketTransport::new(config.url.clone());
    let (mut monitor, handle) = Monitor::new(config.monitor.clone(), transport);

    if config.headless {
        monitor.add_sink(Box::new(TracingSink));
        let monitor_task = tokio::spawn(monitor.run());
        read_stdin_updates(&handle).await?;
        let snapshot = handle.snapshot().await?;
        println!("{}", serde_json::to_string(&snapshot)?);
        handle.shutdown().await;
        monitor_task.await?;
        return Ok(());
    }

    let (sink, mut dashboard_rx) = ChannelSink::channel();
    monitor.add_sink(Box::new(sink));
    let monitor_task = tokio::spawn(monitor.run());
    let snapshot = handle.snapshot().await?;
    let mut app = App::new(snapshot);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run_dashboard(&mut terminal, &mut app, &handle, &mut dashboard_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    handle.shutdown().await;
    if let Err(err) = monitor_task.await {
        warn!("monitor_task_join_error: {err}");
    }
    result
}

async fn run_dashboard(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    handle: &MonitorHandle,
    dashboard_rx: &mut tokio::sync::mpsc::UnboundedReceiver<fleetwatch_monitor::DashboardEvent>,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        let area = terminal.size()?;
        if let Some(viewport) = app.resize(area) {
            handle.set_viewport(viewport).await?;
        }
        terminal.draw(|frame| render_ui(frame, app))?;

        tokio::select! {
            _ = redraw.tick() => {}
            Some(event) = dashboard_rx.recv() => {
                app.apply_dashboard_event(event);
                while let Ok(event) = dashboard_rx.try_recv() {
                    app.apply_dashboard_event(event);
                }
            }
            maybe_event = events.next() => {
                let Some(Ok(event)) = maybe_event else {
                    continue;
                };
                let Some(request) = handle_input(event, app) else {
                    continue;
                };
                match request {
                    UiRequest::Quit => break,
                    UiRequest::Reconnect => handle.reconnect().await?,
                    UiRequest::ClearLogs => handle.clear_logs().await?,
                    UiRequest::SetFilter(filter) => handle.set_filter(filter).await?,
                    UiRequest::SetViewport(viewport) => handle.set_viewport(viewport).await?,
                    UiRequest::ShowDetails(id) => {
                        app.details = handle.log_details(id).await?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Turns an undecodable line into the error entry the activity log shows.
fn stdin_update(frame: Result<UpdateMessage, ProtocolError>) -> UpdateMessage {
    match frame {
        Ok(message) => message,
        Err(err) => {
            warn!("stdin_decode_error: {err}");
            LogDraft::new(LogLevel::Error, format!("Failed to parse update: {err}")).into()
        }
    }
}

/// Feeds newline-delimited update messages from stdin into the monitor.
/// Undecodable lines are reported in the activity log and skipped.
async fn read_stdin_updates(handle: &MonitorHandle) -> anyhow::Result<()> {
    let mut stdin = tokio::io::stdin();
    let mut decoder = NdjsonDecoder::default();
    let mut buf = vec![0u8; STDIN_CHUNK];
    loop {
        let read = stdin.read(&mut buf).await?;
        let report = if read == 0 {
            decoder.finish()
        } else {
            decoder.push_chunk(&buf[..read])
        };
        for frame in report.frames {
            handle.inject(stdin_update(frame)).await?;
        }
        if read == 0 {
            return Ok(());
        }
    }
}
