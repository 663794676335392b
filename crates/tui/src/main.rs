mod app;
mod events;
mod persist;
mod strings;
mod terminal;
mod theme;
mod toast;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use providers::ChatConfig;
use terminal::TerminalGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use persist::ConversationStore;

// The terminal belongs to the UI, so logs go to a daily file under the data dir.
fn init_logging(root: &Path) -> Option<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(root.join("logs"), "tutor.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_env("TUTOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn main() -> Result<()> {
    let root = ConversationStore::default_root().context("no home directory to keep conversations in")?;
    let _log_guard = init_logging(&root);
    let cfg = ChatConfig::from_env_and_file().context("load chat config")?;
    let store = ConversationStore::open(root);
    let mut app = app::App::new(cfg, store).context("start app")?;
    let mut term = TerminalGuard::new()?;
    events::run(&mut term.terminal, &mut app)
}
