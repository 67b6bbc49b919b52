// Entrypoint for the CLI application.
// Loads the saved accounts, builds the queue client and hands both to the
// menu loop, which blocks until the user exits.

use anyhow::Context;
use azqueue_cli::{
    api::AzureQueueClient, config::Settings, console::TerminalConsole, store::AccountStore,
    ui::Shell,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with menu output.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "azqueue_cli=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::from_env();
    let store = AccountStore::new(settings.accounts_file);
    let registry = store
        .load()
        .with_context(|| format!("Failed to load saved accounts from {}", store.path().display()))?;
    let service = AzureQueueClient::new()?;

    Shell::new(TerminalConsole::new(), service, store, registry).run()
}
