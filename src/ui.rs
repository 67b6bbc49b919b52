// UI layer: the numbered menu loop and the flows behind each option.
// Prompts and output go through `Console`; queue calls go through
// `QueueService`.

use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::console::{Console, InputClosed};
use crate::queue::{self, QueueService};
use crate::selector;
use crate::store::{AccountRegistry, AccountStore};

/// Options of the main menu, keyed by the number the user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Send,
    View,
    AddAccount,
    Exit,
    Invalid,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(1) => MenuChoice::Send,
            Ok(2) => MenuChoice::View,
            Ok(3) => MenuChoice::AddAccount,
            Ok(99) => MenuChoice::Exit,
            _ => MenuChoice::Invalid,
        }
    }
}

/// The interactive shell. Owns the account registry for the whole session
/// and hands it to the selector when an operation needs an endpoint.
pub struct Shell<C, Q> {
    console: C,
    service: Q,
    store: AccountStore,
    registry: AccountRegistry,
}

impl<C: Console, Q: QueueService> Shell<C, Q> {
    pub fn new(console: C, service: Q, store: AccountStore, registry: AccountRegistry) -> Self {
        Self {
            console,
            service,
            store,
            registry,
        }
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// Run the menu loop until the user picks exit or input runs out.
    ///
    /// A failed operation is reported and the menu is shown again; only
    /// console failures end the loop with an error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.print_menu();
            let line = match self.console.read_line("Option") {
                Ok(line) => line,
                Err(e) if e.is::<InputClosed>() => break,
                Err(e) => return Err(e),
            };

            let outcome = match MenuChoice::parse(&line) {
                MenuChoice::Send => self.send_message(),
                MenuChoice::View => self.view_messages(),
                MenuChoice::AddAccount => self.add_account(),
                MenuChoice::Exit => break,
                MenuChoice::Invalid => {
                    self.console.say("Invalid option. Try again.");
                    continue;
                }
            };

            if let Err(e) = outcome {
                if e.is::<InputClosed>() {
                    break;
                }
                warn!("operation failed: {e:#}");
                self.console.say(&format!("Error: {e:#}"));
            }
        }

        self.console.say("Exiting.");
        Ok(())
    }

    fn print_menu(&mut self) {
        self.console.say("");
        self.console.say("Choose an option:");
        self.console.say("[1] - Send a message to a queue");
        self.console.say("[2] - View messages in a queue");
        self.console.say("[3] - Add a storage account");
        self.console.say("[99] - Exit");
    }

    fn send_message(&mut self) -> Result<()> {
        let endpoint = selector::resolve(&mut self.console, &self.store, &mut self.registry)?;
        let queue_name = self.console.read_line("Queue name")?.trim().to_string();
        let message = self.console.read_line("Message to send")?;

        let spinner = spinner("Sending message...");
        let result = queue::send(&self.service, &endpoint, &queue_name, &message);
        spinner.finish_and_clear();
        result?;

        self.console.say(&format!(
            "Message '{message}' sent to queue '{queue_name}'."
        ));
        Ok(())
    }

    fn view_messages(&mut self) -> Result<()> {
        let endpoint = selector::resolve(&mut self.console, &self.store, &mut self.registry)?;
        let queue_name = self.console.read_line("Queue name")?.trim().to_string();

        let spinner = spinner("Fetching messages...");
        let result = queue::view(&self.service, &endpoint, &queue_name);
        spinner.finish_and_clear();
        let messages = result?;

        if messages.is_empty() {
            self.console.say("No messages in the queue.");
            return Ok(());
        }

        for message in &messages {
            let mut row = format!("Id: {}, Content: {}", message.id, message.content);
            if let Some(text) = message.decoded().filter(|t| *t != message.content) {
                row.push_str(&format!(", Decoded: {text}"));
            }
            self.console.say(&row);
        }
        Ok(())
    }

    fn add_account(&mut self) -> Result<()> {
        selector::add_account(&mut self.console, &self.store, &mut self.registry)?;
        Ok(())
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
