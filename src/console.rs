// Console seam: every prompt and message of the CLI goes through `Console`,
// so the same flows can run against a real terminal or a scripted list of
// input lines.

use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Result;
use dialoguer::Input;
use thiserror::Error;

/// Raised when there is no more input to read (stdin closed, script
/// exhausted). The shell treats it as a request to exit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("console input closed")]
pub struct InputClosed;

pub trait Console {
    /// Show `prompt` and read one line, without its line terminator.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Print one line of output.
    fn say(&mut self, line: &str);
}

/// Console backed by the process terminal. Uses `dialoguer` prompts when
/// stdin is a TTY and plain line reads when input is piped in.
pub struct TerminalConsole {
    interactive: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String> {
        if self.interactive {
            return Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted => {
                        InputClosed.into()
                    }
                    _ => anyhow::Error::new(e).context("failed to read from terminal"),
                });
        }

        print!("{prompt}: ");
        io::stdout().flush()?;
        read_plain_line(io::stdin().lock())
    }

    fn say(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Read one line from `reader` without its terminator. End of input is
/// `InputClosed`.
fn read_plain_line(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(InputClosed.into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Console that replays queued input lines and records everything shown.
/// Running out of input behaves like a closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    transcript: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Lines printed with `say`, in order. Prompts are not included.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Input lines that have not been consumed yet.
    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, _prompt: &str) -> Result<String> {
        self.input.pop_front().ok_or_else(|| InputClosed.into())
    }

    fn say(&mut self, line: &str) {
        self.transcript.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_console_replays_then_closes() {
        let mut console = ScriptedConsole::new(["first", "second"]);
        assert_eq!(console.read_line("x").unwrap(), "first");
        assert_eq!(console.remaining(), 1);
        assert_eq!(console.read_line("x").unwrap(), "second");

        let err = console.read_line("x").unwrap_err();
        assert!(err.is::<InputClosed>());
    }

    #[test]
    fn plain_lines_lose_their_terminators() {
        let mut input = io::Cursor::new("1\r\nqueue-a\nlast");
        assert_eq!(read_plain_line(&mut input).unwrap(), "1");
        assert_eq!(read_plain_line(&mut input).unwrap(), "queue-a");
        assert_eq!(read_plain_line(&mut input).unwrap(), "last");
    }

    #[test]
    fn plain_read_at_end_of_input_is_closed() {
        let mut input = io::Cursor::new("\n");
        assert_eq!(read_plain_line(&mut input).unwrap(), "");

        let err = read_plain_line(&mut input).unwrap_err();
        assert!(err.is::<InputClosed>());
    }

    #[test]
    fn scripted_console_records_output() {
        let mut console = ScriptedConsole::new(Vec::<String>::new());
        console.say("hello");
        console.say("world");
        assert_eq!(console.transcript(), ["hello", "world"]);
    }
}
