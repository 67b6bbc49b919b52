// Library root
// -----------
// The binary (`main.rs`) wires these modules into the interactive CLI.
//
// Module responsibilities:
// - `store`: saved storage accounts and their flat account file.
// - `console`: line-based prompts, backed by the terminal or a script.
// - `selector`: picks (or creates) the account an operation runs against.
// - `queue`: the `QueueService` seam plus the send/view operations.
// - `api`: Azure Queue REST implementation of `QueueService`.
// - `ui`: the menu loop.
// - `config`: settings read from the environment.
pub mod api;
pub mod config;
pub mod console;
pub mod queue;
pub mod selector;
pub mod store;
pub mod ui;
