//! Background service binary carrying `ASK_AI` messages to the model.
//! Run with: cargo run --bin sidebar-background

use std::process::ExitCode;

use sidebar_chat::start_sidebar_chat;

fn main() -> ExitCode {
    start_sidebar_chat::run_background()
}
