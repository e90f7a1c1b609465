//! Binary entrypoint for the terminal sidebar assistant.

use std::process::ExitCode;

use sidebar_chat::start_sidebar_chat;

/// Start the interactive chat front end.
fn main() -> ExitCode {
    start_sidebar_chat::run()
}
