//! Terminal front end.
//!
//! Renders controller events as plain text and turns typed lines into
//! controller calls. Markdown in answers is printed as-is.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::chat::SessionController;
use crate::chat::attachment::read_attachment;
use crate::chat::events::{ChatEvent, ChatObserver, Confirmer, SessionSummary};
use crate::chat::types::{Attachment, ChatId, ChatSession, Message, Role};
use crate::speech::{AudioPlayer, GeminiTts};

const HELP: &str = "\
Commands:
  /new              start a new chat
  /list             list chats
  /switch <n>       switch to chat n
  /delete [n]       delete chat n (default: current)
  /attach <path>    stage a file for the next message
  /detach           drop the staged file
  /speak            read the last answer aloud
  /stop             stop playback
  /seek <seconds>   move playback, negative rewinds
  /help             show this help
  /quit             exit
Anything else is sent as a message.";

fn write_out(text: &str) {
    let mut out = io::stdout().lock();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn read_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) => {
            warn!("Failed to read input: {e}");
            None
        }
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "AI",
        Role::System => "System",
    }
}

/// Format one message for display.
#[must_use]
pub fn render_message(message: &Message, attachment: Option<&Attachment>) -> String {
    let mut text = format!("[{}] {}", label(message.role), message.content);
    if let Some(attachment) = attachment {
        text.push_str(&format!("\n  (attached: {})", attachment.name));
    }
    text
}

/// Format the session list, marking the current one.
#[must_use]
pub fn render_sessions(sessions: &[SessionSummary]) -> String {
    sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if s.active { '*' } else { ' ' };
            format!("{marker} {}. {}", i + 1, s.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints controller events to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalView;

impl ChatObserver for TerminalView {
    fn on_event(&self, event: &ChatEvent) {
        match event {
            ChatEvent::SessionsChanged(_) => {}
            ChatEvent::ConversationReset => {
                write_out("Hi! Ask me anything about this page.");
            }
            ChatEvent::ConversationLoaded(messages) => {
                for message in messages {
                    write_out(&render_message(message, None));
                }
            }
            ChatEvent::MessageAppended {
                message,
                attachment,
            } => {
                write_out(&render_message(message, attachment.as_ref()));
            }
            ChatEvent::ThinkingStarted => write_out("Thinking..."),
            ChatEvent::ThinkingFinished => {}
        }
    }
}

/// Asks on the terminal before deleting a chat.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm_delete(&self, session: &ChatSession) -> bool {
        let mut out = io::stdout().lock();
        let _ = write!(out, "Delete \"{}\"? [y/N] ", session.title);
        let _ = out.flush();
        drop(out);

        read_line().is_some_and(|answer| {
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
    }
}

/// A typed line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Start a new chat.
    New,
    /// List chats.
    List,
    /// Switch to the n-th chat (1-based).
    Switch(usize),
    /// Delete the n-th chat, or the current one.
    Delete(Option<usize>),
    /// Stage a file.
    Attach(PathBuf),
    /// Drop the staged file.
    Detach,
    /// Read the last answer aloud.
    Speak,
    /// Stop playback.
    Stop,
    /// Move playback by seconds.
    Seek(f64),
    /// Show help.
    Help,
    /// Exit.
    Quit,
    /// Send a message.
    Send(String),
    /// Unrecognized or malformed command.
    Invalid(String),
}

/// Parse a typed line.
#[must_use]
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Send(line.to_string());
    }

    let (name, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(n, a)| (n, a.trim()));

    match name {
        "/new" => Command::New,
        "/list" => Command::List,
        "/switch" => arg
            .parse()
            .map_or_else(|_| Command::Invalid("usage: /switch <n>".to_string()), Command::Switch),
        "/delete" if arg.is_empty() => Command::Delete(None),
        "/delete" => arg.parse().map_or_else(
            |_| Command::Invalid("usage: /delete [n]".to_string()),
            |n| Command::Delete(Some(n)),
        ),
        "/attach" if !arg.is_empty() => Command::Attach(PathBuf::from(arg)),
        "/attach" => Command::Invalid("usage: /attach <path>".to_string()),
        "/detach" => Command::Detach,
        "/speak" => Command::Speak,
        "/stop" => Command::Stop,
        "/seek" => arg
            .parse()
            .map_or_else(|_| Command::Invalid("usage: /seek <seconds>".to_string()), Command::Seek),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command {other}, try /help")),
    }
}

/// Interactive loop over a session controller.
pub struct Repl {
    controller: SessionController,
    tts: Arc<GeminiTts>,
    player: AudioPlayer,
    staged: Option<Attachment>,
}

impl Repl {
    /// Wrap an initialised controller.
    #[must_use]
    pub fn new(controller: SessionController, tts: Arc<GeminiTts>, player: AudioPlayer) -> Self {
        Self {
            controller,
            tts,
            player,
            staged: None,
        }
    }

    /// Read lines until end of input or `/quit`.
    pub async fn run(&mut self) {
        write_out("Type /help for commands.");
        while let Some(line) = read_line() {
            if !self.handle(parse_command(&line)).await {
                break;
            }
        }
        self.player.stop();
    }

    /// Execute one command. Returns `false` to exit.
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::New => {
                self.controller.create_session();
            }
            Command::List => write_out(&self.session_list()),
            Command::Switch(n) => match self.nth_chat(n) {
                Some(id) => {
                    self.controller.select_session(&id);
                }
                None => write_out(&format!("No chat {n}")),
            },
            Command::Delete(n) => {
                let id = match n {
                    Some(n) => self.nth_chat(n),
                    None => self.controller.current_session().map(|s| s.id.clone()),
                };
                match id {
                    Some(id) => {
                        self.controller.delete_session(&id);
                    }
                    None => write_out("No such chat"),
                }
            }
            Command::Attach(path) => match read_attachment(&path) {
                Ok(attachment) => {
                    write_out(&format!("Staged {}", attachment.name));
                    self.staged = Some(attachment);
                }
                Err(e) => write_out(&format!("[System] {e}")),
            },
            Command::Detach => {
                self.staged = None;
            }
            Command::Speak => self.speak().await,
            Command::Stop => self.player.stop(),
            Command::Seek(delta) => match self.player.seek(delta) {
                Some(position) => write_out(&format!("At {:.1}s", position.as_secs_f64())),
                None => write_out("Nothing is playing"),
            },
            Command::Help => write_out(HELP),
            Command::Quit => return false,
            Command::Send(text) => {
                let attachment = self.staged.take();
                self.controller.send_user_message(&text, attachment).await;
            }
            Command::Invalid(reason) => write_out(&reason),
        }
        true
    }

    async fn speak(&self) {
        let Some(text) = self.last_answer() else {
            write_out("Nothing to read yet");
            return;
        };

        match self.tts.synthesize(&text).await {
            Ok(buffer) => {
                write_out(&format!(
                    "Playing {:.1}s of audio",
                    buffer.duration().as_secs_f64()
                ));
                self.player
                    .play(buffer, Duration::ZERO, || write_out("(playback finished)"));
            }
            Err(e) => write_out(&format!("[System] TTS Error: {e}")),
        }
    }

    fn last_answer(&self) -> Option<String> {
        self.controller
            .current_session()?
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
    }

    fn nth_chat(&self, n: usize) -> Option<ChatId> {
        let index = n.checked_sub(1)?;
        self.controller.chats().get(index).map(|c| c.id.clone())
    }

    fn session_list(&self) -> String {
        let current = self.controller.current_session().map(|s| &s.id);
        let summaries: Vec<SessionSummary> = self
            .controller
            .chats()
            .iter()
            .map(|c| SessionSummary::of(c, current))
            .collect();
        render_sessions(&summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  hello there "), Command::Send("hello there".to_string()));
        assert_eq!(parse_command("/switch 2"), Command::Switch(2));
        assert_eq!(parse_command("/delete"), Command::Delete(None));
        assert_eq!(parse_command("/delete 3"), Command::Delete(Some(3)));
        assert_eq!(parse_command("/seek -5"), Command::Seek(-5.0));
        assert_eq!(
            parse_command("/attach notes/a b.txt"),
            Command::Attach(PathBuf::from("notes/a b.txt"))
        );
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert!(matches!(parse_command("/switch x"), Command::Invalid(_)));
        assert!(matches!(parse_command("/bogus"), Command::Invalid(_)));
    }

    #[test]
    fn test_render_message_with_attachment() {
        let message = Message::user("Look");
        let attachment = Attachment::image("cat.png", "data:image/png;base64,AA==");
        assert_eq!(
            render_message(&message, Some(&attachment)),
            "[You] Look\n  (attached: cat.png)"
        );
        assert_eq!(render_message(&Message::assistant("Hi"), None), "[AI] Hi");
    }

    #[test]
    fn test_render_sessions_marks_active() {
        let sessions = vec![
            SessionSummary {
                id: ChatId::from("2"),
                title: "Second".to_string(),
                last_updated: 2,
                active: true,
            },
            SessionSummary {
                id: ChatId::from("1"),
                title: "First".to_string(),
                last_updated: 1,
                active: false,
            },
        ];
        assert_eq!(render_sessions(&sessions), "* 1. Second\n  2. First");
    }
}
