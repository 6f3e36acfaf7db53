//! Interactive console session over the serial stream.

use std::collections::VecDeque;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::config::DEFAULT_BAUD_RATE;
use crate::prefs::{PrefStore, KEY_BAUD_RATE, KEY_COMMAND_HISTORY, KEY_SHOW_TIMESTAMPS};
use crate::protocol::ControlMessage;
use crate::transport::{SerialStream, StreamHandler, StreamState};

const MAX_SCROLLBACK: usize = 1000;
const MAX_HISTORY: usize = 50;

pub enum ConsoleEvent {
    Line(String),
    State(StreamState),
}

/// Bridges transport callbacks onto the console's event channel.
pub struct ChannelHandler(mpsc::UnboundedSender<ConsoleEvent>);

impl ChannelHandler {
    pub fn new(tx: mpsc::UnboundedSender<ConsoleEvent>) -> Self {
        Self(tx)
    }
}

impl StreamHandler for ChannelHandler {
    fn on_line(&mut self, line: String) {
        let _ = self.0.send(ConsoleEvent::Line(line));
    }

    fn on_state(&mut self, state: StreamState) {
        let _ = self.0.send(ConsoleEvent::State(state));
    }
}

/// What an input line asks the session to do.
#[derive(Debug, PartialEq)]
enum InputAction {
    Nothing,
    Forward(ControlMessage),
    Reset,
    Quit,
}

pub struct Console<P: PrefStore> {
    prefs: P,
    baud_rate: u32,
    show_timestamps: bool,
    history: Vec<String>,
    scrollback: VecDeque<String>,
    exhausted: bool,
}

impl<P: PrefStore> Console<P> {
    pub fn new(prefs: P) -> Self {
        let baud_rate = prefs
            .get(KEY_BAUD_RATE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BAUD_RATE);
        let show_timestamps = prefs.get(KEY_SHOW_TIMESTAMPS).as_deref() == Some("true");
        let history = prefs
            .get(KEY_COMMAND_HISTORY)
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default();

        Self {
            prefs,
            baud_rate,
            show_timestamps,
            history,
            scrollback: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn set_baud_rate(&mut self, baud: u32) {
        self.baud_rate = baud;
        self.prefs.set(KEY_BAUD_RATE, &baud.to_string());
    }

    pub fn set_timestamps(&mut self, on: bool) {
        self.show_timestamps = on;
        self.prefs
            .set(KEY_SHOW_TIMESTAMPS, if on { "true" } else { "false" });
    }

    /// Runs the session until `quit` or stdin EOF. `open` attaches a fresh
    /// transport; `reset` closes the current one and attaches another.
    pub async fn run<F>(mut self, open: F) -> anyhow::Result<()>
    where
        F: Fn(ChannelHandler) -> SerialStream,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut stream = open(ChannelHandler::new(tx.clone()));

        self.notice("serial monitor ready, type 'help' for commands");

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut input = stdin.lines();

        loop {
            tokio::select! {
                evt = rx.recv() => match evt {
                    Some(ConsoleEvent::Line(line)) => self.render_line(&line),
                    Some(ConsoleEvent::State(state)) => {
                        if let Some(msg) = self.handle_state(state) {
                            stream.send(msg.to_json());
                        }
                    }
                    // `tx` is held here, so the channel cannot close.
                    None => unreachable!("console event channel closed"),
                },
                line = input.next_line() => match line? {
                    Some(line) => match self.handle_input(line.trim()) {
                        InputAction::Nothing => {}
                        InputAction::Forward(msg) => stream.send(msg.to_json()),
                        InputAction::Reset => {
                            self.notice("resetting connection...");
                            self.exhausted = false;
                            stream.close();
                            stream = open(ChannelHandler::new(tx.clone()));
                        }
                        InputAction::Quit => {
                            stream.close();
                            return Ok(());
                        }
                    },
                    None => {
                        stream.close();
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Turns a state change into a visible notice; on connect, pushes the
    /// session's baud rate to the device like the web terminal does.
    fn handle_state(&mut self, state: StreamState) -> Option<ControlMessage> {
        match state {
            StreamState::Connecting => {
                self.notice("connecting to serial port...");
                None
            }
            StreamState::Connected => {
                self.exhausted = false;
                self.notice("connected to serial port");
                Some(ControlMessage::BaudRate(self.baud_rate))
            }
            StreamState::Disconnected => {
                self.notice("disconnected from serial port");
                None
            }
            StreamState::Reconnecting { attempt, max } => {
                self.notice(&format!("reconnect attempt {}/{}...", attempt, max));
                None
            }
            StreamState::Exhausted => {
                self.exhausted = true;
                self.notice("max reconnect attempts reached, type 'reset' to try again");
                None
            }
        }
    }

    fn handle_input(&mut self, line: &str) -> InputAction {
        if line.is_empty() {
            return InputAction::Nothing;
        }
        self.push_history(line);

        let lower = line.to_ascii_lowercase();
        match lower.as_str() {
            "help" => {
                self.notice("available commands:");
                self.notice("  help              show this help");
                self.notice("  clear             clear the scrollback");
                self.notice("  save              write the scrollback to a file");
                self.notice("  history           show recent commands");
                self.notice("  timestamps        toggle line timestamps");
                self.notice("  baud <rate>       change the serial baud rate");
                self.notice("  reset             drop and redial the connection");
                self.notice("  quit              leave the monitor");
                self.notice("anything else is sent to the device as a command");
                InputAction::Nothing
            }
            "clear" => {
                self.scrollback.clear();
                self.notice("scrollback cleared");
                InputAction::Nothing
            }
            "save" => {
                self.save_log();
                InputAction::Nothing
            }
            "history" => {
                let history: Vec<String> = self.history.clone();
                for (i, cmd) in history.iter().enumerate() {
                    self.notice(&format!("  {:>2}  {}", i + 1, cmd));
                }
                InputAction::Nothing
            }
            "timestamps" => {
                let on = !self.show_timestamps;
                self.set_timestamps(on);
                self.notice(if on {
                    "timestamps enabled"
                } else {
                    "timestamps disabled"
                });
                InputAction::Nothing
            }
            "reset" => InputAction::Reset,
            "quit" | "exit" => InputAction::Quit,
            _ if lower.starts_with("baud ") => match line[5..].trim().parse::<u32>() {
                Ok(rate) if rate > 0 => {
                    self.set_baud_rate(rate);
                    self.notice(&format!("baud rate changed to {}", rate));
                    InputAction::Forward(ControlMessage::BaudRate(rate))
                }
                _ => {
                    self.notice("invalid baud rate");
                    InputAction::Nothing
                }
            },
            _ => {
                if self.exhausted {
                    self.notice("not connected, type 'reset' to reconnect first");
                    return InputAction::Nothing;
                }
                self.record(&format!("> {}", line));
                InputAction::Forward(ControlMessage::Command(line.to_string()))
            }
        }
    }

    /// Prints one device line. Whitespace-only lines are dropped here, at
    /// the rendering layer; the transport below emits them faithfully.
    fn render_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.show_timestamps {
            let stamp = chrono::Local::now().format("%H:%M:%S");
            self.record(&format!("[{}] {}", stamp, line));
        } else {
            self.record(line);
        }
    }

    fn notice(&mut self, text: &str) {
        self.record(&format!("--- {}", text));
    }

    fn record(&mut self, line: &str) {
        println!("{}", line);
        if self.scrollback.len() == MAX_SCROLLBACK {
            self.scrollback.pop_front();
        }
        self.scrollback.push_back(line.to_string());
    }

    fn push_history(&mut self, command: &str) {
        if self.history.last().map(String::as_str) == Some(command) {
            return;
        }
        self.history.push(command.to_string());
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        match serde_json::to_string(&self.history) {
            Ok(json) => self.prefs.set(KEY_COMMAND_HISTORY, &json),
            Err(e) => log::warn!("cannot serialize command history: {}", e),
        }
    }

    fn save_log(&mut self) {
        let name = format!(
            "serial_log_{}.txt",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let mut contents: String = self
            .scrollback
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        contents.push('\n');

        match std::fs::write(&name, contents) {
            Ok(()) => self.notice(&format!("log saved to {}", name)),
            Err(e) => self.notice(&format!("failed to save log: {}", e)),
        }
    }
}
