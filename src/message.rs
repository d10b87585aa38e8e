//! Line protocol definitions
//!
//! Newline-delimited UTF-8 text. Client commands are a keyword optionally
//! followed by a JSON payload; server messages are a keyword followed by
//! free text, some spanning several lines.

use crate::error::{ProtocolError, ValidationError};
use crate::item::{ItemReport, ReportKind};

/// Token that ends a chat session
pub const EXIT_CHAT: &str = "/exit_chat";

/// Client → Server command (Command mode only)
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// `REPORT_LOST <json>` / `REPORT_FOUND <json>`
    Report { kind: ReportKind, report: ItemReport },
    /// `GET_MY_ITEMS`
    GetMyItems,
    /// `GET_ALL_ITEMS`
    GetAllItems,
}

impl ClientCommand {
    /// Parse a trimmed Command-mode line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.starts_with("REPORT_") {
            let (keyword, payload) = match line.split_once(' ') {
                Some((keyword, payload)) => (keyword, payload.trim()),
                None => (line, ""),
            };
            let kind = match keyword {
                "REPORT_LOST" => ReportKind::Lost,
                "REPORT_FOUND" => ReportKind::Found,
                other => return Err(ProtocolError::UnknownReportType(other.to_string())),
            };
            if payload.is_empty() {
                return Err(ProtocolError::MissingItemData);
            }
            let report = serde_json::from_str::<ItemReport>(payload)
                .map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;
            return Ok(ClientCommand::Report { kind, report });
        }

        if line.eq_ignore_ascii_case("GET_MY_ITEMS") {
            Ok(ClientCommand::GetMyItems)
        } else if line.eq_ignore_ascii_case("GET_ALL_ITEMS") {
            Ok(ClientCommand::GetAllItems)
        } else {
            Err(ProtocolError::UnknownCommand(line.to_string()))
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting sent on connect
    Welcome(String),
    /// Allowed locations, sent once after the greeting
    Locations(Vec<String>),
    Success(String),
    Error(String),
    Info(String),
    /// Pairing notification
    MatchFound(String),
    /// Relayed chat text with the sender's tag
    ChatMsg { tag: String, text: String },
    ChatEnded(String),
    /// `GET_MY_ITEMS` response, one summary per item
    YourItems(Vec<String>),
    /// `GET_ALL_ITEMS` response, one summary per item
    AllItems(Vec<String>),
    ServerShutdown(String),
}

impl ServerMessage {
    pub fn info(text: impl Into<String>) -> Self {
        ServerMessage::Info(text.into())
    }

    /// Render as wire text, one or more newline-terminated lines
    pub fn to_wire(&self) -> String {
        match self {
            ServerMessage::Welcome(text) => format!("WELCOME {}\n", text),
            ServerMessage::Locations(locations) => {
                let json = serde_json::to_string(locations).unwrap_or_else(|_| "[]".to_string());
                format!("LOCATIONS {}\n", json)
            }
            ServerMessage::Success(text) => format!("SUCCESS {}\n", text),
            ServerMessage::Error(text) => format!("ERROR {}\n", text),
            ServerMessage::Info(text) => format!("INFO {}\n", text),
            ServerMessage::MatchFound(text) => format!("MATCH_FOUND {}\n", text),
            ServerMessage::ChatMsg { tag, text } => format!("CHAT_MSG [{}]: {}\n", tag, text),
            ServerMessage::ChatEnded(text) => format!("CHAT_ENDED {}\n", text),
            ServerMessage::YourItems(lines) => {
                let mut out = String::from("YOUR_ITEMS\n");
                if lines.is_empty() {
                    out.push_str("You have not reported any items.\n");
                }
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
                out.push_str("END_YOUR_ITEMS\n");
                out
            }
            ServerMessage::AllItems(lines) => {
                let mut out = String::from("ALL_ITEMS_START\n");
                if lines.is_empty() {
                    out.push_str("ITEM: No items reported yet.\n");
                }
                for line in lines {
                    out.push_str("ITEM: ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push_str("ALL_ITEMS_END\n");
                out
            }
            ServerMessage::ServerShutdown(text) => format!("SERVER_SHUTDOWN {}\n", text),
        }
    }
}

/// Convert ProtocolError to an `ERROR` line
impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        ServerMessage::Error(err.to_string())
    }
}

/// Convert ValidationError to an `ERROR` line
impl From<ValidationError> for ServerMessage {
    fn from(err: ValidationError) -> Self {
        ServerMessage::Error(err.to_string())
    }
}
