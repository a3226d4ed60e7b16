use std::fmt;
use std::net::IpAddr;

use crate::files::FileId;

/// Nickname used for chat bot replies. It can never be registered by a user.
pub const BOT_NICKNAME: &str = "@bot";

/// One request line sent by a client: `VERB arg1 arg2 ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    pub verb: String,
    pub args: Vec<&'a str>,
}

impl<'a> Request<'a> {
    /// Returns `None` for a blank line.
    pub fn parse(line: &'a str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next()?.to_uppercase();
        Some(Request {
            verb,
            args: tokens.collect(),
        })
    }
}

/// Successful answers to a client's own request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done,
    Names(Vec<String>),
    File(FileId),
    Bot(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done => write!(f, "100 RPL_DONE"),
            Reply::Names(names) => write!(f, "101 RPL_NAMES {}", names.join(" ")),
            Reply::File(id) => write!(f, "102 RPL_FILE {id}"),
            Reply::Bot(text) => write!(f, ":{BOT_NICKNAME} MESSAGE {text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAnswer {
    Yes { port: u16, address: IpAddr },
    No,
}

/// Push notifications, rendered as `:<from> VERB ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connect,
    Quit { reason: Option<String> },
    Message { text: String },
    Whisper { text: String },
    AskWhisper,
    ReplyWhisper { answer: String },
    StopWhisper,
    Nick { new: String },
    AskFile { id: FileId, size: u64, filename: String },
    ReplyFile { id: FileId, answer: FileAnswer },
}

impl Notice {
    pub fn by(self, nickname: &str) -> String {
        format!(":{nickname} {self}")
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connect => write!(f, "CONNECT"),
            Notice::Quit { reason: None } => write!(f, "QUIT"),
            Notice::Quit {
                reason: Some(reason),
            } => write!(f, "QUIT {reason}"),
            Notice::Message { text } => write!(f, "MESSAGE {text}"),
            Notice::Whisper { text } => write!(f, "WHISPER {text}"),
            Notice::AskWhisper => write!(f, "ASK_WHISPER"),
            Notice::ReplyWhisper { answer } => write!(f, "REPLY_WHISPER {answer}"),
            Notice::StopWhisper => write!(f, "STOP_WHISPER"),
            Notice::Nick { new } => write!(f, "NICK {new}"),
            Notice::AskFile { id, size, filename } => {
                write!(f, "ASK_FILE {id} {size} {filename}")
            }
            Notice::ReplyFile {
                id,
                answer: FileAnswer::No,
            } => write!(f, "REPLY_FILE {id} NO"),
            Notice::ReplyFile {
                id,
                answer: FileAnswer::Yes { port, address },
            } => write!(f, "REPLY_FILE {id} yes {port} {address}"),
        }
    }
}
