//! Inbound chat commands

/// One message pulled from the inbound command source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// Strictly increasing per source.
    pub sequence: i64,
    pub sender_id: String,
    pub text: String,
}

impl InboundCommand {
    pub fn new(sequence: i64, sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sequence,
            sender_id: sender_id.into(),
            text: text.into(),
        }
    }
}

/// Recognized command shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCommand {
    /// Start tracking the given url.
    Add(String),
    List,
    Help,
}

impl TrackerCommand {
    /// Parse a chat message. Unknown commands and `add` without a payload yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?;
        // Group chats address commands as `/add@SomeBot`.
        let keyword = head.split('@').next().unwrap_or(head).to_lowercase();

        match keyword.as_str() {
            "/add" | "/ekle" => {
                let payload = parts.collect::<Vec<_>>().join(" ");
                (!payload.is_empty()).then_some(Self::Add(payload))
            }
            "/list" | "/liste" => Some(Self::List),
            "/help" | "/yardim" | "/start" => Some(Self::Help),
            _ => None,
        }
    }
}

pub const HELP_TEXT: &str = "Price Watch commands:\n\n\
/add <link> - start tracking a product or category page\n\
/list - show tracked links\n\
/help - show this message\n\n\
Prices are checked on every scheduled run.";
