//! Message parser - Splits prefixed command text into name and arguments

/// A command extracted from message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parses `<prefix><name> arg1 arg2` style messages
#[derive(Debug, Clone)]
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a command; `None` when the text does not start with the prefix
    /// or has no command name after it
    pub fn parse(&self, text: &str) -> Option<ParsedCommand> {
        let cmd_text = text.trim_start().strip_prefix(self.command_prefix.as_str())?;

        // "! ping" is not a command
        if cmd_text.starts_with(char::is_whitespace) {
            return None;
        }

        let mut parts = cmd_text.split_whitespace();
        let name = parts.next()?.to_string();
        let args = parts.map(|s| s.to_string()).collect();

        Some(ParsedCommand { name, args })
    }

    /// Whether `text` invokes command `name` (case-insensitive)
    pub fn is_command(&self, text: &str, name: &str) -> bool {
        self.parse(text)
            .map(|cmd| cmd.name.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }

    /// Arguments following the command name, empty when not a command
    pub fn args(&self, text: &str) -> Vec<String> {
        self.parse(text).map(|cmd| cmd.args).unwrap_or_default()
    }
}
