use crate::application::errors::CommandError;
use crate::application::messaging::parser::MessageParser;
use crate::application::messaging::predicates;
use crate::domain::entities::{Command, CommandRegistry};

/// Help line for one registered command
#[derive(Debug, Clone)]
struct HelpEntry {
    name: String,
    description: Option<String>,
    usage: Option<String>,
}

/// Service for assembling the command table
pub struct CommandService {
    registry: CommandRegistry,
    parser: MessageParser,
    bot_name: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            parser: MessageParser::new(prefix),
            bot_name: bot_name.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        self.parser.prefix()
    }

    pub fn register(&mut self, command: Command) {
        self.registry.register(command);
    }

    pub fn register_defaults(&mut self) {
        let prefix = self.prefix().to_string();

        self.register(Command::new("ping")
            .with_description("Check bot is alive")
            .with_usage(format!("{}ping", prefix))
            .with_predicate(predicates::exact(format!("{}ping", prefix)))
            .reply_with("Pong!"));

        let parser = self.parser.clone();
        self.register(Command::new("echo")
            .with_description("Repeat the given text")
            .with_usage(format!("{}echo <text>", prefix))
            .with_predicate(predicates::command(prefix.as_str(), &["echo"]))
            .with_sync_handler(move |event| {
                let args = parser.args(&event.text);
                if args.is_empty() {
                    return Err(CommandError::InvalidArgs(format!("Usage: {}echo <text>", parser.prefix())));
                }
                Ok(Some(event.reply(args.join(" "))))
            }));

        let version = format!("{} v{}", self.bot_name, env!("CARGO_PKG_VERSION"));
        self.register(Command::new("version")
            .with_description("Show bot version")
            .with_predicate(predicates::command(prefix.as_str(), &["version"]))
            .reply_with(version));
    }

    /// Freeze the command table, appending `help` over everything registered so far
    pub fn build(mut self) -> CommandRegistry {
        let prefix = self.prefix().to_string();

        let mut entries: Vec<HelpEntry> = self.registry.all()
            .map(|cmd| HelpEntry {
                name: cmd.name.clone(),
                description: cmd.description.clone(),
                usage: cmd.usage.clone(),
            })
            .collect();
        entries.push(HelpEntry {
            name: "help".to_string(),
            description: Some("Show this message".to_string()),
            usage: Some(format!("{}help [command]", prefix)),
        });

        let parser = self.parser.clone();
        self.registry.register(Command::new("help")
            .with_description("Show this message")
            .with_usage(format!("{}help [command]", prefix))
            .with_predicate(predicates::command(prefix.as_str(), &["help"]))
            .with_sync_handler(move |event| {
                let args = parser.args(&event.text);
                let text = render_help(&entries, parser.prefix(), args.first().map(String::as_str));
                Ok(Some(event.reply(text)))
            }));

        self.registry
    }
}

fn render_help(entries: &[HelpEntry], prefix: &str, command: Option<&str>) -> String {
    if let Some(name) = command {
        let name = name.trim_start_matches(prefix);
        if let Some(cmd) = entries.iter().find(|e| e.name.eq_ignore_ascii_case(name)) {
            let mut help = format!("{}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
            if let Some(usage) = &cmd.usage {
                help.push_str(&format!("\nUsage: {}", usage));
            }
            return help;
        }
        return format!("Command {}{} not found", prefix, name);
    }

    // List all commands
    let mut help = "Available commands:".to_string();
    for cmd in entries {
        help.push_str(&format!("\n  {}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or("")));
    }
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{MessageEvent, ReplyIntent};

    fn registry() -> CommandRegistry {
        let mut service = CommandService::new("!", "ping-bot");
        service.register_defaults();
        service.build()
    }

    async fn run(registry: &CommandRegistry, text: &str) -> Option<Result<Option<ReplyIntent>, CommandError>> {
        let event = MessageEvent::new("C1", "U1", text);
        let cmd = registry.find(&event)?;
        Some(cmd.invoke(event).await)
    }

    #[tokio::test]
    async fn test_ping() {
        let registry = registry();
        let reply = run(&registry, "!ping").await.unwrap().unwrap().unwrap();
        assert_eq!(reply.text, "Pong!");
        assert!(run(&registry, "!ping extra").await.is_none());
    }

    #[tokio::test]
    async fn test_echo() {
        let registry = registry();
        let reply = run(&registry, "!echo hello there").await.unwrap().unwrap().unwrap();
        assert_eq!(reply.text, "hello there");

        let err = run(&registry, "!echo").await.unwrap().unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn test_version() {
        let registry = registry();
        let reply = run(&registry, "!version").await.unwrap().unwrap().unwrap();
        assert_eq!(reply.text, format!("ping-bot v{}", env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn test_help_lists_all_commands() {
        let registry = registry();
        let reply = run(&registry, "!help").await.unwrap().unwrap().unwrap();
        for name in ["ping", "echo", "version", "help"] {
            assert!(reply.text.contains(&format!("!{}", name)), "missing {} in {}", name, reply.text);
        }
    }

    #[tokio::test]
    async fn test_help_for_one_command() {
        let registry = registry();
        let reply = run(&registry, "!help !echo").await.unwrap().unwrap().unwrap();
        assert!(reply.text.starts_with("!echo - Repeat the given text"));
        assert!(reply.text.contains("Usage: !echo <text>"));

        let reply = run(&registry, "!help nope").await.unwrap().unwrap().unwrap();
        assert_eq!(reply.text, "Command !nope not found");
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let mut service = CommandService::new("?", "ping-bot");
        service.register_defaults();
        let registry = service.build();

        assert!(run(&registry, "?ping").await.is_some());
        assert!(run(&registry, "!ping").await.is_none());
    }

    #[test]
    fn test_custom_commands_listed_in_help() {
        let mut service = CommandService::new("!", "ping-bot");
        service.register(Command::new("roll").with_description("Roll a die"));
        let registry = service.build();
        assert!(registry.get("roll").is_some());
        assert!(registry.get("help").is_some());
        assert_eq!(registry.len(), 2);
    }
}
