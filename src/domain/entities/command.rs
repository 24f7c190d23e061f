/// Actions the bot knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuCommand {
    Start,
    AddPhrase,
    RandomPhrase,
    Statistics,
    TestBroadcast,
    Help,
}

/// Represents a bot command and the ways a user can trigger it
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub action: MenuCommand,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    /// Reply keyboard button text, if the command is on the menu
    pub label: Option<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, action: MenuCommand) -> Self {
        Self {
            name: name.into(),
            action,
            description: None,
            aliases: Vec::new(),
            usage: None,
            label: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.to_lowercase() == input_lower ||
            self.aliases.iter().any(|a| a.to_lowercase() == input_lower)
    }

    pub fn matches_label(&self, text: &str) -> bool {
        self.label.as_deref() == Some(text.trim())
    }
}

/// Command registry, kept in registration order so help and menus are stable
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bot's command surface
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(Command::new("start", MenuCommand::Start)
            .with_description("Show the main menu")
            .with_aliases(vec!["menu".to_string()]));

        registry.register(Command::new("add", MenuCommand::AddPhrase)
            .with_description("Add a phrase")
            .with_usage("/add Your phrase")
            .with_label("➕ Add phrase"));

        registry.register(Command::new("sendphrase", MenuCommand::RandomPhrase)
            .with_description("Get a random phrase")
            .with_aliases(vec!["random".to_string()])
            .with_label("🎲 Random phrase"));

        registry.register(Command::new("stats", MenuCommand::Statistics)
            .with_description("Show statistics")
            .with_label("📈 Statistics"));

        registry.register(Command::new("test_send", MenuCommand::TestBroadcast)
            .with_description("Run a test broadcast")
            .with_label("🧪 Test broadcast"));

        registry.register(Command::new("help", MenuCommand::Help)
            .with_description("Show help message")
            .with_label("ℹ️ Help"));

        registry
    }

    /// Registering a name twice replaces the earlier command
    pub fn register(&mut self, command: Command) {
        self.commands.retain(|c| c.name != command.name);
        self.commands.push(command);
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.matches(input))
    }

    pub fn find_by_label(&self, text: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.matches_label(text))
    }

    pub fn find_action(&self, action: MenuCommand) -> Option<&Command> {
        self.commands.iter().find(|c| c.action == action)
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Menu labels laid out two per row
    pub fn menu_layout(&self) -> Vec<Vec<String>> {
        let labels: Vec<String> = self.commands.iter()
            .filter_map(|c| c.label.clone())
            .collect();
        labels.chunks(2).map(|row| row.to_vec()).collect()
    }
}
