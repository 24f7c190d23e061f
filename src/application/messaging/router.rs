//! State router - decides what an inbound event means for its sender
//!
//! Each submitter is either `Idle` or `AwaitingPhrase`:
//! - "add phrase" from the menu: Idle -> AwaitingPhrase, reply with a prompt
//! - any text while AwaitingPhrase: captured as the phrase, back to Idle
//!   whether or not it was stored
//! - a menu label while Idle: run that command
//! - anything else while Idle: show the main menu

use std::sync::Arc;

use chrono_tz::Tz;

use super::conversation::{ConversationState, ConversationStates};
use crate::application::errors::{BotError, ValidationError};
use crate::application::services::broadcast_service::{pick_random, Broadcaster};
use crate::domain::entities::phrase::is_valid_phrase;
use crate::domain::entities::{
    ChatId, Command, CommandRegistry, Content, KeyboardButton, Markup, MenuCommand, Message, Phrase, Reply, User,
    UserId,
};
use crate::domain::traits::{Clock, PhraseStore, SystemClock};

/// Callback data of the inline refresh button under statistics
pub const REFRESH_STATS: &str = "refresh_stats";

/// How many submitters the statistics reply ranks
const TOP_SUBMITTERS: usize = 3;

pub struct StateRouter {
    store: Arc<dyn PhraseStore>,
    broadcaster: Arc<Broadcaster>,
    conversations: ConversationStates,
    commands: CommandRegistry,
    destinations: Vec<ChatId>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl StateRouter {
    pub fn new(store: Arc<dyn PhraseStore>, broadcaster: Arc<Broadcaster>, destinations: Vec<ChatId>) -> Self {
        Self {
            store,
            broadcaster,
            conversations: ConversationStates::new(),
            commands: CommandRegistry::with_defaults(),
            destinations,
            clock: Arc::new(SystemClock),
            timezone: Tz::UTC,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Zone used for the time shown in test broadcasts
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn state(&self, user_id: UserId) -> ConversationState {
        self.conversations.state(user_id)
    }

    /// Handle one inbound event. `None` means nothing to send back.
    pub async fn handle(&self, message: &Message) -> Option<Reply> {
        let user = message.sender.clone().unwrap_or_else(|| User::new(message.chat_id));

        match &message.content {
            Content::Text(text) => Some(self.handle_text(&user, text).await),
            Content::Command { name, args } => Some(self.handle_command(&user, name, args).await),
            Content::CallbackData(data) if data == REFRESH_STATS => Some(self.statistics().await),
            Content::CallbackData(data) => {
                tracing::debug!("Ignoring unknown callback {:?} from {}", data, user.id);
                None
            }
            // a blank event still settles a pending capture
            Content::Empty if self.conversations.take_awaiting(user.id) => Some(self.capture(&user, "").await),
            Content::Empty => None,
        }
    }

    async fn handle_text(&self, user: &User, text: &str) -> Reply {
        if self.conversations.take_awaiting(user.id) {
            tracing::debug!("Capturing phrase from {}", user.id);
            return self.capture(user, text).await;
        }

        match self.commands.find_by_label(text).map(|c| c.action) {
            Some(MenuCommand::AddPhrase) => self.request_phrase(user),
            Some(action) => self.run(action).await,
            None => {
                tracing::debug!("Unrecognised text from {}, showing menu", user.id);
                self.menu().await
            }
        }
    }

    async fn handle_command(&self, user: &User, name: &str, args: &[String]) -> Reply {
        // a command abandons a pending capture
        if self.conversations.take_awaiting(user.id) {
            tracing::debug!("Pending phrase from {} abandoned by /{}", user.id, name);
        }

        match self.commands.find(name).map(|c| c.action) {
            Some(MenuCommand::AddPhrase) => {
                let text = args.join(" ");
                if text.trim().is_empty() {
                    return Reply::text(format!("❌ Provide a phrase: {}", self.usage(MenuCommand::AddPhrase)));
                }
                self.capture(user, &text).await
            }
            Some(action) => self.run(action).await,
            None => {
                tracing::debug!("Unknown command /{} from {}, showing menu", name, user.id);
                self.menu().await
            }
        }
    }

    /// Commands that do not touch conversation state
    async fn run(&self, action: MenuCommand) -> Reply {
        match action {
            MenuCommand::Start => self.menu().await,
            MenuCommand::RandomPhrase => self.random_phrase().await,
            MenuCommand::Statistics => self.statistics().await,
            MenuCommand::TestBroadcast => self.test_broadcast().await,
            MenuCommand::Help => self.help(),
            MenuCommand::AddPhrase => Reply::text(format!("Usage: {}", self.usage(MenuCommand::AddPhrase))),
        }
    }

    fn request_phrase(&self, user: &User) -> Reply {
        self.conversations.begin_capture(user.id);
        Reply::text(format!("✍️ Write your phrase!\n\nOr: {}", self.usage(MenuCommand::AddPhrase)))
    }

    /// Validate and store a submission
    pub async fn submit(&self, user: &User, text: &str) -> Result<Phrase, BotError> {
        if !is_valid_phrase(text) {
            return Err(ValidationError::EmptyPhrase.into());
        }
        Ok(self.store.insert(user, text).await?)
    }

    async fn capture(&self, user: &User, text: &str) -> Reply {
        match self.submit(user, text).await {
            Ok(phrase) => Reply::text(format!(
                "✅ {}, added!\n\n{}\n\n🎉 The collection grew!",
                phrase.display_name, phrase.text
            )),
            Err(BotError::Validation(_)) => Reply::text("❌ The phrase is empty, nothing was saved"),
            Err(e) => {
                tracing::error!("Failed to add phrase from {}: {}", user.id, e);
                Reply::text("❌ Failed to add the phrase")
            }
        }
    }

    async fn menu(&self) -> Reply {
        let count = self.store.count().await;
        Reply::text(format!(
            "🚀 Phrase bot\n\n📊 In store: {} phrases\n\n👇 Choose an action:",
            count
        ))
        .with_markup(Markup::Menu(self.commands.menu_layout()))
    }

    async fn random_phrase(&self) -> Reply {
        let phrases = self.store.list_all().await;
        match pick_random(&phrases) {
            Some(phrase) => Reply::text(format!("🎲 Random phrase:\n\n{}", phrase)),
            None => Reply::text("📭 The collection is empty"),
        }
    }

    async fn statistics(&self) -> Reply {
        let total = self.store.count().await;
        let top = self.store.top_submitters(TOP_SUBMITTERS).await;

        let mut text = format!("📊 STATISTICS:\n\nTotal phrases: {}\n\n🏆 Top {}:\n", total, TOP_SUBMITTERS);
        for (i, entry) in top.iter().enumerate() {
            text.push_str(&format!("{}. {}: {}\n", i + 1, entry.display_name, entry.count));
        }

        Reply::text(text).with_markup(Markup::Inline(vec![vec![
            KeyboardButton::new("🔄 Refresh").with_callback(REFRESH_STATS),
        ]]))
    }

    async fn test_broadcast(&self) -> Reply {
        let phrases = self.store.list_all().await;
        let Some(phrase) = pick_random(&phrases) else {
            return Reply::text("📭 No phrases to send");
        };

        let time = self.clock.now().with_timezone(&self.timezone).format("%H:%M");
        let text = format!("🧪 TEST BROADCAST ({}):\n\n{}", time, phrase);
        let result = self.broadcaster.broadcast(&text, &self.destinations).await;

        let mut summary = format!(
            "🧪 Test finished!\n✅ Delivered: {}/{} chats\n",
            result.success_count(),
            result.total()
        );
        let failed: Vec<String> = result.failed().map(|o| o.chat_id.to_string()).collect();
        if !failed.is_empty() {
            summary.push_str(&format!("❌ Failed: {}\n", failed.join(", ")));
        }
        summary.push_str(&format!("\n{}", phrase));
        Reply::text(summary)
    }

    fn help(&self) -> Reply {
        let mut help = "📋 COMMANDS:\n".to_string();
        for cmd in self.commands.all() {
            let usage = cmd.usage.clone().unwrap_or_else(|| format!("/{}", cmd.name));
            help.push_str(&format!("• {} - {}\n", usage, cmd.description.as_deref().unwrap_or("")));
        }
        Reply::text(help)
    }

    fn usage(&self, action: MenuCommand) -> String {
        self.commands
            .find_action(action)
            .map(|c: &Command| c.usage.clone().unwrap_or_else(|| format!("/{}", c.name)))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryPhraseStore;
    use crate::testing::{FailingStore, ManualClock, RecordingBot};
    use chrono::TimeZone;

    const ALICE: UserId = 42;

    fn alice() -> User {
        User::new(ALICE).with_username("alice")
    }

    fn text(s: &str) -> Message {
        Message::from_text(-1, s).with_sender(alice())
    }

    fn command(name: &str, args: &[&str]) -> Message {
        Message::from_command(-1, name, args.iter().map(|s| s.to_string()).collect()).with_sender(alice())
    }

    fn router_with(store: Arc<dyn PhraseStore>, bot: Arc<RecordingBot>) -> StateRouter {
        StateRouter::new(store, Arc::new(Broadcaster::new(bot)), vec![-10, -20, -30])
    }

    fn router() -> (StateRouter, Arc<MemoryPhraseStore>, Arc<RecordingBot>) {
        let store = Arc::new(MemoryPhraseStore::new());
        let bot = Arc::new(RecordingBot::new());
        (router_with(store.clone(), bot.clone()), store, bot)
    }

    async fn reply(router: &StateRouter, message: Message) -> Reply {
        router.handle(&message).await.expect("a reply")
    }

    #[tokio::test]
    async fn add_phrase_flow_captures_next_text() {
        let (router, store, _) = router();

        let prompt = reply(&router, text("➕ Add phrase")).await;
        assert!(prompt.text.contains("Write your phrase"));
        assert_eq!(router.state(ALICE), ConversationState::AwaitingPhrase);

        let confirm = reply(&router, text("Carpe diem")).await;
        assert!(confirm.text.contains("alice, added"));
        assert!(confirm.text.contains("Carpe diem"));
        assert_eq!(router.state(ALICE), ConversationState::Idle);
        assert_eq!(store.list_all().await, vec!["Carpe diem".to_string()]);

        // only the one message is captured
        let menu = reply(&router, text("Memento mori")).await;
        assert!(matches!(menu.markup, Some(Markup::Menu(_))));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn blank_submission_is_rejected_before_the_store() {
        let (router, store, _) = router();

        for blank in ["", "   "] {
            reply(&router, text("➕ Add phrase")).await;
            let rejected = reply(&router, text(blank)).await;
            assert!(rejected.text.contains("empty"));
            assert_eq!(router.state(ALICE), ConversationState::Idle);
        }

        let rejected = reply(&router, command("add", &[])).await;
        assert!(rejected.text.contains("/add Your phrase"));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn storage_failure_still_clears_state() {
        let router = router_with(Arc::new(FailingStore), Arc::new(RecordingBot::new()));

        reply(&router, text("➕ Add phrase")).await;
        let failed = reply(&router, text("Carpe diem")).await;

        assert!(failed.text.contains("Failed to add"));
        assert_eq!(router.state(ALICE), ConversationState::Idle);
    }

    #[tokio::test]
    async fn menu_label_while_awaiting_is_captured_as_text() {
        let (router, store, _) = router();

        reply(&router, text("➕ Add phrase")).await;
        reply(&router, text("📈 Statistics")).await;

        assert_eq!(store.list_all().await, vec!["📈 Statistics".to_string()]);
    }

    #[tokio::test]
    async fn command_while_awaiting_abandons_capture() {
        let (router, store, _) = router();

        reply(&router, text("➕ Add phrase")).await;
        let stats = reply(&router, command("stats", &[])).await;

        assert!(stats.text.contains("STATISTICS"));
        assert_eq!(router.state(ALICE), ConversationState::Idle);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn unrecognised_text_shows_menu_without_state_change() {
        let (router, store, _) = router();
        store.insert(&alice(), "one").await.unwrap();

        let menu = reply(&router, text("what is this")).await;

        assert!(menu.text.contains("In store: 1 phrases"));
        assert_eq!(menu.markup, Some(Markup::Menu(router.commands().menu_layout())));
        assert_eq!(router.state(ALICE), ConversationState::Idle);

        let menu = reply(&router, command("nonsense", &[])).await;
        assert!(matches!(menu.markup, Some(Markup::Menu(_))));
    }

    #[tokio::test]
    async fn inline_add_stores_joined_args() {
        let (router, store, _) = router();

        let confirm = reply(&router, command("add", &["Carpe", "diem"])).await;

        assert!(confirm.text.contains("added"));
        assert_eq!(store.list_all().await, vec!["Carpe diem".to_string()]);
        assert_eq!(router.state(ALICE), ConversationState::Idle);
    }

    #[tokio::test]
    async fn random_phrase_reports_empty_then_returns_only_phrase() {
        let (router, store, _) = router();

        let empty = reply(&router, text("🎲 Random phrase")).await;
        assert!(empty.text.contains("empty"));

        store.insert(&alice(), "Carpe diem").await.unwrap();
        let random = reply(&router, command("sendphrase", &[])).await;
        assert_eq!(random.text, "🎲 Random phrase:\n\nCarpe diem");
    }

    #[tokio::test]
    async fn statistics_lists_top_three_with_refresh_button() {
        let (router, store, _) = router();
        for (id, name, n) in [(1, "A", 5), (2, "B", 5), (3, "C", 1), (4, "D", 1)] {
            let user = User::new(id).with_username(name);
            for i in 0..n {
                store.insert(&user, &format!("{}{}", name, i)).await.unwrap();
            }
        }

        let stats = reply(&router, text("📈 Statistics")).await;

        assert!(stats.text.contains("Total phrases: 12"));
        assert!(stats.text.contains("1. A: 5\n2. B: 5\n3. C: 1\n"));
        assert!(!stats.text.contains("D: 1"));
        let Some(Markup::Inline(rows)) = stats.markup else {
            panic!("expected inline markup");
        };
        assert_eq!(rows[0][0].callback_data.as_deref(), Some(REFRESH_STATS));

        let refreshed = router.handle(&Message::from_callback(-1, REFRESH_STATS).with_sender(alice())).await;
        assert!(refreshed.is_some_and(|r| r.text.contains("Total phrases: 12")));
    }

    #[tokio::test]
    async fn test_broadcast_reports_delivery_fraction() {
        let store = Arc::new(MemoryPhraseStore::new());
        let bot = Arc::new(RecordingBot::new().failing(-20));
        let clock = Arc::new(ManualClock::new(chrono::Utc.with_ymd_and_hms(2026, 3, 10, 7, 5, 0).unwrap()));
        let router = router_with(store.clone(), bot.clone())
            .with_clock(clock)
            .with_timezone(chrono_tz::Europe::Moscow);

        let empty = reply(&router, text("🧪 Test broadcast")).await;
        assert!(empty.text.contains("No phrases"));
        assert!(bot.attempted().is_empty());

        store.insert(&alice(), "Carpe diem").await.unwrap();
        let summary = reply(&router, command("test_send", &[])).await;

        assert!(summary.text.contains("Delivered: 2/3 chats"));
        assert!(summary.text.contains("Failed: -20"));
        assert_eq!(bot.sent_to(-10), vec!["🧪 TEST BROADCAST (10:05):\n\nCarpe diem".to_string()]);
        assert_eq!(bot.sent_to(-30).len(), 1);
    }

    #[tokio::test]
    async fn help_lists_every_command() {
        let (router, _, _) = router();
        let help = reply(&router, text("ℹ️ Help")).await;

        for cmd in router.commands().all() {
            assert!(help.text.contains(&cmd.name), "missing /{}", cmd.name);
        }
    }

    #[tokio::test]
    async fn parsed_blank_submission_is_rejected_and_clears_state() {
        let (router, store, _) = router();
        let parser = crate::application::messaging::MessageParser::new("/");
        let parse = |s: &str| parser.parse(-1, s, Some(alice()));

        for blank in ["   ", "\n\t", ""] {
            reply(&router, parse("➕ Add phrase")).await;
            let rejected = router.handle(&parse(blank)).await;
            assert!(rejected.is_some_and(|r| r.text.contains("empty")), "no rejection for {:?}", blank);
            assert_eq!(router.state(ALICE), ConversationState::Idle);
        }

        // the next message is not mistaken for the phrase
        let menu = reply(&router, parse("hello later")).await;
        assert!(matches!(menu.markup, Some(Markup::Menu(_))));
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn empty_content_and_unknown_callback_get_no_reply() {
        let (router, _, _) = router();
        assert!(router.handle(&Message::new(-1, Content::Empty)).await.is_none());
        assert!(router.handle(&Message::from_callback(-1, "other")).await.is_none());
    }

    #[tokio::test]
    async fn submitters_are_tracked_independently() {
        let (router, store, _) = router();
        let bob = User::new(7).with_username("bob");

        reply(&router, text("➕ Add phrase")).await;
        let menu = reply(&router, Message::from_text(-1, "hello").with_sender(bob)).await;

        assert!(matches!(menu.markup, Some(Markup::Menu(_))));
        assert_eq!(router.state(ALICE), ConversationState::AwaitingPhrase);
        assert_eq!(router.state(7), ConversationState::Idle);
        assert_eq!(store.count().await, 0);
    }
}
