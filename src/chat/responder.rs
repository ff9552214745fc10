//! Automated responder policy.
//!
//! Picks a canned reply for a message: the first category whose trigger
//! appears in the lower-cased text wins, and a template is chosen uniformly
//! from that category (or from the default pool when nothing matches).

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::{CategoryConfig, ResponderConfig};
use crate::datetime::ServerClock;

const SENDER_PLACEHOLDER: &str = "{sender}";
const TIME_PLACEHOLDER: &str = "{time}";

/// A reply template with optional `{sender}` and `{time}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplate(String);

impl ReplyTemplate {
    /// Create a template.
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether rendering needs the clock.
    pub fn needs_time(&self) -> bool {
        self.0.contains(TIME_PLACEHOLDER)
    }

    /// Render the template.
    ///
    /// The clock is read only when the template contains `{time}`. Time goes
    /// in first so placeholders inside the sender name stay literal.
    pub fn render(&self, sender: &str, clock: &ServerClock) -> String {
        let timed = if self.needs_time() {
            self.0.replace(TIME_PLACEHOLDER, &clock.now_display())
        } else {
            self.0.clone()
        };
        timed.replace(SENDER_PLACEHOLDER, sender)
    }
}

/// A reply category.
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    triggers: Vec<String>,
    replies: Vec<ReplyTemplate>,
}

impl Category {
    /// Create a category. Triggers are lower-cased.
    pub fn new(
        name: impl Into<String>,
        triggers: impl IntoIterator<Item = impl Into<String>>,
        replies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            triggers: triggers
                .into_iter()
                .map(|t| Into::<String>::into(t).to_lowercase())
                .collect(),
            replies: replies.into_iter().map(ReplyTemplate::new).collect(),
        }
    }

    /// Category name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trigger substrings.
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Reply templates.
    pub fn replies(&self) -> &[ReplyTemplate] {
        &self.replies
    }

    /// Whether any trigger occurs in the already lower-cased text.
    fn matches(&self, lowered: &str) -> bool {
        self.triggers.iter().any(|t| lowered.contains(t.as_str()))
    }
}

impl From<&CategoryConfig> for Category {
    fn from(config: &CategoryConfig) -> Self {
        Self::new(&config.name, &config.triggers, &config.replies)
    }
}

/// Immutable responder table.
#[derive(Debug, Clone)]
pub struct ResponderPolicy {
    categories: Vec<Category>,
    default_replies: Vec<ReplyTemplate>,
    clock: ServerClock,
}

impl ResponderPolicy {
    /// Build a policy from explicit categories and a default pool.
    pub fn new(
        categories: Vec<Category>,
        default_replies: impl IntoIterator<Item = impl Into<String>>,
        clock: ServerClock,
    ) -> Self {
        Self {
            categories,
            default_replies: default_replies.into_iter().map(ReplyTemplate::new).collect(),
            clock,
        }
    }

    /// Build a policy from configuration.
    pub fn from_config(config: &ResponderConfig, clock: ServerClock) -> Self {
        Self::new(
            config.categories.iter().map(Category::from).collect(),
            &config.default_replies,
            clock,
        )
    }

    /// Categories in scan order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by name.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Default reply pool.
    pub fn default_replies(&self) -> &[ReplyTemplate] {
        &self.default_replies
    }

    /// First category whose trigger occurs in `text`, ignoring case.
    pub fn matching_category(&self, text: &str) -> Option<&Category> {
        let lowered = text.to_lowercase();
        self.categories.iter().find(|c| c.matches(&lowered))
    }

    /// Choose a reply for `text` sent by `sender`.
    pub fn reply(&self, text: &str, sender: &str) -> String {
        self.reply_with_rng(text, sender, &mut rand::rng())
    }

    /// Choose a reply using the given random source.
    pub fn reply_with_rng<R: Rng + ?Sized>(&self, text: &str, sender: &str, rng: &mut R) -> String {
        let pool = match self.matching_category(text) {
            Some(category) if !category.replies.is_empty() => &category.replies,
            _ => &self.default_replies,
        };

        pool.choose(rng)
            .map(|template| template.render(sender, &self.clock))
            .unwrap_or_default()
    }
}

impl Default for ResponderPolicy {
    fn default() -> Self {
        Self::from_config(&ResponderConfig::default(), ServerClock::default())
    }
}
