//! Localized message table.
//!
//! Every user-visible string goes through here so deployments can reword or
//! translate the bot without touching code. Templates use `{name}`
//! placeholders; unknown keys render as the key itself, which keeps a
//! missing translation visible instead of silent.

use std::collections::HashMap;

/// Message keys for the auto-DJ approval prompts.
pub const KEY_QUEUE_MANAGEMENT: &str = "bot.queue_management";
pub const KEY_QUEUE_REPLACEMENT: &str = "bot.queue_replacement";

/// Pick the approval-prompt key for a proposal round.
///
/// Auto-approved rounds use the `_auto` variant of the two queue prompt
/// keys; every other key passes through unchanged.
pub fn queue_approval_message_key(base_key: &str, auto_approve: bool) -> String {
    match base_key {
        KEY_QUEUE_MANAGEMENT | KEY_QUEUE_REPLACEMENT if auto_approve => {
            format!("{}_auto", base_key)
        }
        _ => base_key.to_string(),
    }
}

/// The message table. Defaults to English; overridable per deployment.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: HashMap<String, String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let mut entries = HashMap::new();
        let mut put = |k: &str, v: &str| entries.insert(k.to_string(), v.to_string());

        put("bot.startup", "The decks are live. Send me songs!");
        put("bot.shutdown", "Packing up the turntables. Back soon.");
        put("bot.help", "Send me a song link or tell me what you want to hear and I'll add it to the playlist.");
        put(
            "bot.added",
            "Added {title} by {artist} to the playlist.\n{url}",
        );
        put(
            "bot.added_at_position",
            "Added {title} by {artist} to the playlist (queue spot {position}).\n{url}",
        );
        put(
            "bot.added_by_approver",
            "Added {title} by {artist} to the playlist ({approver} approved).\n{url}",
        );
        put(
            "bot.added_priority",
            "Coming right up: {title} by {artist} jumps the queue.",
        );
        put(
            "bot.duplicate",
            "{title} by {artist} is already on the playlist.",
        );
        put(
            "bot.confirm",
            "Did you mean {title} by {artist}{album}{year}? Sounds like {mood}.\n{url}",
        );
        put(
            "bot.which_song",
            "I couldn't pin that one down. Which song did you mean?",
        );
        put("bot.denied", "The admins passed on that one. Sorry!");
        put(
            "bot.approval_request",
            "{requester} wants to add {title} by {artist}. Admins, what do you say?\n{url}",
        );
        put("bot.error_extract", "I couldn't read a track from that link.");
        put(
            "bot.error_no_matches",
            "I couldn't find anything matching that. Try different words?",
        );
        put(
            "bot.error_add",
            "Something went wrong adding that track. Try again in a bit.",
        );
        put(
            "bot.error_approval",
            "The approval round fell apart. Try again in a bit.",
        );
        put(
            "bot.queue_management",
            "The playlist ran dry, so I'd queue up {title} by {artist} ({mood}). Object within the hour... or so.",
        );
        put(
            "bot.queue_management_auto",
            "The playlist ran dry, so I'm queueing {title} by {artist} ({mood}).",
        );
        put(
            "bot.queue_replacement",
            "Fine, how about {title} by {artist} instead ({mood})?",
        );
        put(
            "bot.queue_replacement_auto",
            "Out of patience - queueing {title} by {artist} ({mood}).",
        );
        put(
            "bot.queue_auto_accepted",
            "No objections - {track} goes on the playlist.",
        );
        put(
            "warn.device",
            "No active playback device found. The music has stopped!",
        );
        put(
            "warn.permissions",
            "I'm missing admin rights in the chat. Some features will fail.",
        );
        put(
            "warn.settings",
            "Playback settings drifted (shuffle/repeat) and I couldn't fix them: {issues}",
        );
        put(
            "warn.queue_sync",
            "My queue model and the streaming queue have drifted apart. A restart may help.",
        );

        Self { entries }
    }
}

impl Lexicon {
    /// Look up a template; unknown keys echo back as themselves.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Render a template, substituting `{name}` placeholders.
    pub fn render(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.get(key).to_string();
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    /// Overlay deployment-specific entries onto the defaults.
    pub fn merge(&mut self, overrides: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in overrides {
            self.entries.insert(key, value);
        }
    }
}
