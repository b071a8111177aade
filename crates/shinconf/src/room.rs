//! Room identity - the chat group and playlist the bot serves.

use serde::{Deserialize, Serialize};

/// Identity of the served room. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RoomConfig {
    /// Chat group the bot listens in.
    #[serde(default)]
    pub chat_id: String,

    /// Target playlist that collects everyone's requests.
    #[serde(default)]
    pub playlist_id: String,
}
