pub mod chat;
pub mod config;
pub mod emotes;
pub mod twitch;
pub mod util; // doctestのためpubにする

pub use chat::{ChatConfig, ChatEvent, ChatItem, ChatSession};
pub use emotes::{EmoteAggregator, EmoteCatalog, MessageSegment};
pub use twitch::{HelixClient, TwitchError};
