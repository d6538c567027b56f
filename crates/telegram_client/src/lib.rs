pub mod api;
pub mod client_trait;
pub mod error;
pub mod types;

pub use api::client::{TelegramClient, TelegramConfig, DEFAULT_API_BASE};
pub use client_trait::TelegramApi;
pub use error::{Result, TelegramError};
pub use types::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};
