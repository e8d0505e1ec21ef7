//! Chat Channel Abstraction
//!
//! The core only talks to the transport through `Notifier`; the Telegram
//! implementation lives in `crate::telegram`.

pub mod traits;

pub use traits::{delete_quietly, ChannelError, MessageRef, Notifier, ParseMode};
