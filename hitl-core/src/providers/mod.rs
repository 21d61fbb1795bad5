//! Communication providers: the remote relay service and the local display surface
//!
//! Channels talk to the outside world only through the [`RelayService`] and [`DialogSurface`]
//! traits, so tests can substitute recording doubles for Telegram and the native dialog tool.

mod native_dialog;
mod relay;
mod surface;
mod telegram;

pub use native_dialog::{DialogCommand, NativeDialog};
pub use relay::{BotIdentity, InboundMessage, RelayError, RelayService};
pub use surface::{DialogError, DialogOutcome, DialogSurface};
pub use telegram::TelegramClient;
