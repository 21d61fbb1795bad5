//! Responder channels
//!
//! A channel delivers one [`Request`] to the human and produces exactly one [`Outcome`]. The two
//! implementations share that contract, so the coordinator dispatches through [`Channel`] and
//! never branches on channel internals.

mod dialog;
mod relay;

pub use dialog::LocalDialogChannel;
pub use relay::{render_prompt, RemoteRelayChannel};

use crate::models::{Outcome, Request};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Which channel served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelKind {
    #[serde(rename = "telegram")]
    RemoteRelay,
    #[serde(rename = "dialog")]
    LocalDialog,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::RemoteRelay => "telegram",
            ChannelKind::LocalDialog => "dialog",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The channel selected for one request
pub enum Channel<'a> {
    Remote(&'a RemoteRelayChannel),
    Local(&'a LocalDialogChannel),
}

impl Channel<'_> {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Remote(_) => ChannelKind::RemoteRelay,
            Channel::Local(_) => ChannelKind::LocalDialog,
        }
    }

    /// Deliver the request and wait for the human, the deadline, or `cancel`.
    pub async fn deliver(&self, request: &Request, cancel: CancellationToken) -> Outcome {
        match self {
            Channel::Remote(remote) => remote.deliver(request, cancel).await,
            Channel::Local(local) => local.deliver(request, cancel).await,
        }
    }
}
