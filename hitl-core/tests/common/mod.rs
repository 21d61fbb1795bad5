//! Recording doubles for the relay service and the display surface.
#![allow(dead_code)]

use async_trait::async_trait;
use hitl_core::models::Prompt;
use hitl_core::providers::{
    BotIdentity, DialogError, DialogOutcome, DialogSurface, InboundMessage, RelayError,
    RelayService,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type Batch = Result<Vec<InboundMessage>, String>;

/// Relay that replays scripted fetch results and records every call.
///
/// Once the script runs out, a fetch waits for the full `wait` and returns nothing, like an idle
/// long poll.
pub struct ScriptedRelay {
    latest: Mutex<Result<Option<i64>, String>>,
    script: Mutex<VecDeque<Batch>>,
    identity_fails: bool,
    send_fails: bool,
    /// Cancelled right after the given fetch (1-based) returns its batch
    cancel_after_fetch: Option<(usize, CancellationToken)>,
    sent: Mutex<Vec<(String, String)>>,
    fetches: Mutex<Vec<Option<i64>>>,
    probes: AtomicUsize,
}

impl ScriptedRelay {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(Ok(None)),
            script: Mutex::new(VecDeque::new()),
            identity_fails: false,
            send_fails: false,
            cancel_after_fetch: None,
            sent: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn with_latest(self, latest: i64) -> Self {
        *self.latest.lock().unwrap() = Ok(Some(latest));
        self
    }

    pub fn with_seed_failure(self) -> Self {
        *self.latest.lock().unwrap() = Err("connection reset".to_string());
        self
    }

    pub fn with_batch(self, batch: Vec<InboundMessage>) -> Self {
        self.script.lock().unwrap().push_back(Ok(batch));
        self
    }

    pub fn with_fetch_error(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err("502 Bad Gateway".to_string()));
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.identity_fails = true;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.send_fails = true;
        self
    }

    pub fn cancel_after_fetch(mut self, fetch: usize, token: CancellationToken) -> Self {
        self.cancel_after_fetch = Some((fetch, token));
        self
    }

    pub fn push_batch(&self, batch: Vec<InboundMessage>) {
        self.script.lock().unwrap().push_back(Ok(batch));
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// `after` argument of every fetch, in order
    pub fn fetches(&self) -> Vec<Option<i64>> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayService for ScriptedRelay {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn identity(&self) -> Result<BotIdentity, RelayError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.identity_fails {
            return Err(RelayError::Other("getMe failed".to_string()));
        }
        Ok(BotIdentity {
            id: 1,
            username: Some("hitl_test_bot".to_string()),
        })
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<i64, RelayError> {
        if self.send_fails {
            return Err(RelayError::Rejected {
                method: "sendMessage",
                description: "Bad Request: chat not found".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((recipient.to_string(), text.to_string()));
        Ok(sent.len() as i64)
    }

    async fn fetch_updates(
        &self,
        after: Option<i64>,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, RelayError> {
        let count = {
            let mut fetches = self.fetches.lock().unwrap();
            fetches.push(after);
            fetches.len()
        };
        let next = self.script.lock().unwrap().pop_front();
        let result = match next {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(e)) => Err(RelayError::Other(e)),
            None => {
                tokio::time::sleep(wait).await;
                Ok(Vec::new())
            }
        };
        if let Some((n, token)) = &self.cancel_after_fetch {
            if *n == count {
                token.cancel();
            }
        }
        result
    }

    async fn latest_sequence(&self) -> Result<Option<i64>, RelayError> {
        self.latest.lock().unwrap().clone().map_err(RelayError::Other)
    }
}

/// Display surface that answers with a fixed outcome, or never closes when none is given.
pub struct MockSurface {
    available: bool,
    reply: Option<DialogOutcome>,
    presented: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MockSurface {
    pub fn replying(reply: DialogOutcome) -> Self {
        Self {
            available: true,
            reply: Some(reply),
            presented: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Operator never answers
    pub fn silent() -> Self {
        Self {
            reply: None,
            ..Self::replying(DialogOutcome::Dismissed)
        }
    }

    /// Headless session
    pub fn headless() -> Self {
        Self {
            available: false,
            ..Self::silent()
        }
    }

    pub fn presented(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.presented)
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

struct CloseOnDrop(Arc<AtomicBool>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DialogSurface for MockSurface {
    fn name(&self) -> &str {
        "mock"
    }

    fn check_available(&self) -> Result<(), DialogError> {
        if self.available {
            Ok(())
        } else {
            Err(DialogError::NoDisplay("no DISPLAY".to_string()))
        }
    }

    async fn present(&self, _prompt: &Prompt) -> Result<DialogOutcome, DialogError> {
        self.presented.fetch_add(1, Ordering::SeqCst);
        let _modal = CloseOnDrop(Arc::clone(&self.closed));
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => std::future::pending().await,
        }
    }
}
