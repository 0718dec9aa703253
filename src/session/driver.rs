use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use super::{ClickOutcome, PrefetchSession};
use crate::error::FetchError;
use crate::fetch::{fetch_success, FetchedDocument};

/// DOM-side events delivered to a running session
#[derive(Debug)]
pub enum PageEvent {
    Click { href: String, reply: oneshot::Sender<ClickOutcome> },
    PopState { location: String },
    Hover { href: String },
    PointerMove,
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    Unload,
}

/// Read-only view of a running session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub location: String,
    pub body: String,
    pub history_len: usize,
    pub log_len: usize,
    pub cached: Vec<String>,
    pub hints: Vec<String>,
    /// Markup of the hints inserted into the document head
    pub head: String,
    pub in_flight: Vec<String>,
}

type Completion = (String, Result<FetchedDocument, FetchError>);

/// Start `session` on its own task.
///
/// All session state is touched only by that task: page events arrive on a
/// channel and speculative fetches report back on another. The task hands
/// the session back when the page unloads or every handle is dropped.
pub fn spawn(session: PrefetchSession) -> (SessionHandle, JoinHandle<PrefetchSession>) {
    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(run(session, rx));
    (SessionHandle { tx }, task)
}

async fn run(mut session: PrefetchSession, mut events: mpsc::Receiver<PageEvent>) -> PrefetchSession {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    let mut in_flight: HashSet<String> = HashSet::new();

    let period = session.options().interval.max(Duration::from_millis(1));
    let quiet = session.options().debounce;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let debounce = time::sleep(Duration::ZERO);
    tokio::pin!(debounce);
    let mut debounce_armed = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                None | Some(PageEvent::Unload) => break,
                Some(PageEvent::Click { href, reply }) => {
                    let _ = reply.send(session.on_click(&href));
                }
                Some(PageEvent::PopState { location }) => {
                    session.on_pop_state(&location);
                }
                Some(PageEvent::Hover { href }) => {
                    session.on_hover(&href);
                }
                Some(PageEvent::PointerMove) => {
                    debounce.as_mut().reset(Instant::now() + quiet);
                    debounce_armed = true;
                }
                Some(PageEvent::Snapshot { reply }) => {
                    let _ = reply.send(snapshot(&session, &in_flight));
                }
            },
            _ = ticker.tick() => {
                launch(&session, &mut in_flight, &done_tx);
            }
            _ = &mut debounce, if debounce_armed => {
                debounce_armed = false;
                launch(&session, &mut in_flight, &done_tx);
            }
            Some((key, result)) = done_rx.recv() => {
                in_flight.remove(&key);
                let outcome = session.complete_prefetch(key, result);
                debug!(?outcome, "Speculative fetch finished");
            }
        }
    }

    // In-flight fetches keep running; their completions go nowhere
    session
}

fn launch(session: &PrefetchSession, in_flight: &mut HashSet<String>, done_tx: &mpsc::UnboundedSender<Completion>) {
    let planned = match session.plan_prefetch() {
        Ok(planned) => planned,
        Err(outcome) => {
            debug!(?outcome, "No speculative fetch");
            return;
        }
    };
    if !in_flight.insert(planned.key.clone()) {
        return;
    }
    session.notify_agent(&planned);

    let fetcher = session.fetcher();
    let done_tx = done_tx.clone();
    tokio::spawn(async move {
        let result = fetch_success(fetcher.as_ref(), &planned.request).await;
        let _ = done_tx.send((planned.key, result));
    });
}

fn snapshot(session: &PrefetchSession, in_flight: &HashSet<String>) -> SessionSnapshot {
    let page = session.page();
    let mut in_flight: Vec<String> = in_flight.iter().cloned().collect();
    in_flight.sort();
    SessionSnapshot {
        location: page.location().to_string(),
        body: page.body().to_string(),
        history_len: page.history().len(),
        log_len: session.log().len(),
        cached: session.volatile().keys(),
        hints: page.head().hints().iter().map(|h| h.href.clone()).collect(),
        head: page.head().to_html(),
        in_flight,
    }
}

/// Page-side handle to a running session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<PageEvent>,
}

impl SessionHandle {
    /// Deliver a click. If the session is gone the browser just navigates.
    pub async fn click(&self, href: impl Into<String>) -> ClickOutcome {
        let (reply, rx) = oneshot::channel();
        let event = PageEvent::Click { href: href.into(), reply };
        if self.tx.send(event).await.is_err() {
            return ClickOutcome::Proceed { tracked: false };
        }
        rx.await.unwrap_or(ClickOutcome::Proceed { tracked: false })
    }

    pub async fn pop_state(&self, location: impl Into<String>) {
        self.send(PageEvent::PopState { location: location.into() }).await;
    }

    pub async fn hover(&self, href: impl Into<String>) {
        self.send(PageEvent::Hover { href: href.into() }).await;
    }

    /// High-frequency signal; collapsed by the session's debounce
    pub async fn pointer_moved(&self) {
        self.send(PageEvent::PointerMove).await;
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(PageEvent::Snapshot { reply }).await;
        rx.await.ok()
    }

    pub async fn unload(&self) {
        self.send(PageEvent::Unload).await;
    }

    async fn send(&self, event: PageEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Prefetch session already unloaded");
        }
    }
}
