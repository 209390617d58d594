//! Native messaging host.
//!
//! The browser extension launches `phishscan serve` and talks to it over
//! stdio. Scan requests run on their own tasks so slow analyses on one tab
//! never hold up another tab or a lifecycle signal; all outbound frames go
//! through a single writer task.
//!
//! # Example
//!
//! ```no_run
//! use phishscan::host::{Host, HostNotifier, Outbox};
//! # async fn run(build: impl FnOnce(HostNotifier) -> std::sync::Arc<phishscan::Coordinator>,
//! #              tabs: std::sync::Arc<phishscan::tabs::TabTable>) -> Result<(), phishscan::error::HostError> {
//! let (outbox, outgoing) = Outbox::channel();
//! let coordinator = build(HostNotifier::new(outbox.clone()));
//!
//! Host::new(coordinator, tabs, outbox, outgoing)
//!     .serve(tokio::io::stdin(), tokio::io::stdout())
//!     .await
//! # }
//! ```

mod framing;
pub mod protocol;

pub use framing::{read_frame, write_frame, MAX_INBOUND_BYTES, MAX_OUTBOUND_BYTES};
pub use protocol::{Inbound, Outbound, Response};

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::HostError;
use crate::model::{AnalysisResult, TabId};
use crate::notify::{Badge, Notifier};
use crate::tabs::TabTable;

/// Sending half of the outbound message queue.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Response>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, id: Option<u64>, body: Outbound) {
        if self.tx.send(Response { id, body }).is_err() {
            debug!("Outbound channel closed, dropping message");
        }
    }
}

/// Forwards badge changes to the extension.
pub struct HostNotifier {
    outbox: Outbox,
}

impl HostNotifier {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

impl Notifier for HostNotifier {
    fn result_committed(&self, tab_id: TabId, result: &AnalysisResult) {
        self.outbox.send(
            None,
            Outbound::Badge {
                tab_id,
                badge: Badge::for_result(result),
            },
        );
    }

    fn tab_cleared(&self, tab_id: TabId) {
        self.outbox.send(
            None,
            Outbound::Badge {
                tab_id,
                badge: Badge::cleared(),
            },
        );
    }
}

pub struct Host {
    coordinator: Arc<Coordinator>,
    tabs: Arc<TabTable>,
    outbox: Outbox,
    outgoing: mpsc::UnboundedReceiver<Response>,
}

impl Host {
    pub fn new(
        coordinator: Arc<Coordinator>,
        tabs: Arc<TabTable>,
        outbox: Outbox,
        outgoing: mpsc::UnboundedReceiver<Response>,
    ) -> Self {
        Self {
            coordinator,
            tabs,
            outbox,
            outgoing,
        }
    }

    /// Serves requests until the browser closes the channel.
    ///
    /// Analyses still running at that point are abandoned; there is nobody
    /// left to answer.
    pub async fn serve<R, W>(self, mut reader: R, writer: W) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Host {
            coordinator,
            tabs,
            outbox,
            outgoing,
        } = self;

        let shutdown = CancellationToken::new();
        let writer_task = tokio::spawn(write_loop(writer, outgoing, shutdown.clone()));
        let dispatcher = Dispatcher {
            coordinator,
            tabs,
            outbox,
        };
        let mut tasks = JoinSet::new();

        info!("Native messaging host started");
        let read_result = loop {
            while tasks.try_join_next().is_some() {}

            match read_frame(&mut reader).await {
                Ok(Some(frame)) => dispatcher.dispatch(&frame, &mut tasks),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        tasks.shutdown().await;
        dispatcher.coordinator.trackers().cancel_all();
        shutdown.cancel();

        let write_result = match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(HostError::Io(std::io::Error::other(e))),
        };

        info!("Native messaging host stopped");
        read_result.and(write_result)
    }
}

struct Dispatcher {
    coordinator: Arc<Coordinator>,
    tabs: Arc<TabTable>,
    outbox: Outbox,
}

impl Dispatcher {
    fn dispatch(&self, frame: &[u8], tasks: &mut JoinSet<()>) {
        let (id, message) = match protocol::decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Rejected message: {}", e.error);
                self.outbox.send(
                    e.id,
                    Outbound::Error {
                        message: e.error.to_string(),
                    },
                );
                return;
            }
        };

        match message {
            Inbound::Scan(request) => {
                self.tabs.set_url(request.tab_id, request.url.clone());
                let coordinator = self.coordinator.clone();
                let outbox = self.outbox.clone();
                tasks.spawn(async move {
                    let result = coordinator.handle_scan_request(request).await;
                    outbox.send(id, Outbound::Result { result });
                });
            }
            Inbound::SetMode { mode } => {
                let coordinator = self.coordinator.clone();
                let outbox = self.outbox.clone();
                tasks.spawn(async move {
                    let mode = coordinator.set_mode(mode).await;
                    outbox.send(id, Outbound::Mode { mode });
                });
            }
            Inbound::CheckAvailability => {
                let coordinator = self.coordinator.clone();
                let outbox = self.outbox.clone();
                tasks.spawn(async move {
                    let availability = coordinator.check_availability().await;
                    outbox.send(id, Outbound::Availability(availability));
                });
            }
            Inbound::GetStatus { tab_id } => {
                let status = self.coordinator.get_status(tab_id);
                self.outbox.send(id, Outbound::Status { tab_id, status });
            }
            Inbound::ClearTabCache { tab_id } => {
                let removed = self.coordinator.clear_tab_cache(tab_id);
                self.outbox.send(id, Outbound::CacheCleared { tab_id, removed });
            }
            Inbound::TabClosed { tab_id } => {
                self.tabs.remove(tab_id);
                self.coordinator.tab_closed(tab_id);
                self.outbox.send(id, Outbound::Ack);
            }
            Inbound::NavigationStarted { tab_id, url } => {
                match url {
                    Some(url) => self.tabs.set_url(tab_id, url),
                    None => self.tabs.remove(tab_id),
                }
                self.coordinator.navigation_started(tab_id);
                self.outbox.send(id, Outbound::Ack);
            }
            Inbound::IgnoreAdd { pattern, rule_type } => {
                let added = self.coordinator.add_ignore_rule(&pattern, rule_type);
                self.outbox.send(id, Outbound::IgnoreAdded { added });
            }
            Inbound::IgnoreRemove { index } => {
                let removed = self.coordinator.remove_ignore_rule(index);
                self.outbox.send(id, Outbound::IgnoreRemoved { removed });
            }
            Inbound::IgnoreList => {
                let rules = self.coordinator.ignore_rules();
                self.outbox.send(id, Outbound::IgnoreRules { rules });
            }
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outgoing: mpsc::UnboundedReceiver<Response>,
    shutdown: CancellationToken,
) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;

            message = outgoing.recv() => match message {
                Some(response) => write_response(&mut writer, &response).await?,
                None => return Ok(()),
            },

            _ = shutdown.cancelled() => {
                while let Ok(response) = outgoing.try_recv() {
                    write_response(&mut writer, &response).await?;
                }
                return Ok(());
            }
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> Result<(), HostError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(response)?;
    match write_frame(writer, &body).await {
        Err(HostError::MessageTooLarge(len)) => {
            warn!(len, "Dropping oversized outbound message");
            let fallback = Response {
                id: response.id,
                body: Outbound::Error {
                    message: format!("Response of {} bytes exceeds the size limit", len),
                },
            };
            write_frame(writer, &serde_json::to_vec(&fallback)?).await
        }
        other => other,
    }
}
