//! Tool server kernel: wire codec, dispatch, scheduling and session lifecycle.
//!
//! [`ToolServer::serve`] reads newline-delimited JSON-RPC frames, dispatches
//! every request on a bounded scheduler and funnels responses through a
//! single writer task. Responses are correlated by id, not by position.

#![warn(missing_docs, clippy::pedantic)]

mod dispatcher;
mod handlers;
mod lifecycle;
pub mod protocol;
mod scheduler;
pub mod transport;

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tool_primitives::SessionId;
use tracing::{Instrument, debug, error, info, warn};

use protocol::{Incoming, Request, Response, decode_frame, encode_response};
use transport::{DEFAULT_MAX_FRAME_BYTES, Frame, FrameReader, FrameWriter};

pub use dispatcher::ToolDispatcher;
pub use handlers::{
    DispatchError, DispatchResult, Method, RequestContext, RequestHandler, dispatch_request,
};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleEvent, LifecycleResult, ServerState};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};

/// Grace period granted to in-flight requests once input closes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Tunables for [`ToolServer::serve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeOptions {
    max_frame_bytes: usize,
    shutdown_grace: Duration,
}

impl ServeOptions {
    /// Sets the largest accepted inbound frame.
    #[must_use]
    pub const fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Sets how long in-flight requests may run after input closes.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// Returns the largest accepted inbound frame.
    #[must_use]
    pub const fn max_frame_bytes(self) -> usize {
        self.max_frame_bytes
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(self) -> Duration {
        self.shutdown_grace
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Requests decoded and scheduled.
    pub requests: usize,
    /// Notifications received; never answered.
    pub notifications: usize,
    /// Frames dropped because they could not be decoded or were too large.
    pub discarded_frames: usize,
    /// Requests aborted after the grace period; never answered.
    pub abandoned: usize,
    /// Responses written to the output stream.
    pub responses_written: usize,
    /// The session was aborted before input closed.
    pub interrupted: bool,
}

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The session was not in a state that allows serving.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Reading the input stream failed.
    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),
    /// Writing the output stream failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    /// The writer task did not finish cleanly.
    #[error("response writer failed: {reason}")]
    Writer {
        /// Join failure description.
        reason: String,
    },
}

/// Result alias for serving.
pub type ServeResult<T> = Result<T, ServeError>;

/// One serving session over a request handler.
#[derive(Debug)]
pub struct ToolServer<H>
where
    H: RequestHandler + 'static,
{
    session_id: SessionId,
    lifecycle: Lifecycle,
    handler: Arc<H>,
    scheduler: TaskScheduler,
    options: ServeOptions,
}

impl<H> ToolServer<H>
where
    H: RequestHandler + 'static,
{
    /// Creates a server session with a fresh session id.
    #[must_use]
    pub fn new(handler: Arc<H>, scheduler: TaskScheduler, options: ServeOptions) -> Self {
        let session_id = SessionId::random();
        Self {
            session_id,
            lifecycle: Lifecycle::new(session_id),
            handler,
            scheduler,
            options,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.lifecycle.state()
    }

    /// Returns the serving options.
    #[must_use]
    pub const fn options(&self) -> ServeOptions {
        self.options
    }

    /// Returns a reference to the underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    fn request_job(&self, request: Request) -> impl Future<Output = Response> + Send + use<H> {
        let handler = Arc::clone(&self.handler);
        let span = tool_telemetry::request_span(&self.session_id, request.id(), request.method());
        let ctx = RequestContext::from_request(self.session_id, request);
        async move { dispatch_request(handler.as_ref(), ctx).await }.instrument(span)
    }

    /// Serves one session until `reader` reaches end of input.
    ///
    /// Every request gets exactly one response unless it is still running
    /// when the shutdown grace period expires, in which case it is aborted
    /// and left unanswered. Notifications and undecodable frames are never
    /// answered.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Lifecycle`] if this session already served,
    /// [`ServeError::Input`] on a read failure and [`ServeError::Output`] when
    /// responses can no longer be written. In-flight work is drained before
    /// either I/O error is returned.
    pub async fn serve<R, W>(&mut self, reader: R, writer: W) -> ServeResult<ServeSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.serve_until(reader, writer, std::future::pending()).await
    }

    /// Like [`ToolServer::serve`], but aborts the session when `shutdown`
    /// completes first.
    ///
    /// An aborted session stops reading at once, closes the scheduler and
    /// cancels in-flight requests without a grace period. Responses already
    /// queued are still written, as long as the output accepts them within
    /// the grace period.
    ///
    /// # Errors
    ///
    /// Same as [`ToolServer::serve`]. An aborted session also returns
    /// [`ServeError::Writer`] when the output stays blocked past the grace
    /// period.
    pub async fn serve_until<R, W, S>(
        &mut self,
        reader: R,
        writer: W,
        shutdown: S,
    ) -> ServeResult<ServeSummary>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        self.lifecycle.transition(LifecycleEvent::Start)?;
        info!(session_id = %self.session_id, "session started");

        let capacity = self.scheduler.config().max_in_flight().get();
        let (tx, rx) = mpsc::channel::<Response>(capacity);
        let mut writer_task = tokio::spawn(write_responses(FrameWriter::new(writer), rx));

        let mut frames = FrameReader::new(BufReader::new(reader), self.options.max_frame_bytes);
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
        let mut summary = ServeSummary::default();

        let stop = {
            let reading = self.read_frames(&mut frames, &tx, &mut in_flight, &mut summary);
            tokio::pin!(shutdown);
            tokio::select! {
                outcome = reading => Stop::EndOfInput(outcome),
                () = &mut shutdown => Stop::Interrupted,
            }
        };

        self.scheduler.close();
        drop(tx);

        let (read_outcome, written) = match stop {
            Stop::EndOfInput(outcome) => {
                self.lifecycle.transition(LifecycleEvent::Drain)?;
                info!(
                    session_id = %self.session_id,
                    in_flight = in_flight.len(),
                    "input closed; draining"
                );
                summary.abandoned = drain(in_flight, self.options.shutdown_grace).await;
                let written = writer_task.await.map_err(|err| ServeError::Writer {
                    reason: err.to_string(),
                });
                (outcome, written)
            }
            Stop::Interrupted => {
                self.lifecycle.transition(LifecycleEvent::Abort)?;
                summary.interrupted = true;
                summary.abandoned = cancel(in_flight);
                warn!(
                    session_id = %self.session_id,
                    abandoned = summary.abandoned,
                    "session aborted"
                );
                let written =
                    match tokio::time::timeout(self.options.shutdown_grace, &mut writer_task).await {
                        Ok(joined) => joined.map_err(|err| ServeError::Writer {
                            reason: err.to_string(),
                        }),
                        Err(_) => {
                            writer_task.abort();
                            Err(ServeError::Writer {
                                reason: "output still blocked after the grace period".to_owned(),
                            })
                        }
                    };
                (Ok(()), written)
            }
        };
        self.lifecycle.transition(LifecycleEvent::Stop)?;

        read_outcome.map_err(ServeError::Input)?;
        summary.responses_written = written?.map_err(ServeError::Output)?;

        info!(
            session_id = %self.session_id,
            requests = summary.requests,
            notifications = summary.notifications,
            discarded = summary.discarded_frames,
            abandoned = summary.abandoned,
            responses = summary.responses_written,
            interrupted = summary.interrupted,
            "session stopped"
        );
        Ok(summary)
    }

    async fn read_frames<R>(
        &self,
        frames: &mut FrameReader<BufReader<R>>,
        tx: &mpsc::Sender<Response>,
        in_flight: &mut Vec<JoinHandle<()>>,
        summary: &mut ServeSummary,
    ) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if tx.is_closed() {
                warn!(session_id = %self.session_id, "response writer stopped; no longer reading");
                return Ok(());
            }

            let Some(frame) = frames.next_frame().await? else {
                return Ok(());
            };

            match frame {
                Frame::Oversized { len } => {
                    summary.discarded_frames += 1;
                    warn!(len, limit = self.options.max_frame_bytes, "discarding oversized frame");
                }
                Frame::Message(bytes) => match decode_frame(&bytes) {
                    Err(err) => {
                        summary.discarded_frames += 1;
                        warn!(error = %err, "discarding frame");
                    }
                    Ok(Incoming::Notification(notification)) => {
                        summary.notifications += 1;
                        debug!(method = notification.method(), "notification received");
                    }
                    Ok(Incoming::Request(request)) => {
                        summary.requests += 1;
                        let job = self.request_job(request);
                        let tx = tx.clone();
                        // Blocks while every slot is taken; a stalled writer
                        // keeps its slots, so reading pauses here too.
                        let admitted = self
                            .scheduler
                            .spawn(async move {
                                let response = job.await;
                                if tx.send(response).await.is_err() {
                                    debug!("response dropped; writer has stopped");
                                }
                            })
                            .await;
                        match admitted {
                            Ok(handle) => in_flight.push(handle),
                            Err(err) => {
                                warn!(error = %err, "scheduler closed; no longer reading");
                                return Ok(());
                            }
                        }
                    }
                },
            }

            in_flight.retain(|handle| !handle.is_finished());
        }
    }
}

enum Stop {
    EndOfInput(io::Result<()>),
    Interrupted,
}

async fn write_responses<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<Response>,
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(response) = rx.recv().await {
        let bytes = match encode_response(&response) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(request_id = %response.id(), error = %err, "failed to encode response");
                continue;
            }
        };
        writer.write_frame(&bytes).await?;
        written += 1;
    }
    Ok(written)
}

/// Waits up to `grace` for the handles, then aborts the rest. Returns how
/// many were aborted.
async fn drain(handles: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    if handles.is_empty() {
        return 0;
    }

    let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
    match tokio::time::timeout(grace, join_all(handles)).await {
        Ok(results) => {
            for err in results.into_iter().filter_map(Result::err) {
                error!(error = %err, "request task failed");
            }
            0
        }
        Err(_) => {
            let mut abandoned = 0;
            for handle in aborts.into_iter().filter(|handle| !handle.is_finished()) {
                handle.abort();
                abandoned += 1;
            }
            warn!(abandoned, grace_ms = grace.as_millis(), "aborted requests after grace period");
            abandoned
        }
    }
}

/// Aborts every unfinished handle. Returns how many were aborted.
fn cancel(handles: Vec<JoinHandle<()>>) -> usize {
    let mut abandoned = 0;
    for handle in handles.into_iter().filter(|handle| !handle.is_finished()) {
        handle.abort();
        abandoned += 1;
    }
    abandoned
}
