//! Debounced render/export session
//!
//! A tokio worker task owns the provider, the last good artifact, and the
//! platform surfaces, and executes commands sent from async callers. Input
//! edits arrive as debounced submissions (last-write-wins); renders are
//! stamped with a generation counter so a stale completion never overwrites
//! a newer one. Exports queue behind any pending or in-flight render, so an
//! export never silently operates on superseded output.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::compose::{CompositeOutput, CompositedArtifact, RenderWarning};
use crate::error::{Error, Result};
use crate::export::{self, ExportFormat, ExportOptions, ExportPhase};
use crate::platform::{Delivery, Platform};
use crate::{render_raster, render_vector, LogoSpec, RenderRequest, SymbolProvider};

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period between an input change and the re-render it schedules
    pub debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
        }
    }
}

/// How an export left the session
#[derive(Debug)]
pub enum ExportOutcome {
    /// Delivered through the download sink
    Saved(Delivery),
    /// Written to the clipboard
    Copied,
}

enum Command {
    Submit(RenderRequest, Option<LogoSpec>),
    RenderNow(
        RenderRequest,
        Option<LogoSpec>,
        oneshot::Sender<Result<Vec<RenderWarning>>>,
    ),
    Export(
        ExportFormat,
        ExportOptions,
        oneshot::Sender<Result<ExportOutcome>>,
    ),
    Artifact(oneshot::Sender<Option<CompositedArtifact>>),
    Close(oneshot::Sender<()>),
}

type RenderDone = (u64, RenderRequest, Option<LogoSpec>, Result<CompositeOutput>);

/// Handle to a running render/export worker
///
/// Cheap to clone; all clones drive the same worker. Must be created inside
/// a tokio runtime.
#[derive(Clone)]
pub struct RenderSession {
    cmd_tx: mpsc::Sender<Command>,
}

impl RenderSession {
    pub fn new(provider: Arc<dyn SymbolProvider>, platform: Platform) -> Self {
        Self::with_config(provider, platform, SessionConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn SymbolProvider>,
        platform: Platform,
        config: SessionConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (done_tx, done_rx) = mpsc::channel(32);
        let worker = Worker {
            provider,
            platform,
            debounce: config.debounce,
            generation: 0,
            in_flight: 0,
            artifact: None,
            last_request: None,
            pending: None,
            deadline: Instant::now(),
            queued_exports: Vec::new(),
            phase: ExportPhase::Idle,
            done_tx,
        };
        tokio::spawn(worker.run(cmd_rx, done_rx));
        Self { cmd_tx }
    }

    /// Schedule a debounced re-render; supersedes any pending submission
    pub async fn submit(&self, request: RenderRequest, logo: Option<LogoSpec>) -> Result<()> {
        self.cmd_tx
            .send(Command::Submit(request, logo))
            .await
            .map_err(|_| closed())
    }

    /// Render immediately, bypassing the debounce, and wait for the result
    pub async fn render_now(
        &self,
        request: RenderRequest,
        logo: Option<LogoSpec>,
    ) -> Result<Vec<RenderWarning>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RenderNow(request, logo, tx))
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    /// Export the last good artifact in the given format with default options
    pub async fn export(&self, format: ExportFormat) -> Result<ExportOutcome> {
        self.export_with(format, ExportOptions::default()).await
    }

    /// Export with explicit options. Queues behind any in-flight render.
    pub async fn export_with(
        &self,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<ExportOutcome> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Export(format, options, tx))
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())?
    }

    /// The last successfully composited artifact, if any
    pub async fn artifact(&self) -> Result<Option<CompositedArtifact>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Artifact(tx))
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())
    }

    /// Stop the worker after the current command drains
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Close(tx))
            .await
            .map_err(|_| closed())?;
        rx.await.map_err(|_| closed())
    }
}

fn closed() -> Error {
    Error::Other("render session is closed".to_string())
}

struct Worker {
    provider: Arc<dyn SymbolProvider>,
    platform: Platform,
    debounce: Duration,
    generation: u64,
    in_flight: usize,
    artifact: Option<CompositedArtifact>,
    last_request: Option<(RenderRequest, Option<LogoSpec>)>,
    pending: Option<(RenderRequest, Option<LogoSpec>)>,
    deadline: Instant,
    queued_exports: Vec<(ExportFormat, ExportOptions, oneshot::Sender<Result<ExportOutcome>>)>,
    phase: ExportPhase,
    done_tx: mpsc::Sender<RenderDone>,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, mut done_rx: mpsc::Receiver<RenderDone>) {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Submit(request, logo)) => {
                        self.pending = Some((request, logo));
                        self.deadline = Instant::now() + self.debounce;
                    }
                    Some(Command::RenderNow(request, logo, resp)) => {
                        self.pending = None;
                        self.generation += 1;
                        let res = render_raster(
                            self.provider.as_ref(),
                            &request,
                            logo.as_ref(),
                        )
                        .await;
                        let _ = resp.send(self.install(request, logo, res));
                    }
                    Some(Command::Export(format, options, resp)) => {
                        // Chosen ordering policy: exports queue behind both
                        // the debounced submission and any in-flight render.
                        if let Some((request, logo)) = self.pending.take() {
                            self.spawn_render(request, logo);
                        }
                        if self.in_flight > 0 {
                            self.queued_exports.push((format, options, resp));
                        } else {
                            let res = self.perform_export(format, &options);
                            let _ = resp.send(res);
                        }
                    }
                    Some(Command::Artifact(resp)) => {
                        let _ = resp.send(self.artifact.clone());
                    }
                    Some(Command::Close(resp)) => {
                        let _ = resp.send(());
                        break;
                    }
                    None => break,
                },
                done = done_rx.recv() => {
                    if let Some((generation, request, logo, res)) = done {
                        self.in_flight -= 1;
                        if generation == self.generation {
                            let _ = self.install(request, logo, res);
                        } else {
                            debug!("discarding stale render (generation {generation})");
                        }
                        if self.in_flight == 0 && self.pending.is_none() {
                            self.drain_exports();
                        }
                    }
                },
                _ = tokio::time::sleep_until(deadline), if self.pending.is_some() => {
                    if let Some((request, logo)) = self.pending.take() {
                        self.spawn_render(request, logo);
                    }
                },
            }
        }
    }

    fn spawn_render(&mut self, request: RenderRequest, logo: Option<LogoSpec>) {
        self.generation += 1;
        let generation = self.generation;
        self.in_flight += 1;
        let provider = self.provider.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let res = render_raster(provider.as_ref(), &request, logo.as_ref()).await;
            let _ = done_tx.send((generation, request, logo, res)).await;
        });
    }

    /// Install a completed render; failures keep the last good artifact
    fn install(
        &mut self,
        request: RenderRequest,
        logo: Option<LogoSpec>,
        res: Result<CompositeOutput>,
    ) -> Result<Vec<RenderWarning>> {
        match res {
            Ok(output) => {
                for warning in &output.warnings {
                    warn!("{warning}");
                }
                self.artifact = Some(output.artifact);
                self.last_request = Some((request, logo));
                Ok(output.warnings)
            }
            Err(e) => {
                warn!("render failed, keeping last good artifact: {e}");
                Err(e)
            }
        }
    }

    fn drain_exports(&mut self) {
        for (format, options, resp) in std::mem::take(&mut self.queued_exports) {
            let res = self.perform_export(format, &options);
            let _ = resp.send(res);
        }
    }

    fn perform_export(&mut self, format: ExportFormat, options: &ExportOptions) -> Result<ExportOutcome> {
        let res = self.export_stages(format, options);
        // Any stage failure resets to Idle; no partial work survives.
        self.phase = ExportPhase::Idle;
        if let Err(e) = &res {
            warn!("export {format:?} failed: {e}");
        }
        res
    }

    fn export_stages(&mut self, format: ExportFormat, options: &ExportOptions) -> Result<ExportOutcome> {
        let (request, artifact) = if format.wants_vector() {
            self.phase = ExportPhase::Compositing;
            debug!("compositing vector artifact for {format:?} export");
            let (request, logo) = self.last_request.as_ref().ok_or(Error::NoArtifactError)?;
            let output = render_vector(self.provider.as_ref(), request, logo.as_ref())?;
            (request.clone(), output.artifact)
        } else {
            let artifact = self.artifact.clone().ok_or(Error::NoArtifactError)?;
            let (request, _) = self.last_request.as_ref().ok_or(Error::NoArtifactError)?;
            (request.clone(), artifact)
        };

        self.phase = ExportPhase::Encoding;
        debug!("encoding {format:?} export");
        let caps = self.platform.encoders.as_ref();
        let file = match format {
            ExportFormat::Png => export::export_png(&artifact)?,
            ExportFormat::Jpeg => export::export_jpeg(&artifact, &request, caps, options)?,
            ExportFormat::Webp => export::export_webp(&artifact, caps, options)?,
            ExportFormat::Svg => export::export_svg(&artifact)?,
            ExportFormat::Pdf => export::export_print_document(&artifact, &request, options)?,
            ExportFormat::Html => export::export_html_snippet(&artifact, &request, options)?,
            ExportFormat::DataUrl => export::export_data_url(&artifact)?,
            ExportFormat::Clipboard => {
                self.phase = ExportPhase::Downloading;
                export::copy_to_clipboard(&artifact, self.platform.clipboard.as_ref())?;
                return Ok(ExportOutcome::Copied);
            }
        };

        self.phase = ExportPhase::Downloading;
        debug!("delivering {}", file.file_name);
        let delivery = self.platform.downloads.deliver(&file)?;
        Ok(ExportOutcome::Saved(delivery))
    }
}
