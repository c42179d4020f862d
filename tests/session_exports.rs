//! Session behavior: debounce, stale-render discard, and export isolation

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qrforge::export::ExportFormat;
use qrforge::platform::{
    Clipboard, Delivery, DeniedClipboard, DisabledEncoders, DownloadSink, MemoryClipboard,
    MemoryDownloads, Platform, ProbeEncoders,
};
use qrforge::session::{ExportOutcome, SessionConfig};
use qrforge::{
    dataurl, QrcodeProvider, RenderRequest, RenderSession, SymbolOptions, SymbolProvider,
};

/// Counts encodes and optionally stalls the first one, to exercise the
/// stale-render guard
struct CountingProvider {
    inner: QrcodeProvider,
    encodes: AtomicUsize,
    first_delay: Duration,
}

impl CountingProvider {
    fn new() -> Self {
        Self::with_first_delay(Duration::ZERO)
    }

    fn with_first_delay(delay: Duration) -> Self {
        Self {
            inner: QrcodeProvider::new(),
            encodes: AtomicUsize::new(0),
            first_delay: delay,
        }
    }

    fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }
}

impl SymbolProvider for CountingProvider {
    fn encode_raster(&self, content: &str, opts: &SymbolOptions) -> qrforge::Result<String> {
        if self.encodes.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(self.first_delay);
        }
        self.inner.encode_raster(content, opts)
    }

    fn encode_vector(&self, content: &str, opts: &SymbolOptions) -> qrforge::Result<String> {
        self.inner.encode_vector(content, opts)
    }
}

fn memory_platform() -> (Platform, Arc<MemoryDownloads>, Arc<MemoryClipboard>) {
    let downloads = Arc::new(MemoryDownloads::new());
    let clipboard = Arc::new(MemoryClipboard::new());
    let platform = Platform {
        downloads: downloads.clone() as Arc<dyn DownloadSink>,
        clipboard: clipboard.clone(),
        encoders: Arc::new(ProbeEncoders),
    };
    (platform, downloads, clipboard)
}

fn request() -> RenderRequest {
    RenderRequest::new("https://example.com", 160)
}

#[tokio::test(flavor = "multi_thread")]
async fn export_before_any_render_reports_no_artifact() {
    let (platform, downloads, _) = memory_platform();
    let session = RenderSession::new(Arc::new(QrcodeProvider::new()), platform);
    let err = session.export(ExportFormat::Png).await.unwrap_err();
    assert!(matches!(err, qrforge::Error::NoArtifactError));
    assert!(downloads.files().is_empty());
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn rapid_submits_collapse_into_one_render() {
    let provider = Arc::new(CountingProvider::new());
    let (platform, _, _) = memory_platform();
    let session = RenderSession::with_config(
        provider.clone(),
        platform,
        SessionConfig {
            debounce: Duration::from_millis(50),
        },
    );

    for i in 0..5 {
        let req = RenderRequest::new(format!("https://example.com/{i}"), 160);
        session.submit(req, None).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(provider.encode_count(), 1);
    assert!(session.artifact().await.unwrap().is_some());
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_render_completion_is_discarded() {
    // First render stalls; a later one at a different size finishes first.
    // The stalled completion must not overwrite the newer artifact.
    let provider = Arc::new(CountingProvider::with_first_delay(Duration::from_millis(250)));
    let (platform, _, _) = memory_platform();
    let session = RenderSession::with_config(
        provider.clone(),
        platform,
        SessionConfig {
            debounce: Duration::from_millis(1),
        },
    );

    session.submit(RenderRequest::new("slow", 100), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    session.submit(RenderRequest::new("fast", 120), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(provider.encode_count(), 2);
    let artifact = session.artifact().await.unwrap().unwrap();
    let img = dataurl::decode_image(&artifact.payload).unwrap();
    assert_eq!(img.dimensions(), (120, 120));
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn export_queues_behind_pending_render() {
    let (platform, downloads, _) = memory_platform();
    let session = RenderSession::with_config(
        Arc::new(QrcodeProvider::new()),
        platform,
        SessionConfig {
            debounce: Duration::from_millis(200),
        },
    );

    // The export arrives while the submission is still debouncing; it must
    // flush that render and operate on its output, not fail with NoArtifact.
    session.submit(request(), None).await.unwrap();
    let outcome = session.export(ExportFormat::Png).await.unwrap();
    match outcome {
        ExportOutcome::Saved(Delivery { file_name, .. }) => assert_eq!(file_name, "qrcode.png"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(downloads.files().len(), 1);
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn raster_formats_deliver_expected_files() {
    let (platform, downloads, clipboard) = memory_platform();
    let session = RenderSession::new(Arc::new(QrcodeProvider::new()), platform);
    session.render_now(request(), None).await.unwrap();

    for format in [
        ExportFormat::Png,
        ExportFormat::Jpeg,
        ExportFormat::Webp,
        ExportFormat::Svg,
        ExportFormat::Pdf,
        ExportFormat::Html,
        ExportFormat::DataUrl,
    ] {
        session.export(format).await.unwrap();
    }
    session.export(ExportFormat::Clipboard).await.unwrap();

    let names: Vec<String> = downloads.files().iter().map(|f| f.file_name.clone()).collect();
    assert_eq!(
        names,
        vec![
            "qrcode.png",
            "qrcode.jpg",
            "qrcode.webp",
            "qrcode.svg",
            "qrcode-print.html",
            "qrcode-embed.html",
            "qrcode-dataurl.txt",
        ]
    );
    assert!(clipboard.read_text().unwrap().starts_with("data:image/png;base64,"));
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn webp_failure_does_not_block_other_formats() {
    let downloads = Arc::new(MemoryDownloads::new());
    let platform = Platform {
        downloads: downloads.clone() as Arc<dyn DownloadSink>,
        clipboard: Arc::new(MemoryClipboard::new()),
        encoders: Arc::new(DisabledEncoders),
    };
    let session = RenderSession::new(Arc::new(QrcodeProvider::new()), platform);
    session.render_now(request(), None).await.unwrap();

    let err = session.export(ExportFormat::Webp).await.unwrap_err();
    assert!(matches!(err, qrforge::Error::UnsupportedFormatError(_)));
    assert!(downloads.files().is_empty());

    // PNG is unaffected by the WebP failure.
    session.export(ExportFormat::Png).await.unwrap();
    assert_eq!(downloads.files().len(), 1);
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn clipboard_denial_is_surfaced_and_retryable() {
    let platform = Platform {
        downloads: Arc::new(MemoryDownloads::new()),
        clipboard: Arc::new(DeniedClipboard),
        encoders: Arc::new(ProbeEncoders),
    };
    let session = RenderSession::new(Arc::new(QrcodeProvider::new()), platform);
    session.render_now(request(), None).await.unwrap();

    for _ in 0..2 {
        let err = session.export(ExportFormat::Clipboard).await.unwrap_err();
        assert!(matches!(err, qrforge::Error::ClipboardPermissionError(_)));
    }
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn filesystem_sink_leaves_no_partial_files() {
    let dir = tempfile::tempdir().unwrap();
    let session = RenderSession::new(
        Arc::new(QrcodeProvider::new()),
        Platform::with_dir(dir.path()),
    );
    session.render_now(request(), None).await.unwrap();
    session.export(ExportFormat::Png).await.unwrap();

    let entries: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["qrcode.png"]);
    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_render_keeps_last_good_artifact() {
    let (platform, _, _) = memory_platform();
    let session = RenderSession::new(Arc::new(QrcodeProvider::new()), platform);
    session.render_now(request(), None).await.unwrap();
    let before = session.artifact().await.unwrap().unwrap();

    let err = session
        .render_now(RenderRequest::new("x".repeat(8000), 160), None)
        .await
        .unwrap_err();
    assert!(matches!(err, qrforge::Error::EncodeError(_)));
    assert_eq!(session.artifact().await.unwrap().unwrap(), before);
    session.close().await.unwrap();
}
