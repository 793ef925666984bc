use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::QRResult;
use crate::render::{rasterize, RasterImage};
use crate::settings::Settings;
use crate::symbol::{QrCodeEncoder, SymbolEncoder};

// Regenerate
//------------------------------------------------------------------------------

/// Text and colors of `settings` to a fresh image. Reads nothing but its argument.
pub fn regenerate(settings: &Settings) -> QRResult<RasterImage> {
    regenerate_with(settings, &QrCodeEncoder::new(settings.ec_level))
}

/// Like [`regenerate`] with the symbol produced by `encoder`.
pub fn regenerate_with(settings: &Settings, encoder: &dyn SymbolEncoder) -> QRResult<RasterImage> {
    let fg = settings.fg.resolve();
    let bg = settings.bg.resolve();
    debug!(?fg, ?bg, size = ?settings.size, "Regenerating");

    let grid = encoder.encode(&settings.text)?;
    rasterize(&grid, fg, bg, settings.size)
}

// Preview
//------------------------------------------------------------------------------

/// The single current image shown to the user.
#[derive(Debug, Default, Clone)]
pub struct Preview {
    current: Option<RasterImage>,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&RasterImage> {
        self.current.as_ref()
    }

    /// Replaces the image with a successful result. An encoding failure is
    /// logged and leaves the prior image in place. Other errors are returned.
    pub fn refresh(&mut self, result: QRResult<RasterImage>) -> QRResult<()> {
        match result {
            Ok(img) => {
                self.current = Some(img);
                Ok(())
            }
            Err(e) if e.is_encoding_failure() => {
                warn!("Keeping previous preview: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// Regenerator
//------------------------------------------------------------------------------

/// A finished generation and the ticket of the request that produced it.
#[derive(Debug)]
pub struct Generated {
    pub ticket: u64,
    pub result: QRResult<RasterImage>,
}

struct Request {
    ticket: u64,
    settings: Settings,
}

/// Runs generations on one worker thread, newest request wins.
///
/// Every [`Regenerator::submit`] takes a new ticket. Requests queued behind a
/// running generation are collapsed to the newest one, and results for any
/// ticket but the latest are dropped, so at most one generation is in flight
/// and only the last edit ever reaches the caller.
pub struct Regenerator {
    requests: Option<Sender<Request>>,
    results: Receiver<Generated>,
    latest: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl Regenerator {
    pub fn spawn() -> QRResult<Self> {
        Self::spawn_with(|settings: &Settings| regenerate(settings))
    }

    pub fn spawn_with<F>(generate: F) -> QRResult<Self>
    where
        F: Fn(&Settings) -> QRResult<RasterImage> + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (res_tx, res_rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));

        let worker_latest = Arc::clone(&latest);
        let worker = thread::Builder::new()
            .name("regenerator".to_string())
            .spawn(move || run_worker(req_rx, res_tx, worker_latest, generate))?;

        Ok(Self { requests: Some(req_tx), results: res_rx, latest, worker: Some(worker) })
    }

    /// Queues `settings` and returns its ticket.
    pub fn submit(&self, settings: Settings) -> u64 {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = &self.requests {
            if tx.send(Request { ticket, settings }).is_err() {
                warn!(ticket, "Regenerator worker is gone, request dropped");
            }
        }
        ticket
    }

    pub fn latest_ticket(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Result of the latest request if it is ready.
    pub fn try_recv(&self) -> Option<Generated> {
        loop {
            let generated = self.results.try_recv().ok()?;
            if self.is_current(&generated) {
                return Some(generated);
            }
        }
    }

    /// Waits up to `timeout` for the result of the latest request.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Generated> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(left) {
                Ok(generated) if self.is_current(&generated) => return Some(generated),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn is_current(&self, generated: &Generated) -> bool {
        let current = generated.ticket == self.latest_ticket();
        if !current {
            debug!(ticket = generated.ticket, "Discarding superseded result");
        }
        current
    }
}

impl Drop for Regenerator {
    fn drop(&mut self) {
        // Closing the request channel stops the worker
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Regenerator worker panicked");
            }
        }
    }
}

fn run_worker<F>(requests: Receiver<Request>, results: Sender<Generated>, latest: Arc<AtomicU64>, generate: F)
where
    F: Fn(&Settings) -> QRResult<RasterImage>,
{
    while let Ok(mut req) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            debug!(ticket = req.ticket, "Coalescing queued request");
            req = newer;
        }
        if req.ticket != latest.load(Ordering::SeqCst) {
            continue;
        }

        let result = generate(&req.settings);
        if req.ticket != latest.load(Ordering::SeqCst) {
            debug!(ticket = req.ticket, "Dropping result of superseded request");
            continue;
        }
        if results.send(Generated { ticket: req.ticket, result }).is_err() {
            break;
        }
    }
    debug!("Regenerator worker stopped");
}


#[cfg(test)]
mod preview_tests {
    use image::Rgba;

    use super::Preview;
    use crate::error::QRError;
    use crate::render::RasterImage;

    #[test]
    fn test_refresh_replaces() {
        let mut preview = Preview::new();
        assert!(preview.current().is_none());

        let first = RasterImage::from_pixel(2, 2, Rgba([1, 1, 1, 1]));
        let second = RasterImage::from_pixel(3, 3, Rgba([2, 2, 2, 2]));
        preview.refresh(Ok(first)).unwrap();
        preview.refresh(Ok(second.clone())).unwrap();
        assert_eq!(preview.current(), Some(&second));
    }

    #[test]
    fn test_encoding_failure_keeps_prior() {
        let mut preview = Preview::new();
        let img = RasterImage::from_pixel(2, 2, Rgba([1, 1, 1, 1]));
        preview.refresh(Ok(img.clone())).unwrap();

        preview.refresh(Err(QRError::EncodingFailed("data too long".to_string()))).unwrap();
        assert_eq!(preview.current(), Some(&img));
    }

    #[test]
    fn test_encoding_failure_without_prior() {
        let mut preview = Preview::new();
        preview.refresh(Err(QRError::EncodingFailed("data too long".to_string()))).unwrap();
        assert!(preview.current().is_none());
    }

    #[test]
    fn test_other_errors_returned() {
        let mut preview = Preview::new();
        let err = preview.refresh(Err(QRError::InvalidDimensions { width: 0, height: 0 }));
        assert!(matches!(err, Err(QRError::InvalidDimensions { .. })));
    }
}
