//! In-place progress display worker
//!
//! Producers publish into a `watch` channel and return immediately. A tokio
//! task redraws the bar from the latest value, so frames published faster
//! than the terminal can take them are coalesced.

use super::bar::ProgressBar;
use crossterm::{cursor::MoveUp, queue, style::Print};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Publishing side of a display worker
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    tx: Arc<watch::Sender<f64>>,
}

impl DisplayHandle {
    /// Publish a new value; never blocks and never fails
    pub fn display(&self, progress: f64) {
        self.tx.send_replace(progress);
    }
}

pub struct ProgressDisplay;

impl ProgressDisplay {
    /// Spawn a worker drawing into `out`.
    ///
    /// The worker stops once every handle is dropped, after drawing the last
    /// value it has not shown yet. Must be called inside a tokio runtime.
    pub fn spawn<W>(bar: ProgressBar, mut out: W) -> (DisplayHandle, JoinHandle<()>)
    where
        W: Write + Send + 'static,
    {
        let (tx, mut rx) = watch::channel(0.0);

        let worker = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let progress = *rx.borrow_and_update();
                if let Err(e) = draw(&mut out, &bar.render(progress)) {
                    log::warn!("Failed to draw progress: {}", e);
                }
            }
            log::debug!("Display worker stopped");
        });

        (DisplayHandle { tx: Arc::new(tx) }, worker)
    }

    /// Spawn a worker drawing to the process's stdout
    pub fn stdout(bar: ProgressBar) -> (DisplayHandle, JoinHandle<()>) {
        Self::spawn(bar, io::stdout())
    }
}

/// Overwrite the previous line with `line`
fn draw<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    queue!(out, MoveUp(1), Print(line), Print("\n"))?;
    out.flush()
}
