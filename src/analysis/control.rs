//! Run control: cooperative cancellation and the event channel towards the
//! presentation side.

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::detect::DetectionMode;
use crate::error::{QcError, Result};

use super::report::AnalysisReport;

/// Events published by a running analysis.
#[derive(Debug)]
pub enum AnalysisEvent {
    Started { mode: DetectionMode, layers: usize },
    Progress {
        stage: &'static str,
        done: usize,
        total: usize,
    },
    /// A soft error: the run goes on.
    Warning { code: &'static str, message: String },
    Finished(AnalysisReport),
    Cancelled,
    Failed(QcError),
}

/// Handle passed down into every stage of a run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancellationToken,
    events: Option<UnboundedSender<AnalysisEvent>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: UnboundedSender<AnalysisEvent>) -> Self {
        Self {
            token: CancellationToken::new(),
            events: Some(events),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Bail out with `Cancelled` once cancellation was requested.
    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(QcError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn progress(&self, stage: &'static str, done: usize, total: usize) {
        self.emit(AnalysisEvent::Progress { stage, done, total });
    }

    pub(crate) fn emit(&self, event: AnalysisEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_checkpoint_after_cancel() {
        let control = RunControl::new();
        assert!(control.checkpoint().is_ok());

        control.cancel();
        assert!(matches!(control.checkpoint(), Err(QcError::Cancelled)));
    }

    #[test]
    fn test_clones_share_cancellation() {
        let control = RunControl::new();
        let worker = control.clone();
        control.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn test_progress_is_published() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let control = RunControl::with_events(tx);
        control.progress("points", 3, 10);

        match rx.try_recv().unwrap() {
            AnalysisEvent::Progress { stage, done, total } => {
                assert_eq!((stage, done, total), ("points", 3, 10));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
