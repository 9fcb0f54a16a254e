//! Per-frame synchronization loop.
//!
//! The cluster renderer owns the actual frame barrier (all nodes reach frame
//! N before any starts N+1); this module only drives it. Exit is
//! cooperative: the loop polls an exit flag once per frame and, once it is
//! set, runs one additional frame so distributed objects get a chance to
//! dispose cleanly before teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Frame barrier driven by the head process, implemented by the cluster
/// rendering runtime.
pub trait FrameSync {
    fn start_frame(&mut self, frame: u32) -> anyhow::Result<()>;
    fn finish_frame(&mut self) -> anyhow::Result<()>;
    /// Drains every in-flight frame; called once on the final frame.
    fn finish_all_frames(&mut self) -> anyhow::Result<()>;
}

/// Runs frames until `exit` is observed, plus one disposal frame.
///
/// Returns the number of frames started. Errors from the sync are escalated
/// to the caller, which logs and stops the application cleanly.
pub fn run_frame_loop(sync: &mut dyn FrameSync, exit: &AtomicBool) -> anyhow::Result<u32> {
    let mut spin: u32 = 0;
    let mut exit_processed = false;

    while !exit.load(Ordering::Relaxed) {
        sync.start_frame(spin)?;
        sync.finish_frame()?;
        spin += 1;

        if exit.load(Ordering::Relaxed) && !exit_processed {
            exit_processed = true;
            // One extra frame before the loop condition stops us.
            sync.start_frame(spin)?;
            sync.finish_all_frames()?;
            spin += 1;
        }
    }

    Ok(spin)
}

/// Stand-in frame sync that paces the loop at a fixed period and logs at
/// trace level. Used when no cluster rendering runtime is linked in.
pub struct PacedFrameSync {
    period: Duration,
}

impl PacedFrameSync {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl FrameSync for PacedFrameSync {
    fn start_frame(&mut self, frame: u32) -> anyhow::Result<()> {
        tracing::trace!(frame, "frame start");
        Ok(())
    }

    fn finish_frame(&mut self) -> anyhow::Result<()> {
        std::thread::sleep(self.period);
        Ok(())
    }

    fn finish_all_frames(&mut self) -> anyhow::Result<()> {
        tracing::trace!("draining in-flight frames");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    /// Records the frame schedule and trips the exit flag mid-run.
    struct Recording {
        started: Vec<u32>,
        finished: u32,
        drained: u32,
        exit_at: u32,
        exit: Arc<AtomicBool>,
    }

    impl FrameSync for Recording {
        fn start_frame(&mut self, frame: u32) -> anyhow::Result<()> {
            self.started.push(frame);
            Ok(())
        }

        fn finish_frame(&mut self) -> anyhow::Result<()> {
            self.finished += 1;
            if self.finished > self.exit_at {
                self.exit.store(true, Ordering::Relaxed);
            }
            Ok(())
        }

        fn finish_all_frames(&mut self) -> anyhow::Result<()> {
            self.drained += 1;
            Ok(())
        }
    }

    #[test]
    fn exit_runs_exactly_one_extra_frame() {
        let exit = Arc::new(AtomicBool::new(false));
        let mut sync = Recording {
            started: Vec::new(),
            finished: 0,
            drained: 0,
            exit_at: 2,
            exit: exit.clone(),
        };

        let frames = run_frame_loop(&mut sync, &exit).unwrap();

        // Frames 0..=2 ran normally; the exit request after frame 2 got one
        // disposal frame (3) and nothing more.
        assert_eq!(sync.started, vec![0, 1, 2, 3]);
        assert_eq!(sync.drained, 1);
        assert_eq!(frames, 4);
    }

    #[test]
    fn exit_set_before_start_runs_nothing() {
        let exit = Arc::new(AtomicBool::new(true));
        let mut sync = Recording {
            started: Vec::new(),
            finished: 0,
            drained: 0,
            exit_at: u32::MAX,
            exit: exit.clone(),
        };
        let frames = run_frame_loop(&mut sync, &exit).unwrap();
        assert!(sync.started.is_empty());
        assert_eq!(frames, 0);
    }

    #[test]
    fn sync_errors_escalate() {
        struct Failing;
        impl FrameSync for Failing {
            fn start_frame(&mut self, _frame: u32) -> anyhow::Result<()> {
                anyhow::bail!("barrier lost")
            }
            fn finish_frame(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
            fn finish_all_frames(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
        }
        let exit = AtomicBool::new(false);
        assert!(run_frame_loop(&mut Failing, &exit).is_err());
    }
}
