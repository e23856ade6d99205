use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::monitor::{FrameOutcome, SecurityMonitor};

/// Shared pause/resume flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct PauseSwitch {
    paused: Arc<AtomicBool>,
}

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Flip the state; returns true when now paused.
    pub fn toggle(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_processed: u64,
    pub paused_ticks: u64,
    pub faults: u64,
    pub events: u64,
}

/// What one iteration of the loop did.
#[derive(Debug)]
pub enum Step {
    Processed(Box<FrameOutcome>),
    Paused,
    Exhausted,
    Stopped,
}

/// Drives frames from a source through a monitor until the source runs dry
/// or the running flag is cleared.
pub struct FrameLoop {
    source: Box<dyn FrameSource>,
    monitor: SecurityMonitor,
    pause: PauseSwitch,
    running: Arc<AtomicBool>,
    frame_interval: Duration,
    stats: LoopStats,
    connected: bool,
}

impl FrameLoop {
    pub fn new(source: Box<dyn FrameSource>, monitor: SecurityMonitor) -> Self {
        Self {
            source,
            monitor,
            pause: PauseSwitch::new(),
            running: Arc::new(AtomicBool::new(true)),
            frame_interval: Duration::ZERO,
            stats: LoopStats::default(),
            connected: false,
        }
    }

    /// Sleep between iterations (also while paused).
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn pause_switch(&self) -> PauseSwitch {
        self.pause.clone()
    }

    /// Flag checked before every iteration; store `false` to stop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn monitor(&self) -> &SecurityMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut SecurityMonitor {
        &mut self.monitor
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn into_monitor(self) -> SecurityMonitor {
        self.monitor
    }

    /// One iteration without sleeping.
    pub fn step(&mut self) -> Result<Step> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(Step::Stopped);
        }
        if !self.connected {
            self.source.connect()?;
            self.connected = true;
        }
        if self.pause.is_paused() {
            self.stats.paused_ticks += 1;
            return Ok(Step::Paused);
        }
        let Some(frame) = self
            .source
            .next_frame()
            .map_err(|e| anyhow!("frame source {} failed: {}", self.source.stats().uri, e))?
        else {
            return Ok(Step::Exhausted);
        };

        let outcome = self.monitor.process_frame(&frame);
        self.stats.frames_processed += 1;
        self.stats.events += outcome.events.len() as u64;
        if outcome.fault.is_some() {
            self.stats.faults += 1;
        }
        Ok(Step::Processed(Box::new(outcome)))
    }

    /// Run until the source is exhausted or the loop is stopped, handing
    /// every processed frame to `on_frame`.
    pub fn run<F>(&mut self, mut on_frame: F) -> Result<LoopStats>
    where
        F: FnMut(&SecurityMonitor, &FrameOutcome),
    {
        loop {
            match self.step()? {
                Step::Processed(outcome) => on_frame(&self.monitor, &outcome),
                Step::Paused => {}
                Step::Exhausted => {
                    log::info!("frame source {} exhausted", self.source.stats().uri);
                    break;
                }
                Step::Stopped => {
                    log::info!("frame loop stopped");
                    break;
                }
            }
            if !self.frame_interval.is_zero() {
                std::thread::sleep(self.frame_interval);
            }
        }
        Ok(self.stats.clone())
    }
}
