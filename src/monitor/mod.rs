mod alert;
mod connectivity;
mod tier;
mod window;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::watch, time::Instant};
use tracing::{debug, error, info, warn};

pub use alert::Alert;
pub use connectivity::{Connectivity, ConnectivityEdge, ConnectivityState};
pub use tier::{Thresholds, Tier};
pub use window::{DetectionEvent, DetectionWindow};

use crate::{
    camera::{FrameSource, SensorReader},
    config::Config,
    detect::Classifier,
    frame::{self, Frame},
    notify::Notifier,
    recording::FrameSink,
};

#[derive(Debug, PartialEq, Clone)]
pub struct MonitorSettings {
    pub check_interval: Duration,
    pub reconnect_backoff: Duration,
    pub idle_delay: Duration,
    pub target_label: String,
    pub thresholds: Thresholds,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl From<&Config> for MonitorSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            check_interval: cfg.alerting.check_interval(),
            reconnect_backoff: cfg.camera.reconnect_backoff(),
            idle_delay: cfg.alerting.idle_delay(),
            target_label: cfg.model.target_label.clone(),
            thresholds: (&cfg.alerting).into(),
            frame_width: cfg.recording.width,
            frame_height: cfg.recording.height,
        }
    }
}

/// The external pieces the loop drives
pub struct Collaborators {
    pub frames: Box<dyn FrameSource>,
    pub classifier: Box<dyn Classifier>,
    pub sensor: Box<dyn SensorReader>,
    pub notifier: Box<dyn Notifier>,
    pub recorder: Option<Box<dyn FrameSink>>,
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct MonitorStats {
    pub started_at: DateTime<Utc>,
    pub camera: ConnectivityState,
    pub frames_processed: u64,
    pub frames_recorded: u64,
    pub fetch_failures: u64,
    pub classifier_failures: u64,
    pub detections_recorded: u64,
    pub cycles_evaluated: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_tier: Option<Tier>,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

impl MonitorStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            camera: ConnectivityState::Connected,
            frames_processed: 0,
            frames_recorded: 0,
            fetch_failures: 0,
            classifier_failures: 0,
            detections_recorded: 0,
            cycles_evaluated: 0,
            last_cycle_at: None,
            last_tier: None,
            notifications_sent: 0,
            notifications_failed: 0,
        }
    }
}

/// Owns all loop state: the detection window, the evaluation clock and camera connectivity.
/// Everything runs on one task, one collaborator call at a time.
pub struct Monitor {
    settings: MonitorSettings,
    frames: Box<dyn FrameSource>,
    classifier: Box<dyn Classifier>,
    sensor: Box<dyn SensorReader>,
    notifier: Box<dyn Notifier>,
    recorder: Option<Box<dyn FrameSink>>,
    window: DetectionWindow,
    connectivity: Connectivity,
    last_check: Instant,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, collaborators: Collaborators) -> Monitor {
        Monitor {
            settings,
            frames: collaborators.frames,
            classifier: collaborators.classifier,
            sensor: collaborators.sensor,
            notifier: collaborators.notifier,
            recorder: collaborators.recorder,
            window: DetectionWindow::new(),
            connectivity: Connectivity::default(),
            last_check: Instant::now(),
            stats: MonitorStats::new(),
        }
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    #[cfg(test)]
    pub fn window(&self) -> &DetectionWindow {
        &self.window
    }

    #[cfg(test)]
    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Loop until `shutdown` turns true (or its sender goes away). The recording is finalized on the way out.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> MonitorStats {
        let started = Alert::Started {
            label: self.settings.target_label.clone(),
        };
        self.send(started).await;
        info!("Monitoring in progress");

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested");
                break;
            }
            // A slow fetch must not hold up an interrupt
            let pause = tokio::select! {
                pause = self.step() => pause,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown handle dropped, stopping");
                        break;
                    }
                    continue;
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown handle dropped, stopping");
                        break;
                    }
                }
            }
        }

        self.close();
        info!(stats = ?self.stats, camera = %self.connectivity(), "Monitor stopped");
        self.stats
    }

    /// One loop iteration. Returns how long to wait before the next one.
    pub async fn step(&mut self) -> Duration {
        let now = Instant::now();
        if now.duration_since(self.last_check) >= self.settings.check_interval {
            self.evaluate(now).await;
        }

        let frame = self.frames.fetch_frame().await;
        let edge = self.connectivity.observe(frame.is_some());
        self.stats.camera = self.connectivity.state();
        match edge {
            Some(ConnectivityEdge::Lost) => {
                warn!("Camera unreachable");
                self.send(Alert::ConnectionLost).await;
            }
            Some(ConnectivityEdge::Restored) => {
                info!("Camera reachable again");
                self.send(Alert::Reconnected).await;
            }
            None => {}
        }

        match frame {
            Some(frame) => {
                self.process_frame(frame).await;
                self.settings.idle_delay
            }
            None => {
                self.stats.fetch_failures += 1;
                self.settings.reconnect_backoff
            }
        }
    }

    async fn process_frame(&mut self, frame: Frame) {
        self.stats.frames_processed += 1;
        let frame = frame::normalize(frame, self.settings.frame_width, self.settings.frame_height);

        if let Some(recorder) = self.recorder.as_mut() {
            match recorder.write_frame(&frame) {
                Ok(()) => self.stats.frames_recorded += 1,
                Err(e) => warn!("Unable to record frame: {}", e),
            }
        }

        let detections = match self.classifier.classify(&frame).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Inference error: {}", e);
                self.stats.classifier_failures += 1;
                return;
            }
        };
        // A frame counts once, however many boxes of the class it holds
        let hit = detections
            .iter()
            .find(|d| d.label == self.settings.target_label)
            .map(|d| d.confidence);
        if let Some(confidence) = hit {
            debug!(confidence, label = %self.settings.target_label, "Target detected");
            self.window
                .record(DetectionEvent::new(Instant::now(), confidence));
            self.stats.detections_recorded += 1;
        }
    }

    async fn evaluate(&mut self, now: Instant) -> Tier {
        let confidences = self
            .window
            .confidences_within(now, self.settings.check_interval);
        if confidences.len() < self.window.len() {
            debug!(
                stale = self.window.len() - confidences.len(),
                "Ignoring detections outside the interval"
            );
        }
        let moisture = self.sensor.read_status().await;
        let tier = Tier::classify(&confidences, &self.settings.thresholds);
        info!(%tier, detections = confidences.len(), moisture = ?moisture, "Evaluation cycle");

        self.send(Alert::Cycle {
            tier,
            label: self.settings.target_label.clone(),
            moisture,
        })
        .await;

        self.window.clear();
        self.last_check = now;
        self.stats.cycles_evaluated += 1;
        self.stats.last_cycle_at = Some(Utc::now());
        self.stats.last_tier = Some(tier);
        tier
    }

    async fn send(&mut self, alert: Alert) {
        let message = alert.render();
        if self.notifier.notify(&message).await {
            self.stats.notifications_sent += 1;
        } else {
            self.stats.notifications_failed += 1;
        }
    }

    fn close(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            match recorder.finish() {
                Ok(()) => info!("Recording closed"),
                Err(e) => error!("Unable to close recording: {}", e),
            }
        }
    }
}
