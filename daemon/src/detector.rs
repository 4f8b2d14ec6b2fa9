/// The detection loop: settle, capture, classify, and persist on change.
///
/// The last persisted state is owned by the loop itself, so nothing else can
/// write the state file while it runs.
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::capture::{capture_region, Region, ScreenSource};
use crate::classifier::ReferenceIcons;
use crate::config::DetectorConfig;
use crate::state::{write_state, PlayerState};

/// The state most recently written to the state file.
#[derive(Debug)]
pub struct PersistedState {
    path: PathBuf,
    current: PlayerState,
}

impl PersistedState {
    /// Starts tracking `path` as already holding `current`. Nothing is written.
    pub fn new(path: PathBuf, current: PlayerState) -> Self {
        Self { path, current }
    }

    /// Writes `Stopped` to `path` so the file never carries a stale state
    /// from a previous run.
    pub fn initialize(path: PathBuf) -> Self {
        let initial = PlayerState::default();
        write_state(&path, initial);
        Self::new(path, initial)
    }

    pub fn current(&self) -> PlayerState {
        self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `detected`. The file is rewritten only when it differs from
    /// the current state; returns whether a transition happened.
    pub fn update(&mut self, detected: PlayerState) -> bool {
        if detected == self.current {
            return false;
        }
        write_state(&self.path, detected);
        self.current = detected;
        true
    }
}

pub struct StateDetector<S> {
    source: S,
    icons: ReferenceIcons,
    region: Region,
    threshold: u8,
    settle_delay: Duration,
    poll_interval: Duration,
    persisted: PersistedState,
}

impl<S: ScreenSource> StateDetector<S> {
    /// Builds a detector and writes the initial state file.
    pub fn new(source: S, icons: ReferenceIcons, region: Region, config: &DetectorConfig) -> Self {
        Self {
            source,
            icons,
            region,
            threshold: config.effective_threshold(),
            settle_delay: config.settle_delay(),
            poll_interval: config.poll_interval(),
            persisted: PersistedState::initialize(config.state_file.clone()),
        }
    }

    pub fn current(&self) -> PlayerState {
        self.persisted.current()
    }

    /// Captures the region once and classifies it.
    pub fn detect(&mut self) -> PlayerState {
        let captured = capture_region(&mut self.source, &self.region);
        self.icons.classify(captured.as_ref(), self.threshold)
    }

    /// One iteration of the loop. Returns the new state on a transition.
    pub async fn poll(&mut self) -> Option<PlayerState> {
        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
        let detected = self.detect();
        let previous = self.persisted.current();
        if self.persisted.update(detected) {
            info!("State changed: {previous} -> {detected}");
            Some(detected)
        } else {
            None
        }
    }

    /// Polls every `poll_interval` until `stop_rx` turns `true` or its sender
    /// is dropped. Returns the last persisted state.
    pub async fn run(mut self, mut stop_rx: watch::Receiver<bool>) -> PlayerState {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Detector started (every {:?}, threshold {}%, writing {})",
            self.poll_interval,
            self.threshold,
            self.persisted.path().display()
        );

        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Detector stopped in state {}", self.current());
        self.persisted.current()
    }
}

#[cfg(test)]
impl<S> StateDetector<S> {
    fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::FakeSource;
    use image::{Rgba, RgbaImage};

    fn gray(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    fn paused_icon() -> RgbaImage {
        RgbaImage::from_fn(37, 37, |x, _| gray(if x % 2 == 0 { 0 } else { 255 }))
    }

    fn playing_icon() -> RgbaImage {
        RgbaImage::from_fn(37, 37, |x, y| gray(if (x / 4 + y / 4) % 2 == 0 { 30 } else { 220 }))
    }

    const REGION: Region = Region {
        x: 10,
        y: 20,
        width: 37,
        height: 37,
        output_width: 37,
        output_height: 37,
    };

    /// A 100x100 "screen" with `icon` pasted at [`REGION`].
    fn screen_with(icon: &RgbaImage) -> RgbaImage {
        let mut screen = RgbaImage::from_pixel(100, 100, gray(128));
        image::imageops::replace(&mut screen, icon, REGION.x as i64, REGION.y as i64);
        screen
    }

    fn settings(state_file: PathBuf) -> DetectorConfig {
        DetectorConfig {
            settle_delay_ms: 0,
            poll_interval_ms: 5,
            state_file,
            ..DetectorConfig::default()
        }
    }

    fn make_detector(frame: Option<RgbaImage>, state_file: PathBuf) -> StateDetector<FakeSource> {
        let icons = ReferenceIcons::from_images([
            (PlayerState::Paused, paused_icon()),
            (PlayerState::Playing, playing_icon()),
        ]);
        StateDetector::new(FakeSource::new(frame), icons, REGION, &settings(state_file))
    }

    // ── PersistedState ────────────────────────────────────────────────────────

    #[test]
    fn initialize_writes_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.txt");
        std::fs::write(&path, "Playing").unwrap();
        let persisted = PersistedState::initialize(path.clone());
        assert_eq!(persisted.current(), PlayerState::Stopped);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Stopped");
    }

    #[test]
    fn update_with_same_state_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let mut persisted = PersistedState::new(path.clone(), PlayerState::Stopped);

        assert!(!persisted.update(PlayerState::Stopped));
        assert!(!path.exists());
    }

    #[test]
    fn update_writes_only_on_transition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let mut persisted = PersistedState::new(path.clone(), PlayerState::Stopped);

        assert!(persisted.update(PlayerState::Playing));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Playing");

        // Remove the file: an unchanged state must not bring it back.
        std::fs::remove_file(&path).unwrap();
        assert!(!persisted.update(PlayerState::Playing));
        assert!(!path.exists());

        assert!(persisted.update(PlayerState::Paused));
        assert_eq!(persisted.current(), PlayerState::Paused);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Paused");
    }

    #[test]
    fn update_tracks_state_even_if_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        // The state "file" is a directory, so every write fails.
        let mut persisted = PersistedState::new(dir.path().to_path_buf(), PlayerState::Stopped);
        assert!(persisted.update(PlayerState::Playing));
        assert_eq!(persisted.current(), PlayerState::Playing);
    }

    // ── StateDetector ─────────────────────────────────────────────────────────

    #[test]
    fn detect_recognises_icon_in_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector =
            make_detector(Some(screen_with(&playing_icon())), dir.path().join("state.txt"));
        assert_eq!(detector.detect(), PlayerState::Playing);

        detector.source_mut().frame = Some(screen_with(&paused_icon()));
        assert_eq!(detector.detect(), PlayerState::Paused);
    }

    #[test]
    fn detect_on_capture_failure_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = make_detector(None, dir.path().join("state.txt"));
        assert_eq!(detector.detect(), PlayerState::Stopped);
    }

    #[test]
    fn detect_on_screen_too_small_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let tiny = RgbaImage::from_pixel(30, 30, gray(0));
        let mut detector = make_detector(Some(tiny), dir.path().join("state.txt"));
        assert_eq!(detector.detect(), PlayerState::Stopped);
    }

    #[tokio::test]
    async fn poll_reports_only_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let mut detector = make_detector(Some(screen_with(&playing_icon())), path.clone());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Stopped");

        assert_eq!(detector.poll().await, Some(PlayerState::Playing));
        assert_eq!(detector.poll().await, None);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Playing");

        detector.source_mut().frame = None;
        assert_eq!(detector.poll().await, Some(PlayerState::Stopped));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Stopped");
        assert_eq!(detector.source_mut().grabs, 3);
    }

    #[tokio::test]
    async fn run_stops_on_signal_and_keeps_last_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let detector = make_detector(Some(screen_with(&paused_icon())), path.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(detector.run(stop_rx));

        sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();

        let last = handle.await.unwrap();
        assert_eq!(last, PlayerState::Paused);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Paused");
    }

    #[tokio::test]
    async fn run_exits_when_sender_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let detector = make_detector(None, dir.path().join("state.txt"));
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);
        assert_eq!(detector.run(stop_rx).await, PlayerState::Stopped);
    }
}
