//! Tracking session contract and recorded session playback
//!
//! The tracking subsystem reports anchors through [`SessionDelegate`]
//! notifications on its own thread. [`event_channel`] provides the hand-off
//! used to move those notifications onto whichever thread owns the scene.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::anchor::{Anchor, AnchorId, PlaneAlignment};
use crate::recording::Recording;

/// Pause before a looping session replays its recording again
const LOOP_PAUSE: Duration = Duration::from_millis(500);

/// Longest wait between two replayed steps
const MAX_STEP_DELAY: Duration = Duration::from_secs(3600);

/// One anchor lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "anchors", rename_all = "snake_case")]
pub enum SessionEvent {
    AnchorsAdded(Vec<Anchor>),
    AnchorsUpdated(Vec<Anchor>),
    AnchorsRemoved(Vec<Anchor>),
}

impl SessionEvent {
    pub fn anchors(&self) -> &[Anchor] {
        match self {
            SessionEvent::AnchorsAdded(anchors)
            | SessionEvent::AnchorsUpdated(anchors)
            | SessionEvent::AnchorsRemoved(anchors) => anchors,
        }
    }
}

/// Receiver of anchor lifecycle notifications
pub trait SessionDelegate {
    /// One or more anchors were added to the session
    fn session_did_add(&mut self, anchors: &[Anchor]);

    /// The session adjusted the properties of one or more anchors
    fn session_did_update(&mut self, anchors: &[Anchor]);

    /// One or more anchors were removed from the session
    fn session_did_remove(&mut self, anchors: &[Anchor]);

    /// Whether anyone is still listening. Producers stop once this is false.
    fn is_attached(&self) -> bool {
        true
    }

    fn dispatch(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::AnchorsAdded(anchors) => self.session_did_add(anchors),
            SessionEvent::AnchorsUpdated(anchors) => self.session_did_update(anchors),
            SessionEvent::AnchorsRemoved(anchors) => self.session_did_remove(anchors),
        }
    }
}

/// Create a delegate that forwards notifications to a [`SessionEvents`] queue
pub fn event_channel() -> (ChannelDelegate, SessionEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelDelegate { tx }, SessionEvents { rx: Mutex::new(rx) })
}

/// Delegate living on the tracking thread
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelDelegate {
    fn forward(&self, event: SessionEvent) {
        if event.anchors().is_empty() {
            return;
        }
        if self.tx.send(event).is_err() {
            debug!("Session event receiver dropped");
        }
    }
}

impl SessionDelegate for ChannelDelegate {
    fn session_did_add(&mut self, anchors: &[Anchor]) {
        self.forward(SessionEvent::AnchorsAdded(anchors.to_vec()));
    }

    fn session_did_update(&mut self, anchors: &[Anchor]) {
        self.forward(SessionEvent::AnchorsUpdated(anchors.to_vec()));
    }

    fn session_did_remove(&mut self, anchors: &[Anchor]) {
        self.forward(SessionEvent::AnchorsRemoved(anchors.to_vec()));
    }

    fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Queue of notifications waiting for the scene-owning thread
#[derive(Debug)]
pub struct SessionEvents {
    rx: Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl SessionEvents {
    /// Take every queued event without blocking, in delivery order
    pub fn drain(&self) -> Vec<SessionEvent> {
        let mut rx = match self.rx.lock() {
            Ok(rx) => rx,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Which plane alignments the tracking subsystem should detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneDetection {
    pub horizontal: bool,
    pub vertical: bool,
}

impl PlaneDetection {
    pub const NONE: Self = Self {
        horizontal: false,
        vertical: false,
    };

    pub const ALL: Self = Self {
        horizontal: true,
        vertical: true,
    };

    pub fn allows(&self, alignment: PlaneAlignment) -> bool {
        match alignment {
            PlaneAlignment::Horizontal => self.horizontal,
            PlaneAlignment::Vertical => self.vertical,
        }
    }
}

impl Default for PlaneDetection {
    fn default() -> Self {
        Self::ALL
    }
}

/// World tracking configuration applied when a session starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTrackingConfiguration {
    pub plane_detection: PlaneDetection,
}

/// Playback options for a [`TrackingSession`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Speed multiplier applied to recorded delays
    pub playback_rate: f32,
    /// Restart from the beginning once the recording ends
    pub looping: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            playback_rate: 1.0,
            looping: false,
        }
    }
}

/// Counters reported when a session stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub steps: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Recorded delay scaled by the playback rate, capped at [`MAX_STEP_DELAY`]
fn scaled_delay(delay_ms: u64, rate: f32) -> Duration {
    match Duration::try_from_secs_f64(delay_ms as f64 / 1000.0 / rate as f64) {
        Ok(delay) if delay <= MAX_STEP_DELAY => delay,
        _ => {
            warn!(delay_ms, rate, "Scaled step delay too long, capping");
            MAX_STEP_DELAY
        }
    }
}

/// Tracking session backed by a recorded anchor stream
///
/// Replays the recording with its original timing and reports anchors to a
/// delegate, keeping the reported stream consistent with the set of anchors
/// the session currently tracks.
pub struct TrackingSession {
    recording: Recording,
    options: SessionOptions,
    tracked: HashSet<AnchorId>,
    live: Vec<Anchor>,
}

impl TrackingSession {
    pub fn new(recording: Recording, options: SessionOptions) -> Self {
        Self {
            recording,
            options,
            tracked: HashSet::new(),
            live: Vec::new(),
        }
    }

    /// Identities of the anchors currently tracked
    pub fn tracked(&self) -> &HashSet<AnchorId> {
        &self.tracked
    }

    /// Run the session until the recording ends or the delegate detaches
    pub async fn run<D: SessionDelegate>(
        &mut self,
        configuration: WorldTrackingConfiguration,
        delegate: &mut D,
    ) -> SessionSummary {
        let rate = if self.options.playback_rate.is_finite() && self.options.playback_rate > 0.0 {
            self.options.playback_rate
        } else {
            warn!(rate = self.options.playback_rate, "Invalid playback rate, using 1.0");
            1.0
        };

        info!(
            recording = %self.recording.name,
            steps = self.recording.steps.len(),
            horizontal = configuration.plane_detection.horizontal,
            vertical = configuration.plane_detection.vertical,
            "Tracking session started"
        );

        let mut summary = SessionSummary::default();

        'playback: loop {
            for index in 0..self.recording.steps.len() {
                let step = &self.recording.steps[index];
                let delay = scaled_delay(step.delay_ms, rate);
                let event = step.event.clone();

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if !delegate.is_attached() {
                    break 'playback;
                }

                debug!(step = index, "Replaying session step");
                self.replay(&event, configuration, delegate, &mut summary);
                summary.steps += 1;
            }

            if !self.options.looping || !delegate.is_attached() {
                break;
            }

            let live = std::mem::take(&mut self.live);
            self.tracked.clear();
            if !live.is_empty() {
                summary.removed += live.len();
                delegate.session_did_remove(&live);
            }
            debug!("Restarting session playback");
            tokio::time::sleep(LOOP_PAUSE).await;
        }

        info!(
            steps = summary.steps,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "Tracking session stopped"
        );

        summary
    }

    /// Report one recorded event, filtered by configuration and the live set
    fn replay<D: SessionDelegate>(
        &mut self,
        event: &SessionEvent,
        configuration: WorldTrackingConfiguration,
        delegate: &mut D,
        summary: &mut SessionSummary,
    ) {
        let detectable = |anchor: &&Anchor| match anchor {
            Anchor::Plane(plane) => configuration.plane_detection.allows(plane.alignment),
            Anchor::World(_) => true,
        };

        match event {
            SessionEvent::AnchorsAdded(anchors) => {
                let mut added = Vec::new();
                let mut readded = Vec::new();
                for anchor in anchors.iter().filter(detectable) {
                    if self.tracked.insert(anchor.id()) {
                        added.push(anchor.clone());
                    } else {
                        readded.push(anchor.clone());
                    }
                }
                self.remember(&added);
                self.remember(&readded);
                if !added.is_empty() {
                    summary.added += added.len();
                    delegate.session_did_add(&added);
                }
                if !readded.is_empty() {
                    summary.updated += readded.len();
                    delegate.session_did_update(&readded);
                }
            }
            SessionEvent::AnchorsUpdated(anchors) => {
                let updated: Vec<Anchor> = anchors
                    .iter()
                    .filter(detectable)
                    .filter(|a| self.tracked.contains(&a.id()))
                    .cloned()
                    .collect();
                self.remember(&updated);
                if !updated.is_empty() {
                    summary.updated += updated.len();
                    delegate.session_did_update(&updated);
                }
            }
            SessionEvent::AnchorsRemoved(anchors) => {
                let removed: Vec<Anchor> = anchors
                    .iter()
                    .filter(|a| self.tracked.remove(&a.id()))
                    .cloned()
                    .collect();
                self.live.retain(|live| !removed.iter().any(|r| r.id() == live.id()));
                if !removed.is_empty() {
                    summary.removed += removed.len();
                    delegate.session_did_remove(&removed);
                }
            }
        }
    }

    /// Keep the latest snapshot of each live anchor
    fn remember(&mut self, anchors: &[Anchor]) {
        for anchor in anchors {
            match self.live.iter_mut().find(|live| live.id() == anchor.id()) {
                Some(live) => *live = anchor.clone(),
                None => self.live.push(anchor.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{
        PlaneAnchor, PlaneClassification, PlaneExtent, Pose, WorldAnchor,
    };
    use crate::recording::RecordedStep;

    fn plane(id: u128, alignment: PlaneAlignment) -> Anchor {
        PlaneAnchor::new(
            AnchorId::from_u128(id),
            Pose::IDENTITY,
            alignment,
            PlaneExtent::new(1.0, 1.0),
            PlaneClassification::Unknown,
        )
        .into()
    }

    /// Delegate that records what it was told and mirrors the tracked set
    #[derive(Default)]
    struct Recorder {
        events: Vec<SessionEvent>,
        tracked: HashSet<AnchorId>,
        inconsistent: usize,
        /// Detach once this many notifications were received
        detach_after: Option<usize>,
    }

    impl SessionDelegate for Recorder {
        fn is_attached(&self) -> bool {
            self.detach_after.map_or(true, |limit| self.events.len() < limit)
        }

        fn session_did_add(&mut self, anchors: &[Anchor]) {
            for a in anchors {
                if !self.tracked.insert(a.id()) {
                    self.inconsistent += 1;
                }
            }
            self.events.push(SessionEvent::AnchorsAdded(anchors.to_vec()));
        }

        fn session_did_update(&mut self, anchors: &[Anchor]) {
            self.inconsistent += anchors.iter().filter(|a| !self.tracked.contains(&a.id())).count();
            self.events.push(SessionEvent::AnchorsUpdated(anchors.to_vec()));
        }

        fn session_did_remove(&mut self, anchors: &[Anchor]) {
            for a in anchors {
                if !self.tracked.remove(&a.id()) {
                    self.inconsistent += 1;
                }
            }
            self.events.push(SessionEvent::AnchorsRemoved(anchors.to_vec()));
        }
    }

    fn timed_recording(steps: Vec<(u64, SessionEvent)>) -> Recording {
        Recording::new(
            "timed",
            steps
                .into_iter()
                .map(|(delay_ms, event)| RecordedStep { delay_ms, event })
                .collect(),
        )
    }

    fn recording(events: Vec<SessionEvent>) -> Recording {
        Recording::new(
            "test",
            events
                .into_iter()
                .map(|event| RecordedStep { delay_ms: 0, event })
                .collect(),
        )
    }

    #[test]
    fn test_channel_forwards_in_order_and_skips_empty() {
        let (mut delegate, events) = event_channel();
        delegate.session_did_add(&[plane(1, PlaneAlignment::Horizontal)]);
        delegate.session_did_update(&[]);
        delegate.session_did_remove(&[plane(1, PlaneAlignment::Horizontal)]);

        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], SessionEvent::AnchorsAdded(_)));
        assert!(matches!(drained[1], SessionEvent::AnchorsRemoved(_)));
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_channel_detaches_when_receiver_dropped() {
        let (delegate, events) = event_channel();
        assert!(delegate.is_attached());
        drop(events);
        assert!(!delegate.is_attached());
    }

    #[test]
    fn test_event_json_shape() {
        let event = SessionEvent::AnchorsRemoved(vec![plane(3, PlaneAlignment::Vertical)]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "anchors_removed");
        assert_eq!(json["anchors"][0]["type"], "plane");

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_playback_filters_disabled_alignment() {
        let mut session = TrackingSession::new(
            recording(vec![
                SessionEvent::AnchorsAdded(vec![
                    plane(1, PlaneAlignment::Horizontal),
                    plane(2, PlaneAlignment::Vertical),
                ]),
                SessionEvent::AnchorsUpdated(vec![plane(2, PlaneAlignment::Vertical)]),
            ]),
            SessionOptions::default(),
        );
        let configuration = WorldTrackingConfiguration {
            plane_detection: PlaneDetection {
                horizontal: true,
                vertical: false,
            },
        };

        let mut recorder = Recorder::default();
        let summary = session.run(configuration, &mut recorder).await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(recorder.events.len(), 1);
        assert_eq!(recorder.events[0].anchors()[0].id(), AnchorId::from_u128(1));
    }

    #[tokio::test]
    async fn test_playback_keeps_stream_consistent() {
        let world = Anchor::World(WorldAnchor {
            id: AnchorId::from_u128(9),
            name: Some("marker".into()),
            transform: Pose::IDENTITY,
        });
        let mut session = TrackingSession::new(
            recording(vec![
                SessionEvent::AnchorsUpdated(vec![plane(1, PlaneAlignment::Horizontal)]),
                SessionEvent::AnchorsAdded(vec![plane(1, PlaneAlignment::Horizontal), world]),
                SessionEvent::AnchorsAdded(vec![plane(1, PlaneAlignment::Horizontal)]),
                SessionEvent::AnchorsRemoved(vec![plane(2, PlaneAlignment::Horizontal)]),
                SessionEvent::AnchorsRemoved(vec![plane(1, PlaneAlignment::Horizontal)]),
            ]),
            SessionOptions::default(),
        );

        let mut recorder = Recorder::default();
        let summary = session
            .run(WorldTrackingConfiguration::default(), &mut recorder)
            .await;

        assert_eq!(recorder.inconsistent, 0);
        assert_eq!(summary.steps, 5);
        assert_eq!(summary.added, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(session.tracked().len(), 1);
        assert!(session.tracked().contains(&AnchorId::from_u128(9)));
    }

    #[tokio::test]
    async fn test_playback_stops_when_detached() {
        let (delegate, events) = event_channel();
        drop(events);
        let mut delegate = delegate;

        let mut session = TrackingSession::new(
            recording(vec![SessionEvent::AnchorsAdded(vec![plane(
                1,
                PlaneAlignment::Horizontal,
            )])]),
            SessionOptions {
                playback_rate: 1.0,
                looping: true,
            },
        );

        let summary = session
            .run(WorldTrackingConfiguration::default(), &mut delegate)
            .await;
        assert_eq!(summary.steps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_looping_removes_live_anchors_and_restarts() {
        let mut session = TrackingSession::new(
            recording(vec![SessionEvent::AnchorsAdded(vec![
                plane(1, PlaneAlignment::Horizontal),
                plane(2, PlaneAlignment::Vertical),
            ])]),
            SessionOptions {
                playback_rate: 1.0,
                looping: true,
            },
        );
        let mut recorder = Recorder {
            detach_after: Some(3),
            ..Default::default()
        };

        let start = tokio::time::Instant::now();
        let summary = session
            .run(WorldTrackingConfiguration::default(), &mut recorder)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(recorder.inconsistent, 0);
        assert_eq!(recorder.events.len(), 3);
        assert!(matches!(recorder.events[0], SessionEvent::AnchorsAdded(ref a) if a.len() == 2));
        let removed: HashSet<AnchorId> =
            recorder.events[1].anchors().iter().map(Anchor::id).collect();
        assert!(matches!(recorder.events[1], SessionEvent::AnchorsRemoved(_)));
        assert_eq!(
            removed,
            HashSet::from([AnchorId::from_u128(1), AnchorId::from_u128(2)])
        );
        // Second pass reports the anchors as new again
        assert!(matches!(recorder.events[2], SessionEvent::AnchorsAdded(ref a) if a.len() == 2));

        assert_eq!(summary.steps, 2);
        assert_eq!(summary.added, 4);
        assert_eq!(summary.removed, 2);
        assert_eq!(session.tracked().len(), 2);
        assert!(elapsed >= LOOP_PAUSE && elapsed < LOOP_PAUSE * 2);
    }

    fn paced_recording() -> Recording {
        timed_recording(vec![
            (
                400,
                SessionEvent::AnchorsAdded(vec![plane(1, PlaneAlignment::Horizontal)]),
            ),
            (
                600,
                SessionEvent::AnchorsRemoved(vec![plane(1, PlaneAlignment::Horizontal)]),
            ),
        ])
    }

    async fn paced_run(playback_rate: f32) -> (SessionSummary, Duration) {
        let mut session = TrackingSession::new(
            paced_recording(),
            SessionOptions {
                playback_rate,
                looping: false,
            },
        );
        let mut recorder = Recorder::default();
        let start = tokio::time::Instant::now();
        let summary = session
            .run(WorldTrackingConfiguration::default(), &mut recorder)
            .await;
        (summary, start.elapsed())
    }

    fn assert_close(elapsed: Duration, expected: Duration) {
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(20),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_scale_with_playback_rate() {
        let (summary, elapsed) = paced_run(1.0).await;
        assert_eq!(summary.steps, 2);
        assert_close(elapsed, Duration::from_millis(1000));

        let (summary, elapsed) = paced_run(2.0).await;
        assert_eq!(summary.steps, 2);
        assert_close(elapsed, Duration::from_millis(500));

        let (_, elapsed) = paced_run(0.5).await;
        assert_close(elapsed, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_playback_rate_plays_at_normal_speed() {
        for rate in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let (summary, elapsed) = paced_run(rate).await;
            assert_eq!(summary.steps, 2, "rate {rate}");
            assert_close(elapsed, Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiny_playback_rate_caps_step_delay() {
        let mut session = TrackingSession::new(
            timed_recording(vec![(
                400,
                SessionEvent::AnchorsAdded(vec![plane(1, PlaneAlignment::Horizontal)]),
            )]),
            SessionOptions {
                playback_rate: 1e-30,
                looping: false,
            },
        );
        let mut recorder = Recorder::default();
        let start = tokio::time::Instant::now();
        let summary = session
            .run(WorldTrackingConfiguration::default(), &mut recorder)
            .await;

        assert_eq!(summary.added, 1);
        assert_close(start.elapsed(), MAX_STEP_DELAY);
    }

    #[test]
    fn test_scaled_delay() {
        assert_eq!(scaled_delay(400, 2.0), Duration::from_millis(200));
        assert_eq!(scaled_delay(0, 1e-30), Duration::ZERO);
        assert_eq!(scaled_delay(400, 1e-30), MAX_STEP_DELAY);
        assert_eq!(scaled_delay(u64::MAX, f32::MIN_POSITIVE), MAX_STEP_DELAY);
    }

    #[test]
    fn test_detection_allows() {
        assert!(PlaneDetection::ALL.allows(PlaneAlignment::Vertical));
        assert!(!PlaneDetection::NONE.allows(PlaneAlignment::Horizontal));
    }
}
