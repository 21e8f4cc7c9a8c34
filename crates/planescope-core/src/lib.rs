//! planescope core - plane anchors and the tracking session contract
//!
//! This crate holds everything on the tracking side of the relay:
//! the anchor records reported by the tracking subsystem, the delegate
//! contract used to deliver them, and a playback service that replays
//! recorded sessions on their own thread.

pub mod anchor;
pub mod recording;
pub mod session;

pub use anchor::{
    Anchor, AnchorId, PlaneAlignment, PlaneAnchor, PlaneClassification, PlaneExtent,
    PlaneGeometry, Pose, WorldAnchor,
};
pub use recording::{RecordedStep, Recording, RecordingError};
pub use session::{
    event_channel, ChannelDelegate, PlaneDetection, SessionDelegate, SessionEvent,
    SessionEvents, SessionOptions, SessionSummary, TrackingSession, WorldTrackingConfiguration,
};
