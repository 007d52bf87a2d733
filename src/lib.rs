pub mod api;
pub mod audio;
pub mod config;
pub mod gate;
pub mod panel;
pub mod playback;
pub mod timesource;
pub mod transcript;
pub mod video;

pub use api::{ApiClient, ApiError, AudioService, TranscriptSource};
pub use audio::{AudioDelivery, AudioOutput, ClipHandle, ClipOutcome, ClipStopper, RodioOutput};
pub use config::{AudioDeliveryMode, PanelConfig};
pub use gate::{Busy, GatePermit, RequestGate};
pub use panel::{AnswerRecord, Panel, PanelError, PanelUpdate};
pub use playback::{PlaybackError, PlaybackSequencer, SessionControl, SessionEvent, SessionPhase};
pub use timesource::{TimeSource, TimeSourceError};
pub use transcript::{Segment, TranscriptIndex};
pub use video::VideoId;
