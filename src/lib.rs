pub mod audio;
pub mod audio_io;
pub mod coalesce;
pub mod editor;
pub mod error;
pub mod history;
pub mod segment;
pub mod transport;
pub mod wave;

pub use audio::{AudioBuffer, AudioEngine, Voice};
pub use editor::{ClipEditor, EditorConfig, JoinEditor, Track};
pub use error::EditError;
pub use segment::{Segment, SegmentEdge};
pub use transport::{Clock, ManualClock, MultiTransport, TrackTransport, TransportState};
