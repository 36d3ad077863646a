pub mod queue;
pub mod registry;
pub mod session;
pub mod stream;

pub use registry::SessionRegistry;
pub use session::{PlaybackSession, PlaybackState, SessionEvent, SessionSnapshot};
pub use stream::{SongbirdBackend, StreamBackend};
