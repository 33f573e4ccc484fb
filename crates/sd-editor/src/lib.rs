pub mod error;
pub mod history;
pub mod selection;
pub mod session;
pub mod shortcuts;
pub mod store;

pub use error::EditorError;
pub use history::History;
pub use selection::{ComponentTemplate, Selection};
pub use session::{DraftConflict, EditorSession, ProposalState, ProposedPatch, SaveRequest, SessionConfig};
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use store::{LoadedScreen, MemoryStore, ScreenStore, StoreError};
