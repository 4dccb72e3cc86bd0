pub mod api;
pub mod baseline;
pub mod config;
pub mod confirm;
pub mod dedup;
pub mod display;
pub mod error;
pub mod model;
pub mod roster;
pub mod selection;
pub mod store;
pub mod tokens;
pub mod web;

pub use baseline::ChangeTracker;
pub use config::ConsoleConfig;
pub use confirm::{ConfirmRequest, ConfirmationDialog, DialogSurface, KeyInput};
pub use dedup::FetchDedup;
pub use error::{ConsoleError, Result};
pub use model::{Event, Participant, Schedule};
pub use roster::{GlDirectory, GroupLeader, LeaderSource};
pub use selection::{DeepLink, FinalizeOptions, SelectionReconciler, SessionState};
pub use store::{JsonFileStore, MemoryStore, StoreReader};
pub use tokens::{TokenGenerator, TokenRegistry};
