//! Canvas assignment tracking and reminder engine.
//!
//! The crate fetches upcoming assignments from a Canvas LMS instance, keeps
//! per-assignment user overrides on disk, and drives two timers off the
//! result: at-most-once due-date reminders and a rotating "what to show now"
//! pointer. Rendering is left to whatever UI shell sits on top of [`engine::Engine`].

pub mod canvas;
pub mod config;
pub mod display;
pub mod engine;
pub mod model;
pub mod notify;
pub mod registry;
pub mod rotation;
pub mod scheduler;
pub mod store;

pub use engine::{Engine, EngineError, EngineSettings, FetchStatus, Snapshot};
pub use model::{Assignment, NotificationEvent, Threshold};
