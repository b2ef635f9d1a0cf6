pub mod collaborators;
pub mod controller;
pub mod fetch;
pub mod scheduler;

pub use collaborators::{Authenticator, CollaboratorError, LocationStore};
pub use controller::{
    CompletionStatus, ControllerConfig, FetchKind, FetchRequest, FetchResult, FetchTicket,
    ViewModeController,
};
pub use fetch::execute;
pub use scheduler::{CooperativeScheduler, Scheduler, TimerId};
