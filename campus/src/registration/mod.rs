//! Event registration: status model, button state machine, busy retries, and
//! the page controller that ties them to a view.
//!
//! DESIGN
//! ======
//! The pure pieces (`status`, `button`) carry no I/O and are tested
//! exhaustively. `retry` is the only place with failure-handling policy.
//! `controller` owns per-page session state and talks to the outside world
//! only through `ApiClient` and `RegistrationView`.

pub mod button;
pub mod controller;
pub mod retry;
pub mod status;
pub mod view;

pub use button::{ButtonDescriptor, ButtonState};
pub use controller::RegistrationController;
pub use retry::submit_with_retry;
pub use status::{RegistrationState, RegistrationStatus};
pub use view::{AlertKind, RegistrationView, StatusPanel};
