//! Core traits for the Frame dashboard
//!
//! This module defines the abstract interfaces that all plugins must follow.
//!
//! - [`ValueSource`]: Fetch the current value of a property
//! - [`Action`]: Operations triggered by the user
//! - [`Renderer`]: Present a value
//! - [`NotificationTarget`]: Deliver notifications
//! - [`Parser`]: Turn raw output into structured values

pub mod action;
pub mod notification_target;
pub mod parser;
pub mod renderer;
pub mod value_source;

pub use action::{Action, ActionSet};
pub use notification_target::{Notification, NotificationTarget};
pub use parser::{IdentityParser, Parser};
pub use renderer::{PlainRenderer, Renderer, render_plain};
pub use value_source::ValueSource;
