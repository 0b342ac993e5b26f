#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod client;
pub mod config;
pub mod connector;
pub mod controller;
#[doc(hidden)]
pub mod diagnostics;
pub mod error;
#[doc(hidden)]
pub mod observability;
#[doc(hidden)]
pub mod platform;
pub mod reconciler;
pub mod resource;
pub mod store;

pub use config::Config;
pub use controller::{Controller, ControllerHandle, ControllerSettings, ReconcileOutcome};
