//! Gesture-to-action control core.
//!
//! Landmark frames enter through `controller::ControllerState::process_frame`;
//! everything below it is synchronous and single-threaded.

pub mod arbiter;
pub mod controller;
pub mod debounce;
pub mod landmarks;
pub mod pointer;
pub mod scroll;
pub mod virtual_keyboard;
