//! Host-facing UI capabilities injected into the manager: thread marshaling and text lookup.

pub mod dispatch;
pub mod text;

pub use dispatch::{InlineDispatcher, UiDispatcher};
pub use text::{keys, DefaultText, Localizer};
