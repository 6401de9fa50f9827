pub mod console;
pub mod icons;

pub use console::{ConsoleSink, UiMode};
