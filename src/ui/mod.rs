//! UI layer - progress bar rendering and the terminal display worker

mod bar;
mod display;

pub use bar::{ProgressBar, DEFAULT_LABEL, DEFAULT_WIDTH};
pub use display::{DisplayHandle, ProgressDisplay};
