pub mod gaps;
pub mod models;
pub mod placement;
pub mod reflow;
pub mod time_anchor;
pub mod window;
