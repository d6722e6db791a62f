//! Cost-window flow control for client streams.
//!
//! Each stream owns a window: a ceiling on the estimated cost it may have
//! outstanding. Pushes reserve cost, releases return it, and every release
//! feeds a periodic recalculation that grows busy windows toward their fair
//! share of the queue budget and shrinks quiet ones. Streams that stay idle
//! while others churn are first frozen and finally expired.

mod params;
mod queue;
mod sequence;
mod window;

pub use params::{BackpressureError, WindowParams};
pub use queue::{BackpressureStats, Feedback, QueueBackpressure, Release, StreamStats};
pub use sequence::SequenceId;
pub use window::{FeedbackStatus, WindowStatus};
