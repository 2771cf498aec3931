pub mod budget;
pub mod control;
pub mod free;
pub mod looper;
pub mod timed;

pub use budget::Budget;
pub use free::FreeLooper;
pub use looper::{Looper, WorkFn, WorkFuture, work_fn};
pub use timed::TimedLooper;
