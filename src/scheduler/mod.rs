//! Task execution with bounded parallelism.
//!
//! | Module   | Purpose                                          |
//! |----------|--------------------------------------------------|
//! | `pool`   | `WorkerPool`: threads pulling from a bounded queue |
//! | `result` | `BuildResult`, `BuildSummary`                    |
//! | `run`    | Sequential / parallel drivers used by commands   |

mod pool;
mod result;
mod run;


pub use pool::WorkerPool;
pub use result::{BuildResult, BuildSummary};
pub use run::{RunMode, run_tasks};
