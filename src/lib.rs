// The MIT License (MIT)
//
// Copyright (c) 2015 Rustcc developers
// Copyright (c) 2024 HiCR/TaskR Contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A dependency-tracked, label-addressed task scheduler whose workers pin
//! themselves to compute resources and run each task inside a stackful
//! coroutine, so that task-level synchronization (mutex, condition variable)
//! can suspend a task without blocking its worker.
//!
//! ```no_run
//! use taskr::{Runtime, RuntimeConfig};
//! use taskr::processing_unit::HostProcessingUnit;
//!
//! let runtime = Runtime::new(RuntimeConfig::default());
//! for id in core_affinity::get_core_ids().unwrap_or_default() {
//!     runtime.add_processing_unit(Box::new(HostProcessingUnit::new(id))).unwrap();
//! }
//!
//! runtime.add_task(taskr::Task::new(0, taskr::ExecutionUnit::new(|| {
//!     println!("hello from task 0");
//! }))).unwrap();
//!
//! runtime.run().unwrap();
//! runtime.finalize();
//! ```

pub mod config;
pub mod current;
pub mod coroutine;
pub mod error;
pub mod execution_unit;
pub mod processing_unit;
pub mod runtime;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod topology;
pub mod worker;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use execution_unit::ExecutionUnit;
pub use runtime::Runtime;
pub use task::{EventKind, Task, TaskLabel};
pub use worker::Worker;
