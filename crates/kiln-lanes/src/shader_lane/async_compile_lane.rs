// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Moves shader compilation onto a dedicated worker thread.
//!
//! The owning agent exchanges work with the worker once per tick through
//! [`AsyncShaderLane::sync`]: new jobs go in, finished results come out, both
//! under a single lock. The worker sleeps on a condition variable while it has
//! nothing to compile.
//!
//! The hand-off is bounded: at most `capacity` jobs may be queued, compiling or
//! waiting to be collected at any time. Jobs beyond that stay with the caller.

use kiln_core::{CompiledShader, Resource, ResourceHash, ShaderCompiler, Stopwatch};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

const WORKER_THREAD_NAME: &str = "kiln-shader-compiler";

/// A shader program waiting to be compiled.
#[derive(Debug, Clone)]
pub struct ShaderJob {
    /// Hash of the shader resource.
    pub hash: ResourceHash,
    /// The shader source, shared with the registry until the job completes.
    pub resource: Arc<dyn Resource>,
}

/// The outcome of compiling one [`ShaderJob`].
#[derive(Debug, Clone)]
pub struct ShaderCompileResult {
    /// Hash of the shader resource.
    pub hash: ResourceHash,
    /// The compiled binary, or `None` if compilation failed.
    pub shader: Option<CompiledShader>,
    /// Worker time spent on this job.
    pub compile_time: Duration,
}

/// Errors raised while starting or stopping the compile worker.
#[derive(Error, Debug)]
pub enum ShaderLaneError {
    /// The operating system refused to spawn the worker thread.
    #[error("failed to spawn the shader compile worker: {0}")]
    Spawn(#[from] std::io::Error),
    /// The worker thread panicked while compiling.
    #[error("the shader compile worker panicked")]
    WorkerPanicked,
}

#[derive(Default)]
struct Queues {
    pending: Vec<ShaderJob>,
    completed: Vec<ShaderCompileResult>,
    // Jobs accepted whose result has not been collected yet.
    outstanding: usize,
    shutdown: bool,
}

#[derive(Default)]
struct SharedState {
    queues: Mutex<Queues>,
    wake: Condvar,
}

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The asynchronous compiler bridge: one worker thread owning a [`ShaderCompiler`].
///
/// Jobs are compiled in submission order. A result is only handed back through
/// [`AsyncShaderLane::sync`], never delivered on its own.
pub struct AsyncShaderLane {
    shared: Arc<SharedState>,
    worker: Option<JoinHandle<()>>,
    capacity: usize,
}

impl AsyncShaderLane {
    /// Starts the worker thread, moving `compiler` into it.
    ///
    /// `capacity` bounds the jobs in flight; `0` is treated as `1`.
    pub fn start(
        compiler: Box<dyn ShaderCompiler>,
        capacity: usize,
    ) -> Result<Self, ShaderLaneError> {
        let shared = Arc::new(SharedState::default());
        let worker_state = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_owned())
            .spawn(move || run_worker(&worker_state, compiler))?;

        log::debug!("AsyncShaderLane: Worker '{WORKER_THREAD_NAME}' started");
        Ok(Self {
            shared,
            worker: Some(worker),
            capacity: capacity.max(1),
        })
    }

    /// Maximum number of jobs in flight.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many more jobs the lane accepts before results are collected.
    pub fn available_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.shared.lock().outstanding)
    }

    /// Queues a single job for the worker without waiting for it.
    ///
    /// Hands the job back when the lane is full.
    pub fn schedule(&self, job: ShaderJob) -> Result<(), ShaderJob> {
        {
            let mut queues = self.shared.lock();
            if queues.outstanding >= self.capacity {
                return Err(job);
            }
            queues.outstanding += 1;
            queues.pending.push(job);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Moves finished results into `completed`, then hands the worker as many
    /// `outgoing` jobs, oldest first, as the capacity allows.
    ///
    /// Jobs that do not fit stay in `outgoing`. Both vectors are drained or
    /// appended to in place, so the caller can reuse their allocations from tick
    /// to tick.
    pub fn sync(
        &self,
        outgoing: &mut Vec<ShaderJob>,
        completed: &mut Vec<ShaderCompileResult>,
    ) {
        let accepted = {
            let mut queues = self.shared.lock();
            queues.outstanding -= queues.completed.len();
            completed.append(&mut queues.completed);

            let accepted = outgoing
                .len()
                .min(self.capacity.saturating_sub(queues.outstanding));
            queues.pending.extend(outgoing.drain(..accepted));
            queues.outstanding += accepted;
            accepted
        };
        if accepted > 0 {
            self.shared.wake.notify_one();
        }
    }

    /// Whether the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// Jobs the worker already took are finished and their results stay
    /// available to [`AsyncShaderLane::sync`]; jobs still queued are dropped.
    /// Calling this twice is a no-op.
    pub fn shutdown(&mut self) -> Result<(), ShaderLaneError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();

        worker.join().map_err(|_| ShaderLaneError::WorkerPanicked)?;
        log::debug!("AsyncShaderLane: Worker '{WORKER_THREAD_NAME}' stopped");
        Ok(())
    }
}

impl std::fmt::Debug for AsyncShaderLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncShaderLane")
            .field("running", &self.is_running())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Drop for AsyncShaderLane {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("AsyncShaderLane: {e}");
        }
    }
}

fn run_worker(shared: &SharedState, mut compiler: Box<dyn ShaderCompiler>) {
    let mut batch = Vec::new();
    loop {
        {
            let mut queues = shared.lock();
            while queues.pending.is_empty() && !queues.shutdown {
                queues = shared
                    .wake
                    .wait(queues)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if queues.shutdown {
                if !queues.pending.is_empty() {
                    log::warn!(
                        "AsyncShaderLane: Dropping {} queued shader(s) on shutdown",
                        queues.pending.len()
                    );
                    queues.pending.clear();
                }
                return;
            }
            std::mem::swap(&mut batch, &mut queues.pending);
        }

        for job in batch.drain(..) {
            let stopwatch = Stopwatch::new();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                compiler.compile_shader(job.resource.as_ref())
            }));
            let compile_time = stopwatch.elapsed();
            let shader = match outcome {
                Ok(shader) => shader,
                Err(_) => {
                    log::error!("AsyncShaderLane: Compiler panicked on {}", job.hash);
                    None
                }
            };
            if shader.is_none() {
                log::debug!("AsyncShaderLane: Compiling {} failed", job.hash);
            }

            shared.lock().completed.push(ShaderCompileResult {
                hash: job.hash,
                shader,
                compile_time,
            });
        }
    }
}
