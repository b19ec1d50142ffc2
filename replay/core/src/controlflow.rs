//! Drives a transform chain to completion.

use crate::transform::{TransformChain, TransformError, TransformId, Writer};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// How often progress is reported, in input commands.
pub const PROGRESS_INTERVAL: u64 = 100;

const UNKNOWN_COMMAND: &str = "unknown";

#[derive(thiserror::Error, Debug)]
pub enum ControlFlowError {
    #[error("stopped: {0}")]
    Stopped(String),

    #[error("command {id} ({command}) failed: {source}")]
    CommandFailed {
        id: TransformId,
        command: String,
        #[source]
        source: TransformError,
    },

    #[error("command {id} ({command}) panicked: {message}")]
    Panicked {
        id: TransformId,
        command: String,
        message: String,
    },
}

/// Cooperative cancellation flag shared between a running generator and
/// whoever wants to stop it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    cause: Arc<Mutex<Option<String>>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. The first cause given wins.
    pub fn stop(&self, cause: impl Into<String>) {
        let mut slot = self.cause.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(cause.into());
        }
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn cause(&self) -> Option<String> {
        self.cause.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Input commands processed so far.
    pub processed: u64,
    pub current: TransformId,
}

type ProgressFn = Box<dyn FnMut(Progress) + Send>;

/// Runs every step of a [`TransformChain`], containing stage failures and
/// checking for cancellation between steps.
pub struct ControlFlowGenerator<W> {
    chain: TransformChain<W>,
    stop: Option<StopSignal>,
    on_progress: Option<ProgressFn>,
    processed: u64,
}

impl<W: Writer> ControlFlowGenerator<W> {
    pub fn new(chain: TransformChain<W>) -> Self {
        Self {
            chain,
            stop: None,
            on_progress: None,
            processed: 0,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(Progress) + Send + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn chain(&self) -> &TransformChain<W> {
        &self.chain
    }

    pub fn into_chain(self) -> TransformChain<W> {
        self.chain
    }

    /// Processes steps until the chain reports the end of commands.
    ///
    /// The first failing step ends the loop; later stages are not flushed.
    pub fn transform_all(&mut self) -> Result<(), ControlFlowError> {
        let _span = tracing::debug_span!("transform_all").entered();
        while !self.chain.is_end_of_commands() {
            let id = self.chain.current_command_id();
            let step = catch_unwind(AssertUnwindSafe(|| {
                self.chain.process_next_transformed_commands()
            }));
            match step {
                Ok(Ok(())) => {}
                Ok(Err(source)) => {
                    let command = self.command_name(id);
                    tracing::warn!(%id, %command, error = %source, "transform step failed");
                    return Err(ControlFlowError::CommandFailed {
                        id,
                        command,
                        source,
                    });
                }
                Err(payload) => {
                    let command = self.command_name(id);
                    let message = panic_message(payload.as_ref());
                    tracing::error!(%id, %command, %message, "transform step panicked");
                    return Err(ControlFlowError::Panicked {
                        id,
                        command,
                        message,
                    });
                }
            }

            if let TransformId::Command(_) = id {
                self.processed += 1;
                if self.processed % PROGRESS_INTERVAL == 0 {
                    let progress = Progress {
                        processed: self.processed,
                        current: id,
                    };
                    tracing::info!(processed = self.processed, %id, "transform progress");
                    if let Some(f) = self.on_progress.as_mut() {
                        f(progress);
                    }
                }
            }

            if let Some(stop) = &self.stop {
                if stop.is_stopped() {
                    let cause = stop.cause().unwrap_or_else(|| "cancelled".to_owned());
                    tracing::debug!(%id, %cause, "transform loop stopped");
                    return Err(ControlFlowError::Stopped(cause));
                }
            }
        }
        Ok(())
    }

    fn command_name(&self, id: TransformId) -> String {
        self.chain
            .command_name(id)
            .unwrap_or(UNKNOWN_COMMAND)
            .to_owned()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
