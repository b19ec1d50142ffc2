//! Stateful rewriting stages between a command source and a writer.
//!
//! A [`TransformChain`] pulls one command at a time from its source and hands
//! it to each [`Transform`] in order. A stage may drop the commands it is given,
//! rewrite them or emit extra ones; whatever it returns is all the next stage
//! sees. Commands that survive every stage reach the [`Writer`], which applies
//! them to the [`GlobalState`] and records them.

mod chain;
mod terminator;

pub use chain::TransformChain;
pub use terminator::EarlyTerminator;

use crate::command::{CommandBox, CommandError};
use crate::state::GlobalState;

use std::fmt;

/// Position of a batch of commands in the stream.
///
/// `Begin` and `End` mark commands emitted before the first or after the last
/// captured command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformId {
    Begin,
    Command(u64),
    End,
}

impl TransformId {
    /// # Panics
    ///
    /// Panics if called on `Begin` or `End`.
    pub fn id(self) -> u64 {
        match self {
            TransformId::Command(id) => id,
            marker => panic!("{marker} has no command id"),
        }
    }

    pub fn try_id(self) -> Option<u64> {
        match self {
            TransformId::Command(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn is_marker(self) -> bool {
        !matches!(self, TransformId::Command(_))
    }
}

impl fmt::Display for TransformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformId::Begin => f.write_str("begin"),
            TransformId::Command(id) => write!(f, "{id}"),
            TransformId::End => f.write_str("end"),
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct TransformFlags: u32 {
        /// The stage reads state that must reflect every earlier command.
        const REQUIRES_ACCURATE_STATE = 1 << 0;
        /// The stage may hold commands back until `flush`.
        const BUFFERS_COMMANDS = 1 << 1;
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl TransformError {
    pub fn stage<E>(stage: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(err),
        }
    }
}

/// One stage of a transform chain.
///
/// Every hook except `transform` defaults to doing nothing.
pub trait Transform {
    fn name(&self) -> &str;

    fn flags(&self) -> TransformFlags {
        TransformFlags::empty()
    }

    /// Called once before the first command. Returned commands are handed to
    /// the following stages under [`TransformId::Begin`].
    fn pre_loop(&mut self, state: &GlobalState) -> Result<Vec<CommandBox>, TransformError> {
        let _ = state;
        Ok(Vec::new())
    }

    fn transform(
        &mut self,
        id: TransformId,
        cmds: Vec<CommandBox>,
        state: &GlobalState,
    ) -> Result<Vec<CommandBox>, TransformError>;

    /// Releases anything held back. Called once after the last command.
    fn flush(&mut self, state: &GlobalState) -> Result<Vec<CommandBox>, TransformError> {
        let _ = state;
        Ok(Vec::new())
    }

    /// Called once after `flush`. Returned commands are handed to the
    /// following stages under [`TransformId::End`].
    fn post_loop(&mut self, state: &GlobalState) -> Result<Vec<CommandBox>, TransformError> {
        let _ = state;
        Ok(Vec::new())
    }
}

/// Terminal consumer of a transform chain.
pub trait Writer {
    fn state(&self) -> &GlobalState;

    fn mutate_and_write(&mut self, id: TransformId, cmd: CommandBox) -> Result<(), TransformError>;
}

/// A writer that applies each command to its state and keeps it.
#[derive(Debug)]
pub struct CommandRecorder {
    state: GlobalState,
    written: Vec<(TransformId, CommandBox)>,
}

impl CommandRecorder {
    pub fn new(state: GlobalState) -> Self {
        Self {
            state,
            written: Vec::new(),
        }
    }

    /// Commands in the order they were written.
    pub fn commands(&self) -> &[(TransformId, CommandBox)] {
        &self.written
    }

    pub fn ids(&self) -> Vec<TransformId> {
        self.written.iter().map(|(id, _)| *id).collect()
    }

    pub fn into_parts(self) -> (GlobalState, Vec<(TransformId, CommandBox)>) {
        (self.state, self.written)
    }
}

impl Writer for CommandRecorder {
    fn state(&self) -> &GlobalState {
        &self.state
    }

    fn mutate_and_write(&mut self, id: TransformId, cmd: CommandBox) -> Result<(), TransformError> {
        cmd.mutate(&mut self.state, id)?;
        tracing::trace!(%id, command = cmd.name(), "written");
        self.written.push((id, cmd));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_marker_ids() {
        assert_eq!(TransformId::Command(4).id(), 4);
        assert_eq!(TransformId::End.try_id(), None);
        assert!(TransformId::Begin.is_marker());
        assert!(TransformId::Begin < TransformId::Command(0));
        assert!(TransformId::Command(u64::MAX) < TransformId::End);
    }

    #[test]
    #[should_panic]
    fn ensure_marker_id_panics() {
        TransformId::Begin.id();
    }
}
