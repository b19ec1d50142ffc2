//! Commands flowing through a transform chain, and where they come from.

use crate::allocator::AllocError;
use crate::api::ApiId;
use crate::codec::CodecError;
use crate::data::MemoryError;
use crate::state::GlobalState;
use crate::transform::TransformId;
use crate::view::ViewError;

use std::collections::VecDeque;
use std::fmt;

/// A single captured API call.
pub trait Command: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// The API the command belongs to, if any.
    fn api(&self) -> Option<ApiId> {
        None
    }

    /// Applies the command's side effects to `state`.
    fn mutate(&self, state: &mut GlobalState, id: TransformId) -> Result<(), CommandError>;
}

pub type CommandBox = Box<dyn Command>;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl CommandError {
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }
}

/// Source of the commands fed into a transform chain.
pub trait CommandGenerator {
    /// Id of the command the next call to `next_command` returns, or
    /// [`TransformId::End`] once the source is exhausted.
    fn current_command_id(&self) -> TransformId;

    fn is_end_of_commands(&self) -> bool;

    fn next_command(&mut self) -> Option<(TransformId, CommandBox)>;
}

/// Generates a fixed list of commands with ids counting up from zero.
#[derive(Debug, Default)]
pub struct LinearGenerator {
    commands: VecDeque<CommandBox>,
    next: u64,
}

impl LinearGenerator {
    pub fn new(commands: Vec<CommandBox>) -> Self {
        Self {
            commands: commands.into(),
            next: 0,
        }
    }
}

impl CommandGenerator for LinearGenerator {
    fn current_command_id(&self) -> TransformId {
        if self.commands.is_empty() {
            TransformId::End
        } else {
            TransformId::Command(self.next)
        }
    }

    fn is_end_of_commands(&self) -> bool {
        self.commands.is_empty()
    }

    fn next_command(&mut self) -> Option<(TransformId, CommandBox)> {
        let cmd = self.commands.pop_front()?;
        let id = TransformId::Command(self.next);
        self.next += 1;
        Some((id, cmd))
    }
}

impl FromIterator<CommandBox> for LinearGenerator {
    fn from_iter<I: IntoIterator<Item = CommandBox>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
