use super::{Transform, TransformError, TransformFlags, TransformId, Writer};
use crate::command::{CommandBox, CommandGenerator};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Begin,
    Running,
    Done,
}

/// Feeds commands from a source through each stage and into a writer, one
/// step at a time.
pub struct TransformChain<W> {
    source: Box<dyn CommandGenerator>,
    stages: Vec<Box<dyn Transform>>,
    writer: W,
    phase: Phase,
    current: Option<(TransformId, String)>,
}

impl<W: Writer> TransformChain<W> {
    pub fn new(
        source: Box<dyn CommandGenerator>,
        stages: Vec<Box<dyn Transform>>,
        writer: W,
    ) -> Self {
        Self {
            source,
            stages,
            writer,
            phase: Phase::Begin,
            current: None,
        }
    }

    pub fn is_end_of_commands(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Id of the batch the next step processes.
    pub fn current_command_id(&self) -> TransformId {
        match self.phase {
            Phase::Begin => TransformId::Begin,
            Phase::Running => self.source.current_command_id(),
            Phase::Done => TransformId::End,
        }
    }

    /// Name of the input command handled by the most recent step, if it was
    /// a command.
    pub fn command_name(&self, id: TransformId) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|(current, _)| *current == id)
            .map(|(_, name)| name.as_str())
    }

    /// Union of every stage's flags.
    pub fn flags(&self) -> TransformFlags {
        self.stages
            .iter()
            .fold(TransformFlags::empty(), |acc, s| acc | s.flags())
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Advances by exactly one step: the begin hooks, one input command, or
    /// the end hooks.
    pub fn process_next_transformed_commands(&mut self) -> Result<(), TransformError> {
        match self.phase {
            Phase::Begin => {
                let _span = tracing::trace_span!("chain_begin").entered();
                tracing::debug!(stages = self.stages.len(), flags = ?self.flags(), "starting transform chain");
                for i in 0..self.stages.len() {
                    let cmds = self.stages[i].pre_loop(self.writer.state())?;
                    self.run_from(i + 1, TransformId::Begin, cmds)?;
                }
                self.phase = Phase::Running;
            }
            Phase::Running => match self.source.next_command() {
                Some((id, cmd)) => {
                    let _span = tracing::trace_span!("chain_step", %id).entered();
                    self.current = Some((id, cmd.name().to_owned()));
                    self.run_from(0, id, vec![cmd])?;
                }
                None => {
                    let _span = tracing::trace_span!("chain_end").entered();
                    self.current = None;
                    for i in 0..self.stages.len() {
                        let mut cmds = self.stages[i].flush(self.writer.state())?;
                        cmds.extend(self.stages[i].post_loop(self.writer.state())?);
                        self.run_from(i + 1, TransformId::End, cmds)?;
                    }
                    self.phase = Phase::Done;
                }
            },
            Phase::Done => {}
        }
        Ok(())
    }

    fn run_from(
        &mut self,
        start: usize,
        id: TransformId,
        mut cmds: Vec<CommandBox>,
    ) -> Result<(), TransformError> {
        for stage in &mut self.stages[start..] {
            if cmds.is_empty() {
                return Ok(());
            }
            cmds = stage.transform(id, cmds, self.writer.state())?;
            tracing::trace!(stage = stage.name(), emitted = cmds.len());
        }
        for cmd in cmds {
            self.writer.mutate_and_write(id, cmd)?;
        }
        Ok(())
    }
}
