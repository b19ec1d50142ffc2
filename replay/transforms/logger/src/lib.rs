use replay_core::command::CommandBox;
use replay_core::state::GlobalState;
use replay_core::transform::{Transform, TransformError, TransformId};

use std::io::Write;

use tracing::debug;

/// Passes every command through unchanged and writes one line per command to
/// a sink.
///
/// Each line reads `"{id} {api} {name}"`, where `api` is the registered API
/// name, or `-` for commands that belong to no API.
pub struct CommandLogger<W> {
    sink: W,
    lines: u64,
}

impl<W: Write> CommandLogger<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, lines: 0 }
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn log(&mut self, id: TransformId, cmd: &CommandBox, state: &GlobalState) -> std::io::Result<()> {
        let name = cmd.name();
        match cmd.api() {
            Some(api) => match state.apis.by_id(api) {
                Some(known) => writeln!(self.sink, "{id} {} {name}", known.name)?,
                None => writeln!(self.sink, "{id} {api} {name}")?,
            },
            None => writeln!(self.sink, "{id} - {name}")?,
        }
        debug!(%id, command = name, "[CommandLogger]");
        self.lines += 1;
        Ok(())
    }
}

impl<W: Write> Transform for CommandLogger<W> {
    fn name(&self) -> &str {
        "command-logger"
    }

    fn transform(
        &mut self,
        id: TransformId,
        cmds: Vec<CommandBox>,
        state: &GlobalState,
    ) -> Result<Vec<CommandBox>, TransformError> {
        for cmd in &cmds {
            self.log(id, cmd, state)
                .map_err(|e| TransformError::stage("command-logger", e))?;
        }
        Ok(cmds)
    }

    fn flush(&mut self, _: &GlobalState) -> Result<Vec<CommandBox>, TransformError> {
        self.sink
            .flush()
            .map_err(|e| TransformError::stage("command-logger", e))?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_core::api::{Api, ApiId, ApiRegistry};
    use replay_core::command::{Command, CommandError, LinearGenerator};
    use replay_core::layout::MemoryLayout;
    use replay_core::transform::{CommandRecorder, TransformChain};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Call(&'static str, Option<ApiId>);

    impl Command for Call {
        fn name(&self) -> &str {
            self.0
        }

        fn api(&self) -> Option<ApiId> {
            self.1
        }

        fn mutate(&self, _: &mut GlobalState, _: TransformId) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn test_logs_every_command() {
        let mut apis = ApiRegistry::new();
        apis.register(Api {
            id: ApiId(7),
            name: "gles".into(),
            index: 1,
        })
        .unwrap();
        let state = GlobalState::new(MemoryLayout::arm64(), Arc::new(apis));

        let source: LinearGenerator = vec![
            Box::new(Call("glClear", Some(ApiId(7)))) as CommandBox,
            Box::new(Call("vkQueueSubmit", Some(ApiId(9)))),
            Box::new(Call("frame", None)),
        ]
        .into_iter()
        .collect();

        let mut chain = TransformChain::new(
            Box::new(source),
            vec![Box::new(CommandLogger::new(Vec::new()))],
            CommandRecorder::new(state),
        );
        while !chain.is_end_of_commands() {
            chain.process_next_transformed_commands().unwrap();
        }
        assert_eq!(chain.writer().commands().len(), 3);
    }

    #[test]
    fn test_line_format() {
        let state = GlobalState::default();
        let mut logger = CommandLogger::new(Vec::new());
        let out = logger
            .transform(
                TransformId::Command(4),
                vec![
                    Box::new(Call("draw", Some(ApiId(2)))) as CommandBox,
                    Box::new(Call("end", None)),
                ],
                &state,
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(logger.lines(), 2);
        let text = String::from_utf8(logger.into_inner()).unwrap();
        assert_eq!(text, "4 0x00000002 draw\n4 - end\n");
    }
}
