use super::{Transform, TransformError, TransformId};
use crate::api::ApiId;
use crate::command::{Command, CommandBox};
use crate::state::GlobalState;

/// Stops the stream of an API once the last requested command has passed.
///
/// Commands with no API count as belonging to it. Commands of other APIs and
/// batches emitted under the begin/end markers are never dropped.
#[derive(Debug, Default)]
pub struct EarlyTerminator {
    api: Option<ApiId>,
    last: Option<u64>,
    done: bool,
}

impl EarlyTerminator {
    pub fn new(api: Option<ApiId>) -> Self {
        Self {
            api,
            last: None,
            done: false,
        }
    }

    /// Requests that command `id` is still emitted.
    pub fn add(&mut self, id: u64) {
        self.last = Some(self.last.map_or(id, |last| last.max(id)));
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn matches(&self, cmd: &dyn Command) -> bool {
        match cmd.api() {
            None => true,
            api => api == self.api,
        }
    }
}

impl Transform for EarlyTerminator {
    fn name(&self) -> &str {
        "early-terminator"
    }

    fn transform(
        &mut self,
        id: TransformId,
        cmds: Vec<CommandBox>,
        _: &GlobalState,
    ) -> Result<Vec<CommandBox>, TransformError> {
        let (Some(n), Some(last)) = (id.try_id(), self.last) else {
            return Ok(cmds);
        };
        if !self.done {
            // the cut is reached by the first command of this API at or past `last`
            if n >= last && cmds.iter().any(|cmd| self.matches(cmd.as_ref())) {
                tracing::debug!(last, at = n, "terminating command stream");
                self.done = true;
            }
            return Ok(cmds);
        }
        Ok(cmds
            .into_iter()
            .filter(|cmd| !self.matches(cmd.as_ref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;

    #[derive(Debug)]
    struct Call(Option<ApiId>);

    impl Command for Call {
        fn name(&self) -> &str {
            "call"
        }

        fn api(&self) -> Option<ApiId> {
            self.0
        }

        fn mutate(&self, _: &mut GlobalState, _: TransformId) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn run(t: &mut EarlyTerminator, id: u64, api: Option<ApiId>) -> usize {
        let state = GlobalState::default();
        t.transform(TransformId::Command(id), vec![Box::new(Call(api))], &state)
            .unwrap()
            .len()
    }

    #[test]
    fn test_keeps_highest_requested_id() {
        let mut t = EarlyTerminator::new(Some(ApiId(1)));
        t.add(3);
        t.add(1);
        assert_eq!(run(&mut t, 2, None), 1);
        assert!(!t.is_done());
        assert_eq!(run(&mut t, 3, Some(ApiId(1))), 1);
        assert!(t.is_done());
        assert_eq!(run(&mut t, 4, Some(ApiId(1))), 0);
        assert_eq!(run(&mut t, 5, None), 0);
        assert_eq!(run(&mut t, 6, Some(ApiId(2))), 1);
    }

    #[test]
    fn test_other_api_at_last_id_does_not_terminate() {
        let mut t = EarlyTerminator::new(Some(ApiId(1)));
        t.add(5);
        assert_eq!(run(&mut t, 5, Some(ApiId(2))), 1);
        assert!(!t.is_done());
        // first command of the terminated API to reach the cut is still emitted
        assert_eq!(run(&mut t, 6, Some(ApiId(1))), 1);
        assert!(t.is_done());
        assert_eq!(run(&mut t, 7, Some(ApiId(1))), 0);
        assert_eq!(run(&mut t, 8, Some(ApiId(2))), 1);
    }

    #[test]
    fn test_without_target_passes_everything() {
        let mut t = EarlyTerminator::new(None);
        assert_eq!(run(&mut t, 100, None), 1);
        assert!(!t.is_done());
    }
}
