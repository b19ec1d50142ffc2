use replay_core::prelude::*;
use replay_core::transform::TransformId::Command as Cmd;

use std::sync::Arc;

#[derive(Debug)]
struct Draw;

impl Command for Draw {
    fn name(&self) -> &str {
        "draw"
    }

    fn mutate(&self, _: &mut GlobalState, _: TransformId) -> Result<(), CommandError> {
        Ok(())
    }
}

/// Writes `id + 1` at `0x100 + id` in the application pool when replayed.
#[derive(Debug)]
struct Poke;

impl Command for Poke {
    fn name(&self) -> &str {
        "poke"
    }

    fn mutate(&self, state: &mut GlobalState, id: TransformId) -> Result<(), CommandError> {
        let n = id.id();
        state.pools.application_mut().write_bytes(0x100 + n, &[n as u8 + 1]);
        Ok(())
    }
}

fn draws(n: usize) -> Box<dyn CommandGenerator> {
    Box::new(
        (0..n)
            .map(|_| Box::new(Draw) as CommandBox)
            .collect::<LinearGenerator>(),
    )
}

fn read(pool: &Pool, base: u64, size: usize) -> Vec<u8> {
    let mut out = vec![0xcc; size];
    pool.read(base, &mut out).unwrap();
    out
}

#[test]
fn pool_overlapping_writes() {
    let mut pool = Pool::new();
    pool.write_bytes(1, &[10, 11, 12]);
    pool.write_bytes(7, &[20, 21, 22, 23]);
    pool.write_bytes(2, &[30, 31]);
    pool.write_bytes(2, &[40, 41, 42]);
    pool.write_bytes(8, &[50]);

    let expected = vec![0, 10, 40, 41, 42, 0, 0, 20, 50, 22, 23, 0];
    assert_eq!(read(&pool, 0, 12), expected);
    assert_eq!(pool.slice(Range::new(0, 12)).bytes().unwrap(), expected);

    let mut streamed = Vec::new();
    std::io::Read::read_to_end(
        &mut pool.slice(Range::new(0, 12)).reader().unwrap(),
        &mut streamed,
    )
    .unwrap();
    assert_eq!(streamed, expected);
}

#[test]
fn pool_of_pool_with_resources() {
    let store = Arc::new(MemoryStore::new());
    let id = store.store(b"resource!").unwrap();

    let mut pools = Pools::new();
    let (scratch, pool) = pools.new_pool();
    pool.write(0x10, Data::resource(id, 9, store.clone()));
    pool.write_bytes(0x12, b"S");

    let window = pools.must_get(scratch).slice(Range::new(0x0e, 8));
    pools.application_mut().write(0x1000, window);
    assert_eq!(
        read(pools.application(), 0x1000, 8),
        b"\0\0reSource"[..8].to_vec()
    );
    assert_eq!(pools.application().strlen(0x1000).unwrap(), Some(0));
    assert_eq!(pools.application().strlen(0x1002).unwrap(), Some(6));
}

#[test]
fn allocator_first_fit() {
    let free: U64RangeList = vec![Range::new(2, 6), Range::new(9, 9), Range::new(19, 2)].into();
    let mut a = BasicAllocator::new(free.clone());

    assert_eq!(a.alloc(10, 1), Err(AllocError::OutOfSpace { count: 10, align: 1 }));
    assert_eq!(a.alloc(5, 1), Ok(2));
    assert_eq!(
        a.free_list().as_slice(),
        &[Range::new(7, 1), Range::new(9, 9), Range::new(19, 2)]
    );
    assert_eq!(a.free(4), Err(AllocError::UnknownAllocation(4)));
    assert_eq!(a.free(2), Ok(()));
    assert_eq!(a.free_list(), &free);
    assert!(a.alloc_list().is_empty());
}

#[test]
fn early_terminator_stops_after_last() {
    let mut term = EarlyTerminator::new(None);
    term.add(5);
    let mut flow = ControlFlowGenerator::new(TransformChain::new(
        draws(10),
        vec![Box::new(term)],
        CommandRecorder::new(GlobalState::default()),
    ));
    flow.transform_all().unwrap();
    let ids = flow.chain().writer().ids();
    assert_eq!(ids, (0..=5).map(Cmd).collect::<Vec<_>>());
}

/// Requests a stop as soon as it sees command `at`.
struct StopAt {
    at: u64,
    signal: StopSignal,
}

impl Transform for StopAt {
    fn name(&self) -> &str {
        "stop-at"
    }

    fn transform(
        &mut self,
        id: TransformId,
        cmds: Vec<CommandBox>,
        _: &GlobalState,
    ) -> Result<Vec<CommandBox>, TransformError> {
        if id == Cmd(self.at) {
            self.signal.stop("cancelled by test");
        }
        Ok(cmds)
    }
}

#[test]
fn cancellation_stops_after_current_command() {
    let signal = StopSignal::new();
    let stage = StopAt {
        at: 3,
        signal: signal.clone(),
    };
    let mut flow = ControlFlowGenerator::new(TransformChain::new(
        draws(10),
        vec![Box::new(stage)],
        CommandRecorder::new(GlobalState::default()),
    ))
    .with_stop_signal(signal);

    match flow.transform_all() {
        Err(ControlFlowError::Stopped(cause)) => assert_eq!(cause, "cancelled by test"),
        other => panic!("expected a stop, got {other:?}"),
    }
    let ids = flow.chain().writer().ids();
    assert_eq!(ids, (0..=3).map(Cmd).collect::<Vec<_>>());
}

#[test]
fn failing_command_is_annotated() {
    #[derive(Debug)]
    struct Oom;

    impl Command for Oom {
        fn name(&self) -> &str {
            "oom"
        }

        fn mutate(&self, state: &mut GlobalState, _: TransformId) -> Result<(), CommandError> {
            state.allocator.alloc(u64::MAX, 1)?;
            Ok(())
        }
    }

    let source: LinearGenerator = vec![
        Box::new(Poke) as CommandBox,
        Box::new(Oom),
        Box::new(Poke),
    ]
    .into_iter()
    .collect();
    let mut flow = ControlFlowGenerator::new(TransformChain::new(
        Box::new(source),
        Vec::new(),
        CommandRecorder::new(GlobalState::default()),
    ));

    match flow.transform_all() {
        Err(ControlFlowError::CommandFailed { id, command, source }) => {
            assert_eq!(id, Cmd(1));
            assert_eq!(command, "oom");
            assert!(matches!(
                source,
                TransformError::Command(CommandError::Alloc(AllocError::OutOfSpace { .. }))
            ));
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    let (state, written) = flow.into_chain().into_writer().into_parts();
    assert_eq!(written.len(), 1);
    assert_eq!(read(state.pools.application(), 0x100, 3), vec![1, 0, 0]);
}

#[test]
fn snapshot_restores_lazily() {
    let store = Arc::new(MemoryStore::new());
    let mut state = GlobalState::default();
    let base = state
        .alloc_data(Data::from_bytes(b"vertex data".to_vec()), 8)
        .unwrap();

    let snap = state.pools.snapshot(store.as_ref()).unwrap();
    let mut json = Vec::new();
    snap.save(&mut json).unwrap();

    let loaded = replay_core::snapshot::PoolsSnapshot::load(json.as_slice()).unwrap();
    let pools = Pools::restore(&loaded, store).unwrap();
    assert_eq!(
        pools.application().slice(Range::new(base, 6)).bytes().unwrap(),
        b"vertex"
    );
}
