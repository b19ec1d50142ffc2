use crate::allocator::AllocError;
use crate::api::RegistryError;
use crate::codec::CodecError;
use crate::command::CommandError;
use crate::controlflow::ControlFlowError;
use crate::data::MemoryError;
use crate::opcode::OpcodeError;
use crate::snapshot::SnapshotError;
use crate::store::StoreError;
use crate::transform::TransformError;
use crate::view::ViewError;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Opcode(#[from] OpcodeError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    ControlFlow(#[from] ControlFlowError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
