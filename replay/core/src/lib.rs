//! Core memory model and command pipeline for replaying captured graphics
//! command streams.
//!
//! Memory is modelled lazily. A [`Pool`](pool::Pool) records the writes made
//! to an unbounded address space instead of holding a flat image, and
//! [`Data`](data::Data) describes where written bytes come from: an in-memory
//! blob, a content-addressed resource, or a window over another pool. Typed
//! access goes through the `codec` and `view` modules under a target
//! [`MemoryLayout`](layout::MemoryLayout).
//!
//! Commands flow from a generator through a
//! [`TransformChain`](transform::TransformChain) of rewriting stages into a
//! [`Writer`](transform::Writer) that applies them to the
//! [`GlobalState`](state::GlobalState). The
//! [`ControlFlowGenerator`](controlflow::ControlFlowGenerator) drives the
//! chain, reports progress and turns stage failures into annotated errors.

pub mod allocator;
pub mod api;
pub mod codec;
pub mod command;
pub mod controlflow;
pub mod data;
pub mod error;
pub mod graph;
pub mod interval;
pub mod layout;
pub mod opcode;
pub mod pool;
pub mod pools;
pub mod range;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod transform;
pub mod view;

pub mod prelude {
    pub use super::allocator::{invert_memory_ranges, AllocError, BasicAllocator};

    pub use super::api::{Api, ApiId, ApiRegistry};

    pub use super::codec::{Decoder, Encoder, PrimitiveKind, StructType, Type, Value};

    pub use super::command::{Command, CommandBox, CommandError, CommandGenerator, LinearGenerator};

    pub use super::controlflow::{ControlFlowError, ControlFlowGenerator, StopSignal};

    pub use super::data::{Data, MemoryError};

    pub use super::error::ReplayError;

    pub use super::interval::U64RangeList;

    pub use super::layout::{Endian, MemoryLayout};

    pub use super::pool::{Pool, PoolId};

    pub use super::pools::{Pools, APPLICATION_POOL};

    pub use super::range::Range;

    pub use super::state::GlobalState;

    pub use super::store::{ContentId, ContentStore, MemoryStore, StoreError};

    pub use super::transform::{
        CommandRecorder, EarlyTerminator, Transform, TransformChain, TransformError,
        TransformFlags, TransformId, Writer,
    };
}

#[derive(Copy, Clone)]
pub struct Hex<T>(pub T);

impl std::fmt::Display for Hex<u64> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl std::fmt::Debug for Hex<u64> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for Hex<u8> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl std::fmt::Debug for Hex<u8> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl std::fmt::Display for Hex<&[u8]> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().copied().map(Hex))
            .finish()
    }
}
