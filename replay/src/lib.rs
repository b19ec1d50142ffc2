pub use replay_core::{
    allocator, api, codec, command, controlflow, data, error, graph, interval, layout, opcode,
    pool, pools, range, snapshot, state, view, Hex,
};

pub mod memory {
    pub use replay_core::data::*;
    pub use replay_core::pool::*;
    pub use replay_core::pools::*;
    pub use replay_core::range::Range;
}

pub mod prelude {
    pub use replay_core::prelude::*;
}

pub mod store {
    pub use replay_core::store::*;

    #[cfg(feature = "sqlite")]
    pub use replay_sqlite as sqlite;
}

pub mod transform {
    pub use replay_core::transform::*;

    #[cfg(feature = "transforms")]
    pub use replay_logger as logger;
}
