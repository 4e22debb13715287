pub mod arena;
pub use arena::Arena;

pub mod stream;
pub use stream::Stream;
