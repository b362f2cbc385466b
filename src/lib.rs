#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,

    clippy::all,
    clippy::pedantic,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

pub mod error;
pub mod io;
pub mod vector;
pub mod algebra;
pub mod codec;
pub mod container;
pub mod store;
pub mod sampler;
pub mod passes;
pub mod progress;

/// Re-exports of the types needed to open a store, look up pages, and run
/// the processing passes without reaching into every submodule.
pub mod prelude {
    pub use crate::algebra::{Face, PageIndex};
    pub use crate::error::{Error, Result};
    pub use crate::progress::{Context, NullProgress, Progress};
    pub use crate::sampler::ImageSource;
    pub use crate::store::{Catalog, Store};
}
