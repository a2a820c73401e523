//! Resolution passes and the compiler driver for slate graphs.
//!
//! Provides a [`Pass`] trait, the name/type/return-type resolution passes,
//! matmul support-definition synthesis, entry-point collection, and the
//! fixed-point [`Compiler`] driver that ties them together.

mod compiler;
mod entry;
mod infer;
mod names;
mod support;
mod typeres;
pub mod visit;

pub use compiler::{Compilation, Compiler, Options};
pub use entry::EntryPoint;
pub use infer::ReturnTypeInference;
pub use names::NameResolution;
pub use support::{SupportDefinition, SupportDefinitions};
pub use typeres::TypeResolution;

use std::fmt::Debug;

use slate_ir::{Diagnostics, Graph, NodeId};

/// A resolution pass over a module graph.
pub trait Pass: Debug {
    /// Human-readable name of the pass.
    fn name(&self) -> &str;

    /// Runs the pass on the graph rooted at `root`. Returns `true` if any
    /// cache was filled or node created.
    fn run(&self, graph: &mut Graph, root: NodeId, diags: &mut Diagnostics) -> bool;
}

/// Maximum number of fixed-point iterations before giving up.
pub const MAX_ITERATIONS: usize = 10;
