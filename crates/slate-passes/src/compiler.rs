//! The compiler driver: fixed-point resolution plus post-convergence
//! collection.

use log::debug;

use slate_ir::{Diagnostics, Graph, NodeId};

use crate::entry::{collect_entry_points, EntryPoint};
use crate::support::{collect_support, SupportDefinitions};
use crate::visit::postorder;
use crate::{NameResolution, Pass, ReturnTypeInference, TypeResolution, MAX_ITERATIONS};

/// Compilation options.
///
/// `standalone` and `struct_annotations` are carried for downstream
/// emitters; only `auto_entry_points` changes what the driver itself does.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    /// Emit a self-contained program rather than a linkable fragment.
    pub standalone: bool,
    /// Annotate emitted struct fields with their computed offsets.
    pub struct_annotations: bool,
    /// Wrap the last declared function in a synthesized `main` when no
    /// function carries a stage tag.
    pub auto_entry_points: bool,
}

/// Everything a compilation produces besides the mutated graph itself.
#[derive(Debug)]
pub struct Compilation {
    pub diagnostics: Diagnostics,
    pub support_definitions: SupportDefinitions,
    pub entry_points: Vec<EntryPoint>,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Runs the resolution passes to a fixed point, then collects support
/// definitions and entry points.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compiler {
    pub options: Options,
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Compiles the module rooted at `root` in place.
    ///
    /// Never fails: unresolvable programs come back with error diagnostics
    /// and `None` in the affected `resolved_type` caches.
    pub fn compile(&self, graph: &mut Graph, root: NodeId) -> Compilation {
        let passes: [&dyn Pass; 3] = [&NameResolution, &TypeResolution, &ReturnTypeInference];
        let mut diags = Diagnostics::new();
        let converged = run_to_fixed_point(&passes, graph, root, &mut diags);
        if !converged {
            diags.error(
                None,
                format!("resolution did not converge after {MAX_ITERATIONS} iterations"),
            );
        }

        // Whatever is still untyped after convergence stays that way; report
        // each unresolved type node once.
        for node in postorder(graph, root) {
            if graph.nodes[node].is_type() && graph.nodes[node].resolved_type.is_none() {
                diags.error(
                    Some(node),
                    format!("type '{}' could not be resolved", graph.type_name(node)),
                );
            }
        }

        let support_definitions = collect_support(graph, root);
        // Synthesized bodies are pre-bound but not yet typed.
        let helpers: Vec<NodeId> = support_definitions.iter().map(|d| d.function).collect();
        for helper in helpers {
            for _ in 0..MAX_ITERATIONS {
                if !TypeResolution.run(graph, helper, &mut diags) {
                    break;
                }
            }
        }

        let entry_points =
            collect_entry_points(graph, root, self.options.auto_entry_points, &mut diags);

        Compilation {
            diagnostics: diags,
            support_definitions,
            entry_points,
        }
    }
}

/// Repeats the pass pipeline until no pass reports a change. Diagnostics
/// are cleared at the top of each iteration, so only the final iteration's
/// messages survive. Returns `false` if the iteration cap was hit first.
fn run_to_fixed_point(
    passes: &[&dyn Pass],
    graph: &mut Graph,
    root: NodeId,
    diags: &mut Diagnostics,
) -> bool {
    for iteration in 0..MAX_ITERATIONS {
        diags.clear();
        let mut changed = false;
        for pass in passes {
            let pass_changed = pass.run(graph, root, diags);
            debug!(
                "iteration {iteration}: {} changed={pass_changed}",
                pass.name()
            );
            changed |= pass_changed;
        }
        if !changed {
            return true;
        }
    }
    false
}
