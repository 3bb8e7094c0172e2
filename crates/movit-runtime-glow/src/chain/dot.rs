//! Graphviz dumps of the graph between finalize steps.

use movit_core::DebugLevel;

use super::EffectChain;
use crate::init::debug_level;

impl EffectChain {
    /// Emit the graph as a debug event and, at `DebugLevel::Debug`, write it
    /// to `<step>.dot` in the working directory.
    pub(crate) fn output_dot(&self, step: &str) {
        let write_file = debug_level() == DebugLevel::Debug;
        if !write_file && !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let dot = self.to_dot();
        tracing::debug!(step, %dot, "finalize step");
        if write_file {
            let path = format!("{step}.dot");
            if let Err(e) = std::fs::write(&path, dot) {
                tracing::warn!(%path, error = %e, "could not write graph dump");
            }
        }
    }

    /// The enabled graph with every node's effect and, on each edge, the
    /// sender's colour space, gamma curve and alpha type.
    pub fn to_dot(&self) -> String {
        self.graph.to_dot(
            |id, node| {
                let name = node
                    .effect
                    .as_ref()
                    .map_or("(rewriting)", |e| e.effect_type_id());
                match node.containing_phase {
                    Some(p) => format!("{name} ({id}), phase {p}"),
                    None => format!("{name} ({id})"),
                }
            },
            |_, _, sender| {
                format!(
                    "{}, {}, {}",
                    sender.output_color_space.name(),
                    sender.output_gamma_curve.name(),
                    sender.output_alpha_type.name()
                )
            },
        )
    }
}
