//! Reversible mutation descriptors
//!
//! Every mutation the sanctioned surface can perform has a descriptor
//! capturing enough prior state to undo it. Generated scripts apply several
//! host operations that must reverse as one unit on failure, so the
//! executor keeps its own descriptor list instead of leaning on the host's
//! generic undo stack.

use crate::core::types::{Bounds, NodeId};
use crate::host::{HostAdapter, HostResult, SerializedNode};
use serde::{Deserialize, Serialize};

/// A record of one reversible change applied to the host document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationDescriptor {
    /// A node was created; reversal deletes it by id
    LayerCreated { id: NodeId, name: String },
    /// A node was removed; reversal re-inserts the serialized node
    LayerRemoved { node: SerializedNode },
    LayerRenamed { from: String, to: String },
    OpacityChanged { name: String, prior: u8 },
    VisibilityChanged { name: String, prior: bool },
    LayerMoved {
        name: String,
        prior_x: i32,
        prior_y: i32,
    },
    LayerRotated { name: String, prior: f64 },
    ActiveLayerChanged { prior: Option<String> },
    SelectionChanged { prior: Option<Bounds> },
}

impl MutationDescriptor {
    /// Undo this mutation using the captured prior state
    pub fn revert(&self, host: &mut dyn HostAdapter) -> HostResult<()> {
        match self {
            MutationDescriptor::LayerCreated { id, .. } => host.remove_node(*id),
            MutationDescriptor::LayerRemoved { node } => host.restore_layer(node).map(|_| ()),
            MutationDescriptor::LayerRenamed { from, to } => host.rename_layer(to, from),
            MutationDescriptor::OpacityChanged { name, prior } => {
                host.set_opacity(name, *prior)
            }
            MutationDescriptor::VisibilityChanged { name, prior } => {
                host.set_visible(name, *prior)
            }
            MutationDescriptor::LayerMoved {
                name,
                prior_x,
                prior_y,
            } => host.set_position(name, *prior_x, *prior_y),
            MutationDescriptor::LayerRotated { name, prior } => {
                host.set_rotation(name, *prior)
            }
            MutationDescriptor::ActiveLayerChanged { prior } => {
                host.set_active_layer(prior.as_deref())
            }
            MutationDescriptor::SelectionChanged { prior } => host.set_selection(*prior),
        }
    }

    /// Short human-readable description for logs and history display
    pub fn describe(&self) -> String {
        match self {
            MutationDescriptor::LayerCreated { name, .. } => {
                format!("created layer '{}'", name)
            }
            MutationDescriptor::LayerRemoved { node } => {
                format!("removed layer '{}'", node.name)
            }
            MutationDescriptor::LayerRenamed { from, to } => {
                format!("renamed layer '{}' to '{}'", from, to)
            }
            MutationDescriptor::OpacityChanged { name, .. } => {
                format!("changed opacity of '{}'", name)
            }
            MutationDescriptor::VisibilityChanged { name, .. } => {
                format!("changed visibility of '{}'", name)
            }
            MutationDescriptor::LayerMoved { name, .. } => format!("moved layer '{}'", name),
            MutationDescriptor::LayerRotated { name, .. } => {
                format!("rotated layer '{}'", name)
            }
            MutationDescriptor::ActiveLayerChanged { .. } => "changed active layer".into(),
            MutationDescriptor::SelectionChanged { .. } => "changed selection".into(),
        }
    }
}
