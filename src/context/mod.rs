//! Gather document context for generation prompts
//!
//! Builds a snapshot of the host document state so the generation service
//! understands what it is operating on. The snapshot is informational
//! context for the generator only; it is never execution-time ground truth.

use crate::core::types::Bounds;
use crate::host::HostAdapter;
use serde::{Deserialize, Serialize};

/// Immutable description of the host state at a single point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Whether a document is open; a first-class state, not an error
    pub has_document: bool,
    pub document: Option<DocumentSummary>,
    /// Ordered layer descriptors, bottom to top
    pub layers: Vec<LayerDescriptor>,
    pub active_layer: Option<String>,
    pub selection: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub color_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: String,
    pub kind: String,
    pub visible: bool,
    pub opacity: u8,
    pub bounds: Bounds,
    pub parent: Option<String>,
}

impl ContextSnapshot {
    /// Capture the current host state
    ///
    /// Never fails: if no document is open (or any read faults), the
    /// snapshot reports the explicit no-document state.
    pub fn capture(host: &dyn HostAdapter) -> Self {
        if !host.has_document() {
            return Self::no_document();
        }

        let document = match host.document_info() {
            Ok(info) => Some(DocumentSummary {
                name: info.name,
                width: info.width,
                height: info.height,
                color_model: info.color_model,
            }),
            Err(_) => return Self::no_document(),
        };

        let layers = host
            .layers()
            .unwrap_or_default()
            .into_iter()
            .map(|l| LayerDescriptor {
                name: l.name,
                kind: l.kind.as_str().into(),
                visible: l.visible,
                opacity: l.opacity,
                bounds: l.bounds,
                parent: l.parent,
            })
            .collect();

        Self {
            has_document: true,
            document,
            layers,
            active_layer: host.active_layer().ok().flatten(),
            selection: host.selection().ok().flatten(),
        }
    }

    /// The explicit no-document state
    pub fn no_document() -> Self {
        Self {
            has_document: false,
            document: None,
            layers: Vec::new(),
            active_layer: None,
            selection: None,
        }
    }

    /// Generate a text summary of the snapshot for generation prompts
    pub fn summary(&self) -> String {
        let mut s = String::new();

        match &self.document {
            Some(doc) => {
                s.push_str(&format!(
                    "Document: {} ({}x{}, {})\n",
                    doc.name, doc.width, doc.height, doc.color_model
                ));

                if self.layers.is_empty() {
                    s.push_str("Layers: none\n");
                } else {
                    s.push_str("Layers (bottom to top):\n");
                    for layer in &self.layers {
                        s.push_str(&format!(
                            "- '{}' ({}, {}, opacity {})\n",
                            layer.name,
                            layer.kind,
                            if layer.visible { "visible" } else { "hidden" },
                            layer.opacity
                        ));
                    }
                }

                if let Some(active) = &self.active_layer {
                    s.push_str(&format!("Active layer: '{}'\n", active));
                }

                if let Some(sel) = &self.selection {
                    s.push_str(&format!(
                        "Selection: {}x{} at ({}, {})\n",
                        sel.width, sel.height, sel.x, sel.y
                    ));
                }
            }
            None => {
                s.push_str("No document is currently open.\n");
            }
        }

        s
    }
}
