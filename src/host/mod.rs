//! Host adapter boundary
//!
//! The pipeline never talks to the editor's object model directly; every
//! capability it needs is expressed on [`HostAdapter`]. Each call is
//! synchronous and either succeeds or raises a [`HostFault`], which the
//! executor treats uniformly as an execution fault triggering rollback.

pub mod document;

use crate::core::types::{Bounds, LayerKind, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fault raised by a host capability call
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostFault {
    #[error("no document is open")]
    NoDocument,

    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("a layer named '{0}' already exists")]
    DuplicateLayer(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("host call failed: {0}")]
    CallFailed(String),
}

pub type HostResult<T> = std::result::Result<T, HostFault>;

/// Summary of the open document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub color_model: String,
}

/// One layer as reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    /// 0-255, matching the host convention (not a percentage)
    pub opacity: u8,
    pub x: i32,
    pub y: i32,
    /// Radians
    pub rotation: f64,
    pub bounds: Bounds,
    pub parent: Option<String>,
}

/// Full serialized form of a removed layer, sufficient for re-insertion
/// at its original position in the sibling order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    /// Original node id; restoration reuses it so earlier reversal tokens
    /// that reference this node stay valid
    pub id: NodeId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: u8,
    pub x: i32,
    pub y: i32,
    pub rotation: f64,
    /// Index within the root's children at removal time
    pub index: usize,
    /// Whether this was the active layer at removal time
    pub active: bool,
}

/// Capability surface the scoped executor is bound to
///
/// Read calls are used by the snapshot builder and by the executor to
/// capture reversal tokens; write calls are the only way the pipeline can
/// mutate the document.
pub trait HostAdapter: Send {
    // --- reads ---
    fn has_document(&self) -> bool;
    fn document_info(&self) -> HostResult<DocumentInfo>;
    fn layers(&self) -> HostResult<Vec<LayerInfo>>;
    fn active_layer(&self) -> HostResult<Option<String>>;
    fn selection(&self) -> HostResult<Option<Bounds>>;
    fn opacity(&self, name: &str) -> HostResult<u8>;
    fn visible(&self, name: &str) -> HostResult<bool>;
    fn position(&self, name: &str) -> HostResult<(i32, i32)>;
    fn rotation(&self, name: &str) -> HostResult<f64>;

    // --- writes ---
    fn create_layer(&mut self, name: &str, kind: LayerKind) -> HostResult<NodeId>;
    fn remove_layer(&mut self, name: &str) -> HostResult<SerializedNode>;
    fn remove_node(&mut self, id: NodeId) -> HostResult<()>;
    fn restore_layer(&mut self, node: &SerializedNode) -> HostResult<NodeId>;
    fn rename_layer(&mut self, name: &str, new_name: &str) -> HostResult<()>;
    fn set_opacity(&mut self, name: &str, opacity: u8) -> HostResult<()>;
    fn set_visible(&mut self, name: &str, visible: bool) -> HostResult<()>;
    fn set_position(&mut self, name: &str, x: i32, y: i32) -> HostResult<()>;
    fn set_rotation(&mut self, name: &str, radians: f64) -> HostResult<()>;
    fn set_active_layer(&mut self, name: Option<&str>) -> HostResult<()>;
    fn set_selection(&mut self, bounds: Option<Bounds>) -> HostResult<()>;

    /// Recomposite the visible document; invoked exactly once per script
    fn refresh_projection(&mut self) -> HostResult<()>;
}
