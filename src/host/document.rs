//! In-memory reference host
//!
//! A minimal document/layer tree implementing [`HostAdapter`]. It backs the
//! interactive binary and the test suites; a production build would bind
//! these same capabilities to the editor's plugin API instead.

use crate::core::types::{Bounds, LayerKind, NodeId};
use crate::host::{
    DocumentInfo, HostAdapter, HostFault, HostResult, LayerInfo, SerializedNode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    id: NodeId,
    name: String,
    kind: LayerKind,
    visible: bool,
    opacity: u8,
    x: i32,
    y: i32,
    rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Document {
    name: String,
    width: u32,
    height: u32,
    color_model: String,
    layers: Vec<Layer>,
    active: Option<String>,
    selection: Option<Bounds>,
}

/// In-memory host with a single optional open document
#[derive(Debug)]
pub struct MemoryHost {
    document: Option<Document>,
    next_id: u64,
    refresh_count: u64,
}

impl MemoryHost {
    /// Host with no open document
    pub fn empty() -> Self {
        Self {
            document: None,
            next_id: 1,
            refresh_count: 0,
        }
    }

    /// Host with a fresh document and no layers
    pub fn with_document(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            document: Some(Document {
                name: name.into(),
                width,
                height,
                color_model: "RGBA".into(),
                layers: Vec::new(),
                active: None,
                selection: None,
            }),
            next_id: 1,
            refresh_count: 0,
        }
    }

    /// Structural digest of the full document state
    ///
    /// Two hosts with identical trees produce identical digests; used to
    /// verify rollback atomicity.
    pub fn digest(&self) -> String {
        match &self.document {
            Some(doc) => {
                // Ids are allocation-order artifacts, not structure; strip
                // them so a rolled-back tree digests equal to the original.
                let stripped: Vec<_> = doc
                    .layers
                    .iter()
                    .map(|l| {
                        (
                            l.name.clone(),
                            l.kind,
                            l.visible,
                            l.opacity,
                            l.x,
                            l.y,
                            l.rotation.to_bits(),
                        )
                    })
                    .collect();
                serde_json::to_string(&(
                    &doc.name,
                    doc.width,
                    doc.height,
                    &doc.color_model,
                    stripped,
                    &doc.active,
                    &doc.selection,
                ))
                .unwrap_or_default()
            }
            None => "no-document".into(),
        }
    }

    /// How many times the projection has been refreshed
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    fn doc(&self) -> HostResult<&Document> {
        self.document.as_ref().ok_or(HostFault::NoDocument)
    }

    fn doc_mut(&mut self) -> HostResult<&mut Document> {
        self.document.as_mut().ok_or(HostFault::NoDocument)
    }

    fn layer(&self, name: &str) -> HostResult<&Layer> {
        self.doc()?
            .layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| HostFault::LayerNotFound(name.into()))
    }

    fn layer_mut(&mut self, name: &str) -> HostResult<&mut Layer> {
        self.doc_mut()?
            .layers
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| HostFault::LayerNotFound(name.into()))
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl HostAdapter for MemoryHost {
    fn has_document(&self) -> bool {
        self.document.is_some()
    }

    fn document_info(&self) -> HostResult<DocumentInfo> {
        let doc = self.doc()?;
        Ok(DocumentInfo {
            name: doc.name.clone(),
            width: doc.width,
            height: doc.height,
            color_model: doc.color_model.clone(),
        })
    }

    fn layers(&self) -> HostResult<Vec<LayerInfo>> {
        let doc = self.doc()?;
        Ok(doc
            .layers
            .iter()
            .map(|l| LayerInfo {
                id: l.id,
                name: l.name.clone(),
                kind: l.kind,
                visible: l.visible,
                opacity: l.opacity,
                x: l.x,
                y: l.y,
                rotation: l.rotation,
                bounds: Bounds::new(l.x, l.y, doc.width as i32, doc.height as i32),
                parent: None,
            })
            .collect())
    }

    fn active_layer(&self) -> HostResult<Option<String>> {
        Ok(self.doc()?.active.clone())
    }

    fn selection(&self) -> HostResult<Option<Bounds>> {
        Ok(self.doc()?.selection)
    }

    fn opacity(&self, name: &str) -> HostResult<u8> {
        Ok(self.layer(name)?.opacity)
    }

    fn visible(&self, name: &str) -> HostResult<bool> {
        Ok(self.layer(name)?.visible)
    }

    fn position(&self, name: &str) -> HostResult<(i32, i32)> {
        let layer = self.layer(name)?;
        Ok((layer.x, layer.y))
    }

    fn rotation(&self, name: &str) -> HostResult<f64> {
        Ok(self.layer(name)?.rotation)
    }

    fn create_layer(&mut self, name: &str, kind: LayerKind) -> HostResult<NodeId> {
        if name.is_empty() {
            return Err(HostFault::InvalidArgument("layer name is empty".into()));
        }
        if self.doc()?.layers.iter().any(|l| l.name == name) {
            return Err(HostFault::DuplicateLayer(name.into()));
        }
        let id = self.alloc_id();
        let doc = self.doc_mut()?;
        doc.layers.push(Layer {
            id,
            name: name.into(),
            kind,
            visible: true,
            opacity: 255,
            x: 0,
            y: 0,
            rotation: 0.0,
        });
        Ok(id)
    }

    fn remove_layer(&mut self, name: &str) -> HostResult<SerializedNode> {
        let doc = self.doc_mut()?;
        let index = doc
            .layers
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| HostFault::LayerNotFound(name.into()))?;
        let layer = doc.layers.remove(index);
        let active = doc.active.as_deref() == Some(name);
        if active {
            doc.active = None;
        }
        Ok(SerializedNode {
            id: layer.id,
            name: layer.name,
            kind: layer.kind,
            visible: layer.visible,
            opacity: layer.opacity,
            x: layer.x,
            y: layer.y,
            rotation: layer.rotation,
            index,
            active,
        })
    }

    fn remove_node(&mut self, id: NodeId) -> HostResult<()> {
        let doc = self.doc_mut()?;
        let index = doc
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(HostFault::NodeNotFound(id))?;
        let removed = doc.layers.remove(index);
        if doc.active.as_deref() == Some(removed.name.as_str()) {
            doc.active = None;
        }
        Ok(())
    }

    fn restore_layer(&mut self, node: &SerializedNode) -> HostResult<NodeId> {
        let doc = self.doc()?;
        if doc.layers.iter().any(|l| l.name == node.name) {
            return Err(HostFault::DuplicateLayer(node.name.clone()));
        }
        if doc.layers.iter().any(|l| l.id == node.id) {
            return Err(HostFault::InvalidArgument(format!(
                "node id {:?} is already in use",
                node.id
            )));
        }
        let doc = self.doc_mut()?;
        let index = node.index.min(doc.layers.len());
        doc.layers.insert(
            index,
            Layer {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind,
                visible: node.visible,
                opacity: node.opacity,
                x: node.x,
                y: node.y,
                rotation: node.rotation,
            },
        );
        if node.active {
            doc.active = Some(node.name.clone());
        }
        Ok(node.id)
    }

    fn rename_layer(&mut self, name: &str, new_name: &str) -> HostResult<()> {
        if new_name.is_empty() {
            return Err(HostFault::InvalidArgument("layer name is empty".into()));
        }
        if name != new_name && self.doc()?.layers.iter().any(|l| l.name == new_name) {
            return Err(HostFault::DuplicateLayer(new_name.into()));
        }
        let was_active = self.doc()?.active.as_deref() == Some(name);
        self.layer_mut(name)?.name = new_name.into();
        if was_active {
            self.doc_mut()?.active = Some(new_name.into());
        }
        Ok(())
    }

    fn set_opacity(&mut self, name: &str, opacity: u8) -> HostResult<()> {
        self.layer_mut(name)?.opacity = opacity;
        Ok(())
    }

    fn set_visible(&mut self, name: &str, visible: bool) -> HostResult<()> {
        self.layer_mut(name)?.visible = visible;
        Ok(())
    }

    fn set_position(&mut self, name: &str, x: i32, y: i32) -> HostResult<()> {
        let layer = self.layer_mut(name)?;
        layer.x = x;
        layer.y = y;
        Ok(())
    }

    fn set_rotation(&mut self, name: &str, radians: f64) -> HostResult<()> {
        self.layer_mut(name)?.rotation = radians;
        Ok(())
    }

    fn set_active_layer(&mut self, name: Option<&str>) -> HostResult<()> {
        if let Some(name) = name {
            self.layer(name)?;
        }
        self.doc_mut()?.active = name.map(|n| n.to_string());
        Ok(())
    }

    fn set_selection(&mut self, bounds: Option<Bounds>) -> HostResult<()> {
        if let Some(b) = bounds {
            if b.width <= 0 || b.height <= 0 {
                return Err(HostFault::InvalidArgument(
                    "selection must have positive width and height".into(),
                ));
            }
        }
        self.doc_mut()?.selection = bounds;
        Ok(())
    }

    fn refresh_projection(&mut self) -> HostResult<()> {
        self.doc()?;
        self.refresh_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_host_has_no_document() {
        let host = MemoryHost::empty();
        assert!(!host.has_document());
        assert_eq!(host.document_info(), Err(HostFault::NoDocument));
        assert_eq!(host.digest(), "no-document");
    }

    #[test]
    fn test_create_and_remove_layer() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        let id = host.create_layer("Background", LayerKind::Paint).unwrap();
        assert_eq!(host.layers().unwrap().len(), 1);

        let node = host.remove_layer("Background").unwrap();
        assert_eq!(node.index, 0);
        assert!(host.layers().unwrap().is_empty());

        assert_eq!(host.remove_node(id), Err(HostFault::NodeNotFound(id)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        host.create_layer("Sketch", LayerKind::Paint).unwrap();
        assert_eq!(
            host.create_layer("Sketch", LayerKind::Paint),
            Err(HostFault::DuplicateLayer("Sketch".into()))
        );
    }

    #[test]
    fn test_restore_preserves_order() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        host.create_layer("A", LayerKind::Paint).unwrap();
        host.create_layer("B", LayerKind::Paint).unwrap();
        host.create_layer("C", LayerKind::Paint).unwrap();

        let node = host.remove_layer("B").unwrap();
        host.restore_layer(&node).unwrap();

        let names: Vec<_> = host.layers().unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_digest_ignores_node_ids() {
        let mut a = MemoryHost::with_document("untitled", 800, 600);
        a.create_layer("X", LayerKind::Paint).unwrap();

        let mut b = MemoryHost::with_document("untitled", 800, 600);
        b.create_layer("scratch", LayerKind::Paint).unwrap();
        b.remove_layer("scratch").unwrap();
        b.create_layer("X", LayerKind::Paint).unwrap();

        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_restore_reuses_id_and_active_state() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        let id = host.create_layer("A", LayerKind::Paint).unwrap();
        host.set_active_layer(Some("A")).unwrap();

        let node = host.remove_layer("A").unwrap();
        assert!(node.active);
        assert_eq!(host.active_layer().unwrap(), None);

        let restored = host.restore_layer(&node).unwrap();
        assert_eq!(restored, id);
        assert_eq!(host.active_layer().unwrap(), Some("A".into()));
        // The original id still addresses the restored node
        host.remove_node(id).unwrap();
    }

    #[test]
    fn test_rename_tracks_active_layer() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        host.create_layer("Old", LayerKind::Paint).unwrap();
        host.set_active_layer(Some("Old")).unwrap();
        host.rename_layer("Old", "New").unwrap();
        assert_eq!(host.active_layer().unwrap(), Some("New".into()));
    }

    #[test]
    fn test_removing_active_layer_clears_active() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        host.create_layer("L", LayerKind::Paint).unwrap();
        host.set_active_layer(Some("L")).unwrap();
        host.remove_layer("L").unwrap();
        assert_eq!(host.active_layer().unwrap(), None);
    }

    #[test]
    fn test_selection_validation() {
        let mut host = MemoryHost::with_document("untitled", 800, 600);
        assert!(host
            .set_selection(Some(Bounds::new(0, 0, 0, 10)))
            .is_err());
        host.set_selection(Some(Bounds::new(10, 10, 100, 50))).unwrap();
        assert_eq!(
            host.selection().unwrap(),
            Some(Bounds::new(10, 10, 100, 50))
        );
    }

    #[test]
    fn test_refresh_requires_document() {
        let mut host = MemoryHost::empty();
        assert_eq!(host.refresh_projection(), Err(HostFault::NoDocument));
    }
}
