//! Shared value types used across the pipeline

use serde::{Deserialize, Serialize};

/// Identifier for a node in the host document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Kind of layer the host can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Paint,
    Group,
    Fill,
    Vector,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Paint => "paint",
            LayerKind::Group => "group",
            LayerKind::Fill => "fill",
            LayerKind::Vector => "vector",
        }
    }

    /// Parse a layer kind as it appears in script arguments
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paint" => Some(LayerKind::Paint),
            "group" => Some(LayerKind::Group),
            "fill" => Some(LayerKind::Fill),
            "vector" => Some(LayerKind::Vector),
            _ => None,
        }
    }
}

/// Rectangular bounds in document pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Current wall-clock time as unix milliseconds
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
