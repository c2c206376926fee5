//! Payloads attached to indexed vectors.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A sentence or chunk of a document, located on its page so a hit can be
/// scrolled to and highlighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// Zero-based page index
    pub page: u32,
    pub bounds: Rect,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, page: u32, bounds: Rect) -> Self {
        Self {
            text: text.into(),
            page,
            bounds,
        }
    }
}

/// Payloads that can be turned into an embedding.
pub trait Embeddable {
    /// Text handed to the embedding model.
    fn embedding_text(&self) -> &str;
}

impl Embeddable for TextSpan {
    fn embedding_text(&self) -> &str {
        &self.text
    }
}

impl Embeddable for String {
    fn embedding_text(&self) -> &str {
        self
    }
}

impl Embeddable for &str {
    fn embedding_text(&self) -> &str {
        self
    }
}
