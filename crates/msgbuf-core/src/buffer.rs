//! Ordered element buffer with builder-style append operations.
//!
//! Insertion order is the eventual send order. The buffer is mutated only by
//! appending (single or batch) and by popping from the tail (`revert`); it is
//! owned by one orchestrator and never shared across concurrent sends.

use serde_json::Value;

use crate::element::{Element, FileSource};
use crate::error::{ElementError, SendError, SendResult};

/// An ordered, append-only-plus-revert sequence of [`Element`]s.
#[derive(Debug, Clone, Default)]
pub struct ElementBuffer {
    elements: Vec<Element>,
}

impl ElementBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The buffered elements in send order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Returns a snapshot copy of the buffered elements.
    pub fn snapshot(&self) -> Vec<Element> {
        self.elements.clone()
    }

    /// Removes all buffered elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Appends one element.
    pub fn push(&mut self, element: Element) -> &mut Self {
        self.elements.push(element);
        self
    }

    /// Appends a batch of elements, preserving their order.
    pub fn extend(&mut self, elements: impl IntoIterator<Item = Element>) -> &mut Self {
        self.elements.extend(elements);
        self
    }

    /// Removes the last `n` elements.
    ///
    /// Fails with [`SendError::Underflow`] (removing nothing) if `n` exceeds
    /// the current length.
    pub fn revert(&mut self, n: usize) -> SendResult<&mut Self> {
        if n > self.elements.len() {
            return Err(SendError::Underflow {
                requested: n,
                available: self.elements.len(),
            });
        }
        self.elements.truncate(self.elements.len() - n);
        Ok(self)
    }

    // --------------------------------
    // Builder-style append shorthands
    // --------------------------------

    /// Appends plain text.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Element::text(text))
    }

    /// Appends an image.
    pub fn image(&mut self, source: impl Into<FileSource>) -> &mut Self {
        self.push(Element::image(source))
    }

    /// Appends a mention of a user id.
    pub fn mention(&mut self, target: impl Into<String>) -> &mut Self {
        self.push(Element::mention(target))
    }

    /// Appends a mention within a domain (e.g. a channel mention).
    pub fn mention_in(
        &mut self,
        target: impl Into<String>,
        domain: impl Into<String>,
    ) -> &mut Self {
        self.push(Element::mention_in(target, domain))
    }

    /// Appends a mention of everyone.
    pub fn mention_all(&mut self) -> &mut Self {
        self.push(Element::mention_all())
    }

    /// Appends a reply reference.
    pub fn reply(&mut self, message_id: impl Into<String>) -> &mut Self {
        self.push(Element::reply(message_id))
    }

    /// Appends a sticker.
    pub fn face(&mut self, face_id: impl Into<String>) -> &mut Self {
        self.push(Element::face(face_id))
    }

    /// Appends a voice recording.
    pub fn voice(&mut self, source: impl Into<FileSource>) -> &mut Self {
        self.push(Element::voice(source))
    }

    /// Appends a video.
    pub fn video(&mut self, source: impl Into<FileSource>) -> &mut Self {
        self.push(Element::video(source))
    }

    /// Appends a file with an explicit display name.
    pub fn file(&mut self, source: impl Into<FileSource>, name: impl Into<String>) -> &mut Self {
        self.push(Element::file(source, name))
    }

    /// Appends a file, deriving its display name from the reference.
    pub fn try_file(
        &mut self,
        source: impl Into<FileSource>,
    ) -> Result<&mut Self, ElementError> {
        let element = Element::file_auto(source)?;
        Ok(self.push(element))
    }

    /// Appends a link share card.
    pub fn share(
        &mut self,
        url: impl Into<String>,
        title: impl Into<String>,
        content: Option<String>,
        image: Option<String>,
    ) -> &mut Self {
        self.push(Element::share(url, title, content, image))
    }

    /// Appends a geolocation.
    pub fn location(
        &mut self,
        latitude: f64,
        longitude: f64,
        title: Option<String>,
        content: Option<String>,
    ) -> &mut Self {
        self.push(Element::location(latitude, longitude, title, content))
    }

    /// Appends a raw string passthrough.
    pub fn raw(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Element::raw(text))
    }

    /// Appends a raw platform-native passthrough.
    pub fn raw_native(&mut self, payload: Value) -> &mut Self {
        self.push(Element::raw_native(payload))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_extend_preserve_order() {
        let mut buf = ElementBuffer::new();
        buf.text("a").mention("42");
        buf.extend([Element::text("b"), Element::face("5")]);

        let kinds: Vec<_> = buf.elements().iter().map(Element::kind).collect();
        assert_eq!(buf.len(), 4);
        assert_eq!(
            kinds,
            vec![
                crate::element::ElementKind::Text,
                crate::element::ElementKind::Mention,
                crate::element::ElementKind::Text,
                crate::element::ElementKind::Face,
            ]
        );
    }

    #[test]
    fn test_append_then_revert_is_identity() {
        let mut buf = ElementBuffer::new();
        buf.text("keep");
        let before = buf.snapshot();

        buf.push(Element::text("dropped"));
        buf.revert(1).unwrap();

        assert_eq!(buf.snapshot(), before);
    }

    #[test]
    fn test_revert_underflow_leaves_buffer_unchanged() {
        let mut buf = ElementBuffer::new();
        buf.text("a").text("b");

        let err = buf.revert(3).unwrap_err();
        assert!(matches!(
            err,
            SendError::Underflow {
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_revert_many() {
        let mut buf = ElementBuffer::new();
        buf.text("a").text("b").text("c");
        buf.revert(2).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.elements()[0], Element::text("a"));
    }

    #[test]
    fn test_try_file_derivation() {
        let mut buf = ElementBuffer::new();
        buf.try_file(FileSource::path("/tmp/doc.pdf")).unwrap();
        assert!(matches!(
            &buf.elements()[0],
            Element::File { name, .. } if name == "doc.pdf"
        ));

        assert!(buf.try_file(FileSource::bytes(vec![1])).is_err());
        assert_eq!(buf.len(), 1);
    }
}
