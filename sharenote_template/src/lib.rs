//! Static HTML artifact for a shared note.
//!
//! [`build`] turns a [`TemplateDescriptor`] into a self-contained page. The
//! page carries its content inline (plaintext) or as an envelope that the
//! embedded bootstrap decrypts in the browser with the key from the URL
//! fragment. Captured [`ElementStyle`]s are re-applied on load so the page
//! looks like the note did in the editor.

mod artifact;
mod inspect;
mod style;

pub use artifact::{DEFAULT_WIDTH, DocumentContent, TemplateDescriptor, TemplateError, build};
pub use inspect::extract_envelope;
pub use style::{
    ElementStyle, PUSHER_CLASS, StyleSource, capture_element_style, remove_style_property,
};
