use crate::artifact::ENCRYPTED_DATA_OPEN;

/// Reads the envelope JSON back out of a built artifact.
///
/// Returns `None` for plaintext artifacts and for documents that were not
/// produced by [`build`](crate::build).
pub fn extract_envelope(html: &str) -> Option<String> {
    let start = html.find(ENCRYPTED_DATA_OPEN)? + ENCRYPTED_DATA_OPEN.len();
    let len = html[start..].find("</div>")?;
    let envelope = html_escape::decode_html_entities(&html[start..start + len]);
    let envelope = envelope.trim();
    (!envelope.is_empty()).then(|| envelope.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentContent, TemplateDescriptor, build};
    use sharenote_crypto::{DecryptionKey, SharePayload, open, seal};

    fn descriptor(content: DocumentContent) -> TemplateDescriptor {
        TemplateDescriptor {
            id: "doc".to_owned(),
            title: "Doc".to_owned(),
            description: String::new(),
            width: String::new(),
            elements: Vec::new(),
            content,
            math: false,
            theme_css: None,
        }
    }

    #[test]
    fn plain_artifact_has_no_envelope() {
        let html = build(&descriptor(DocumentContent::Plain("<p>x</p>".to_owned()))).unwrap();
        assert_eq!(extract_envelope(&html), None);
        assert_eq!(extract_envelope("<html></html>"), None);
    }

    #[test]
    fn envelope_survives_the_artifact() {
        let key = DecryptionKey::generate();
        let payload = SharePayload {
            content: "<p>secret &amp; <b>bold</b></p>".to_owned(),
            basename: "Secret".to_owned(),
        };
        let envelope = seal(&payload, &key, None, 16).unwrap();
        let html = build(&descriptor(DocumentContent::Encrypted(envelope.clone()))).unwrap();

        let extracted = extract_envelope(&html).unwrap();
        assert_eq!(extracted, envelope);
        assert_eq!(open(&extracted, &key).unwrap(), payload);
        assert!(!html.contains("<b>bold</b>"));
    }
}
