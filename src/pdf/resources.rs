use lopdf::{Dictionary, Document, Object, ObjectId};

/// Look up an inheritable page attribute (`MediaBox`, `Resources`, `Rotate`, ...).
///
/// Walks the `Parent` chain of the page tree until the key is found.
/// References are resolved for the returned value only at the top level.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // The depth bound guards against cyclic Parent links in damaged files.
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// The page's media box as `[llx, lly, urx, ury]`.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], String> {
    let value = inherited_attribute(doc, page_id, b"MediaBox")
        .ok_or_else(|| "page has no MediaBox".to_string())?;
    let array = match value {
        Object::Reference(id) => doc
            .get_object(id)
            .and_then(Object::as_array)
            .map_err(|e| format!("invalid MediaBox: {}", e))?
            .clone(),
        other => other
            .as_array()
            .map_err(|e| format!("invalid MediaBox: {}", e))?
            .clone(),
    };
    if array.len() != 4 {
        return Err(format!("MediaBox has {} entries, expected 4", array.len()));
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(&array) {
        *slot = value
            .as_float()
            .map_err(|e| format!("invalid MediaBox entry: {}", e))? as f64;
    }
    Ok(rect)
}

/// The page's resources, either a reference or an inline dictionary.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Object {
    inherited_attribute(doc, page_id, b"Resources")
        .unwrap_or_else(|| Object::Dictionary(Dictionary::new()))
}

/// Resources of the canvas page: the template form plus the overlay fonts.
pub fn canvas_resources(
    template_name: &str,
    template_form: ObjectId,
    fonts: &[(&str, ObjectId)],
) -> Dictionary {
    let mut xobjects = Dictionary::new();
    xobjects.set(template_name, Object::Reference(template_form));

    let mut font_resources = Dictionary::new();
    for (name, font_id) in fonts {
        font_resources.set(*name, Object::Reference(*font_id));
    }

    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));
    resources.set("Font", Object::Dictionary(font_resources));
    resources.set(
        "ProcSet",
        vec![Object::from("PDF"), Object::from("Text")],
    );
    resources
}
