use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::config::{Layout, OverlaySpec};
use crate::draft::PrescriptionDraft;
use crate::error::GenerateError;
use super::content::{compress_data, ContentBuilder};
use super::fonts::{find_unicode_font, is_win_ansi, system_fonts, Helvetica, TextFont, UnicodeFont};
use super::resources::{canvas_resources, inherited_attribute, media_box, page_resources};

/// Resource name of the imported template page.
pub const TEMPLATE_XOBJECT: &str = "Tpl";

/// A system font embedded for one overlay's non-WinAnsi text.
struct Fallback {
    resource: String,
    font_id: ObjectId,
    font: UnicodeFont,
}

/// Fonts registered on the canvas page.
struct OverlayFonts {
    helvetica: ObjectId,
    /// Fallback per overlay, by overlay index.
    fallbacks: Vec<Option<Fallback>>,
}

impl OverlayFonts {
    /// Register Helvetica, and a system Unicode font for every overlay
    /// that needs one.
    fn prepare(doc: &mut Document, texts: &[&str]) -> Result<Self, GenerateError> {
        let helvetica = Helvetica::create(doc);
        let mut db = None;
        let mut fallbacks = Vec::with_capacity(texts.len());

        for text in texts {
            if is_win_ansi(text) {
                fallbacks.push(None);
                continue;
            }
            let db = db.get_or_insert_with(system_fonts);
            let Some(font) = find_unicode_font(db, text) else {
                tracing::warn!(
                    "No system font covers {:?}, unsupported characters will print as '?'",
                    text
                );
                fallbacks.push(None);
                continue;
            };

            let font_id = font
                .embed(doc)
                .map_err(|e| GenerateError::Render(format!("failed to embed font: {}", e)))?;
            let resource = format!("F{}", 2 + fallbacks.iter().flatten().count());
            fallbacks.push(Some(Fallback {
                resource,
                font_id,
                font,
            }));
        }

        Ok(Self { helvetica, fallbacks })
    }

    /// Font and resource name to draw overlay `index` with.
    fn for_overlay(&self, index: usize) -> (&dyn TextFont, &str) {
        match self.fallbacks.get(index) {
            Some(Some(fallback)) => (&fallback.font as &dyn TextFont, fallback.resource.as_str()),
            _ => (&Helvetica, Helvetica::RESOURCE_NAME),
        }
    }

    fn resources(&self) -> Vec<(&str, ObjectId)> {
        let mut fonts = vec![(Helvetica::RESOURCE_NAME, self.helvetica)];
        for fallback in self.fallbacks.iter().flatten() {
            fonts.push((fallback.resource.as_str(), fallback.font_id));
        }
        fonts
    }
}

/// Compose the prescription: the template's first page with the three
/// draft fields drawn over it, as a single-page PDF.
pub fn compose(
    template_bytes: &[u8],
    draft: &PrescriptionDraft,
    layout: &Layout,
) -> Result<Vec<u8>, GenerateError> {
    let template = Document::load_mem(template_bytes)
        .map_err(|e| GenerateError::TemplateLoad(e.to_string()))?;

    let template_page = *template
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| GenerateError::TemplateLoad("template has no pages".to_string()))?;

    let bounds = media_box(&template, template_page).map_err(GenerateError::TemplateLoad)?;
    let page_content = template
        .get_page_content(template_page)
        .map_err(|e| GenerateError::TemplateLoad(format!("unreadable page content: {}", e)))?;
    let template_resources = page_resources(&template, template_page);
    let rotate = inherited_attribute(&template, template_page, b"Rotate");

    // The canvas starts with every object of the template so the page's
    // resources resolve; whatever the new page does not reach is pruned.
    let mut canvas = Document::with_version("1.5");
    canvas.max_id = template.max_id;
    canvas.objects = template.objects;

    let form_id = import_page_as_form(&mut canvas, &page_content, template_resources, &bounds)?;

    let overlays: [(&str, &OverlaySpec); 3] = [
        (draft.patient_name.as_str(), &layout.name),
        (draft.prescription_text.as_str(), &layout.prescription),
        (draft.issue_date.as_str(), &layout.date),
    ];
    let texts: Vec<&str> = overlays.iter().map(|(text, _)| *text).collect();
    let fonts = OverlayFonts::prepare(&mut canvas, &texts)?;

    let mut builder = ContentBuilder::new();
    builder.draw_form(TEMPLATE_XOBJECT);
    for (index, (text, spec)) in overlays.into_iter().enumerate() {
        let (font, resource) = fonts.for_overlay(index);
        builder.add_text(text, spec, font, resource, layout.font_size.as_points());
    }

    let content = builder
        .build_content_bytes()
        .and_then(|bytes| compress_data(&bytes))
        .map_err(|e| GenerateError::Render(e.to_string()))?;
    let content_id = canvas.add_object(Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        content,
    ));

    let resources = canvas_resources(TEMPLATE_XOBJECT, form_id, &fonts.resources());

    let pages_id = canvas.new_object_id();
    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => rect_object(&bounds),
        "Contents" => content_id,
        "Resources" => resources,
    };
    if let Some(rotate) = rotate {
        page.set("Rotate", rotate);
    }
    let page_id = canvas.add_object(page);

    canvas.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = canvas.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    canvas.trailer = Dictionary::new();
    canvas.trailer.set("Root", catalog_id);

    let pruned = canvas.prune_objects();
    tracing::debug!("Dropped {} template objects not used by the page", pruned.len());

    let mut buffer = Vec::new();
    canvas
        .save_to(&mut buffer)
        .map_err(|e| GenerateError::Render(format!("failed to serialize PDF: {}", e)))?;
    Ok(buffer)
}

/// Wrap the template page's content and resources in a Form XObject
/// whose bounding box is the page's media box.
fn import_page_as_form(
    doc: &mut Document,
    content: &[u8],
    resources: Object,
    bounds: &[f64; 4],
) -> Result<ObjectId, GenerateError> {
    let compressed = compress_data(content).map_err(|e| GenerateError::Render(e.to_string()))?;

    let mut form = Dictionary::new();
    form.set("Type", "XObject");
    form.set("Subtype", "Form");
    form.set("FormType", 1);
    form.set("BBox", rect_object(bounds));
    form.set("Resources", resources);
    form.set("Filter", "FlateDecode");

    Ok(doc.add_object(Stream::new(form, compressed)))
}

fn rect_object(rect: &[f64; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v as f32)).collect())
}
