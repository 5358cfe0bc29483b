//! Default prescription template.
//!
//! Writes the single-page background the overlay anchors are calibrated
//! against: a title, one label per field and a signature line.

use anyhow::{anyhow, Context, Result};
use printpdf::{BuiltinFont, Line, Mm, PdfDocument, Point, Pt};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::Layout;

/// US Letter, 612 x 792 pt.
const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;

const LABEL_X: f64 = 50.0;
const LABEL_SIZE: f32 = 12.0;

fn mm(points: f64) -> Mm {
    Mm::from(Pt(points as f32))
}

/// Render the default template to PDF bytes.
pub fn default_template_bytes() -> Result<Vec<u8>> {
    let layout = Layout::default();
    let (doc, page, layer) = PdfDocument::new(
        "Receita",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Template",
    );
    let canvas = doc.get_page(page).get_layer(layer);

    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("Failed to add Helvetica-Bold: {}", e))?;
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("Failed to add Helvetica: {}", e))?;

    canvas.use_text("RECEITA", 22.0, mm(LABEL_X), mm(720.0), &bold);

    // Labels share the first baseline of the overlay next to them.
    let baseline_drop = 718.0 * layout.font_size.as_points() / 1000.0;
    let labels = [
        ("Paciente:", &layout.name),
        ("Uso:", &layout.prescription),
        ("Data:", &layout.date),
    ];
    for (label, spec) in labels {
        let baseline = spec.y.as_points() - baseline_drop;
        canvas.use_text(label, LABEL_SIZE, mm(LABEL_X), mm(baseline), &regular);
    }

    canvas.set_outline_thickness(0.75);
    canvas.add_line(Line {
        points: vec![
            (Point::new(mm(200.0), mm(300.0)), false),
            (Point::new(mm(420.0), mm(300.0)), false),
        ],
        is_closed: false,
    });
    canvas.use_text("Assinatura e carimbo", 10.0, mm(255.0), mm(286.0), &regular);

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|e| anyhow!("Failed to serialize template: {}", e))?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush template: {}", e.error()))
}

/// Write the default template to `path`, creating parent directories.
pub fn write_default_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let bytes = default_template_bytes()?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    std::io::Write::write_all(&mut writer, &bytes)
        .with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!("Wrote default template to {:?}", path);
    Ok(())
}
