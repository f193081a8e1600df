//! PDF rendering of a laid-out report

use super::layout::{ReportDocument, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rgb};

const LAYER_NAME: &str = "Layer 1";

/// Render `doc` to PDF bytes using the built-in Helvetica faces
pub fn render_pdf(title: &str, doc: &ReportDocument) -> Result<Vec<u8>, String> {
    let (pdf, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);

    let regular = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| e.to_string())?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| e.to_string())?;

    for (index, page) in doc.pages.iter().enumerate() {
        let (page_ref, layer_ref) = if index == 0 {
            (first_page, first_layer)
        } else {
            pdf.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME)
        };
        let layer = pdf.get_page(page_ref).get_layer(layer_ref);

        for item in &page.items {
            let (r, g, b) = item.color;
            layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
            let font = if item.bold { &bold } else { &regular };
            // PDF origin is bottom-left
            layer.use_text(
                item.text.as_str(),
                item.size_pt,
                Mm(item.x_mm),
                Mm(PAGE_HEIGHT_MM - item.y_mm),
                font,
            );
        }
    }

    pdf.save_to_bytes().map_err(|e| e.to_string())
}
