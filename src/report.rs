// Tabular exports: CSV bytes and a paginated A4 PDF.
//
// PDF coordinates are kept as distances from the top edge while laying out
// and converted to printpdf's bottom-left origin only when drawing.
use crate::error::{DashboardError, Result};
use crate::quartile::Band;
use crate::style::{band_fill, Rgb};
use crate::types::{ClassificationRow, QuartileRow};
use chrono::NaiveDate;
use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rect,
};
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT_MARGIN: f32 = 10.0;
const TOP_MARGIN: f32 = 10.0;
const BOTTOM_MARGIN: f32 = 15.0;
const HEADER_HEIGHT: f32 = 10.0;
const MIN_ROW_HEIGHT: f32 = 10.0;
const LINE_HEIGHT: f32 = 4.5;
const CELL_PADDING: f32 = 1.5;
const HEADER_FONT_SIZE: f32 = 10.0;
const BODY_FONT_SIZE: f32 = 8.0;
const PT_TO_MM: f32 = 0.352_778;

/// Serialize `rows` as UTF-8 CSV; the header row carries the display names.
///
/// An empty slice yields an empty buffer, since there is no row to take the
/// header from.
pub fn to_csv_bytes<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.into_inner().map_err(DashboardError::export)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfColumn {
    pub header: String,
    /// Millimetres.
    pub width: f32,
    pub align: Align,
    /// Long text wraps onto extra lines instead of overflowing.
    pub wrap: bool,
}

impl PdfColumn {
    fn new(header: &str, width: f32, align: Align) -> Self {
        Self {
            header: header.to_string(),
            width,
            align,
            wrap: false,
        }
    }

    fn wrapping(mut self) -> Self {
        self.wrap = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfCell {
    pub text: String,
    pub fill: Option<Rgb>,
}

impl PdfCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fill: None,
        }
    }

    pub fn filled(text: impl Into<String>, fill: Rgb) -> Self {
        Self {
            text: text.into(),
            fill: Some(fill),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleLine {
    pub text: String,
    pub size: f32,
    pub height: f32,
}

/// Where the logo goes on the first page; `y` is measured from the top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoPlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Vertical space reserved below `y` before the title starts.
    pub reserve: f32,
}

/// Fixed strings stamped on every report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMeta {
    pub institution: String,
    pub source_note: String,
    pub generated: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfReport {
    pub document_title: String,
    pub logo: Option<LogoPlacement>,
    pub title_lines: Vec<TitleLine>,
    pub metadata: String,
    pub columns: Vec<PdfColumn>,
    pub rows: Vec<Vec<PdfCell>>,
    pub footer: String,
}

fn footer(meta: &ReportMeta) -> String {
    format!(
        "{} Gerado em {}.",
        meta.source_note,
        meta.generated.format("%d/%m/%Y")
    )
}

/// Edition ranking: `ORD, ESCOLA, ETAPA, PROFICIÊNCIA, COMPONENTE, EDIÇÃO`.
pub fn ranking_report(rows: &[ClassificationRow], edition: &str, meta: &ReportMeta) -> PdfReport {
    let columns = vec![
        PdfColumn::new("ORD", 15.0, Align::Center),
        PdfColumn::new("ESCOLA", 60.0, Align::Left).wrapping(),
        PdfColumn::new("ETAPA", 20.0, Align::Center),
        PdfColumn::new("PROFICIÊNCIA", 25.0, Align::Center),
        PdfColumn::new("COMPONENTE", 50.0, Align::Left),
        PdfColumn::new("EDIÇÃO", 20.0, Align::Center),
    ];
    let body = rows
        .iter()
        .map(|r| {
            vec![
                PdfCell::text(&r.ord),
                PdfCell::text(&r.school),
                PdfCell::text(&r.stage),
                PdfCell::text(format!("{:.1}", r.score)),
                PdfCell::text(&r.component),
                PdfCell::text(&r.edition),
            ]
        })
        .collect();
    let (stage, component) = rows
        .first()
        .map(|r| (r.stage.as_str(), r.component.as_str()))
        .unwrap_or(("", ""));
    PdfReport {
        document_title: format!("Ranking SPAECE {}", edition),
        logo: Some(LogoPlacement {
            x: 60.0,
            y: 10.0,
            width: 90.0,
            reserve: 40.0,
        }),
        title_lines: vec![
            TitleLine { text: meta.institution.clone(), size: 16.0, height: 10.0 },
            TitleLine { text: "Ranking SPAECE".to_string(), size: 16.0, height: 10.0 },
            TitleLine { text: format!("Edição: {}", edition), size: 14.0, height: 10.0 },
        ],
        metadata: format!("Etapa: {} | Componente: {}", stage, component),
        columns,
        rows: body,
        footer: footer(meta),
    }
}

/// Cohort quartiles: `Pos., Escola, Etapa, Proficiência, Quartil`, the band
/// cell filled with its colour. Rows are expected best first.
pub fn quartile_report(
    rows: &[QuartileRow],
    component: &str,
    stage: &str,
    edition: &str,
    meta: &ReportMeta,
) -> PdfReport {
    let columns = vec![
        PdfColumn::new("Pos.", 15.0, Align::Center),
        PdfColumn::new("Escola", 60.0, Align::Left).wrapping(),
        PdfColumn::new("Etapa", 20.0, Align::Center),
        PdfColumn::new("Proficiência", 25.0, Align::Center),
        PdfColumn::new("Quartil", 30.0, Align::Center),
    ];
    let body = rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let band_cell = match Band::from_label(&r.band) {
                Some(band) => PdfCell::filled(band.short(), band_fill(band)),
                None => PdfCell::text(&r.band),
            };
            vec![
                PdfCell::text((i + 1).to_string()),
                PdfCell::text(&r.school),
                PdfCell::text(&r.stage),
                PdfCell::text(format!("{:.1}", r.score)),
                band_cell,
            ]
        })
        .collect();
    PdfReport {
        document_title: format!("Quartis {} {} {}", component, stage, edition),
        logo: Some(LogoPlacement {
            x: 10.0,
            y: 8.0,
            width: 30.0,
            reserve: 0.0,
        }),
        title_lines: vec![
            TitleLine {
                text: "Classificação por Quartis de Proficiência".to_string(),
                size: 16.0,
                height: 20.0,
            },
            TitleLine {
                text: format!("Componente: {} | Etapa: {} | Edição: {}", component, stage, edition),
                size: 12.0,
                height: 10.0,
            },
        ],
        metadata: meta.institution.clone(),
        columns,
        rows: body,
        footer: footer(meta),
    }
}

/// Approximate Helvetica advance width in millimetres.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em = if bold { 0.58 } else { 0.52 };
    text.chars().count() as f32 * size * PT_TO_MM * em
}

/// Break `text` into lines no wider than `width`; words longer than a line
/// are split by character.
pub fn wrap_text(text: &str, width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, size, false) <= width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for ch in word.chars() {
            current.push(ch);
            if text_width(&current, size, false) > width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn pdf_err(e: impl std::fmt::Display) -> DashboardError {
    DashboardError::export(format!("pdf: {}", e))
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        rgb.0 as f32 / 255.0,
        rgb.1 as f32 / 255.0,
        rgb.2 as f32 / 255.0,
        None,
    ))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Drawing state: current page layer plus the cursor measured from the top.
struct Canvas {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    fonts: Fonts,
    cursor: f32,
    pages: usize,
}

impl Canvas {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let fonts = Fonts {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
            bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        };
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            fonts,
            cursor: TOP_MARGIN,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = TOP_MARGIN;
        self.pages += 1;
    }

    fn text(&self, text: &str, size: f32, bold: bool, x: f32, baseline: f32, rgb: Rgb) {
        let font = if bold { &self.fonts.bold } else { &self.fonts.regular };
        self.layer.set_fill_color(color(rgb));
        self.layer
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT - baseline), font);
    }

    fn centered(&self, text: &str, size: f32, bold: bool, baseline: f32) {
        let x = (PAGE_WIDTH - text_width(text, size, bold)) / 2.0;
        self.text(text, size, bold, x.max(LEFT_MARGIN), baseline, Rgb::BLACK);
    }

    fn rect(&self, x: f32, top: f32, width: f32, height: f32, fill: Option<Rgb>) {
        self.layer.set_outline_color(color(Rgb::BLACK));
        self.layer.set_outline_thickness(0.2);
        let mode = match fill {
            Some(rgb) => {
                self.layer.set_fill_color(color(rgb));
                PaintMode::FillStroke
            }
            None => PaintMode::Stroke,
        };
        let bottom = PAGE_HEIGHT - top - height;
        let rect = Rect::new(Mm(x), Mm(bottom), Mm(x + width), Mm(PAGE_HEIGHT - top)).with_mode(mode);
        self.layer.add_rect(rect);
    }

    fn logo(&mut self, png: &[u8], place: LogoPlacement) -> Result<()> {
        let decoder = PngDecoder::new(Cursor::new(png)).map_err(pdf_err)?;
        let image = Image::try_from(decoder).map_err(pdf_err)?;
        let px_w = image.image.width.0 as f32;
        let px_h = image.image.height.0 as f32;
        if px_w <= 0.0 {
            return Ok(());
        }
        // dpi chosen so the image spans exactly `place.width` millimetres.
        let dpi = px_w * 25.4 / place.width;
        let height = px_h * 25.4 / dpi;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(place.x)),
                translate_y: Some(Mm(PAGE_HEIGHT - place.y - height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn footer(&self, text: &str) {
        self.text(text, 7.0, false, LEFT_MARGIN, PAGE_HEIGHT - 8.0, Rgb::BLACK);
    }
}

impl PdfReport {
    fn table_header(&self, canvas: &mut Canvas) {
        let mut x = LEFT_MARGIN;
        for col in &self.columns {
            canvas.rect(x, canvas.cursor, col.width, HEADER_HEIGHT, Some(Rgb::HEADER_BLUE));
            let tx = x + (col.width - text_width(&col.header, HEADER_FONT_SIZE, true)) / 2.0;
            canvas.text(
                &col.header,
                HEADER_FONT_SIZE,
                true,
                tx.max(x + 0.5),
                canvas.cursor + HEADER_HEIGHT / 2.0 + 1.2,
                Rgb::WHITE,
            );
            x += col.width;
        }
        canvas.cursor += HEADER_HEIGHT;
    }

    /// Lines of every cell after wrapping; non-wrapping columns keep one line.
    fn cell_lines(&self, row: &[PdfCell]) -> Vec<Vec<String>> {
        self.columns
            .iter()
            .zip(row)
            .map(|(col, cell)| {
                if col.wrap {
                    wrap_text(&cell.text, col.width - 2.0 * CELL_PADDING, BODY_FONT_SIZE)
                } else {
                    vec![cell.text.clone()]
                }
            })
            .collect()
    }

    fn row_height(lines: &[Vec<String>]) -> f32 {
        let max_lines = lines.iter().map(Vec::len).max().unwrap_or(1);
        (max_lines as f32 * LINE_HEIGHT + 2.0 * CELL_PADDING).max(MIN_ROW_HEIGHT)
    }

    fn draw_row(&self, canvas: &mut Canvas, row: &[PdfCell], lines: &[Vec<String>], height: f32) {
        let mut x = LEFT_MARGIN;
        for ((col, cell), cell_lines) in self.columns.iter().zip(row).zip(lines) {
            canvas.rect(x, canvas.cursor, col.width, height, cell.fill);
            let block = cell_lines.len() as f32 * LINE_HEIGHT;
            let first_baseline = canvas.cursor + (height - block) / 2.0 + LINE_HEIGHT * 0.75;
            for (i, line) in cell_lines.iter().enumerate() {
                let tx = match col.align {
                    Align::Left => x + CELL_PADDING,
                    Align::Center => {
                        (x + (col.width - text_width(line, BODY_FONT_SIZE, false)) / 2.0).max(x + 0.5)
                    }
                };
                canvas.text(
                    line,
                    BODY_FONT_SIZE,
                    false,
                    tx,
                    first_baseline + i as f32 * LINE_HEIGHT,
                    Rgb::BLACK,
                );
            }
            x += col.width;
        }
        canvas.cursor += height;
    }

    /// Lay the report out and return the finished document bytes.
    pub fn render(&self, logo_png: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut canvas = Canvas::new(&self.document_title)?;
        canvas.footer(&self.footer);

        if let (Some(png), Some(place)) = (logo_png, self.logo) {
            canvas.logo(png, place)?;
            canvas.cursor = canvas.cursor.max(place.y + place.reserve);
        }
        for line in &self.title_lines {
            canvas.centered(&line.text, line.size, true, canvas.cursor + line.height * 0.65);
            canvas.cursor += line.height;
        }
        if !self.metadata.is_empty() {
            canvas.centered(&self.metadata, 9.0, false, canvas.cursor + 5.0);
            canvas.cursor += 8.0;
        }

        self.table_header(&mut canvas);
        for row in &self.rows {
            let lines = self.cell_lines(row);
            let height = Self::row_height(&lines);
            if canvas.cursor + height > PAGE_HEIGHT - BOTTOM_MARGIN {
                canvas.new_page();
                canvas.footer(&self.footer);
                self.table_header(&mut canvas);
            }
            self.draw_row(&mut canvas, row, &lines, height);
        }

        debug!(
            title = %self.document_title,
            rows = self.rows.len(),
            pages = canvas.pages,
            "pdf rendered"
        );
        canvas.doc.save_to_bytes().map_err(pdf_err)
    }

    /// Number of pages `render` will produce.
    pub fn page_count(&self) -> usize {
        let mut cursor = TOP_MARGIN;
        if let Some(place) = self.logo {
            cursor = cursor.max(place.y + place.reserve);
        }
        cursor += self.title_lines.iter().map(|l| l.height).sum::<f32>();
        if !self.metadata.is_empty() {
            cursor += 8.0;
        }
        cursor += HEADER_HEIGHT;
        let mut pages = 1;
        for row in &self.rows {
            let height = Self::row_height(&self.cell_lines(row));
            if cursor + height > PAGE_HEIGHT - BOTTOM_MARGIN {
                pages += 1;
                cursor = TOP_MARGIN + HEADER_HEIGHT;
            }
            cursor += height;
        }
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ReportMeta {
        ReportMeta {
            institution: "SETOR DE MONITORAMENTO".to_string(),
            source_note: "Fonte: SEDUC.".to_string(),
            generated: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    fn classification(n: usize) -> Vec<ClassificationRow> {
        (0..n)
            .map(|i| ClassificationRow {
                ord: format!("{}º", i + 1),
                school: format!("EEF ESCOLA MUNICIPAL DE ENSINO FUNDAMENTAL NÚMERO {}", i),
                stage: "5º Ano".to_string(),
                score: 300.0 - i as f64,
                component: "MATEMÁTICA".to_string(),
                edition: "2019".to_string(),
            })
            .collect()
    }

    #[test]
    fn csv_header_uses_display_names() {
        let bytes = to_csv_bytes(&classification(1)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "ORD,ESCOLA,ETAPA,PROFICIENCIA_MEDIA,COMPONENTE_CURRICULAR,EDICAO");
    }

    #[test]
    fn wrapping_respects_column_width() {
        let lines = wrap_text("EEF ESCOLA MUNICIPAL DE ENSINO FUNDAMENTAL PROFESSORA MARIA", 57.0, 8.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, 8.0, false) <= 57.0);
        }
        assert_eq!(lines.join(" "), "EEF ESCOLA MUNICIPAL DE ENSINO FUNDAMENTAL PROFESSORA MARIA");
        assert_eq!(wrap_text("", 57.0, 8.0), vec![String::new()]);
    }

    #[test]
    fn wrapped_rows_grow_instead_of_overflowing() {
        let report = ranking_report(&classification(1), "2019", &meta());
        let lines = report.cell_lines(&report.rows[0]);
        assert!(lines[1].len() > 1);
        assert!(lines[0].len() == 1);
        assert!(PdfReport::row_height(&lines) >= lines[1].len() as f32 * LINE_HEIGHT);
    }

    #[test]
    fn quartile_cells_carry_band_colours() {
        let rows = vec![QuartileRow {
            school: "EEF A".to_string(),
            stage: "9º Ano".to_string(),
            component: "MATEMÁTICA".to_string(),
            edition: "2019".to_string(),
            score: 487.46,
            band: Band::Q1.label().to_string(),
        }];
        let report = quartile_report(&rows, "MATEMÁTICA", "9º Ano", "2019", &meta());
        assert_eq!(report.columns.len(), 5);
        assert_eq!(report.rows[0][0].text, "1");
        assert_eq!(report.rows[0][3].text, "487.5");
        assert_eq!(report.rows[0][4], PdfCell::filled("Q1", band_fill(Band::Q1)));
    }

    #[test]
    fn long_tables_paginate() {
        assert_eq!(ranking_report(&classification(3), "2019", &meta()).page_count(), 1);
        assert!(ranking_report(&classification(60), "2019", &meta()).page_count() > 2);
    }

    #[test]
    fn renders_pdf_bytes_in_memory() {
        let report = ranking_report(&classification(40), "2019", &meta());
        let bytes = report.render(None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn broken_logo_is_an_export_error() {
        let report = ranking_report(&classification(1), "2019", &meta());
        let err = report.render(Some(b"not a png")).unwrap_err();
        assert!(matches!(err, DashboardError::Export(_)));
    }
}
