//! Diet report generation
//!
//! A printable PDF of the working session: patient header, day totals, a
//! macronutrient chart and one table per meal slot. A slot table is never
//! split across pages.

use std::fs::File;
use std::io::BufWriter;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::Local;
use ::image::{DynamicImage, ImageFormat, RgbImage};
use printpdf::*;
use serde::Serialize;

use crate::db::Database;
use crate::error::{PlanError, PlanResult};
use crate::models::{
    Nutrients, Patient, CALORIES, CARBOHYDRATE, FAT, FIBER, PROTEIN, REQUIRED_NUTRIENTS,
};
use crate::nutrition::{
    aggregate_entry, aggregate_session, aggregate_slot, DisplayPrecision, FoodCatalog, Session, SessionEntry,
};
use super::Workspace;

const COLOR_TITLE: (u8, u8, u8) = (0, 112, 60);
const COLOR_BLACK: (u8, u8, u8) = (0, 0, 0);
const COLOR_GRAY: (u8, u8, u8) = (128, 128, 128);
const COLOR_PROTEIN: (u8, u8, u8) = (192, 0, 0);
const COLOR_CARBOHYDRATE: (u8, u8, u8) = (255, 165, 0);
const COLOR_FAT: (u8, u8, u8) = (0, 112, 192);
const COLOR_FIBER: (u8, u8, u8) = (0, 176, 80);

// Letter, portrait
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;

const SLOT_TITLE_HEIGHT: f32 = 7.0;
const TABLE_HEADER_HEIGHT: f32 = 5.0;
const ROW_HEIGHT: f32 = 4.5;
const SLOT_FOOTER_HEIGHT: f32 = 10.0;

const COLUMNS: [(&str, f32); 7] = [
    ("Food", 70.0),
    ("Grams", 20.0),
    ("kcal", 18.0),
    ("Protein", 20.0),
    ("Carb", 20.0),
    ("Fat", 18.0),
    ("Fiber", 18.0),
];

#[derive(Debug, Serialize)]
pub struct DietReport {
    pub file_path: String,
    pub pages: usize,
    pub entries: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportReportResponse {
    pub success: bool,
    pub file_path: String,
    pub pages: usize,
    pub entries: usize,
    pub totals: Nutrients,
    pub message: String,
}

/// Vertical space a slot's table needs
fn slot_height(entries: usize) -> f32 {
    // An empty slot still prints one "empty meal" line
    SLOT_TITLE_HEIGHT + TABLE_HEADER_HEIGHT + entries.max(1) as f32 * ROW_HEIGHT + SLOT_FOOTER_HEIGHT
}

fn usable_height() -> f32 {
    PAGE_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
}

/// Rows of one slot printed together on one page
#[derive(Debug, Clone, PartialEq)]
struct SlotChunk {
    slot: usize,
    page: usize,
    rows: Range<usize>,
    /// Earlier rows of the slot are on a previous page
    continued: bool,
    /// Carries the slot total
    last: bool,
}

impl SlotChunk {
    fn height(&self) -> f32 {
        let footer = if self.last { SLOT_FOOTER_HEIGHT } else { 0.0 };
        SLOT_TITLE_HEIGHT + TABLE_HEADER_HEIGHT + self.rows.len().max(1) as f32 * ROW_HEIGHT + footer
    }
}

/// Place slot tables on pages, starting with `first_page_used` mm consumed on page 0.
///
/// A slot that does not fit in what is left moves whole to the next page.
/// Only a slot taller than a full page is split; its rows continue on the
/// following pages under a repeated header and the total goes with the last rows.
fn layout(row_counts: &[usize], first_page_used: f32) -> Vec<SlotChunk> {
    let usable = usable_height();
    let head = SLOT_TITLE_HEIGHT + TABLE_HEADER_HEIGHT;
    let mut chunks = Vec::new();
    let mut page = 0;
    let mut used = first_page_used;

    for (slot, &rows) in row_counts.iter().enumerate() {
        let whole = slot_height(rows);
        if used > 0.0 && used + whole > usable && whole <= usable {
            page += 1;
            used = 0.0;
        }
        if used + whole <= usable || rows <= 1 {
            chunks.push(SlotChunk { slot, page, rows: 0..rows, continued: false, last: true });
            used += whole;
            continue;
        }

        let mut start = 0;
        loop {
            let remaining = rows - start;
            let left = usable - used;
            if head + remaining as f32 * ROW_HEIGHT + SLOT_FOOTER_HEIGHT <= left {
                chunks.push(SlotChunk { slot, page, rows: start..rows, continued: start > 0, last: true });
                used += head + remaining as f32 * ROW_HEIGHT + SLOT_FOOTER_HEIGHT;
                break;
            }

            let room = ((left - head) / ROW_HEIGHT).floor();
            if room < 1.0 || remaining == 1 {
                page += 1;
                used = 0.0;
                continue;
            }
            // Keep at least one row back for the chunk that carries the total
            let take = (room as usize).min(remaining - 1);
            chunks.push(SlotChunk { slot, page, rows: start..start + take, continued: start > 0, last: false });
            start += take;
            page += 1;
            used = 0.0;
        }
    }
    chunks
}

/// Macro grams as a bar chart, PNG bytes
pub fn generate_macro_chart(totals: &Nutrients, width: u32, height: u32) -> Result<Vec<u8>, String> {
    use plotters::prelude::*;

    let bars = [
        ("Protein", totals.get(PROTEIN), COLOR_PROTEIN),
        ("Carbohydrate", totals.get(CARBOHYDRATE), COLOR_CARBOHYDRATE),
        ("Fat", totals.get(FAT), COLOR_FAT),
        ("Fiber", totals.get(FIBER), COLOR_FIBER),
    ];
    let y_max = bars.iter().map(|b| b.1).fold(0.0, f64::max).max(10.0) * 1.15;

    let mut buffer = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d((0u32..bars.len() as u32).into_segmented(), 0.0..y_max)
            .map_err(|e| e.to_string())?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_label_formatter(&|v| match v {
                SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                    bars.get(*i as usize).map(|b| b.0.to_string()).unwrap_or_default()
                }
                SegmentValue::Last => String::new(),
            })
            .y_desc("grams")
            .draw()
            .map_err(|e| e.to_string())?;

        for (i, (_, value, color)) in bars.iter().enumerate() {
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(RGBColor(color.0, color.1, color.2).filled())
                        .margin(25)
                        .data(std::iter::once((i as u32, *value))),
                )
                .map_err(|e| e.to_string())?;
        }

        root.present().map_err(|e| e.to_string())?;
    }

    let img = RgbImage::from_raw(width, height, buffer).ok_or("Failed to create image from buffer")?;

    let mut png_bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| e.to_string())?;

    Ok(png_bytes)
}

fn rgb_to_printpdf(color: (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        color.0 as f32 / 255.0,
        color.1 as f32 / 255.0,
        color.2 as f32 / 255.0,
        None,
    ))
}

fn add_text(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, x: f32, y: f32, size: f32, color: (u8, u8, u8)) {
    layer.set_fill_color(rgb_to_printpdf(color));
    layer.use_text(text, size, Mm(x), Mm(y), font);
}

fn add_line(layer: &PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32, color: (u8, u8, u8), width: f32) {
    layer.set_outline_color(rgb_to_printpdf(color));
    layer.set_outline_thickness(width);
    layer.add_line(Line {
        points: vec![(Point::new(Mm(x1), Mm(y1)), false), (Point::new(Mm(x2), Mm(y2)), false)],
        is_closed: false,
    });
}

fn nutrient_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn unit(key: &str) -> &'static str {
    match key {
        CALORIES => "kcal",
        PROTEIN | CARBOHYDRATE | FAT | FIBER => "g",
        _ => "mg",
    }
}

/// Truncate long food names to the table column
fn fit(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        name.to_string()
    } else {
        let cut: String = name.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Write the report for a session to `output_path`
pub fn generate_diet_report(
    patient: &Patient,
    diet_name: &str,
    session: &Session,
    catalog: &FoodCatalog,
    precision: DisplayPrecision,
    output_path: &Path,
) -> PlanResult<DietReport> {
    let report_err = |e: String| PlanError::Report(e);
    let totals = aggregate_session(session, catalog);

    let (doc, page1, layer1) = PdfDocument::new("Diet Plan", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(|e| report_err(e.to_string()))?;
    let font_bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| report_err(e.to_string()))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let top = PAGE_HEIGHT - MARGIN_TOP;
    let mut y = top;

    // Header
    add_text(&layer, &font_bold, "Diet Plan", MARGIN_LEFT, y, 18.0, COLOR_TITLE);
    y -= 9.0;
    add_text(&layer, &font, &format!("Patient: {}", patient.name), MARGIN_LEFT, y, 11.0, COLOR_BLACK);
    add_text(&layer, &font, &format!("Diet: {}", diet_name), 120.0, y, 11.0, COLOR_BLACK);
    y -= 6.0;
    let today = Local::now().date_naive();
    add_text(&layer, &font, &format!("Generated: {}", today.format("%Y-%m-%d")), MARGIN_LEFT, y, 11.0, COLOR_BLACK);
    y -= 8.0;
    add_line(&layer, MARGIN_LEFT, y, PAGE_WIDTH - MARGIN_LEFT, y, COLOR_GRAY, 0.5);
    y -= 8.0;

    // Patient block
    add_text(&layer, &font_bold, "Patient", MARGIN_LEFT, y, 12.0, COLOR_BLACK);
    y -= 6.0;
    let mut details = Vec::new();
    if let Some(age) = patient.age_on(today) {
        details.push(format!("Age: {} years", age));
    }
    if let Some(gender) = &patient.gender {
        details.push(format!("Gender: {}", gender));
    }
    if let Some(email) = &patient.email {
        details.push(format!("Email: {}", email));
    }
    if let Some(phone) = &patient.phone {
        details.push(format!("Phone: {}", phone));
    }
    if details.is_empty() {
        details.push("No additional details".to_string());
    }
    for line in &details {
        add_text(&layer, &font, line, MARGIN_LEFT, y, 10.0, COLOR_BLACK);
        y -= 5.0;
    }
    y -= 4.0;

    // Day totals: required keys then extras
    add_text(&layer, &font_bold, "Daily totals", MARGIN_LEFT, y, 12.0, COLOR_BLACK);
    y -= 6.0;
    let keys: Vec<&str> = REQUIRED_NUTRIENTS.iter().copied().chain(totals.extra_keys()).collect();
    for pair in keys.chunks(2) {
        for (col, key) in pair.iter().enumerate() {
            let text = format!(
                "{}: {} {}",
                nutrient_label(key),
                precision.format(key, totals.get(key)),
                unit(key)
            );
            add_text(&layer, &font, &text, MARGIN_LEFT + col as f32 * 80.0, y, 10.0, COLOR_BLACK);
        }
        y -= 5.0;
    }
    y -= 4.0;

    // Macro chart, 800x300 px at 127 DPI is 160x60 mm
    match generate_macro_chart(&totals, 800, 300) {
        Ok(png_bytes) => {
            let image = printpdf::image_crate::load_from_memory(&png_bytes).map_err(|e| report_err(e.to_string()))?;
            Image::from_dynamic_image(&image).add_to_layer(
                layer.clone(),
                ImageTransform {
                    translate_x: Some(Mm(MARGIN_LEFT)),
                    translate_y: Some(Mm(y - 60.0)),
                    dpi: Some(127.0),
                    ..Default::default()
                },
            );
            y -= 66.0;
        }
        Err(e) => {
            tracing::warn!(error = %e, "macro chart could not be drawn");
            add_text(&layer, &font, &format!("Chart generation error: {}", e), MARGIN_LEFT, y, 9.0, COLOR_GRAY);
            y -= 8.0;
        }
    }

    // Slot tables
    let slots: Vec<(&str, &[SessionEntry])> = session.iter().collect();
    let row_counts: Vec<usize> = slots.iter().map(|(_, entries)| entries.len()).collect();
    let mut current_page = 0;

    for chunk in layout(&row_counts, top - y) {
        let (slot, entries) = slots[chunk.slot];
        if chunk.page != current_page {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            layer = doc.get_page(next_page).get_layer(next_layer);
            current_page = chunk.page;
            y = top;
        }

        let heading = if chunk.continued {
            format!("{} (continued)", slot)
        } else {
            slot.to_string()
        };
        add_text(&layer, &font_bold, &heading, MARGIN_LEFT, y, 12.0, COLOR_TITLE);
        y -= SLOT_TITLE_HEIGHT;

        let mut x = MARGIN_LEFT;
        for (title, width) in COLUMNS {
            add_text(&layer, &font_bold, title, x, y, 8.0, COLOR_BLACK);
            x += width;
        }
        add_line(&layer, MARGIN_LEFT, y - 1.5, MARGIN_LEFT + COLUMNS.iter().map(|c| c.1).sum::<f32>(), y - 1.5, COLOR_GRAY, 0.3);
        y -= TABLE_HEADER_HEIGHT;

        if entries.is_empty() {
            add_text(&layer, &font, "Empty meal", MARGIN_LEFT, y, 8.0, COLOR_GRAY);
            y -= ROW_HEIGHT;
        }
        for entry in &entries[chunk.rows.clone()] {
            let n = aggregate_entry(catalog, entry);
            let name = catalog
                .lookup(entry.food_id)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("Unknown food {}", entry.food_id));
            let values = [
                fit(&name, 40),
                precision.format(PROTEIN, entry.quantity_grams),
                precision.format(CALORIES, n.get(CALORIES)),
                precision.format(PROTEIN, n.get(PROTEIN)),
                precision.format(CARBOHYDRATE, n.get(CARBOHYDRATE)),
                precision.format(FAT, n.get(FAT)),
                precision.format(FIBER, n.get(FIBER)),
            ];
            let mut x = MARGIN_LEFT;
            for (value, (_, width)) in values.iter().zip(COLUMNS) {
                add_text(&layer, &font, value, x, y, 8.0, COLOR_BLACK);
                x += width;
            }
            y -= ROW_HEIGHT;
        }

        if !chunk.last {
            continue;
        }
        let slot_totals = aggregate_slot(session, catalog, slot)?;
        let summary = format!(
            "Meal total: {} kcal | Protein {} g | Carb {} g | Fat {} g | Fiber {} g",
            precision.format(CALORIES, slot_totals.get(CALORIES)),
            precision.format(PROTEIN, slot_totals.get(PROTEIN)),
            precision.format(CARBOHYDRATE, slot_totals.get(CARBOHYDRATE)),
            precision.format(FAT, slot_totals.get(FAT)),
            precision.format(FIBER, slot_totals.get(FIBER)),
        );
        y -= 1.0;
        add_text(&layer, &font_bold, &summary, MARGIN_LEFT, y, 8.0, COLOR_BLACK);
        y -= SLOT_FOOTER_HEIGHT - 1.0;
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| report_err(e.to_string()))?;
    }
    let file = File::create(output_path).map_err(|e| report_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer).map_err(|e| report_err(e.to_string()))?;

    let report = DietReport {
        file_path: output_path.display().to_string(),
        pages: current_page + 1,
        entries: session.entry_count(),
    };
    tracing::info!(path = %report.file_path, pages = report.pages, "diet report written");
    Ok(report)
}

/// Export the working session of the selected patient as a PDF
pub fn export_diet_report(db: &Database, ws: &Workspace, file_name: Option<&str>) -> Result<ExportReportResponse, String> {
    let patient_id = ws
        .context
        .patient_id()
        .ok_or("No patient selected. Call select_patient first.")?;
    let session = ws.context.session();
    if session.is_empty() {
        return Err("Nothing to report: the session is empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let patient = Patient::get_by_id(&conn, patient_id)
        .map_err(|e| format!("Failed to get patient: {}", e))?
        .ok_or_else(|| format!("Patient not found with id: {}", patient_id))?;
    drop(conn);

    let diet_name = ws
        .context
        .current_diet()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "Unsaved diet".to_string());

    let file_name = match file_name {
        Some(name) if !name.trim().is_empty() => PathBuf::from(name.trim()),
        _ => PathBuf::from(format!("diet_{}_{}.pdf", patient_id, Local::now().format("%Y%m%d_%H%M%S"))),
    };
    let output_path = ws.config.report_dir.join(file_name);

    let report = generate_diet_report(
        &patient,
        &diet_name,
        session,
        &ws.catalog,
        ws.config.precision,
        &output_path,
    )
    .map_err(super::plan_error)?;

    let totals = ws.config.precision.round_all(&aggregate_session(session, &ws.catalog));
    Ok(ExportReportResponse {
        success: true,
        message: format!(
            "Diet report for {} written with {} entries over {} page(s)",
            patient.name, report.entries, report.pages
        ),
        file_path: report.file_path,
        pages: report.pages,
        entries: report.entries,
        totals,
    })
}
