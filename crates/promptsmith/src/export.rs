//! PDF export of generated text.
//!
//! Writes a small, self-contained PDF 1.4 document: A4 pages, the built-in
//! Helvetica font at 12 pt, and one 10 mm row per line. Text is split on
//! newlines, and each line is wrapped greedily on spaces to the printable
//! width using Helvetica's glyph metrics. Nothing is embedded, so the output
//! stays a few kilobytes.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::history::GenerationResult;

const MM: f64 = 72.0 / 25.4;
const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const MARGIN: f64 = 10.0 * MM;
const BOTTOM_MARGIN: f64 = 20.0 * MM;
const LINE_HEIGHT: f64 = 10.0 * MM;
const FONT_SIZE: f64 = 12.0;

/// Helvetica advance widths (1/1000 em) for bytes 32..=126 under
/// WinAnsiEncoding.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // p..~
];

/// A rendered document ready to be saved or downloaded.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Render a ledger entry, named after its generation time.
pub fn export_result(result: &GenerationResult) -> ExportedDocument {
    ExportedDocument {
        filename: export_filename(result.generated_at),
        bytes: encode_pdf(&result.generated_text),
    }
}

/// `generated_prompt_<unix seconds>.pdf`
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("generated_prompt_{}.pdf", at.timestamp())
}

/// Encode `text` and write it to `path`.
pub fn write_pdf(path: &Path, text: &str) -> std::io::Result<()> {
    std::fs::write(path, encode_pdf(text))
}

/// Encode `text` as a paginated PDF document.
pub fn encode_pdf(text: &str) -> Vec<u8> {
    let rows = layout_rows(text);
    let per_page = rows_per_page();
    let mut pages: Vec<&[String]> = rows.chunks(per_page).collect();
    if pages.is_empty() {
        pages.push(&[]);
    }

    // Object numbering: 1 catalog, 2 page tree, 3 font, then a
    // (page, content) pair per page.
    let page_obj = |i: usize| 4 + 2 * i;
    let mut objects: Vec<String> = Vec::with_capacity(3 + 2 * pages.len());

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", page_obj(i)))
        .collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    for (i, page_rows) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.2} {PAGE_HEIGHT:.2}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_obj(i) + 1
        ));
        let content = page_content(page_rows);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", i + 1);
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    );
    out.into_bytes()
}

fn rows_per_page() -> usize {
    (((PAGE_HEIGHT - MARGIN - BOTTOM_MARGIN) / LINE_HEIGHT).floor() as usize).max(1)
}

fn page_content(rows: &[String]) -> String {
    let mut content = String::new();
    for (row, line) in rows.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        // Baseline sits near the vertical middle of the 10 mm row.
        let y = PAGE_HEIGHT - MARGIN - LINE_HEIGHT * row as f64 - LINE_HEIGHT / 2.0
            - FONT_SIZE * 0.35;
        let _ = writeln!(
            content,
            "BT /F1 {FONT_SIZE} Tf {MARGIN:.2} {y:.2} Td ({}) Tj ET",
            escape(line)
        );
    }
    content.trim_end().to_string()
}

/// Split text into printable rows: one or more per source line.
pub(crate) fn layout_rows(text: &str) -> Vec<String> {
    let max_width = PAGE_WIDTH - 2.0 * MARGIN;
    text.split('\n')
        .flat_map(|line| wrap_line(&to_printable(line), max_width))
        .collect()
}

fn wrap_line(line: &str, max_width: f64) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }

    let mut rows = Vec::new();
    let mut row = String::new();
    let mut started = false;

    for word in line.split(' ') {
        let candidate = if started {
            format!("{row} {word}")
        } else {
            word.to_string()
        };
        if text_width(&candidate) <= max_width {
            row = candidate;
            started = true;
            continue;
        }

        if started {
            rows.push(std::mem::take(&mut row));
        }
        row = word.to_string();
        started = true;

        // A single word wider than the page is split by glyph.
        while text_width(&row) > max_width {
            let (head, tail) = split_to_width(&row, max_width);
            rows.push(head);
            row = tail;
        }
    }
    rows.push(row);
    rows
}

/// Longest prefix (at least one char) that fits, and the remainder.
fn split_to_width(s: &str, max_width: f64) -> (String, String) {
    let mut head = String::new();
    let mut width = 0.0;
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        let w = char_width(c);
        if !head.is_empty() && width + w > max_width {
            break;
        }
        width += w;
        head.push(c);
        chars.next();
    }
    (head, chars.collect())
}

fn char_width(c: char) -> f64 {
    let units = match c as usize {
        code @ 32..=126 => HELVETICA_WIDTHS[code - 32],
        _ => 556,
    };
    f64::from(units) * FONT_SIZE / 1000.0
}

fn text_width(s: &str) -> f64 {
    s.chars().map(char_width).sum()
}

/// Map text onto the printable ASCII range the built-in font can show.
fn to_printable(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\t' => out.push_str("    "),
            '\r' => {}
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{00B7}' => out.push('*'),
            '\u{00A0}' | '\u{2002}'..='\u{200A}' => out.push(' '),
            '\u{200B}' | '\u{FEFF}' => {}
            _ => out.push('?'),
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
