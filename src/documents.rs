//! Text extraction from uploaded investor documents (PDF, PPTX).

use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use zip::ZipArchive;

/// Characters of extracted text sent to the chat-completion API.
pub const MAX_PROMPT_CHARS: usize = 12_000;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("unsupported document format: {0} (expected .pdf or .pptx)")]
    UnsupportedFormat(String),

    #[error("failed to read PDF: {0}")]
    Pdf(String),

    #[error("failed to read PPTX: {0}")]
    Pptx(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Pptx,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Result<Self, DocumentError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".pdf") {
            Ok(DocumentKind::Pdf)
        } else if lower.ends_with(".pptx") {
            Ok(DocumentKind::Pptx)
        } else {
            Err(DocumentError::UnsupportedFormat(file_name.to_string()))
        }
    }
}

pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, DocumentError> {
    match DocumentKind::from_file_name(file_name)? {
        DocumentKind::Pdf => extract_pdf_text(bytes),
        DocumentKind::Pptx => extract_pptx_text(bytes),
    }
}

/// `pdf-extract` panics on some malformed files (a page without `/MediaBox`,
/// for one), so the parser runs inside `catch_unwind`.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|payload| DocumentError::Pdf(panic_message(payload.as_ref())))?
        .map_err(|e| DocumentError::Pdf(e.to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("parser panicked: {}", detail)
}

/// Slide number from `ppt/slides/slide12.xml`.
fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn extract_pptx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocumentError::Pptx(e.to_string()))?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut runs = Vec::new();
    for (_, name) in slides {
        let mut xml = String::new();
        archive
            .by_name(&name)
            .map_err(|e| DocumentError::Pptx(e.to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| DocumentError::Pptx(e.to_string()))?;

        let text = slide_text(&xml)?;
        if !text.is_empty() {
            runs.push(text);
        }
    }

    Ok(runs.join("\n"))
}

/// Paragraph text of a slide: `a:t` runs joined, one line per `a:p`.
fn slide_text(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"a:t" => in_text_run = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"a:t" => in_text_run = false,
            Ok(Event::End(e)) if e.name().as_ref() == b"a:p" => {
                let line = current.trim().to_string();
                if !line.is_empty() {
                    lines.push(line);
                }
                current.clear();
            }
            Ok(Event::Text(t)) if in_text_run => {
                let text = t.unescape().map_err(|e| DocumentError::Pptx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::Pptx(e.to_string())),
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }
    Ok(lines.join("\n"))
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Single-page PDF whose page dictionary has no `/MediaBox`.
#[cfg(test)]
pub(crate) fn pdf_without_media_box() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R >>",
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.into_bytes()
}
