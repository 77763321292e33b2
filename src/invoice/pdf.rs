use std::io;

use axum::body::Bytes;

use crate::invoice::sink::FanoutWriter;

// US Letter, 1in margins, Courier only. Courier advances 600/1000 em per
// glyph, which is what makes right alignment exact.
const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 72.0;
const GLYPH_WIDTH: f64 = 0.6;
const LINE_SPACING: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone)]
pub struct TextLine {
    pub text: String,
    pub size: f64,
    pub align: Align,
}

impl TextLine {
    pub fn new(text: impl Into<String>, size: f64, align: Align) -> Self {
        Self {
            text: text.into(),
            size,
            align,
        }
    }

    pub fn blank() -> Self {
        Self::new("", 14.0, Align::Left)
    }
}

/// Forward-only PDF emitter. Objects go out in order, each chunk handed
/// to the fan-out writer as soon as it is assembled, and the final xref
/// table is built from the byte offsets already written. No sink is ever
/// asked to seek and the full document is never held in memory.
#[derive(Debug, Default)]
pub struct Document {
    lines: Vec<TextLine>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: TextLine) {
        self.lines.push(line);
    }

    pub fn page_count(&self) -> usize {
        self.paginate().len()
    }

    fn paginate(&self) -> Vec<Vec<&TextLine>> {
        let mut pages = Vec::new();
        let mut current: Vec<&TextLine> = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN;
        for line in &self.lines {
            let advance = line.size * LINE_SPACING;
            if y - advance < MARGIN && !current.is_empty() {
                pages.push(std::mem::take(&mut current));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= advance;
            current.push(line);
        }
        if !current.is_empty() || pages.is_empty() {
            pages.push(current);
        }
        pages
    }

    pub async fn write_to(&self, out: &mut FanoutWriter) -> io::Result<()> {
        let pages = self.paginate();
        // 1 catalog, 2 page tree, 3 font, then a (page, contents) pair per page.
        let object_count = 3 + 2 * pages.len();
        let mut offsets: Vec<u64> = Vec::with_capacity(object_count);
        let mut written: u64 = 0;

        let header: &[u8] = b"%PDF-1.4\n";
        written += header.len() as u64;
        out.write(Bytes::from_static(header)).await?;

        let kids = (0..pages.len())
            .map(|i| format!("{} 0 R", 4 + 2 * i))
            .collect::<Vec<_>>()
            .join(" ");
        let head_objects = [
            "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
            format!(
                "2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} >>\nendobj\n",
                pages.len()
            ),
            "3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Courier \
             /Encoding /WinAnsiEncoding >>\nendobj\n"
                .to_string(),
        ];
        for object in head_objects {
            offsets.push(written);
            written += object.len() as u64;
            out.write(Bytes::from(object)).await?;
        }

        for (i, page) in pages.iter().enumerate() {
            let page_id = 4 + 2 * i;
            let contents_id = page_id + 1;

            let page_object = format!(
                "{page_id} 0 obj\n<< /Type /Page /Parent 2 0 R \
                 /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R >> >> \
                 /Contents {contents_id} 0 R >>\nendobj\n"
            );
            offsets.push(written);
            written += page_object.len() as u64;
            out.write(Bytes::from(page_object)).await?;

            let content = render_page(page);
            let contents_object = format!(
                "{contents_id} 0 obj\n<< /Length {} >>\nstream\n{content}endstream\nendobj\n",
                content.len()
            );
            offsets.push(written);
            written += contents_object.len() as u64;
            out.write(Bytes::from(contents_object)).await?;
        }

        let xref_offset = written;
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
        for offset in &offsets {
            tail.push_str(&format!("{offset:010} 00000 n \n"));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            object_count + 1
        ));
        out.write(Bytes::from(tail)).await?;

        Ok(())
    }
}

fn render_page(lines: &[&TextLine]) -> String {
    let mut content = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in lines {
        y -= line.size * LINE_SPACING;
        if line.text.is_empty() {
            continue;
        }
        let width = line.text.chars().count() as f64 * GLYPH_WIDTH * line.size;
        let x = match line.align {
            Align::Left => MARGIN,
            Align::Center => (PAGE_WIDTH - width) / 2.0,
            Align::Right => PAGE_WIDTH - MARGIN - width,
        }
        .max(0.0);
        content.push_str(&format!(
            "BT\n/F1 {} Tf\n{x:.2} {y:.2} Td\n({}) Tj\nET\n",
            line.size,
            escape_text(&line.text)
        ));
    }
    content
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => {
                // One WinAnsi byte per glyph, as an octal escape; anything
                // outside Latin-1 has no glyph in this font.
                let byte = if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' };
                out.push_str(&format!("\\{byte:03o}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::sink::test_support::{BufferSink, SharedBuffer};

    fn sample_document(lines: usize) -> Document {
        let mut doc = Document::new();
        for i in 0..lines {
            doc.push(TextLine::new(format!("line {i}"), 14.0, Align::Left));
        }
        doc
    }

    async fn render(doc: &Document) -> String {
        let buffer = SharedBuffer::default();
        let mut out = FanoutWriter::new();
        out.push(Box::new(BufferSink {
            buffer: buffer.clone(),
        }));
        doc.write_to(&mut out).await.unwrap();
        assert!(out.finish().await.is_empty());
        String::from_utf8(buffer.contents()).unwrap()
    }

    #[tokio::test]
    async fn emits_a_well_formed_document() {
        let rendered = render(&sample_document(3)).await;
        assert!(rendered.starts_with("%PDF-1.4\n"));
        assert!(rendered.ends_with("%%EOF\n"));
        assert!(rendered.contains("/BaseFont /Courier"));
        assert!(rendered.contains("(line 0) Tj"));
        // 5 objects for a single page plus the free head entry.
        assert!(rendered.contains("xref\n0 6\n"));
        assert_eq!(rendered.matches(" 00000 n \n").count(), 5);
    }

    #[tokio::test]
    async fn long_documents_break_into_pages() {
        // 14pt lines at 1.5 spacing: 30 fit between the margins.
        let doc = sample_document(31);
        assert_eq!(doc.page_count(), 2);
        let rendered = render(&doc).await;
        assert!(rendered.contains("/Count 2"));

        assert_eq!(sample_document(30).page_count(), 1);
        assert_eq!(sample_document(0).page_count(), 1);
    }

    #[tokio::test]
    async fn parentheses_and_backslashes_are_escaped() {
        let mut doc = Document::new();
        doc.push(TextLine::new("Widget (blue) \\ large", 14.0, Align::Left));
        let rendered = render(&doc).await;
        assert!(rendered.contains(r"(Widget \(blue\) \\ large) Tj"));
    }

    #[tokio::test]
    async fn non_ascii_glyphs_become_winansi_octal_escapes() {
        let mut doc = Document::new();
        doc.push(TextLine::new("Café au Lait", 14.0, Align::Left));
        doc.push(TextLine::new("Price: 5€", 14.0, Align::Left));
        let rendered = render(&doc).await;
        assert!(rendered.contains("/Encoding /WinAnsiEncoding"));
        assert!(rendered.contains(r"(Caf\351 au Lait) Tj"));
        // The euro sign is outside Latin-1 and has no glyph here.
        assert!(rendered.contains(r"(Price: 5\077) Tj"));
    }

    #[test]
    fn right_aligned_text_ends_at_the_margin() {
        let line = TextLine::new("total", 10.0, Align::Right);
        let binding = [&line];
        let content = render_page(&binding);
        // 5 glyphs * 6pt wide: x = 612 - 72 - 30.
        assert!(content.contains("510.00"));
    }
}
