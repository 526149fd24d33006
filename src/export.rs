//! Downloadable documents: Markdown always, DOCX when built with the `docx` feature.

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::advisory::AdvisoryResult;
use crate::prompt::render_pain_points;
use crate::questionnaire::QuestionnaireInput;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("DOCX export is not available in this build")]
    Unavailable,
    #[error("failed to write document: {0}")]
    Write(String),
}

pub fn document_title(software: &str) -> String {
    match software.trim() {
        "" => "Procesadvies".to_string(),
        software => format!("Procesadvies {software}"),
    }
}

/// `advies_{software}_{YYYYmmdd_HHMM}.{ext}` with the software label reduced to `[a-z0-9-]`.
pub fn export_filename(software: &str, generated_at: &DateTime<Local>, ext: &str) -> String {
    let mut slug = String::new();
    for c in software.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() { "onbekend" } else { slug };
    format!("advies_{}_{}.{}", slug, generated_at.format("%Y%m%d_%H%M"), ext)
}

pub fn markdown_document(input: &QuestionnaireInput, result: &AdvisoryResult) -> String {
    format!(
        "# {}\n\n\
        _Gegenereerd op {}_\n\n\
        ## Uitgangssituatie\n\n\
        - Software: {}\n\
        - Voorkeursaanpak: {}\n\n\
        ### Knelpunten\n\n{}\n\n\
        ## Advies\n\n{}\n",
        document_title(&input.software),
        result.generated_at_display(),
        input.software.trim(),
        input.approach,
        render_pain_points(input),
        result.text.trim()
    )
}

#[cfg(feature = "docx")]
pub fn docx_document(title: &str, body: &str) -> Result<Vec<u8>, ExportError> {
    docx::build(title, body)
}

#[cfg(not(feature = "docx"))]
pub fn docx_document(_title: &str, _body: &str) -> Result<Vec<u8>, ExportError> {
    Err(ExportError::Unavailable)
}

#[cfg(feature = "docx")]
mod docx {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use super::ExportError;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

    const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

    // Body text is 11pt (w:sz counts half-points).
    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style></w:styles>"#;

    // Control characters other than tab, newline and carriage return are not allowed in XML 1.0.
    fn is_xml_char(c: char) -> bool {
        matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
    }

    fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars().filter(|&c| is_xml_char(c)) {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                c => out.push(c),
            }
        }
        out
    }

    fn paragraph(text: &str, style: Option<&str>) -> String {
        let props = style
            .map(|s| format!("<w:pPr><w:pStyle w:val=\"{s}\"/></w:pPr>"))
            .unwrap_or_default();
        format!(
            "<w:p>{props}<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
            escape(text)
        )
    }

    pub(super) fn document_xml(title: &str, body: &str) -> String {
        let mut paragraphs = paragraph(title, Some("Heading1"));
        for line in body.lines() {
            paragraphs.push_str(&paragraph(line, None));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
            <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
            <w:body>{paragraphs}</w:body></w:document>"
        )
    }

    pub(super) fn build(title: &str, body: &str) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let document = document_xml(title, body);
        let parts: [(&str, &str); 5] = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS),
            ("word/styles.xml", STYLES),
            ("word/document.xml", document.as_str()),
        ];
        for (name, content) in parts {
            zip.start_file(name, options)
                .map_err(|e| ExportError::Write(e.to_string()))?;
            zip.write_all(content.as_bytes())
                .map_err(|e| ExportError::Write(e.to_string()))?;
        }

        let cursor = zip.finish().map_err(|e| ExportError::Write(e.to_string()))?;
        Ok(cursor.into_inner())
    }

}
