use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use zip::ZipArchive;

use crate::models::DocumentUnits;

use super::normalize::normalize;

/// Reads the body paragraphs and table rows of a DOCX file.
pub fn extract_docx_units(path: &Path) -> Result<DocumentUnits> {
    let file =
        File::open(path).with_context(|| format!("failed to open DOCX: {}", path.display()))?;
    let mut archive = ZipArchive::new(file).context("DOCX is not a valid ZIP archive")?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX missing word/document.xml")?
        .read_to_string(&mut document_xml)
        .context("failed to read word/document.xml")?;

    parse_document_xml(&document_xml)
}

/// Top-level `w:p` elements become paragraphs (raw, unnormalized). Each row
/// of a top-level `w:tbl` becomes one `" | "`-joined line of normalized,
/// non-empty cell texts.
pub fn parse_document_xml(xml: &str) -> Result<DocumentUnits> {
    let doc = Document::parse(xml).context("failed to parse DOCX XML")?;
    let body = doc
        .descendants()
        .find(|node| is_tag(node, "body"))
        .context("DOCX XML has no w:body")?;

    let mut units = DocumentUnits::default();
    for block in body.children().filter(Node::is_element) {
        if is_tag(&block, "p") {
            units.paragraphs.push(paragraph_text(block));
        } else if is_tag(&block, "tbl") {
            for row in block.children().filter(|n| is_tag(n, "tr")) {
                let row_text = row
                    .children()
                    .filter(|n| is_tag(n, "tc"))
                    .map(|cell| normalize(&cell_text(cell)))
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(" | ");
                if !row_text.is_empty() {
                    units.table_rows.push(row_text);
                }
            }
        }
    }

    Ok(units)
}

fn is_tag(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Run content only: `w:t` text, `w:tab` as `\t`, `w:br`/`w:cr` as `\n`.
/// Tab stops in paragraph properties are not runs and are ignored.
fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants().filter(Node::is_element) {
        let in_run = node.parent().is_some_and(|parent| is_tag(&parent, "r"));
        if !in_run {
            continue;
        }
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn cell_text(cell: Node) -> String {
    cell.children()
        .filter(|n| is_tag(n, "p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    pub fn document_xml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    pub fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
    }

    pub fn write_docx(path: &Path, body: &str) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document_xml(body).as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn paragraphs_keep_document_order_and_raw_text() {
        let xml = document_xml(&format!(
            "{}{}<w:p/>",
            para("Item No. 1"),
            para("  Confirmation of minutes ")
        ));
        let units = parse_document_xml(&xml).unwrap();
        assert_eq!(
            units.paragraphs,
            vec!["Item No. 1", "  Confirmation of minutes ", ""]
        );
        assert!(units.table_rows.is_empty());
    }

    #[test]
    fn runs_tabs_and_breaks_are_rendered() {
        let xml = document_xml(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Regu</w:t></w:r><w:r><w:t>lation</w:t><w:tab/><w:t>4</w:t><w:br/><w:t>next</w:t></w:r></w:p>"#,
        );
        let units = parse_document_xml(&xml).unwrap();
        assert_eq!(units.paragraphs, vec!["Regulation\t4\nnext"]);
    }

    #[test]
    fn tables_become_pipe_joined_rows() {
        let table = format!(
            "<w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc><w:tc><w:p/></w:tc></w:tr>\
             <w:tr><w:tc>{}</w:tc><w:tc>{}{}</w:tc></w:tr>\
             <w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl>",
            para("Programme"),
            para("Min  CGPA"),
            para("Ph.D."),
            para("6.5"),
            para("(on 10 point scale)")
        );
        let xml = document_xml(&format!("{}{}", para("Item No. 7"), table));
        let units = parse_document_xml(&xml).unwrap();

        // table paragraphs are not body paragraphs
        assert_eq!(units.paragraphs, vec!["Item No. 7"]);
        assert_eq!(
            units.table_rows,
            vec!["Programme | Min CGPA", "Ph.D. | 6.5(on 10 point scale)"]
        );
    }

    #[test]
    fn reads_docx_archive_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BoG54_2021.docx");
        write_docx(&path, &para("Resolution with respect to: fees"));

        let units = extract_docx_units(&path).unwrap();
        assert_eq!(units.paragraphs, vec!["Resolution with respect to: fees"]);
    }

    #[test]
    fn rejects_non_zip_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(extract_docx_units(&path).is_err());
    }
}
