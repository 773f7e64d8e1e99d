//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// A paragraph of a generated DOCX: optional heading level and text.
pub struct Para<'a> {
    pub heading: Option<u8>,
    pub text: &'a str,
}

pub fn heading(level: u8, text: &str) -> Para<'_> {
    Para {
        heading: Some(level),
        text,
    }
}

pub fn para(text: &str) -> Para<'_> {
    Para {
        heading: None,
        text,
    }
}

/// Build a minimal DOCX package holding the given paragraphs.
pub fn build_docx(paragraphs: &[Para<'_>]) -> Vec<u8> {
    let mut body = String::new();
    for p in paragraphs {
        body.push_str("<w:p>");
        if let Some(level) = p.heading {
            body.push_str(&format!(
                r#"<w:pPr><w:pStyle w:val="Heading{}"/></w:pPr>"#,
                level
            ));
        }
        body.push_str(&format!(
            r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            p.text
        ));
    }
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        W_NS, body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub const ENGLISH: &str = "The first paragraph is here.\n\n\
A second, somewhat longer paragraph follows it.\n\n\
Third.";

pub const FRENCH: &str = "Le premier paragraphe est ici.\n\n\
Un deuxième paragraphe, un peu plus long, le suit.\n\n\
Troisième.";

pub const ARABIC: &str = "هذه هي الفقرة الأولى.\n\n\
تليها فقرة ثانية أطول قليلاً.\n\n\
الثالثة.";
