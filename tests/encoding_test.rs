//! Integration tests for layout composition and the output encoders.

mod common;

use bifold::encode::{self, encoder_for};
use bifold::{
    load_bytes, Bifold, BlockKind, Error, FormatConfig, Language, LayoutMode, LoadOptions,
    LoaderRegistry, Margins, Normalizer, OutputFormat, SourceDocument,
};
use common::{build_docx, heading, para, ENGLISH, FRENCH};

fn aligned(first: &str, second: &str) -> bifold::AlignedDocuments {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.md");
    let b = dir.path().join("b.md");
    std::fs::write(&a, first).unwrap();
    std::fs::write(&b, second).unwrap();
    Bifold::new().align(&a, &b).unwrap()
}

fn reload(name: &str, data: Vec<u8>) -> Vec<BlockKind> {
    let loaded = LoaderRegistry::with_defaults()
        .load(&SourceDocument::new(name, data), &LoadOptions::default())
        .unwrap();
    let doc = Normalizer::default().normalize(loaded).unwrap();
    doc.blocks.iter().map(|b| b.kind).collect()
}

const GUIDE_EN: &str = "# Guide\n\nStart here.\n\n- Step one\n- Step two\n\n## Details\n\nMore text.\n";
const GUIDE_FR: &str = "# Guide\n\nCommencez ici.\n\n- Étape un\n- Étape deux\n\n## Détails\n\nPlus de texte.\n";

#[test]
fn test_docx_round_trip_kinds() {
    let aligned = aligned(GUIDE_EN, GUIDE_FR);
    for mode in [LayoutMode::SideBySide, LayoutMode::Interleaved] {
        let config = FormatConfig::new().with_layout_mode(mode);
        let tree = aligned.compose(&config).unwrap();
        let encoded = encode::encode(&tree, &config, OutputFormat::Docx).unwrap();

        assert_eq!(reload("out.docx", encoded.data), tree.implied_kinds(), "{}", mode);
    }
}

#[test]
fn test_epub_round_trip_kinds() {
    let aligned = aligned(GUIDE_EN, GUIDE_FR);
    let config = FormatConfig::new().with_layout_mode(LayoutMode::Interleaved);
    let tree = aligned.compose(&config).unwrap();
    let encoded = encode::encode(&tree, &config, OutputFormat::Epub).unwrap();

    assert_eq!(reload("out.epub", encoded.data), tree.implied_kinds());
}

#[test]
fn test_interleaved_order_follows_primary_language() {
    let aligned = aligned("First.\n", "Premier.\n");
    let config = FormatConfig::new()
        .with_layout_mode(LayoutMode::Interleaved)
        .with_primary_language(Language::Second);
    let tree = aligned.compose(&config).unwrap();

    let texts: Vec<String> = tree.cells().iter().map(|c| c.plain_text()).collect();
    assert_eq!(texts, vec!["Premier.", "First."]);
}

#[test]
fn test_pagination_is_deterministic() {
    let long_en: String = (0..80)
        .map(|i| format!("Paragraph {} of a long English text that wraps across lines.\n\n", i))
        .collect();
    let long_fr: String = (0..80)
        .map(|i| format!("Paragraphe {} d'un long texte français qui passe à la ligne.\n\n", i))
        .collect();
    let aligned = aligned(&long_en, &long_fr);
    let config = FormatConfig::default();

    let first = aligned.compose(&config).unwrap();
    let second = aligned.compose(&config).unwrap();
    assert!(first.page_count() > 1);
    assert_eq!(first.pages, second.pages);
    assert_eq!(first.page_count(), second.page_count());
}

#[test]
fn test_epub_rejects_explicit_margins() {
    let aligned = aligned(GUIDE_EN, GUIDE_FR);
    let config = FormatConfig::new().with_margins(Margins::uniform(1.5));
    let tree = aligned.compose(&config).unwrap();

    let result = encoder_for(OutputFormat::Epub).encode(&tree, &config);
    assert!(matches!(result, Err(Error::EncodingUnsupportedFeature(_))));

    // paged formats honour the same configuration
    let docx = encode::encode(&tree, &config, OutputFormat::Docx).unwrap();
    assert!(!docx.data.is_empty());
}

#[test]
fn test_pdf_rejects_glyphs_outside_win_ansi() {
    let aligned = aligned("Hello world.\n", "你好，世界。\n");
    let config = FormatConfig::default();
    let tree = aligned.compose(&config).unwrap();

    assert!(matches!(
        encode::encode(&tree, &config, OutputFormat::Pdf),
        Err(Error::EncodingUnsupportedFeature(_))
    ));
    assert!(encode::encode(&tree, &config, OutputFormat::Html).is_ok());
}

#[test]
fn test_pdf_page_count_matches_document() {
    let a = load_bytes(
        "en.docx",
        build_docx(&[heading(1, "Report"), para("Quarterly figures are attached.")]),
    )
    .unwrap();
    let b = load_bytes(
        "fr.docx",
        build_docx(&[heading(1, "Rapport"), para("Les chiffres trimestriels sont joints.")]),
    )
    .unwrap();
    let units = bifold::align_documents(&a, &b).unwrap();
    let config = FormatConfig::default();
    let tree = bifold::Composer::new(config.clone())
        .compose(&units, &a, &b)
        .unwrap();
    let encoded = encode::encode(&tree, &config, OutputFormat::Pdf).unwrap();

    let pdf = lopdf::Document::load_mem(&encoded.data).unwrap();
    assert_eq!(pdf.get_pages().len(), encoded.page_count);
    assert_eq!(encoded.page_count, 1);
}

#[test]
fn test_html_is_single_file() {
    let a = load_bytes("en.txt", ENGLISH.as_bytes().to_vec()).unwrap();
    let b = load_bytes("fr.txt", FRENCH.as_bytes().to_vec()).unwrap();
    let units = bifold::align_documents(&a, &b).unwrap();
    let config = FormatConfig::new().with_title("Parallel text");
    let tree = bifold::Composer::new(config.clone())
        .compose(&units, &a, &b)
        .unwrap();
    let encoded = encode::encode(&tree, &config, OutputFormat::Html).unwrap();
    let html = String::from_utf8(encoded.data).unwrap();

    assert!(html.contains("<title>Parallel text</title>"));
    assert!(html.contains("Troisième."));
    assert!(!html.contains("src=\"images/"));
}
