//! Integration tests for loading and alignment.

mod common;

use bifold::model::is_monotone_cover;
use bifold::{
    align_documents, load_bytes, AlignMethod, AlignOptions, Aligner, AlignmentStats, Error,
    InputFormat, JsonFormat,
};
use common::{build_docx, heading, para, ENGLISH, FRENCH};

#[test]
fn test_three_matching_paragraphs() {
    let a = load_bytes("en.txt", ENGLISH.as_bytes().to_vec()).unwrap();
    let b = load_bytes("fr.txt", FRENCH.as_bytes().to_vec()).unwrap();
    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 3);

    let units = align_documents(&a, &b).unwrap();
    assert_eq!(units.len(), 3);
    for (i, unit) in units.iter().enumerate() {
        assert!(matches!(
            unit.method(),
            AlignMethod::Exact | AlignMethod::Structural
        ));
        assert_eq!(unit.left().map(|r| r.index()), Some(i));
        assert_eq!(unit.right().map(|r| r.index()), Some(i));
    }
    assert!(is_monotone_cover(&units, 3, 3));
}

#[test]
fn test_sentence_starting_with_keyword_stays_paragraph() {
    let a = load_bytes(
        "en.txt",
        b"Part of the day was spent reading by the window.\n\n\
The afternoon was quiet and grey.\n\n\
Evening came early."
            .to_vec(),
    )
    .unwrap();
    let b = load_bytes(
        "fr.txt",
        "Une partie de la journée fut passée à lire près de la fenêtre.\n\n\
L'après-midi était calme et gris.\n\n\
Le soir tomba tôt."
            .as_bytes()
            .to_vec(),
    )
    .unwrap();
    assert!(a.blocks.iter().all(|b| !b.kind.is_heading()));

    let units = align_documents(&a, &b).unwrap();
    assert_eq!(units.len(), 3);
    assert!(units.iter().all(|u| u.method() != AlignMethod::Unmatched));
}

#[test]
fn test_extra_heading_left_only() {
    let a = load_bytes(
        "en.md",
        b"Opening paragraph with some words.\n\n## Extra heading\n\n\
Middle paragraph with some words.\n\nClosing paragraph with some words.\n"
            .to_vec(),
    )
    .unwrap();
    let b = load_bytes(
        "fr.md",
        "Paragraphe d'ouverture avec des mots.\n\nParagraphe du milieu avec des mots.\n\n\
Paragraphe de clôture avec des mots.\n"
            .as_bytes()
            .to_vec(),
    )
    .unwrap();
    assert_eq!(a.metadata.format, Some(InputFormat::Markdown));

    let units = align_documents(&a, &b).unwrap();
    let unmatched: Vec<_> = units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.method() == AlignMethod::Unmatched)
        .collect();
    assert_eq!(unmatched.len(), 1);
    let (position, unit) = unmatched[0];
    assert_eq!(position, 1);
    assert_eq!(unit.left().map(|r| r.index()), Some(1));
    assert!(unit.right().is_none());
    assert!(is_monotone_cover(&units, a.len(), b.len()));
}

#[test]
fn test_docx_pair_alignment() {
    let a = load_bytes(
        "en.docx",
        build_docx(&[
            heading(1, "Chapter One"),
            para("It was a bright cold day in April."),
            heading(1, "Chapter Two"),
            para("The hallway smelt of boiled cabbage."),
        ]),
    )
    .unwrap();
    let b = load_bytes(
        "fr.docx",
        build_docx(&[
            heading(1, "Chapitre un"),
            para("C'était une journée d'avril froide et claire."),
            heading(1, "Chapitre deux"),
            para("Le hall sentait le chou cuit."),
        ]),
    )
    .unwrap();
    assert_eq!(a.metadata.format, Some(InputFormat::Docx));
    assert!(a.blocks[0].kind.is_heading());

    let units = align_documents(&a, &b).unwrap();
    assert_eq!(units.len(), 4);
    assert!(units.iter().all(|u| u.is_pair()));

    let stats = AlignmentStats::compute(&units);
    assert_eq!(stats.unit_count, 4);
    assert_eq!(stats.pair_count(), 4);
    assert_eq!(stats.unmatched_count(), 0);
}

#[test]
fn test_alignment_always_covers_both_documents() {
    let paragraphs: Vec<String> = (0..12)
        .map(|i| format!("Paragraph number {} has {} words in it.", i, i + 5))
        .collect();
    let aligner = Aligner::new(AlignOptions::default());

    for dropped in 0..paragraphs.len() {
        let a_text = paragraphs.join("\n\n");
        let b_text = paragraphs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != dropped && *i % 5 != 4)
            .map(|(_, p)| p.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let a = load_bytes("a.txt", a_text.into_bytes()).unwrap();
        let b = load_bytes("b.txt", b_text.into_bytes()).unwrap();

        let units = aligner.align(&a, &b).unwrap();
        assert!(
            is_monotone_cover(&units, a.len(), b.len()),
            "dropping paragraph {}",
            dropped
        );
        assert!(units.len() >= a.len().max(b.len()));
        assert!(units.len() <= a.len() + b.len());
    }
}

#[test]
fn test_alignment_json_export() {
    let a = load_bytes("en.txt", ENGLISH.as_bytes().to_vec()).unwrap();
    let b = load_bytes("fr.txt", FRENCH.as_bytes().to_vec()).unwrap();
    let units = align_documents(&a, &b).unwrap();

    let json = bifold::align::to_json(&units, &a, &b, JsonFormat::Compact).unwrap();
    assert!(!json.contains('\n'));
    assert!(json.contains("Troisième."));
    assert!(json.contains("structural") || json.contains("exact"));
}

#[test]
fn test_empty_input_rejected() {
    assert!(matches!(
        load_bytes("empty.md", Vec::new()),
        Err(Error::EmptyDocument)
    ));
}
