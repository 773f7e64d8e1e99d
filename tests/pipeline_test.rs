//! End-to-end tests for job orchestration.

mod common;

use std::time::Duration;

use bifold::{
    Error, ErrorKind, FormatConfig, InputFile, JobStage, LayoutMode, Margins, Orchestrator,
    OutputFormat,
};
use common::{build_docx, heading, para, ARABIC, ENGLISH, FRENCH};

fn text(name: &str, body: &str) -> InputFile {
    InputFile::new(name, body.as_bytes().to_vec())
}

fn wait(orchestrator: &Orchestrator, id: bifold::JobId) -> bifold::JobStatus {
    orchestrator
        .wait(id, Some(Duration::from_secs(60)))
        .unwrap()
}

#[test]
fn test_docx_inputs_to_every_format() {
    let first = build_docx(&[
        heading(1, "Introduction"),
        para("The first paragraph is here."),
        para("A second paragraph follows."),
    ]);
    let second = build_docx(&[
        heading(1, "Introduction"),
        para("Le premier paragraphe est ici."),
        para("Un deuxième paragraphe suit."),
    ]);
    let orchestrator = Orchestrator::default();

    for format in OutputFormat::all() {
        let result = orchestrator
            .run(
                InputFile::new("en.docx", first.clone()),
                InputFile::new("fr.docx", second.clone()),
                format,
                FormatConfig::default(),
            )
            .unwrap();
        assert_eq!(result.filename, format!("bilingual_output.{}", format.extension()));
        assert_eq!(result.mime_type, format.mime_type());
        assert_eq!(result.size_bytes, result.data.len());
        assert!(result.size_bytes > 0);
        assert!(result.page_count >= 1);
    }
}

#[test]
fn test_preview_matches_alignment() {
    let orchestrator = Orchestrator::default();
    let id = orchestrator
        .submit_job(
            text("en.txt", ENGLISH),
            text("fr.txt", FRENCH),
            OutputFormat::Docx,
            FormatConfig::default(),
        )
        .unwrap();
    let status = wait(&orchestrator, id);
    assert_eq!(status.stage, JobStage::Completed);

    let preview = orchestrator.get_preview(id).unwrap();
    assert_eq!(preview.len(), 3);
    assert_eq!(preview[2].text1.as_deref(), Some("Third."));
    assert_eq!(preview[2].text2.as_deref(), Some("Troisième."));
    assert!(preview.iter().all(|p| p.text1.is_some() && p.text2.is_some()));
}

#[test]
fn test_empty_first_document_stops_at_loading() {
    let orchestrator = Orchestrator::default();
    let id = orchestrator
        .submit_job(
            InputFile::new("empty.txt", Vec::new()),
            text("fr.txt", FRENCH),
            OutputFormat::Pdf,
            FormatConfig::default(),
        )
        .unwrap();
    let status = wait(&orchestrator, id);

    assert_eq!(status.stage, JobStage::Failed);
    assert_eq!(
        status.history,
        vec![JobStage::Submitted, JobStage::Loading, JobStage::Failed]
    );
    let error = status.error.unwrap();
    assert_eq!(error.kind, ErrorKind::EmptyDocument);
    assert_eq!(error.stage, JobStage::Loading);

    assert!(matches!(
        orchestrator.get_preview(id),
        Err(Error::NotReady { .. })
    ));
    match orchestrator.get_result(id) {
        Err(Error::JobFailed { kind, stage, .. }) => {
            assert_eq!(kind, ErrorKind::EmptyDocument);
            assert_eq!(stage, JobStage::Loading);
        }
        other => panic!("expected a failed job, got {:?}", other.map(|r| r.filename)),
    }
}

#[test]
fn test_whitespace_only_document_is_empty() {
    let orchestrator = Orchestrator::default();
    let result = orchestrator.run(
        text("blank.txt", "  \n\n\t\n"),
        text("fr.txt", FRENCH),
        OutputFormat::Html,
        FormatConfig::default(),
    );
    assert!(matches!(
        result,
        Err(Error::JobFailed {
            kind: ErrorKind::EmptyDocument,
            ..
        })
    ));
}

#[test]
fn test_unknown_container_is_unsupported() {
    let orchestrator = Orchestrator::default();
    let result = orchestrator.run(
        InputFile::new("notes.xyz", b"\x00\x01binary".to_vec()),
        text("fr.txt", FRENCH),
        OutputFormat::Html,
        FormatConfig::default(),
    );
    assert!(matches!(
        result,
        Err(Error::JobFailed {
            kind: ErrorKind::UnsupportedFormat,
            stage: JobStage::Loading,
            ..
        })
    ));
}

#[test]
fn test_epub_with_explicit_margins_produces_nothing() {
    let orchestrator = Orchestrator::default();
    let id = orchestrator
        .submit_job(
            text("en.txt", ENGLISH),
            text("fr.txt", FRENCH),
            OutputFormat::Epub,
            FormatConfig::new().with_margins(Margins::uniform(2.0)),
        )
        .unwrap();
    let status = wait(&orchestrator, id);

    let error = status.error.unwrap();
    assert_eq!(error.kind, ErrorKind::EncodingUnsupportedFeature);
    assert_eq!(error.stage, JobStage::Encoding);
    assert!(orchestrator.get_result(id).is_err());
}

#[test]
fn test_pdf_rejects_right_to_left_text() {
    let orchestrator = Orchestrator::default();
    let pdf = orchestrator.run(
        text("en.txt", ENGLISH),
        text("ar.txt", ARABIC),
        OutputFormat::Pdf,
        FormatConfig::default(),
    );
    assert!(matches!(
        pdf,
        Err(Error::JobFailed {
            kind: ErrorKind::EncodingUnsupportedFeature,
            stage: JobStage::Encoding,
            ..
        })
    ));

    // the same pair is fine for containers with a direction marker
    let html = orchestrator
        .run(
            text("en.txt", ENGLISH),
            text("ar.txt", ARABIC),
            OutputFormat::Html,
            FormatConfig::default(),
        )
        .unwrap();
    let html = String::from_utf8(html.data).unwrap();
    assert!(html.contains(r#"dir="rtl""#));
}

#[test]
fn test_generated_epub_is_accepted_as_input() {
    let orchestrator = Orchestrator::default();
    let config = FormatConfig::new().with_layout_mode(LayoutMode::Interleaved);
    let epub = orchestrator
        .run(
            text("en.txt", ENGLISH),
            text("fr.txt", FRENCH),
            OutputFormat::Epub,
            config,
        )
        .unwrap();

    let html = orchestrator
        .run(
            InputFile::new("bilingual.epub", epub.data),
            text("en.txt", ENGLISH),
            OutputFormat::Html,
            FormatConfig::default(),
        )
        .unwrap();
    assert!(html.size_bytes > 0);
}

#[test]
fn test_concurrent_jobs_are_independent() {
    let orchestrator = Orchestrator::default();
    let ids: Vec<_> = OutputFormat::all()
        .into_iter()
        .map(|format| {
            orchestrator
                .submit_job(
                    text("en.txt", ENGLISH),
                    text("fr.txt", FRENCH),
                    format,
                    FormatConfig::default(),
                )
                .unwrap()
        })
        .collect();

    for (id, format) in ids.iter().zip(OutputFormat::all()) {
        let status = wait(&orchestrator, *id);
        assert_eq!(status.stage, JobStage::Completed, "{}", format);
        assert_eq!(status.format, format);
    }
    assert_eq!(orchestrator.job_ids().len(), 4);
    assert!(orchestrator.remove_job(ids[0]));
    assert!(matches!(
        orchestrator.get_status(ids[0]),
        Err(Error::JobNotFound(_))
    ));

    for (id, format) in ids.iter().zip(OutputFormat::all()).skip(1) {
        assert_eq!(orchestrator.get_result(*id).unwrap().format, format);
    }
    assert!(orchestrator.job_ids().is_empty());
}

#[test]
fn test_status_serializes_for_clients() {
    let orchestrator = Orchestrator::default();
    let id = orchestrator
        .submit_job(
            text("en.txt", ENGLISH),
            text("fr.txt", FRENCH),
            OutputFormat::Html,
            FormatConfig::default(),
        )
        .unwrap();
    let status = wait(&orchestrator, id);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["stage"], "completed");
    assert_eq!(json["progressPercent"], 100);
    assert_eq!(json["format"], "html");
    assert_eq!(json["id"], id.to_string());
    assert!(json.get("error").is_none());
}
