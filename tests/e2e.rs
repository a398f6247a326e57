//! End-to-end integration tests for resume-parser.
//!
//! These tests make live LLM API calls and, for the PDF cases, need
//! libpdfium plus sample resumes in `./test_cases/`. They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested. Keys and chains come from the environment (or
//! `.env`) exactly as they would for the CLI.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_parse_plain_text -- --nocapture

use resume_parser::{
    OcrPreference, ParseOptions, ParseRequest, ParserConfig, PipelineResult, ResumeParser,
    UsageStep,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn parser() -> ResumeParser {
    ResumeParser::from_env().expect("provider keys for the configured chains")
}

/// Persist the result next to the fixtures for manual inspection.
fn save(result: &PipelineResult, name: &str) {
    let path = output_dir().join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(result).expect("serialisable result");
    std::fs::write(&path, json).ok();
    println!("[{name}] saved → {}", path.display());
}

/// Assert the run produced a plausible resume.
fn assert_resume(result: &PipelineResult, expected_name: &str, context: &str) {
    assert!(
        result.success,
        "[{context}] parse failed: {:?}",
        result.error
    );
    let data = result.data.as_ref().expect("data on success");
    assert!(
        data.personal_info
            .name
            .to_lowercase()
            .contains(&expected_name.to_lowercase()),
        "[{context}] unexpected name: {:?}",
        data.personal_info.name
    );
    assert!(
        result
            .metadata
            .usage
            .iter()
            .any(|u| u.step == UsageStep::Parse && u.output_tokens > 0),
        "[{context}] expected a successful parse call in usage"
    );
    println!(
        "[{context}] ✓  {} jobs, {} skills, {} in / {} out tokens, {}ms",
        data.experience.len(),
        data.skills.len(),
        result.metadata.total_input_tokens(),
        result.metadata.total_output_tokens(),
        result.metadata.processing_time_ms,
    );
}

const SAMPLE_RESUME: &str = "\
Maria Gonzalez
Senior Backend Engineer | Barcelona, Spain
maria.gonzalez@example.com | +34 600 123 456 | github.com/mgonzalez

EXPERIENCE
Senior Backend Engineer, Glovo (Barcelona) | Mar 2021 - Present
- Led migration of order routing from Python to Rust, cutting p99 latency by 60%
- Mentored four engineers and ran the backend guild

Software Engineer, Typeform (Barcelona) | Sep 2017 - Feb 2021
- Built the webhooks delivery service handling 20M events per day

EDUCATION
BSc Computer Science, Universitat Politecnica de Catalunya, 2013 - 2017

SKILLS
Rust, Python, PostgreSQL, Kafka, Kubernetes

LANGUAGES
Spanish (native), English (C1), Catalan (native)
";

// ── Text resumes (LLM only, no pdfium) ───────────────────────────────────────

#[tokio::test]
async fn test_parse_plain_text() {
    e2e_skip_unless_enabled!();

    let request = ParseRequest::new(SAMPLE_RESUME.as_bytes().to_vec(), "text/plain", "maria.txt");
    let result = parser().parse(request).await.expect("request accepted");

    save(&result, "plain_text");
    assert_resume(&result, "Maria Gonzalez", "plain_text");
    assert_eq!(result.metadata.extraction_method, "algorithmic");
    assert!(!result.metadata.ocr_used);

    let data = result.data.unwrap();
    assert!(data.experience.len() >= 2, "both positions expected");
    assert!(data.skills.iter().any(|s| s.skill.eq_ignore_ascii_case("rust")));
}

#[tokio::test]
async fn test_parse_with_skip_preference() {
    e2e_skip_unless_enabled!();

    let request = ParseRequest::new(SAMPLE_RESUME.as_bytes().to_vec(), "text/plain", "maria.txt")
        .with_ocr(OcrPreference::Skip);
    let result = parser().parse(request).await.expect("request accepted");

    assert_resume(&result, "Maria", "skip_preference");
    assert!(result
        .metadata
        .usage
        .iter()
        .all(|u| u.step == UsageStep::Parse));
}

#[tokio::test]
async fn test_result_is_json_serialisable() {
    e2e_skip_unless_enabled!();

    let request = ParseRequest::new(SAMPLE_RESUME.as_bytes().to_vec(), "text/plain", "maria.txt");
    let result = parser().parse(request).await.expect("request accepted");

    let json = serde_json::to_value(&result).expect("serialisable");
    assert!(json["metadata"]["usage"].is_array());
    assert_eq!(json["success"], result.success);
}

#[tokio::test]
async fn test_missing_key_is_rejected_up_front() {
    e2e_skip_unless_enabled!();

    let mut config = ParserConfig::builder()
        .parse_models("anthropic/claude-3-haiku-20240307")
        .ocr_models("none")
        .build()
        .expect("valid config");
    config.providers.anthropic_api_key = None;

    assert!(ResumeParser::new(config).is_err());
}

// ── Document resumes (need pdfium and fixtures) ──────────────────────────────

#[tokio::test]
async fn test_parse_text_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_text.pdf"));

    let result = parser()
        .parse_file(&path, ParseOptions::default())
        .await
        .expect("request accepted");

    save(&result, "resume_text_pdf");
    assert!(result.success, "{:?}", result.error);
    assert!(result.metadata.pages >= 1);
}

#[tokio::test]
async fn test_parse_scanned_pdf_uses_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume_scanned.pdf"));

    let result = parser()
        .parse_file(&path, ParseOptions::default())
        .await
        .expect("request accepted");

    save(&result, "resume_scanned_pdf");
    assert!(result.success, "{:?}", result.error);
    assert!(result.metadata.ocr_used, "scanned resume should take the OCR path");
    assert_eq!(result.metadata.extraction_method, "ocr");
    assert_eq!(result.metadata.usage[0].step, UsageStep::Ocr);
}

#[tokio::test]
async fn test_parse_docx() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.docx"));

    let result = parser()
        .parse_file(&path, ParseOptions::default())
        .await
        .expect("request accepted");

    save(&result, "resume_docx");
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.metadata.extraction_method, "algorithmic");
}

#[tokio::test]
async fn test_parse_image_forced_ocr() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.png"));

    let options = ParseOptions {
        ocr: Some(OcrPreference::Force),
        ..ParseOptions::default()
    };
    let result = parser()
        .parse_file(&path, options)
        .await
        .expect("request accepted");

    save(&result, "resume_png");
    assert!(result.success, "{:?}", result.error);
    assert!(result.metadata.ocr_used);
}
