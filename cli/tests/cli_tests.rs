//! Smoke tests for the `sparql-proto` binary. The `compile` subcommand is
//! fully offline, so everything here runs without a SPARQL endpoint.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_document(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(json.as_bytes()).expect("write temp file");
    file
}

#[test]
fn compile_prints_sparql_to_stdout() {
    let doc = write_document(
        r#"{
            "proto": {"id": "?id", "name": "$foaf:name"},
            "$prefixes": {"foaf": "http://xmlns.com/foaf/0.1/"},
            "$limit": 5
        }"#,
    );

    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg(doc.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PREFIX foaf: <http://xmlns.com/foaf/0.1/>"))
        .stdout(predicate::str::contains("SELECT DISTINCT ?id ?v0"))
        .stdout(predicate::str::contains("?id foaf:name ?v0"))
        .stdout(predicate::str::contains("LIMIT 5"));
}

#[test]
fn compile_writes_to_output_file() {
    let doc = write_document(r#"{"proto": {"id": "?id"}}"#);
    let out = NamedTempFile::new().unwrap();

    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg(doc.path())
        .arg("--output")
        .arg(out.path())
        .assert()
        .success();

    let written = std::fs::read_to_string(out.path()).unwrap();
    assert!(written.contains("SELECT DISTINCT ?id"));
}

#[test]
fn missing_input_file_fails_with_context() {
    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg("/nonexistent/query.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn non_object_document_fails() {
    let doc = write_document("[1, 2, 3]");

    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg(doc.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[test]
fn document_without_prototype_fails() {
    let doc = write_document(r#"{"$limit": 3}"#);

    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg(doc.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("prototype"));
}

#[test]
fn bestlang_without_language_reports_compile_error() {
    let doc = write_document(r#"{"proto": {"id": "?id", "label": "$rdfs:label$bestlang"}}"#);

    Command::cargo_bin("sparql-proto")
        .unwrap()
        .arg("compile")
        .arg(doc.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("bestlang"));
}
