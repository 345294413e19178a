// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const SAMPLE: &str = "\
# managed services
https://github.com/acme/worker.git

   https://github.com/acme/api.git   release
git@github.com:acme/api.git main api-canary
   # indented comment
";

#[test]
fn parses_sample_in_order() {
    let parsed = parse(SAMPLE);
    assert!(parsed.errors.is_empty());
    assert!(parsed.warnings.is_empty());
    assert_eq!(
        parsed.services,
        vec![
            ServiceDescriptor::new("https://github.com/acme/worker.git"),
            ServiceDescriptor::new("https://github.com/acme/api.git").with_branch("release"),
            ServiceDescriptor::new("git@github.com:acme/api.git").with_directory_name("api-canary"),
        ]
    );
}

#[yare::parameterized(
    empty          = { "" },
    blank_lines    = { "\n  \n\t\n" },
    only_comments  = { "# a\n#b\n  # c" },
)]
fn no_services(text: &str) {
    let parsed = parse(text);
    assert!(parsed.services.is_empty());
    assert!(parsed.errors.is_empty());
}

#[test]
fn extra_fields_are_ignored_with_warning() {
    let parsed = parse("https://x/a.git dev a-dir extra more\n");
    assert_eq!(parsed.services.len(), 1);
    assert_eq!(parsed.services[0].directory_name, "a-dir");
    assert_eq!(
        parsed.warnings,
        vec![LineWarning { line: 1, ignored: vec!["extra".to_string(), "more".to_string()] }]
    );
}

#[yare::parameterized(
    parent   = { "https://x/a.git main ..",     ".." },
    nested   = { "https://x/a.git main a/b",    "a/b" },
    absolute = { "https://x/a.git main /etc",   "/etc" },
)]
fn rejects_escaping_directories(line: &str, name: &str) {
    let parsed = parse(&format!("https://x/ok.git\n{line}\n"));
    assert_eq!(parsed.services.len(), 1);
    assert_eq!(
        parsed.errors,
        vec![LineError::InvalidDirectory { line: 2, name: name.to_string() }]
    );
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.txt");
    assert!(matches!(load(&path), Err(ServicesFileError::NotFound(p)) if p == path));
}

#[test]
fn load_directory_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load(dir.path()), Err(ServicesFileError::Read(..))));
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.txt");
    std::fs::write(&path, SAMPLE).unwrap();
    assert_eq!(load(&path).unwrap().services.len(), 3);
}
