//! End-to-end build tests against a real toolchain.
//!
//! These tests exercise the whole pipeline: discovery, the parallel compile
//! group, the progress protocol and the final link. They skip gracefully on
//! machines without gcc or clang at the fixed locations.

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};

use solder::builder::{BuilderConfig, ProjectBuilder, SharedLibBuilder};
use solder::command::{CancelToken, Step};
use solder::toolchain::Toolchain;

fn available_toolchain() -> Option<Toolchain> {
    [Toolchain::Gcc, Toolchain::Clang]
        .into_iter()
        .find(|tc| tc.check_env().is_ok())
}

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn make_builder(
    root: &Path,
    toolchain: Toolchain,
    jobs: usize,
) -> (SharedLibBuilder, Arc<Mutex<Vec<(String, f64)>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut builder = SharedLibBuilder::new(
        BuilderConfig {
            project_root: root.to_path_buf(),
            build_dir: root.join("build/obj"),
            toolchain,
            sources: vec![r".*\.(c|cpp)$".to_string()],
            includes: Vec::new(),
            target: root.join("build/lib.so"),
            link_libs: Vec::new(),
        },
        move |label, progress| sink.lock().unwrap().push((label.to_string(), progress)),
    )
    .expect("builder construction failed");
    builder.set_jobs(NonZeroUsize::new(jobs).unwrap());
    (builder, events)
}

#[test]
fn test_mixed_c_cpp_project_builds_shared_library() {
    let Some(toolchain) = available_toolchain() else {
        eprintln!("Skipping test: no native toolchain installed");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    write_file(
        &dir.path().join("src/a.c"),
        "int from_c(void) { return 1; }\n",
    );
    write_file(
        &dir.path().join("src/b.cpp"),
        "extern \"C\" int from_cpp() { return 2; }\n",
    );

    let (builder, events) = make_builder(dir.path(), toolchain, 2);
    let plan = builder.build_project().unwrap();
    assert_eq!(plan.len(), 2);

    fs::create_dir_all(dir.path().join("build/obj")).unwrap();

    let cancel = CancelToken::new();
    for step in &plan {
        match step {
            Step::Group(group) => {
                assert_eq!(group.len(), 2);
                assert_eq!(group.jobs(), 2);
                let failures = group
                    .run(&cancel, false, |done, total, label| {
                        let line = format!("{done}&{total}&{label}");
                        builder.output_processor(&line).unwrap();
                    })
                    .unwrap();
                assert!(failures.is_empty(), "compiles failed: {failures:?}");
            }
            Step::Single(link) => {
                // One C++ source forces the C++ frontend for linking.
                assert_eq!(link.program(), toolchain.cxx());
                assert_eq!(link.status().unwrap(), 0);
            }
        }
    }

    assert!(dir.path().join("build/lib.so").exists());

    // The compile group produced one in-order event per source.
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!((events[0].1 - 0.5).abs() < 1e-9);
    assert!((events[1].1 - 1.0).abs() < 1e-9);
    assert!(events.iter().any(|(label, _)| label.ends_with("a.c")));
    assert!(events.iter().any(|(label, _)| label.ends_with("b.cpp")));
}

#[test]
fn test_object_files_land_in_build_dir_and_decode() {
    let Some(toolchain) = available_toolchain() else {
        eprintln!("Skipping test: no native toolchain installed");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("src/only.c");
    write_file(&source, "int only(void) { return 3; }\n");

    let (builder, _) = make_builder(dir.path(), toolchain, 1);
    let plan = builder.build_project().unwrap();
    fs::create_dir_all(dir.path().join("build/obj")).unwrap();

    let Step::Group(group) = &plan[0] else {
        panic!("first step should be the compile group");
    };
    let failures = group.run(&CancelToken::new(), false, |_, _, _| {}).unwrap();
    assert!(failures.is_empty());

    let objects: Vec<_> = fs::read_dir(dir.path().join("build/obj"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(objects.len(), 1);

    // The object name is a reversible encoding of the source path.
    let decoded = solder::builder::source_from_object_name(&objects[0]).unwrap();
    assert_eq!(decoded, source.canonicalize().unwrap());
}

#[test]
fn test_failed_compile_reports_and_leaves_no_library() {
    let Some(toolchain) = available_toolchain() else {
        eprintln!("Skipping test: no native toolchain installed");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("src/ok.c"), "int ok(void) { return 0; }\n");
    write_file(&dir.path().join("src/broken.c"), "this is not C\n");

    let (builder, _) = make_builder(dir.path(), toolchain, 2);
    let plan = builder.build_project().unwrap();
    fs::create_dir_all(dir.path().join("build/obj")).unwrap();

    let Step::Group(group) = &plan[0] else {
        panic!("first step should be the compile group");
    };
    let failures = group.run(&CancelToken::new(), false, |_, _, _| {}).unwrap();

    // The broken file fails, its sibling still completes, and the caller's
    // policy is to stop before linking.
    assert_eq!(failures.len(), 1);
    assert!(failures[0].label.ends_with("broken.c"));
    assert!(!dir.path().join("build/lib.so").exists());
}
