use farmdyn_qm::core::batch::{discover, find, DescriptorRewriter, DirectiveSet, COMPILATION_BATCH};
use farmdyn_qm::core::error::QmError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn rewriter(output_dir: &Path) -> DescriptorRewriter {
    DescriptorRewriter::new(output_dir.to_path_buf(), "GUROBI", "CPLEX")
}

#[test]
fn test_rewrite_points_output_dir_and_swaps_backend() {
    let temp = TempDir::new().unwrap();
    let descriptor = temp.path().join("batch_test_dairy.txt");
    fs::write(
        &descriptor,
        "* dairy farm tests\r\n\
         output dir = C:\\Users\\someone\\FarmDyn\\output\r\n\
         Solver = Gurobi\r\n\
         MIP solver = GUROBI\r\n\
         Scenario description = base = 1\r\n",
    )
    .unwrap();

    let output_dir = temp.path().join("qmTemp");
    let returned = rewriter(&output_dir)
        .rewrite_output_dir(&descriptor)
        .unwrap();
    assert_eq!(returned, output_dir);

    let content = fs::read_to_string(&descriptor).unwrap();
    assert_eq!(
        content,
        format!(
            "* dairy farm tests\r\n\
             output dir = {}\r\n\
             Solver = CPLEX\r\n\
             MIP solver = GUROBI\r\n\
             Scenario description = base = 1\r\n",
            output_dir.display()
        )
    );
}

#[test]
fn test_rewrite_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let descriptor = temp.path().join("batch_test_dairy.txt");
    fs::write(&descriptor, "output dir=/tmp/x\nSolver = GUROBI\n").unwrap();

    let rewriter = rewriter(&temp.path().join("out"));
    rewriter.rewrite_output_dir(&descriptor).unwrap();
    let first = fs::read_to_string(&descriptor).unwrap();
    rewriter.rewrite_output_dir(&descriptor).unwrap();
    let second = fs::read_to_string(&descriptor).unwrap();
    assert_eq!(second, first);
    assert_eq!(DirectiveSet::parse(&second).len(), 2);
    assert!(DirectiveSet::parse("").is_empty());
}

#[test]
fn test_every_output_dir_directive_is_rewritten() {
    let temp = TempDir::new().unwrap();
    let descriptor = temp.path().join("batch_test_dairy.txt");
    fs::write(&descriptor, "output dir = a\noutput dir = b\n").unwrap();

    rewriter(Path::new("/qm/out"))
        .rewrite_output_dir(&descriptor)
        .unwrap();
    assert_eq!(
        fs::read_to_string(&descriptor).unwrap(),
        "output dir = /qm/out\noutput dir = /qm/out\n"
    );
}

#[test]
fn test_missing_output_dir_leaves_file_untouched() {
    let temp = TempDir::new().unwrap();
    let descriptor = temp.path().join("batch_test_dairy.txt");
    fs::write(&descriptor, "Solver = GUROBI\n").unwrap();

    let err = rewriter(&temp.path().join("out"))
        .rewrite_output_dir(&descriptor)
        .unwrap_err();
    assert!(matches!(err, QmError::MissingOutputDir(path) if path == descriptor));
    assert_eq!(fs::read_to_string(&descriptor).unwrap(), "Solver = GUROBI\n");
}

#[test]
fn test_directive_set_keeps_untouched_lines_verbatim() {
    let content = "  Solver   =  CPLEX \n# comment without assignment\n\nlast = 1";
    let directives = DirectiveSet::parse(content);
    assert_eq!(directives.get("Solver"), Some("CPLEX"));
    assert_eq!(directives.get("missing"), None);
    assert_eq!(directives.serialize(), content);
}

#[test]
fn test_discover_excludes_compilation_batch_and_sorts() {
    let temp = TempDir::new().unwrap();
    for name in [
        "batch_test_pigs.txt",
        "batch_test_compilation.txt",
        "batch_test_dairy.txt",
        "batch_other.txt",
        "batch_test_dairy.bak",
    ] {
        fs::write(temp.path().join(name), "output dir = x\n").unwrap();
    }
    fs::create_dir(temp.path().join("batch_test_folder.txt")).unwrap();

    let batches = discover(temp.path(), "batch_test_*.txt", &[]).unwrap();
    let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["batch_test_dairy", "batch_test_pigs"]);
}

#[test]
fn test_custom_exclusions_keep_compilation_batch_out() {
    let temp = TempDir::new().unwrap();
    for name in [
        "batch_test_compilation.txt",
        "batch_test_slow.txt",
        "batch_test_dairy.txt",
    ] {
        fs::write(temp.path().join(name), "output dir = x\n").unwrap();
    }

    let batches = discover(
        temp.path(),
        "batch_test_*.txt",
        &["batch_test_slow.txt".to_string()],
    )
    .unwrap();
    let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["batch_test_dairy"]);

    // naming the compilation test explicitly still works
    let compilation = find(temp.path(), "batch_test_*.txt", "batch_test_compilation").unwrap();
    assert_eq!(compilation.file_name, COMPILATION_BATCH);
}

#[test]
fn test_find_accepts_name_or_file_name() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("batch_test_dairy.txt"), "").unwrap();

    let by_name = find(temp.path(), "batch_test_*.txt", "batch_test_dairy").unwrap();
    let by_file = find(temp.path(), "batch_test_*.txt", "batch_test_dairy.txt").unwrap();
    assert_eq!(by_name, by_file);
    assert!(find(temp.path(), "batch_test_*.txt", "batch_test_pigs").is_err());
}
