use sample_builder::{
    check_no_identical_build_files, clean_samples, prepare_samples, sample_fingerprints,
    GeneratorOptions,
};
use std::path::Path;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn prepare_check_and_clean() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("samples.toml"),
        r#"
[[sample]]
name = "small"
template_dir = "templates/java"
projects = 3
source_files = 2

[[sample]]
name = "shared"
template_dir = "templates/plain"
projects = 2
"#,
    );
    write(
        &root.join("templates/java/build.gradle"),
        "rootProject.name = '${projectName}'\n",
    );
    write(
        &root.join("templates/java/src/Source${sourceIndex}.java"),
        "class Source${sourceIndex} {}\n",
    );
    write(&root.join("templates/plain/build.gradle"), "apply plugin: 'java'\n");

    let options = GeneratorOptions::default()
        .samples_file(root.join("samples.toml"))
        .out_dir(root.join("out"));

    let fingerprints = prepare_samples(&options).unwrap();
    assert_eq!(
        vec!["shared", "small"],
        fingerprints.keys().map(String::as_str).collect::<Vec<_>>()
    );
    assert_eq!(fingerprints, sample_fingerprints(&options).unwrap());
    assert!(root.join("out/small/project-3/src/Source2.java").exists());

    // The "shared" template has no per-project content so its build files collide.
    let duplicates = check_no_identical_build_files(&options.out_dir, ".gradle").unwrap();
    pretty_assertions::assert_eq!(
        vec![vec![
            root.join("out/shared/project-1/build.gradle"),
            root.join("out/shared/project-2/build.gradle"),
        ]],
        duplicates
    );

    clean_samples(&options).unwrap();
    assert!(!options.out_dir.exists());
    clean_samples(&options).unwrap();
}
