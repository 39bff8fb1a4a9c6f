//! End-to-end updates over fixture projects.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tf_patcher::lock::LockError;
use tf_patcher::manifest::{
    load_from_str, Dependency, DependencyFile, FileRole, ManifestFormat, RequirementRecord,
    SourceDescriptor,
};
use tf_patcher::update::{compute_updated_files, single_dependency, FileUpdater, UpdateError};
use tf_patcher::LockRunner;

fn load_fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|err| panic!("failed to load fixture {name}: {err}"))
}

/// Writes a lock whose provider version is read from the sandboxed main.tf.
struct FakeTerraform {
    sources: RefCell<Vec<String>>,
}

impl FakeTerraform {
    fn new() -> Self {
        Self {
            sources: RefCell::new(Vec::new()),
        }
    }
}

impl LockRunner for FakeTerraform {
    fn lock_providers(&self, workdir: &Path, provider_source: &str) -> Result<(), LockError> {
        self.sources.borrow_mut().push(provider_source.to_string());
        let main = fs::read_to_string(workdir.join("main.tf")).expect("main.tf in sandbox");
        let version = main
            .lines()
            .find_map(|line| line.trim().strip_prefix("version = "))
            .expect("version line")
            .trim_matches('"')
            .to_string();
        fs::write(
            workdir.join(".terraform.lock.hcl"),
            format!(
                "provider \"{provider_source}\" {{\n  version     = \"{version}\"\n  constraints = \"{version}\"\n}}\n"
            ),
        )
        .expect("write lock");
        Ok(())
    }
}

/// A runner that must never be reached.
struct NoTerraform;

impl LockRunner for NoTerraform {
    fn lock_providers(&self, _workdir: &Path, provider_source: &str) -> Result<(), LockError> {
        panic!("unexpected lock regeneration for {provider_source}");
    }
}

fn record(file: &str, requirement: Option<&str>, source: SourceDescriptor) -> RequirementRecord {
    RequirementRecord {
        file: file.to_string(),
        requirement: requirement.map(str::to_string),
        source,
    }
}

fn git(url: &str, reference: &str) -> SourceDescriptor {
    SourceDescriptor::Git {
        url: url.to_string(),
        reference: Some(reference.to_string()),
    }
}

fn registry() -> SourceDescriptor {
    SourceDescriptor::Registry {
        registry_hostname: Some("registry.terraform.io".to_string()),
        module_identifier: Some("hashicorp/consul/aws".to_string()),
    }
}

fn aws_provider() -> SourceDescriptor {
    SourceDescriptor::Provider {
        registry_hostname: "registry.terraform.io".to_string(),
        module_identifier: "hashicorp/aws".to_string(),
    }
}

#[test]
fn registry_module_golden() {
    let input = load_fixture("registry/main.tf");
    let expected = load_fixture("registry/main.tf.expected");
    let dependency = Dependency {
        name: "hashicorp/consul/aws".to_string(),
        requirements: vec![record("main.tf", Some("0.3.8"), registry())],
        previous_requirements: vec![record("main.tf", Some("0.1.0"), registry())],
    };
    let files = vec![DependencyFile::new("main.tf", input, FileRole::Configuration)];

    let updated = compute_updated_files(&dependency, &files, &NoTerraform).expect("update");

    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].name, "main.tf");
    assert_eq!(updated[0].content, expected);
}

#[test]
fn git_module_golden_touches_only_named_module() {
    let input = load_fixture("git/main.tf");
    let expected = load_fixture("git/main.tf.expected");
    let url = "https://github.com/cloudposse/terraform-null-label.git";
    let dependency = Dependency {
        name: "origin_label".to_string(),
        requirements: vec![record("main.tf", None, git(url, "tags/0.4.1"))],
        previous_requirements: vec![record("main.tf", None, git(url, "tags/0.3.7"))],
    };
    let files = vec![DependencyFile::new("main.tf", input, FileRole::Configuration)];

    let updated = compute_updated_files(&dependency, &files, &NoTerraform).expect("update");

    assert_eq!(updated[0].content, expected);
    assert_eq!(updated[0].content.matches("tags/0.3.7").count(), 1);
}

#[test]
fn terragrunt_terraform_block_golden() {
    let input = load_fixture("terragrunt/terragrunt.hcl");
    let expected = load_fixture("terragrunt/terragrunt.hcl.expected");
    let url = "git@github.com:gruntwork-io/modules-example.git";
    let dependency = Dependency {
        name: "gruntwork-io/modules-example".to_string(),
        requirements: vec![record("terragrunt.hcl", None, git(url, "v0.0.3"))],
        previous_requirements: vec![record("terragrunt.hcl", None, git(url, "v0.0.2"))],
    };
    let files = vec![DependencyFile::classified("terragrunt.hcl", input).expect("classified")];

    let updated = compute_updated_files(&dependency, &files, &NoTerraform).expect("update");

    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].content, expected);
}

#[test]
fn provider_golden_with_lock() {
    let input = load_fixture("provider/main.tf");
    let expected = load_fixture("provider/main.tf.expected");
    let lock = load_fixture("provider/.terraform.lock.hcl");
    let dependency = Dependency {
        name: "hashicorp/aws".to_string(),
        requirements: vec![record("main.tf", Some("3.40.0"), aws_provider())],
        previous_requirements: vec![record("main.tf", Some("3.37.0"), aws_provider())],
    };
    let files = vec![
        DependencyFile::classified(".terraform.lock.hcl", lock.clone()).expect("lock"),
        DependencyFile::classified("main.tf", input).expect("main"),
    ];
    let runner = FakeTerraform::new();

    let updated = compute_updated_files(&dependency, &files, &runner).expect("update");

    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].name, "main.tf");
    assert_eq!(updated[0].content, expected);
    assert_eq!(updated[1].name, ".terraform.lock.hcl");
    assert_ne!(updated[1].content, lock);
    assert!(updated[1].content.contains("version     = \"3.40.0\""));
    assert_eq!(
        *runner.sources.borrow(),
        ["registry.terraform.io/hashicorp/aws"]
    );
}

#[test]
fn provider_check_mode_skips_lock() {
    let dependency = Dependency {
        name: "hashicorp/aws".to_string(),
        requirements: vec![record("main.tf", Some("3.40.0"), aws_provider())],
        previous_requirements: vec![record("main.tf", Some("3.37.0"), aws_provider())],
    };
    let files = vec![
        DependencyFile::classified("main.tf", load_fixture("provider/main.tf")).expect("main"),
        DependencyFile::classified(
            ".terraform.lock.hcl",
            load_fixture("provider/.terraform.lock.hcl"),
        )
        .expect("lock"),
    ];

    let updated = FileUpdater::without_lock_regeneration(&dependency, &files)
        .updated_dependency_files()
        .expect("update");

    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].name, "main.tf");
}

#[test]
fn configuration_files_come_before_nested_tool_files() {
    let url = "https://github.com/cloudposse/terraform-null-label.git";
    let dependency = Dependency {
        name: "origin_label".to_string(),
        requirements: vec![
            record("terragrunt.hcl", None, git(url, "tags/0.4.1")),
            record("main.tf", None, git(url, "tags/0.4.1")),
        ],
        previous_requirements: vec![
            record("terragrunt.hcl", None, git(url, "tags/0.3.7")),
            record("main.tf", None, git(url, "tags/0.3.7")),
        ],
    };
    let terragrunt = "terraform {\n  source = \"git::https://github.com/cloudposse/terraform-null-label.git?ref=tags/0.3.7\"\n}\n";
    let files = vec![
        DependencyFile::classified("terragrunt.hcl", terragrunt).expect("hcl"),
        DependencyFile::classified("main.tf", load_fixture("git/main.tf")).expect("tf"),
    ];

    let updated = compute_updated_files(&dependency, &files, &NoTerraform).expect("update");

    let names: Vec<&str> = updated.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["main.tf", "terragrunt.hcl"]);
    assert!(updated[1].content.contains("ref=tags/0.4.1"));
}

#[test]
fn mismatched_file_fails_before_any_patch() {
    let dependency = Dependency {
        name: "hashicorp/consul/aws".to_string(),
        requirements: vec![record("main.tf", Some("0.3.8"), registry())],
        previous_requirements: vec![record("other.tf", Some("0.1.0"), registry())],
    };
    let files = vec![DependencyFile::new(
        "main.tf",
        load_fixture("registry/main.tf"),
        FileRole::Configuration,
    )];

    let err = compute_updated_files(&dependency, &files, &NoTerraform).unwrap_err();
    assert!(matches!(err, UpdateError::MismatchedRequirementFile { .. }));
}

#[test]
fn missing_version_field_is_content_unchanged() {
    let content = "module \"consul\" {\n  source = \"hashicorp/consul/aws\"\n}\n";
    let dependency = Dependency {
        name: "hashicorp/consul/aws".to_string(),
        requirements: vec![record("main.tf", Some("0.3.8"), registry())],
        previous_requirements: vec![record("main.tf", Some("0.1.0"), registry())],
    };
    let files = vec![DependencyFile::new("main.tf", content, FileRole::Configuration)];

    let err = compute_updated_files(&dependency, &files, &NoTerraform).unwrap_err();
    assert!(matches!(err, UpdateError::ContentUnchanged { ref file } if file == "main.tf"));
}

#[test]
fn unchanged_requirements_change_no_files() {
    let dependency = Dependency {
        name: "hashicorp/consul/aws".to_string(),
        requirements: vec![record("main.tf", Some("0.1.0"), registry())],
        previous_requirements: vec![record("main.tf", Some("0.1.0"), registry())],
    };
    let files = vec![DependencyFile::new(
        "main.tf",
        load_fixture("registry/main.tf"),
        FileRole::Configuration,
    )];

    let err = compute_updated_files(&dependency, &files, &NoTerraform).unwrap_err();
    assert!(matches!(err, UpdateError::NoFilesChanged));
    assert_eq!(err.to_string(), "no files changed");
}

#[test]
fn manifest_drives_update() {
    let manifest = load_from_str(
        r#"
[[dependencies]]
name = "hashicorp/consul/aws"

[[dependencies.requirements]]
file = "main.tf"
requirement = "0.3.8"
source = { type = "registry", registry_hostname = "registry.terraform.io", module_identifier = "hashicorp/consul/aws" }

[[dependencies.previous_requirements]]
file = "main.tf"
requirement = "0.1.0"
source = { type = "registry", registry_hostname = "registry.terraform.io", module_identifier = "hashicorp/consul/aws" }
"#,
        ManifestFormat::Toml,
    )
    .expect("manifest");

    let dependency = single_dependency(&manifest.dependencies).expect("one dependency");
    let files = vec![DependencyFile::new(
        "main.tf",
        load_fixture("registry/main.tf"),
        FileRole::Configuration,
    )];

    let updated = compute_updated_files(dependency, &files, &NoTerraform).expect("update");
    assert_eq!(updated[0].content, load_fixture("registry/main.tf.expected"));
}
