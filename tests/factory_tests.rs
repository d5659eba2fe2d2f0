//! Assembly of a release plan from config documents

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use web_deploy::config::parse_project_config;
use web_deploy::factory::ProjectFactory;
use web_deploy::project::{Hook, ModuleType};
use web_deploy::{DeployError, RecordingExecutor};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/deploy.yaml")
}

fn factory(yaml: &str) -> ProjectFactory {
    ProjectFactory::new(
        parse_project_config(yaml).unwrap(),
        Arc::new(RecordingExecutor::new()),
    )
    .unwrap()
}

const MINIMAL: &str = r#"
project:
  system:
    app_dir: /srv/app
  modules:
    module:
      type: generic
      git: {name: src, url: "https://example.com/app.git"}
"#;

#[test]
fn test_fixture_builds_a_project() {
    let mut factory =
        ProjectFactory::from_file(&fixture(), Arc::new(RecordingExecutor::new())).unwrap();
    let project = factory.build().unwrap();

    let system = project.system();
    assert_eq!(system.app_directory(), Path::new("/srv/app"));
    assert_eq!(system.project_tree().len(), 2);
    assert_eq!(system.project_tree()[0].owner, "deploy");
    assert_eq!(system.project_tree()[1].owner, "root");
    assert_eq!(system.log_files()[0].mode, "0644");
    assert_eq!(system.log_files()[1].mode, "0640");

    let daemons: Vec<&str> = system.daemons().iter().map(|d| d.name()).collect();
    assert_eq!(daemons, vec!["nginx", "uwsgi", "supervisor"]);

    let types: Vec<ModuleType> = project.modules().iter().map(|m| m.module_type()).collect();
    assert_eq!(types, vec![ModuleType::Django, ModuleType::Frontend]);
    assert_eq!(project.modules()[1].location(), PathBuf::from("/srv/app/front"));
}

#[test]
fn test_django_module_hooks_from_fixture() {
    let mut factory =
        ProjectFactory::from_file(&fixture(), Arc::new(RecordingExecutor::new())).unwrap();
    let project = factory.build().unwrap();
    let django = &project.modules()[0];

    let names: Vec<String> = django.hooks().iter().map(ToString::to_string).collect();
    assert_eq!(
        names,
        vec![
            "install_system_packages",
            "install_python_packages",
            "backup_database",
            "migrate",
            "ensure_media_root",
            "ensure_static_dir",
            "collect_static",
            "create_symlink",
        ]
    );

    match django.hooks().last() {
        Some(Hook::CreateSymlinks(links)) => {
            assert_eq!(links[0].path, PathBuf::from("/srv/shared/local_settings.py"));
            assert_eq!(links[0].target, Some(PathBuf::from("src/local_settings.py")));
        }
        other => panic!("unexpected last hook {other:?}"),
    }
}

#[test]
fn test_collect_static_false_words() {
    let yaml = r#"
project:
  system: {app_dir: /srv/app}
  modules:
    module:
      type: django
      manage_py: manage.py
      python_rq_file: requirements.txt
      apt_rq_file: apt.txt
      collect_static: "no"
      git: {name: src, url: "https://example.com/app.git"}
      db: {type: postgres, path: /srv/backup, name: app, user: app}
"#;
    let project = factory(yaml).build().unwrap();
    let hooks = project.modules()[0].hooks();
    assert!(!hooks.contains(&Hook::CollectStatic));
    assert!(!hooks.contains(&Hook::EnsureStaticDir));
    assert!(hooks.contains(&Hook::Migrate));
}

#[test]
fn test_single_module_and_module_list_are_equivalent() {
    let list = MINIMAL
        .replace("    module:\n      type", "    module:\n      - type")
        .replace("      git:", "        git:");

    let single = factory(MINIMAL).build().unwrap();
    let many = factory(&list).build().unwrap();

    assert_eq!(single.modules().len(), 1);
    assert_eq!(many.modules().len(), 1);
    assert_eq!(single.modules()[0].location(), many.modules()[0].location());
}

#[test]
fn test_unknown_module_type_is_rejected() {
    let yaml = MINIMAL.replace("type: generic", "type: rails");
    let result = factory(&yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[test]
fn test_unknown_daemon_type_is_rejected() {
    let yaml = MINIMAL.replace(
        "app_dir: /srv/app",
        "app_dir: /srv/app\n    daemons: {daemon: [nginx, apache]}",
    );
    let result = factory(&yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[test]
fn test_empty_module_list_is_rejected() {
    let yaml = "project:\n  system: {app_dir: /srv/app}\n  modules:\n    module: []\n";
    let result = factory(yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[test]
fn test_modules_must_be_a_sequence() {
    let yaml = "project:\n  system: {app_dir: /srv/app}\n  modules: generic\n";
    let result = factory(yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[test]
fn test_missing_git_url_is_rejected() {
    let yaml = MINIMAL.replace(", url: \"https://example.com/app.git\"", "");
    let result = factory(&yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[test]
fn test_missing_app_dir_is_rejected() {
    let yaml = MINIMAL.replace("app_dir: /srv/app", "project_tree: {item: /srv/backup}");
    let result = factory(&yaml).build();
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}

#[tokio::test]
async fn test_app_dir_trailing_slash_is_trimmed() {
    let yaml = MINIMAL.replace("app_dir: /srv/app", "app_dir: /srv/app/");
    let project = factory(&yaml).build().unwrap();
    let system = project.system();

    assert_eq!(system.app_directory().as_os_str(), "/srv/app");
    assert_eq!(system.inactive_slot().await.unwrap().as_os_str(), "/srv/app1");
}

#[test]
fn test_system_is_built_once_per_assembly() {
    let mut factory = factory(MINIMAL);

    let first = factory.system(false).unwrap();
    let second = factory.system(false).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let project = factory.build().unwrap();
    assert!(Arc::ptr_eq(&first, project.system()));

    let rebuilt = factory.system(true).unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
}

#[test]
fn test_invalid_defaults_are_rejected() {
    let config = json!({"system": {"app_dir": "/srv/app", "defaults": {"owner": ["a"]}}});
    let result = ProjectFactory::new(config, Arc::new(RecordingExecutor::new()));
    assert!(matches!(result, Err(DeployError::Configuration(_))));
}
