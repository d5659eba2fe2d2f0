//! End-to-end releases against a simulated host

use std::path::{Path, PathBuf};
use std::sync::Arc;
use web_deploy::config::parse_project_config;
use web_deploy::factory::ProjectFactory;
use web_deploy::{DeployError, Project, RecordingExecutor};

const DJANGO: &str = r##"
project:
  system:
    app_dir: /srv/app
    project_tree:
      item: [/srv/backup, /srv/shared]
    log_files:
      item: /var/log/app/django.log
    daemons:
      daemon:
        - nginx
        - {"@name": celery, "#text": supervisor}
  modules:
    module:
      type: django
      container_name: data
      manage_py: src/manage.py
      python_rq_file: src/requirements.txt
      apt_rq_file: src/apt.txt
      media_dir: {"@target": media, "#text": /srv/shared/media}
      git: {name: src, url: "https://example.com/app.git"}
      db: {type: postgres, path: /srv/backup, name: app, user: app, password: secret}
      hooks:
        hook:
          type: create_symlink
          priority: 1
          item: {target: src/local_settings.py, text: /srv/shared/local_settings.py}
"##;

fn project(yaml: &str, host: &Arc<RecordingExecutor>) -> Project {
    ProjectFactory::new(parse_project_config(yaml).unwrap(), host.clone())
        .unwrap()
        .build()
        .unwrap()
}

fn position(commands: &[String], needle: &str) -> usize {
    commands
        .iter()
        .position(|c| c.contains(needle))
        .unwrap_or_else(|| panic!("no command containing {needle:?} in {commands:#?}"))
}

#[tokio::test]
async fn test_first_release_targets_second_slot() {
    let host = Arc::new(RecordingExecutor::new());
    let mut project = project(DJANGO, &host);

    let report = project.release(None).await.unwrap();

    assert_eq!(report.previous_slot, PathBuf::from("/srv/app1"));
    assert_eq!(report.live_slot, PathBuf::from("/srv/app2"));
    assert_eq!(report.modules, vec![PathBuf::from("/srv/app2/data")]);
    assert_eq!(host.link_target("/srv/app"), Some(PathBuf::from("/srv/app2")));

    let commands = host.commands();
    let first_link = position(&commands, "ln -sfT -- \"/srv/app1\" \"/srv/app\"");
    let clone = position(
        &commands,
        "git clone \"https://example.com/app.git\" \"/srv/app2/data/src\"",
    );
    let migrate = position(&commands, "python \"/srv/app2/data/src/manage.py\" migrate");
    let switch = position(&commands, "ln -sfT -- \"/srv/app2\" \"/srv/app\"");
    let restart = position(&commands, "service nginx restart");

    assert!(first_link < clone);
    assert!(clone < migrate);
    assert!(migrate < switch);
    assert!(switch < restart);
    assert_eq!(commands.last().map(String::as_str), Some("supervisorctl restart celery"));
}

#[tokio::test]
async fn test_hooks_run_in_pipeline_order() {
    let host = Arc::new(RecordingExecutor::new());
    let mut project = project(DJANGO, &host);

    project.release(None).await.unwrap();

    let commands = host.commands();
    let settings_link = position(&commands, "\"/srv/app2/data/src/local_settings.py\"");
    let apt = position(&commands, "apt-get -y install");
    let dump = position(&commands, "pg_dump --clean -h localhost -U app app");
    let media = position(&commands, "\"/srv/app2/data/media\"");
    let collect = position(&commands, "collectstatic --noinput");

    assert!(settings_link < apt);
    assert!(apt < dump);
    assert!(dump < media);
    assert!(media < collect);
    assert_eq!(
        host.link_target("/srv/app2/data/media"),
        Some(PathBuf::from("/srv/shared/media"))
    );
}

#[tokio::test]
async fn test_second_release_returns_to_first_slot() {
    let host = Arc::new(RecordingExecutor::new());

    project(DJANGO, &host).release(None).await.unwrap();
    host.clear_history();
    let report = project(DJANGO, &host).release(Some("v2.0")).await.unwrap();

    assert_eq!(report.previous_slot, PathBuf::from("/srv/app2"));
    assert_eq!(report.live_slot, PathBuf::from("/srv/app1"));
    assert_eq!(host.link_target("/srv/app"), Some(PathBuf::from("/srv/app1")));

    let commands = host.commands();
    assert!(commands.iter().any(|c| c == "git checkout v2.0"));
    assert!(!commands.iter().any(|c| c == "git pull"));
    let forced: Vec<&String> = commands.iter().filter(|c| c.starts_with("ln -sfT")).collect();
    assert_eq!(forced, vec!["ln -sfT -- \"/srv/app1\" \"/srv/app\""]);
}

#[tokio::test]
async fn test_failed_module_update_keeps_live_slot() {
    let host = Arc::new(RecordingExecutor::new().fail_on("migrate"));
    let mut project = project(DJANGO, &host);

    let result = project.release(None).await;

    assert!(matches!(result, Err(DeployError::RemoteCommand { .. })));
    assert_eq!(host.link_target("/srv/app"), Some(PathBuf::from("/srv/app1")));

    let commands = host.commands();
    assert!(!commands.iter().any(|c| c.contains("collectstatic")));
    assert!(!commands.iter().any(|c| c.contains("restart")));
}

#[tokio::test]
async fn test_daemon_failure_after_switch_is_state_inconsistency() {
    let host = Arc::new(RecordingExecutor::new().fail_on("service nginx restart"));
    let mut project = project(DJANGO, &host);

    let result = project.release(None).await;

    match result {
        Err(DeployError::StateInconsistency { live_slot, source }) => {
            assert_eq!(live_slot, Path::new("/srv/app2"));
            assert!(matches!(*source, DeployError::RemoteCommand { .. }));
        }
        other => panic!("expected a state inconsistency, got {other:?}"),
    }
    assert_eq!(host.link_target("/srv/app"), Some(PathBuf::from("/srv/app2")));
    assert!(!host.commands().iter().any(|c| c.starts_with("supervisorctl")));
}

#[tokio::test]
async fn test_invalid_live_link_aborts_before_any_module_update() {
    let host = Arc::new(
        RecordingExecutor::new()
            .with_path("/srv/app-blue")
            .with_link("/srv/app", "/srv/app-blue"),
    );
    let mut project = project(DJANGO, &host);

    let result = project.release(None).await;

    assert!(matches!(result, Err(DeployError::InvalidSlot { .. })));
    assert!(!host.commands().iter().any(|c| c.starts_with("git")));
}

#[tokio::test]
async fn test_unreadable_live_link_aborts_release() {
    let host = Arc::new(RecordingExecutor::new().fail_on("readlink"));
    let mut project = project(DJANGO, &host);

    let result = project.release(None).await;

    match result {
        Err(DeployError::RemoteCommand { command, .. }) => assert!(command.contains("readlink")),
        other => panic!("expected the readlink failure, got {other:?}"),
    }
    assert!(!host.commands().iter().any(|c| c.starts_with("git")));
}

#[tokio::test]
async fn test_backups_are_rotated_during_release() {
    let old: Vec<String> = (1..=6)
        .map(|day| format!("dump_sql_2024_01_0{day}_00_00_00_db.sq.gz"))
        .collect();
    let host = Arc::new(RecordingExecutor::new().with_listing("/srv/backup", old));
    let mut project = project(DJANGO, &host);

    project.release(None).await.unwrap();

    let rm = host
        .commands()
        .into_iter()
        .find(|c| c.starts_with("rm -- "))
        .unwrap();
    assert_eq!(rm, "rm -- \"dump_sql_2024_01_01_00_00_00_db.sq.gz\"");

    let remaining = host.listing("/srv/backup");
    assert_eq!(remaining.len(), 6);
    assert!(!remaining.contains(&"dump_sql_2024_01_01_00_00_00_db.sq.gz".to_string()));
    assert!(remaining.iter().any(|name| !name.starts_with("dump_sql_2024_")));
}
