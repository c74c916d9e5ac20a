//! Environment file tests

use sitedeploy::deploy::env::{parse_env_json, render_env, write_env, EnvVar, ENV_FILE_NAME};
use sitedeploy::filesys::dir::Dir;

#[test]
fn test_render_joins_lines_in_order() {
    let vars = vec![EnvVar::new("A", "1"), EnvVar::new("B", "2")];
    assert_eq!(render_env(&vars), "A=1\nB=2");
}

#[test]
fn test_values_are_written_verbatim() {
    let vars = parse_env_json(r#"[{"key":"URL","value":"https://x.io/?a=b c"}]"#).unwrap();
    assert_eq!(render_env(&vars), "URL=https://x.io/?a=b c");
}

#[tokio::test]
async fn test_write_env_overwrites_file() {
    let tmp = tempfile::tempdir().unwrap();
    let workspace = Dir::new(tmp.path());

    write_env(&workspace, &[EnvVar::new("OLD", "x")]).await.unwrap();
    write_env(&workspace, &[EnvVar::new("A", "1"), EnvVar::new("B", "2")])
        .await
        .unwrap();

    let written = std::fs::read_to_string(tmp.path().join(ENV_FILE_NAME)).unwrap();
    assert_eq!(written, "A=1\nB=2");
}

#[tokio::test]
async fn test_empty_env_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let workspace = Dir::new(tmp.path());

    write_env(&workspace, &[]).await.unwrap();

    assert!(!tmp.path().join(ENV_FILE_NAME).exists());
}
