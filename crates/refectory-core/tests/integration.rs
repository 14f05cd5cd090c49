//! # Integration Tests
//!
//! Configuration files driving full table runs.

use std::io::Write;
use std::time::Duration;

use refectory_core::{replay, RefectoryConfig, RefectoryError, Table};

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_file() {
    let file = write_config(
        r#"
        [table]
        seats = 6
        think_ms = 1
        eat_ms = 1
        cycles = 3

        [alley]
        carts = 4
        "#,
    );

    let config = RefectoryConfig::load(file.path()).unwrap();
    assert_eq!(config.table.seats, 6);
    assert_eq!(config.table.cycles, Some(3));
    assert_eq!(config.alley.carts, 4);
    assert_eq!(config.alley.capacity, 5);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert_eq!(
        RefectoryConfig::load_or_default(&path).unwrap(),
        RefectoryConfig::default()
    );
    assert!(matches!(
        RefectoryConfig::load(&path),
        Err(RefectoryError::ConfigIo { .. })
    ));
}

#[test]
fn test_invalid_file_rejected() {
    let file = write_config("[table]\nseats = 0\n");
    assert!(matches!(
        RefectoryConfig::load(file.path()),
        Err(RefectoryError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configured_table_run() {
    let file = write_config(
        r#"
        [table]
        seats = 7
        think_ms = 2
        eat_ms = 2
        cycles = 5
        report_interval_ms = 10
        "#,
    );
    let config = RefectoryConfig::load(file.path()).unwrap();

    let report = Table::new(config.table).unwrap().run().await.unwrap();
    assert_eq!(report.total_meals(), 35);
    assert_eq!(report.status.total_meals, 35);
    assert_eq!(report.snapshot.units, vec![2; 7]);
    for agent in &report.agents {
        assert_eq!(agent.left_heavy + agent.right_heavy, agent.meals);
    }

    let json = report.to_json().unwrap();
    assert!(json.contains("\"total_meals\": 35"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeouts_do_not_leak_units() {
    let config = RefectoryConfig::default()
        .table
        .with_seats(5)
        .with_durations(1, 5)
        .with_cycles(Some(8))
        .with_request_timeout(Some(1))
        .with_report_interval(None);

    let report = tokio::time::timeout(Duration::from_secs(30), Table::new(config).unwrap().run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.total_meals(), 40);
    assert_eq!(report.snapshot.units, vec![2; 5]);
    assert_eq!(report.status.hungry, 0);
}

#[test]
fn test_walkthrough_replay() {
    let steps = replay().unwrap();
    let last_grant = &steps[5];
    assert_eq!(last_grant.units, vec![2, 2, 0, 1, 2]);
    assert_eq!(last_grant.eating, vec![2]);

    // A left-heavy grant empties the own pile, a right-heavy one the right pile.
    assert_eq!(steps[1].units[0], 0);
    assert_eq!(steps[2].units[2], 0);
}
