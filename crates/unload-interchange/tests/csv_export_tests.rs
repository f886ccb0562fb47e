/// Integration tests for CSV export over SQLite
mod common;

use common::{
    CountingConnection, auth_db, friends_db, friends_registry, people_db, people_registry,
    read_lines,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use unload_core::{Connection, SchemaRegistry, UnloadError};
use unload_interchange::{
    CsvExportError, CsvExportOptions, CsvExporter, ExportOutcome, output_path,
};

fn options(dir: &tempfile::TempDir) -> CsvExportOptions {
    CsvExportOptions::default().with_output_dir(dir.path())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_default_export_writes_captions_names_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[("Alice", Some("alice@example.com")), ("Bob", None)]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let outcome = exporter.export_table("people", "person").await.unwrap();
    let ExportOutcome::Written(summary) = outcome else {
        panic!("person table should be exported");
    };

    assert_eq!(summary.path, dir.path().join("unload-person.csv"));
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(
        read_lines(&summary.path),
        vec![
            "ID;name;email address",
            "id;name;email",
            "1;Alice;alice@example.com",
            "2;Bob;",
        ]
    );

    let raw = std::fs::read_to_string(&summary.path).unwrap();
    assert!(raw.ends_with("2;Bob;\r\n"));
}

#[tokio::test]
async fn test_empty_table_has_only_header_rows() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let ExportOutcome::Written(summary) = exporter.export_table("people", "person").await.unwrap()
    else {
        panic!("person table should be exported");
    };

    assert_eq!(summary.rows_written, 0);
    assert_eq!(
        read_lines(&summary.path),
        vec!["ID;name;email address", "id;name;email"]
    );
}

#[tokio::test]
async fn test_explicit_fields_without_captions_skip_caption_row() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[("Alice", Some("alice@example.com"))]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let summary = exporter
        .export_fields("people", "person", &strings(&["email", "id"]), None)
        .await
        .unwrap();

    assert_eq!(
        read_lines(&summary.path),
        vec!["email;id", "alice@example.com;1"]
    );

    let summary = exporter
        .export_fields("people", "person", &strings(&["name"]), Some(&[]))
        .await
        .unwrap();
    assert_eq!(read_lines(&summary.path), vec!["name", "Alice"]);
}

#[tokio::test]
async fn test_explicit_fields_with_captions() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[("Alice", Some("alice@example.com"))]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let summary = exporter
        .export_fields(
            "people",
            "person",
            &strings(&["name", "email"]),
            Some(&strings(&["Full name", "Mail"])),
        )
        .await
        .unwrap();

    assert_eq!(
        read_lines(&summary.path),
        vec!["Full name;Mail", "name;email", "Alice;alice@example.com"]
    );
}

#[tokio::test]
async fn test_caption_count_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let err = exporter
        .export_fields(
            "people",
            "person",
            &strings(&["name", "email"]),
            Some(&strings(&["Full name"])),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CsvExportError::CaptionMismatch {
            fields: 2,
            captions: 1
        }
    ));
    assert!(!output_path(dir.path(), "person").exists());
}

#[tokio::test]
async fn test_unknown_table_returns_not_found_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let outcome = exporter.export_table("people", "pet").await.unwrap();
    assert_eq!(outcome, ExportOutcome::TableNotFound);
    assert!(!output_path(dir.path(), "pet").exists());
}

#[tokio::test]
async fn test_unknown_table_with_explicit_fields_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let err = exporter
        .export_fields("people", "pet", &strings(&["id"]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CsvExportError::Core(UnloadError::ModelNotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_lookup_aborts_export() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let err = exporter
        .export_fields("people", "person", &strings(&["phone"]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CsvExportError::Core(UnloadError::InvalidLookup { .. })
    ));
}

#[tokio::test]
async fn test_second_run_overwrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Arc::new(
        people_db(&[
            ("Alice", Some("alice@example.com")),
            ("Bob", Some("bob@example.com")),
        ])
        .await,
    );
    let exporter = CsvExporter::new(conn.clone(), people_registry(), options(&dir));

    exporter.export_table("people", "person").await.unwrap();
    conn.execute("DELETE FROM people_person WHERE name = 'Bob'", &[])
        .await
        .unwrap();
    let ExportOutcome::Written(summary) = exporter.export_table("people", "person").await.unwrap()
    else {
        panic!("person table should be exported");
    };

    assert_eq!(
        read_lines(&summary.path),
        vec![
            "ID;name;email address",
            "id;name;email",
            "1;Alice;alice@example.com",
        ]
    );
}

#[tokio::test]
async fn test_keys_stream_across_chunks_one_query_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Arc::new(CountingConnection::new(
        people_db(&[
            ("a", None),
            ("b", None),
            ("c", None),
            ("d", None),
            ("e", None),
        ])
        .await,
    ));
    let exporter = CsvExporter::new(
        conn.clone(),
        people_registry(),
        options(&dir).with_chunk_size(2),
    );

    let summary = exporter
        .export_fields("people", "person", &strings(&["id", "name"]), None)
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 5);
    assert_eq!(
        read_lines(&summary.path),
        vec!["id;name", "1;a", "2;b", "3;c", "4;d", "5;e"]
    );
    // three key chunks (2 + 2 + 1) and one query per row
    assert_eq!(conn.query_count(), 3 + 5);
}

#[tokio::test]
async fn test_values_needing_quotes_are_quoted() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[("Smith; John", Some("say \"hi\""))]).await;
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir));

    let summary = exporter
        .export_fields("people", "person", &strings(&["name", "email"]), None)
        .await
        .unwrap();

    assert_eq!(
        read_lines(&summary.path),
        vec!["name;email", r#""Smith; John";"say ""hi""""#]
    );
}

#[tokio::test]
async fn test_progress_callback_reports_completion() {
    let dir = tempfile::tempdir().unwrap();
    let conn = people_db(&[("Alice", None), ("Bob", None)]).await;
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let exporter = CsvExporter::new(Arc::new(conn), people_registry(), options(&dir))
        .with_progress_callback(Box::new(move |progress| {
            sink.lock().unwrap().push(progress);
        }));

    exporter.export_table("people", "person").await.unwrap();

    let reports = reports.lock().unwrap();
    let last = reports.last().expect("at least one report");
    assert!(last.finished);
    assert_eq!(last.rows_exported, 2);
    assert_eq!(last.table, "person");
}

#[tokio::test]
async fn test_builtin_user_export_follows_relations() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SchemaRegistry::builtin().unwrap());
    let exporter = CsvExporter::new(Arc::new(auth_db().await), registry, options(&dir));

    let ExportOutcome::Written(summary) = exporter.export_table("auth", "user").await.unwrap()
    else {
        panic!("auth.user should be exported");
    };

    let lines = read_lines(&summary.path);
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "ID;password;last login;superuser status;username;first name;last name;\
         email address;staff status;active;date joined;groups;user permissions"
    );
    assert_eq!(
        lines[1],
        "id;password;last_login;is_superuser;username;first_name;last_name;\
         email;is_staff;is_active;date_joined;groups;user_permissions"
    );
    // lowest related group key, empty when the user has none
    assert_eq!(
        lines[2],
        "1;x;;1;root;Ada;Lovelace;ada@example.com;1;1;2024-01-01;2;1"
    );
    assert_eq!(lines[3], "2;y;;0;guest;;;;0;1;2024-02-01;;");
}

#[tokio::test]
async fn test_lookup_paths_across_relations() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SchemaRegistry::builtin().unwrap());
    let exporter = CsvExporter::new(Arc::new(auth_db().await), registry, options(&dir));

    let summary = exporter
        .export_fields(
            "auth",
            "user",
            &strings(&["username", "groups__name", "groups__permissions__codename"]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        read_lines(&summary.path),
        vec![
            "username;groups__name;groups__permissions__codename",
            "root;editors;add_user",
            "guest;;",
        ]
    );

    let summary = exporter
        .export_fields("auth", "group", &strings(&["name", "user", "user__username"]), None)
        .await
        .unwrap();
    assert_eq!(
        read_lines(&summary.path),
        vec![
            "name;user;user__username",
            "admins;;",
            "editors;1;root",
            "viewers;1;root",
        ]
    );
}

#[tokio::test]
async fn test_reverse_accessor_is_not_an_export_path() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(SchemaRegistry::builtin().unwrap());
    let exporter = CsvExporter::new(Arc::new(auth_db().await), registry, options(&dir));

    let err = exporter
        .export_fields("auth", "group", &strings(&["user_set__username"]), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CsvExportError::Core(UnloadError::InvalidLookup { .. })
    ));
}

#[tokio::test]
async fn test_self_referential_relations() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = CsvExporter::new(
        Arc::new(friends_db().await),
        friends_registry(),
        options(&dir),
    );

    // the symmetrical friends relation adds no reverse column
    let ExportOutcome::Written(summary) = exporter.export_table("people", "person").await.unwrap()
    else {
        panic!("person table should be exported");
    };
    assert_eq!(
        read_lines(&summary.path),
        vec![
            "person;ID;name;mentor;friends",
            "mentees;id;name;mentor;friends",
            "2;1;Ada;;2",
            ";2;Grace;1;1",
            ";3;Linus;1;",
        ]
    );

    let summary = exporter
        .export_fields(
            "people",
            "person",
            &strings(&["name", "friends__name", "mentor__name", "mentees__name"]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        read_lines(&summary.path),
        vec![
            "name;friends__name;mentor__name;mentees__name",
            "Ada;Grace;;Grace",
            "Grace;Ada;Ada;",
            "Linus;;Ada;",
        ]
    );
}
