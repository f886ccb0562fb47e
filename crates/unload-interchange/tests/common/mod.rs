//! Shared fixtures for export tests

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use unload_core::{
    Connection, FieldDef, ModelSchema, QueryResult, Result, SchemaRegistry, StatementResult, Value,
};
use unload_driver_sqlite::SqliteConnection;

/// Connection wrapper counting every query, for asserting round trips
pub struct CountingConnection {
    inner: SqliteConnection,
    pub queries: AtomicUsize,
}

impl CountingConnection {
    pub fn new(inner: SqliteConnection) -> Self {
        Self {
            inner,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for CountingConnection {
    fn driver_name(&self) -> &str {
        "counting"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.inner.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(sql, params).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Registry with a single `people.Person` model
pub fn people_registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new()
        .with_model(
            "people",
            ModelSchema::new("Person")
                .with_field(FieldDef::new("id").with_verbose_name("ID"))
                .with_field(FieldDef::new("name"))
                .with_field(FieldDef::new("email").with_verbose_name("email address")),
        )
        .expect("valid registry");
    Arc::new(registry)
}

/// In-memory database holding `people_person` with the given (name, email) rows
pub async fn people_db(rows: &[(&str, Option<&str>)]) -> SqliteConnection {
    let conn = SqliteConnection::open(":memory:").expect("Failed to open in-memory db");
    conn.execute_batch(
        "CREATE TABLE people_person (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
    )
    .await
    .expect("Failed to create people_person");
    for (name, email) in rows {
        let email = email.map(Value::from).unwrap_or(Value::Null);
        conn.execute(
            "INSERT INTO people_person (name, email) VALUES (?, ?)",
            &[Value::from(*name), email],
        )
        .await
        .expect("Failed to insert person");
    }
    conn
}

/// Stock auth tables with two users and three groups
pub async fn auth_db() -> SqliteConnection {
    let conn = SqliteConnection::open(":memory:").expect("Failed to open in-memory db");
    conn.execute_batch(
        r#"
        CREATE TABLE django_content_type (id INTEGER PRIMARY KEY, app_label TEXT, model TEXT);
        CREATE TABLE auth_permission (id INTEGER PRIMARY KEY, name TEXT, content_type_id INTEGER, codename TEXT);
        CREATE TABLE auth_group (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE auth_group_permissions (id INTEGER PRIMARY KEY, group_id INTEGER, permission_id INTEGER);
        CREATE TABLE auth_user (
            id INTEGER PRIMARY KEY, password TEXT, last_login TEXT, is_superuser INTEGER,
            username TEXT, first_name TEXT, last_name TEXT, email TEXT, is_staff INTEGER,
            is_active INTEGER, date_joined TEXT
        );
        CREATE TABLE auth_user_groups (id INTEGER PRIMARY KEY, user_id INTEGER, group_id INTEGER);
        CREATE TABLE auth_user_user_permissions (id INTEGER PRIMARY KEY, user_id INTEGER, permission_id INTEGER);

        INSERT INTO django_content_type VALUES (1, 'auth', 'user');
        INSERT INTO auth_permission VALUES (1, 'Can add user', 1, 'add_user');
        INSERT INTO auth_group VALUES (1, 'admins'), (2, 'editors'), (3, 'viewers');
        INSERT INTO auth_group_permissions VALUES (1, 2, 1);
        INSERT INTO auth_user VALUES
            (1, 'x', NULL, 1, 'root', 'Ada', 'Lovelace', 'ada@example.com', 1, 1, '2024-01-01'),
            (2, 'y', NULL, 0, 'guest', '', '', '', 0, 1, '2024-02-01');
        INSERT INTO auth_user_groups VALUES (1, 1, 3), (2, 1, 2);
        INSERT INTO auth_user_user_permissions VALUES (1, 1, 1);
        "#,
    )
    .await
    .expect("Failed to create auth tables");
    conn
}

/// Lines of a written export, without record terminators
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("export file exists")
        .lines()
        .map(str::to_string)
        .collect()
}

/// `people.Person` with a self foreign key and a symmetrical self many-to-many
pub fn friends_registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new()
        .with_model(
            "people",
            ModelSchema::new("Person")
                .with_field(FieldDef::new("id").with_verbose_name("ID"))
                .with_field(FieldDef::new("name"))
                .with_field(FieldDef::foreign_key("mentor", "person").with_related_name("mentees"))
                .with_field(FieldDef::many_to_many("friends", "person")),
        )
        .expect("valid registry");
    Arc::new(registry)
}

/// Ada mentors Grace and Linus; Ada and Grace are friends
pub async fn friends_db() -> SqliteConnection {
    let conn = SqliteConnection::open(":memory:").expect("Failed to open in-memory db");
    conn.execute_batch(
        r#"
        CREATE TABLE people_person (id INTEGER PRIMARY KEY, name TEXT, mentor_id INTEGER);
        CREATE TABLE people_person_friends (
            id INTEGER PRIMARY KEY, from_person_id INTEGER, to_person_id INTEGER
        );

        INSERT INTO people_person VALUES (1, 'Ada', NULL), (2, 'Grace', 1), (3, 'Linus', 1);
        INSERT INTO people_person_friends VALUES (1, 1, 2), (2, 2, 1);
        "#,
    )
    .await
    .expect("Failed to create people tables");
    conn
}
