//! Shared harness for the integration tests
//!
//! `spawn_app` runs the server on a random port against a lazy pool that
//! never connects unless a handler reaches the database, so everything that
//! is decided before a query (auth middleware, input validation, password
//! policy) can be exercised without Postgres. `spawn_app_with_db` creates a
//! throw-away database and runs the migrations.

#![allow(dead_code)]

use gamehub::auth::TokenService;
use gamehub::configuration::{get_configuration, DatabaseSettings, Settings};
use gamehub::startup::run;
use gamehub::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use std::time::Duration;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub tokens: TokenService,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A valid bearer token for `user_id`, signed with the server's secret
    pub fn token_for(&self, user_id: i64) -> String {
        self.tokens
            .issue(user_id, "tester", "tester@example.com")
            .expect("Failed to issue token")
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

fn test_configuration() -> Settings {
    init_telemetry("warn");
    get_configuration().expect("Failed to read configuration.")
}

fn launch(configuration: &Settings, pool: PgPool) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let server = run(listener, pool.clone(), configuration.jwt.clone())
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: pool,
        tokens: TokenService::new(&configuration.jwt),
        client: reqwest::Client::new(),
    }
}

pub async fn spawn_app() -> TestApp {
    let configuration = test_configuration();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy(&configuration.database.connection_string())
        .expect("Failed to create lazy pool");

    launch(&configuration, pool)
}

pub async fn spawn_app_with_db() -> TestApp {
    let mut configuration = test_configuration();
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let pool = configure_database(&configuration.database).await;

    launch(&configuration, pool)
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

/// Inserts a game with `achievement_count` achievements and returns
/// `(game_id, achievement_ids)`
pub async fn seed_game(pool: &PgPool, title: &str, achievement_count: i32) -> (i64, Vec<i64>) {
    let game_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO games (title, developer, total_achievements) VALUES ($1, 'Test Studio', $2) RETURNING game_id",
    )
    .bind(title)
    .bind(achievement_count)
    .fetch_one(pool)
    .await
    .expect("Failed to insert game");

    let mut achievement_ids = Vec::new();
    for i in 0..achievement_count {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO achievements (game_id, name, points_value) VALUES ($1, $2, 10) RETURNING achievement_id",
        )
        .bind(game_id)
        .bind(format!("Achievement {}", i + 1))
        .fetch_one(pool)
        .await
        .expect("Failed to insert achievement");
        achievement_ids.push(id);
    }

    (game_id, achievement_ids)
}
