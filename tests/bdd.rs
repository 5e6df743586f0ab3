use std::{fmt, fs::File, net::SocketAddr, sync::Arc};

use anyhow::Context;
use chrono::{Duration, TimeZone, Utc};
use cucumber::{given, then, when, World as _};
use outings::{
    config::AppConfig,
    db::{init_pool, run_migrations},
    models::{outing::OutingReturn, student::NewStudent},
    services::clock::ManualClock,
    state::AppState,
};
use tempfile::TempDir;

#[derive(Debug, cucumber::World, Default)]
struct OutingWorld {
    state: Option<TestState>,
    last_return: Option<OutingReturn>,
    last_error: Option<String>,
}

impl OutingWorld {
    fn app_state(&self) -> &AppState {
        &self
            .state
            .as_ref()
            .expect("state must be initialised first")
            .app
    }

    fn clock(&self) -> &ManualClock {
        &self
            .state
            .as_ref()
            .expect("state must be initialised first")
            .clock
    }
}

struct TestState {
    app: AppState,
    clock: Arc<ManualClock>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;

        let config = AppConfig {
            database_url: format!("sqlite://{}", db_path.to_string_lossy()),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cookie_secret: "bdd-cookie-secret".into(),
            timezone: chrono_tz::Asia::Kolkata,
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 4, 30, 0).unwrap(),
        ));
        let app = AppState::with_clock(config, db, clock.clone());
        Ok(Self {
            app,
            clock,
            _root: root,
        })
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut OutingWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.last_return = None;
    world.last_error = None;
}

#[given(regex = r#"^a registered student \"([^\"]+)\"$"#)]
async fn given_registered_student(world: &mut OutingWorld, sid: String) {
    world
        .app_state()
        .students
        .register(NewStudent {
            id: sid,
            name: "Test Student".into(),
            course: "B.Tech".into(),
            branch: "CSE".into(),
            semester: "1".into(),
            year: "1".into(),
            hostel: "H1".into(),
            room: None,
            mobile: "9000000000".into(),
            password: "bdd-password".into(),
        })
        .await
        .expect("register student");
}

#[when(regex = r#"^student \"([^\"]+)\" starts an outing for \"([^\"]*)\"$"#)]
async fn when_start_outing(world: &mut OutingWorld, sid: String, reason: String) {
    let result = world
        .app_state()
        .outings
        .start_outing(&sid, &reason, None)
        .await;
    world.last_error = result.err().map(|err| err.to_string());
}

#[when(regex = r#"^student \"([^\"]+)\" returns after (\d+) seconds$"#)]
async fn when_return_after(world: &mut OutingWorld, sid: String, seconds: i64) {
    world.clock().advance(Duration::seconds(seconds));
    record_return(world, &sid, None).await;
}

#[when(regex = r#"^student \"([^\"]+)\" returns at \"([^\"]+)\"$"#)]
async fn when_return_at(world: &mut OutingWorld, sid: String, at: String) {
    record_return(world, &sid, Some(&at)).await;
}

#[when(regex = r#"^student \"([^\"]+)\" tries to return$"#)]
async fn when_try_return(world: &mut OutingWorld, sid: String) {
    record_return(world, &sid, None).await;
}

#[when(regex = r#"^student \"([^\"]+)\" completes outings for \"([^\"]+)\"$"#)]
async fn when_complete_outings(world: &mut OutingWorld, sid: String, reasons: String) {
    for reason in reasons.split(',').map(str::trim) {
        world
            .app_state()
            .outings
            .start_outing(&sid, reason, None)
            .await
            .expect("start outing");
        world.clock().advance(Duration::minutes(30));
        world
            .app_state()
            .outings
            .mark_return(&sid, None)
            .await
            .expect("return");
    }
}

#[then(regex = r#"^student \"([^\"]+)\" is on an outing$"#)]
async fn then_on_outing(world: &mut OutingWorld, sid: String) {
    assert!(world.app_state().outings.is_on_outing(&sid).await.unwrap());
}

#[then(regex = r#"^student \"([^\"]+)\" is not on an outing$"#)]
async fn then_not_on_outing(world: &mut OutingWorld, sid: String) {
    assert!(!world.app_state().outings.is_on_outing(&sid).await.unwrap());
}

#[then(regex = r#"^the last return took \"([^\"]+)\"$"#)]
async fn then_return_took(world: &mut OutingWorld, expected: String) {
    let last = world.last_return.as_ref().expect("a return must have happened");
    assert_eq!(last.duration, expected);
}

#[then(regex = r#"^the last action failed with \"([^\"]+)\"$"#)]
async fn then_last_failed(world: &mut OutingWorld, expected: String) {
    let err = world.last_error.as_deref().expect("an error was expected");
    assert!(err.contains(&expected), "{err:?} does not mention {expected:?}");
}

#[then(regex = r#"^the history of student \"([^\"]+)\" lists \"([^\"]+)\"$"#)]
async fn then_history_lists(world: &mut OutingWorld, sid: String, expected: String) {
    let history = world
        .app_state()
        .outings
        .history(&sid)
        .await
        .expect("history");
    let reasons = history
        .iter()
        .map(|outing| outing.reason.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    assert_eq!(reasons, expected);
}

#[then(regex = r"^there are (\d+) outings in storage$")]
async fn then_outing_count(world: &mut OutingWorld, expected: i64) {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outings")
        .fetch_one(&world.app_state().db)
        .await
        .expect("count outings");
    assert_eq!(count, expected);
}

async fn record_return(world: &mut OutingWorld, sid: &str, at: Option<&str>) {
    match world.app_state().outings.mark_return(sid, at).await {
        Ok(receipt) => {
            world.last_return = Some(receipt);
            world.last_error = None;
        }
        Err(err) => {
            world.last_return = None;
            world.last_error = Some(err.to_string());
        }
    }
}

#[tokio::main]
async fn main() {
    OutingWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
