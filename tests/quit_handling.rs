#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::time::{Duration, Instant, sleep, timeout};
use workervet_query::{
    api::{AdminApi, Skill, Skills},
    application::Application,
    command::{Action, Command},
    error::QueryError,
    query::{QueryClient, QueryResult, QueryStatus},
    runtime::Runtime,
    subscription::Subscription,
    transport::{Method, mock::MockTransport},
};

// Test application that sends quit from init command
struct InitQuitApp;

impl Application for InitQuitApp {
    type Message = ();
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Self::Message>) {
        // Quit immediately after initialization
        (Self, Command::effect(Action::Quit))
    }

    fn update(&mut self, _msg: Self::Message) -> Command<Self::Message> {
        Command::none()
    }

    fn subscriptions(&self) -> Vec<Subscription<Self::Message>> {
        vec![]
    }
}

#[tokio::test]
async fn test_quit_from_init_command() {
    // Test that quit from init command is processed quickly
    let runtime = Runtime::<InitQuitApp>::new(());

    let start = Instant::now();
    let result = timeout(Duration::from_secs(1), runtime.run()).await;
    let elapsed = start.elapsed();

    assert!(result.is_ok(), "Runtime should quit within 1 second");
    assert!(
        elapsed < Duration::from_millis(200),
        "Should quit quickly from init command"
    );
}

// Test application with multiple messages before quit
struct MultiMessageQuitApp {
    counter: u32,
}

#[derive(Debug, Clone)]
enum MultiMessage {
    Increment,
    Quit,
}

impl Application for MultiMessageQuitApp {
    type Message = MultiMessage;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Self::Message>) {
        // Send multiple messages, then quit
        let commands = vec![
            Command::message(MultiMessage::Increment),
            Command::message(MultiMessage::Increment),
            Command::message(MultiMessage::Increment),
            Command::future(async {
                sleep(Duration::from_millis(20)).await;
                MultiMessage::Quit
            }),
        ];
        (Self { counter: 0 }, Command::batch(commands))
    }

    fn update(&mut self, msg: Self::Message) -> Command<Self::Message> {
        match msg {
            MultiMessage::Increment => {
                self.counter += 1;
                Command::none()
            }
            MultiMessage::Quit => Command::effect(Action::Quit),
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Self::Message>> {
        vec![]
    }
}

#[tokio::test]
async fn test_quit_after_multiple_messages() {
    // Test that every message before quit is processed
    let runtime = Runtime::<MultiMessageQuitApp>::new(());

    let app = timeout(Duration::from_millis(500), runtime.run())
        .await
        .expect("Runtime should quit within 500ms");
    assert_eq!(app.counter, 3);
}

// Test application that quits while its query is still loading
struct ImpatientApp {
    api: AdminApi,
}

impl Application for ImpatientApp {
    type Message = QueryResult<Vec<Skill>>;
    type Flags = AdminApi;

    fn new(api: AdminApi) -> (Self, Command<Self::Message>) {
        (Self { api }, Command::none())
    }

    fn update(&mut self, result: Self::Message) -> Command<Self::Message> {
        if result.is_loading() {
            Command::effect(Action::Quit)
        } else {
            Command::none()
        }
    }

    fn subscriptions(&self) -> Vec<Subscription<Self::Message>> {
        vec![Subscription::new(self.api.query::<Skills>(()))]
    }
}

#[tokio::test]
async fn test_quit_with_fetch_in_flight() {
    // Quitting does not wait for the fetch, and the fetch still fills the cache
    let transport = MockTransport::new();
    transport.on(Method::Get, "skills", Ok(json!([{ "_id": "s1", "skill_name": "Trust" }])));
    transport.hold();

    let client = QueryClient::new();
    let api = AdminApi::new(Arc::new(transport.clone()), client.clone());
    let key = AdminApi::key::<Skills>(&());

    timeout(Duration::from_secs(1), Runtime::<ImpatientApp>::new(api).run())
        .await
        .expect("Runtime should quit while the fetch is held");

    assert_eq!(client.subscriber_count(&key), 0);
    assert_eq!(client.get(&key).status, QueryStatus::Loading);

    transport.release();
    timeout(Duration::from_secs(1), async {
        while client.get(&key).status != QueryStatus::Success {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("orphaned fetch should complete");
    let skills = client.get_query_data::<Vec<Skill>>(&key).expect("cached");
    assert_eq!(skills[0].skill_name, "Trust");
}

// Test application that quits once a mutation reports back
struct DeleteSkillApp {
    outcome: Option<Result<Value, QueryError>>,
}

impl Application for DeleteSkillApp {
    type Message = Result<Value, QueryError>;
    type Flags = AdminApi;

    fn new(api: AdminApi) -> (Self, Command<Self::Message>) {
        let client = api.client().clone();
        let cmd = Arc::new(api.delete_skill()).mutate(client, "s1".to_string());
        (Self { outcome: None }, cmd)
    }

    fn update(&mut self, outcome: Self::Message) -> Command<Self::Message> {
        self.outcome = Some(outcome);
        Command::effect(Action::Quit)
    }

    fn subscriptions(&self) -> Vec<Subscription<Self::Message>> {
        vec![]
    }
}

#[tokio::test]
async fn test_quit_after_mutation_result() {
    let transport = MockTransport::new();
    transport.on(
        Method::Delete,
        "skills/s1",
        Err(QueryError::HttpError {
            status: 404,
            message: "Skill Not Found".to_string(),
        }),
    );
    let api = AdminApi::new(Arc::new(transport.clone()), QueryClient::new());

    let app = timeout(Duration::from_secs(1), Runtime::<DeleteSkillApp>::new(api).run())
        .await
        .expect("Runtime should quit after the mutation");

    let err = app.outcome.expect("mutation reported").expect_err("server rejected");
    assert_eq!(err.to_string(), "Skill Not Found");
    assert_eq!(transport.call_count(Method::Delete, "skills/s1"), 1);
}
