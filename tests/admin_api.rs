// Integration tests for admin API mutations and their invalidations

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::time::{Duration, timeout};
use workervet_query::{
    api::{
        AdminApi, Department, DepartmentPassRate, DepartmentPassRates, Departments, LoginInput, Skill, Skills, User,
        Whoami,
    },
    query::{QueryClient, QueryObserver, QueryResult, QueryStatus},
    transport::{Method, mock::MockTransport, normalize_error},
    QueryError,
};

fn api_with(transport: &MockTransport) -> AdminApi {
    AdminApi::new(Arc::new(transport.clone()), QueryClient::new())
}

async fn settle<P, V>(observer: &mut QueryObserver<P, V>, done: impl Fn(&QueryResult<V>) -> bool) -> QueryResult<V>
where
    P: serde::Serialize + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let current = observer.result();
    if done(&current) {
        return current;
    }
    timeout(Duration::from_secs(1), async {
        loop {
            let result = observer.changed().await;
            if done(&result) {
                return result;
            }
        }
    })
    .await
    .expect("query should settle")
}

fn names(result: &QueryResult<Vec<Department>>) -> Vec<String> {
    result
        .data()
        .map(|list| list.iter().map(|d| d.department_name.clone()).collect())
        .unwrap_or_default()
}

fn department_transport() -> MockTransport {
    let transport = MockTransport::new();
    transport.on_sequence(
        Method::Get,
        "departments",
        vec![
            Ok(json!([
                { "_id": "d1", "department_name": "Finance" },
                { "_id": "d2", "department_name": "Legal" }
            ])),
            Ok(json!([{ "_id": "d1", "department_name": "Finance" }])),
        ],
    );
    transport.on_sequence(
        Method::Get,
        "assessment/department/pass-rate",
        vec![
            Ok(json!([
                { "department_name": "Finance", "percentage": 50.0, "total_people": 4, "total_passed": 2 },
                { "department_name": "Legal", "percentage": 100.0, "total_people": 1, "total_passed": 1 }
            ])),
            Ok(json!([
                { "department_name": "Finance", "percentage": 50.0, "total_people": 4, "total_passed": 2 }
            ])),
        ],
    );
    transport
}

#[tokio::test]
async fn test_delete_department_refreshes_list_and_dashboard() {
    let transport = department_transport();
    transport.on(Method::Delete, "departments/d2", Ok(json!({ "deleted": true })));
    let api = api_with(&transport);

    let mut list = api.observe::<Departments>(());
    let mut pass_rates = api.observe::<DepartmentPassRates>(());
    let before = settle(&mut list, QueryResult::is_success).await;
    settle(&mut pass_rates, QueryResult::is_success).await;
    assert_eq!(names(&before), ["Finance", "Legal"]);

    transport.hold();
    let delete = api.delete_department();
    let pending = tokio::spawn({
        let client = api.client().clone();
        async move { delete.execute(&client, "d2".to_string()).await }
    });

    // Removed from the cached list before the server answers.
    let optimistic = settle(&mut list, |result| names(result) == ["Finance"]).await;
    assert!(!optimistic.is_loading());

    transport.release();
    timeout(Duration::from_secs(1), pending)
        .await
        .expect("mutation completes")
        .expect("task ok")
        .expect("server accepted");
    assert_eq!(transport.call_count(Method::Delete, "departments/d2"), 1);

    let refreshed = settle(&mut list, |result| {
        result.is_success() && result.revision > optimistic.revision && !result.is_fetching()
    })
    .await;
    assert_eq!(names(&refreshed), ["Finance"]);

    let rates: QueryResult<Vec<DepartmentPassRate>> =
        settle(&mut pass_rates, |result| result.data().is_some_and(|rates| rates.len() == 1)).await;
    assert!(rates.is_success());
    assert_eq!(transport.call_count(Method::Get, "departments"), 2);
    assert_eq!(transport.call_count(Method::Get, "assessment/department/pass-rate"), 2);
}

#[tokio::test]
async fn test_failed_delete_restores_list_and_skips_invalidation() {
    let transport = MockTransport::new();
    transport.on(
        Method::Get,
        "skills",
        Ok(json!([
            { "_id": "s1", "skill_name": "Trust" },
            { "_id": "s2", "skill_name": "Ethics" }
        ])),
    );
    transport.on(
        Method::Delete,
        "skills/s2",
        Err(normalize_error(409, br#"{"message":["skill_in_use"]}"#)),
    );
    let api = api_with(&transport);

    let mut skills = api.observe::<Skills>(());
    settle(&mut skills, QueryResult::is_success).await;

    let err = api
        .delete_skill()
        .execute(api.client(), "s2".to_string())
        .await
        .expect_err("server rejected");
    assert_eq!(err.to_string(), "Skill In Use");
    assert_eq!(err.status(), Some(409));

    let key = AdminApi::key::<Skills>(&());
    let cached = api.client().get_query_data::<Vec<Skill>>(&key).expect("cached");
    assert_eq!(cached.len(), 2, "optimistic removal rolled back");
    assert_eq!(api.client().get(&key).status, QueryStatus::Success);
    assert_eq!(transport.call_count(Method::Get, "skills"), 1);
}

#[tokio::test]
async fn test_login_refreshes_whoami() {
    let user = json!({ "_id": "u1", "full_name": "Ada Obi", "email": "ada@workervet.test", "role": "admin" });
    let transport = MockTransport::new();
    transport.on_sequence(
        Method::Get,
        "auth/whoami",
        vec![
            Err(QueryError::HttpError { status: 401, message: "Unauthorized".to_string() }),
            Ok(json!({ "data": user })),
        ],
    );
    transport.on(Method::Post, "auth/admin/login", Ok(json!({ "user": user })));
    let api = api_with(&transport);

    let mut whoami = api.observe::<Whoami>(());
    let anonymous = settle(&mut whoami, QueryResult::is_error).await;
    assert_eq!(anonymous.error().map(QueryError::status), Some(Some(401)));

    let signed_in: User = api
        .login()
        .execute(api.client(), LoginInput::new("ada@workervet.test", "secret"))
        .await
        .expect("login accepted");
    assert!(signed_in.is_admin());

    let login = transport.last_call(Method::Post, "auth/admin/login").expect("sent");
    assert!(login.with_auth);
    assert_eq!(login.body, Some(json!({ "email": "ada@workervet.test", "password": "secret" })));

    let current = settle(&mut whoami, QueryResult::is_success).await;
    assert_eq!(current.data().map(|user| user.id.as_str()), Some("u1"));
}

#[tokio::test]
async fn test_login_validation_sends_nothing() {
    let transport = MockTransport::new();
    let api = api_with(&transport);

    let err = api
        .login()
        .execute(api.client(), LoginInput::new("ada", ""))
        .await
        .expect_err("rejected");
    assert!(matches!(err, QueryError::ValidationError(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_logout_clears_cache() {
    let transport = department_transport();
    transport.on(Method::Post, "auth/logout", Ok(Value::Null));
    let api = api_with(&transport);

    api.fetch::<Departments>(()).await.expect("fetched");
    let mut pass_rates = api.observe::<DepartmentPassRates>(());
    settle(&mut pass_rates, QueryResult::is_success).await;
    assert_eq!(api.client().len(), 2);

    api.logout().execute(api.client(), ()).await.expect("logged out");

    // Unobserved entries are gone; observed ones are reset without data.
    assert!(!api.client().contains(&AdminApi::key::<Departments>(&())));
    let reset = settle(&mut pass_rates, QueryResult::is_idle).await;
    assert!(reset.data().is_none());
    assert_eq!(transport.last_call(Method::Post, "auth/logout").map(|call| call.with_auth), Some(true));
}
