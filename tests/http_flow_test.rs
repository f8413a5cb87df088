//! Full reconciliation runs over HTTP against a wiremock Marathon.

use marathon_converge::{
    ApplicationSpec, ClientConfig, ConvergeError, DiffStyle, Goal, Invocation, Reconciler,
    SyncPolicy, Target,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> SyncPolicy {
    SyncPolicy {
        max_attempts: 3,
        interval: Duration::from_millis(10),
    }
}

fn web_invocation(goal: Goal, force: bool) -> Invocation {
    let spec = ApplicationSpec::from_value(json!({"id": "/web", "instances": 1})).unwrap();
    Invocation {
        goal,
        target: Target::Spec(spec),
        force,
        diff_style: DiffStyle::Full,
    }
}

#[tokio::test]
async fn present_creates_and_waits_for_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app": {"id": "/web", "instances": 1, "tasksRunning": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/apps"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "/web", "instances": 1, "tasksRunning": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = Reconciler::connect(&ClientConfig::new(&server.uri()), fast_policy()).unwrap();
    let outcome = reconciler
        .reconcile(&web_invocation(Goal::Present, false))
        .await
        .unwrap();
    assert!(outcome.changed());
}

#[tokio::test]
async fn absent_deletes_and_waits_for_removal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app": {"id": "/web", "instances": 1, "tasksRunning": 1}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/apps/web"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deploymentId": "d-1", "version": "v2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = Reconciler::connect(&ClientConfig::new(&server.uri()), fast_policy()).unwrap();
    let outcome = reconciler
        .reconcile(&web_invocation(Goal::Absent, true))
        .await
        .unwrap();
    assert!(outcome.changed());
}

#[tokio::test]
async fn updated_without_drift_sends_no_put() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app": {"id": "/web", "instances": 1, "tasksRunning": 1, "version": "v1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = Reconciler::connect(&ClientConfig::new(&server.uri()), fast_policy()).unwrap();
    let outcome = reconciler
        .reconcile(&web_invocation(Goal::Updated, false))
        .await
        .unwrap();
    assert!(!outcome.changed());
}

#[tokio::test]
async fn updated_treats_float_resources_as_converged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app": {
                "id": "/api", "instances": 2, "cpus": 0.5, "mem": 128.0, "disk": 0.0,
                "tasksRunning": 2, "version": "v1"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let spec = ApplicationSpec::from_value(json!({
        "id": "api", "instances": 2, "cpus": 0.5, "mem": 128, "disk": 0
    }))
    .unwrap();
    let invocation = Invocation {
        goal: Goal::Updated,
        target: Target::Spec(spec),
        force: false,
        diff_style: DiffStyle::Full,
    };

    let reconciler = Reconciler::connect(&ClientConfig::new(&server.uri()), fast_policy()).unwrap();
    let outcome = reconciler.reconcile(&invocation).await.unwrap();
    assert!(!outcome.changed());
}

#[tokio::test]
async fn delete_that_never_lands_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "app": {"id": "/web", "tasksRunning": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2/apps/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deploymentId": "d"})))
        .mount(&server)
        .await;

    let reconciler = Reconciler::connect(&ClientConfig::new(&server.uri()), fast_policy()).unwrap();
    let err = reconciler
        .reconcile(&web_invocation(Goal::Absent, false))
        .await
        .unwrap_err();
    match err {
        ConvergeError::Timeout {
            app_id,
            endpoint,
            attempts,
            ..
        } => {
            assert_eq!(app_id, "/web");
            assert_eq!(endpoint, server.uri());
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Timeout, got: {other}"),
    }
}
