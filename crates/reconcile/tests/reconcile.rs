use pb_org::{BackendId, OrgConfig, OrgConnection, Orgs};
use pb_stream::ChangeEvent;
use pb_sync::{
	lookup::project_query, MirrorOutcome, Notification, Notifier, Propagation, ReconcileConfig,
	Reconciler,
};

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing_test::traced_test;
use wiremock::{
	matchers::{body_json, header, method, path, query_param},
	Mock, MockServer, ResponseTemplate,
};

const QUERY_PATH: &str = "/services/data/v24.0/query";
const TASK_PATH: &str = "/services/data/v24.0/sobjects/CMC_Task__c/T1";
const CHALLENGE_PATH: &str = "/services/data/v24.0/sobjects/Challenge__c/C1";

struct Fixture {
	source: MockServer,
	target: MockServer,
	reconciler: Reconciler,
	notifications: broadcast::Receiver<Notification>,
}

async fn org(backend: BackendId, access_token: &str) -> (MockServer, Arc<OrgConnection>) {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/services/oauth2/token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"access_token": access_token,
			"instance_url": server.uri(),
			"token_type": "Bearer",
		})))
		.mount(&server)
		.await;

	let connection = OrgConnection::new(
		backend,
		OrgConfig::new("client-id", "client-secret", "user@example.com", "password")
			.with_login_url(server.uri())
			.with_request_timeout(Duration::from_secs(2)),
	)
	.unwrap();

	(server, Arc::new(connection))
}

async fn fixture(config: ReconcileConfig) -> Fixture {
	let (source, source_connection) = org(BackendId::Source, "source-token").await;
	let (target, target_connection) = org(BackendId::Target, "target-token").await;

	let notifier = Notifier::default();
	let notifications = notifier.subscribe();

	Fixture {
		source,
		target,
		reconciler: Reconciler::new(
			Orgs::new(source_connection, target_connection),
			notifier,
			config,
		),
		notifications,
	}
}

fn event() -> ChangeEvent {
	ChangeEvent::from_payload(&json!({
		"sobject": {
			"Challenge__c": "C1",
			"CMC_Task__c": "T1",
			"Status__c": "Active",
			"Submissions__c": 5,
		},
	}))
	.unwrap()
}

fn chain(project_id: Value) -> Value {
	json!({
		"totalSize": 1,
		"done": true,
		"records": [{
			"Id": "T1",
			"Story__r": { "Sprint__r": { "Release__r": { "Project__r": { "pse__Project_ID__c": project_id } } } },
		}],
	})
}

async fn mount_query(target: &MockServer, response: ResponseTemplate) {
	Mock::given(method("GET"))
		.and(path(QUERY_PATH))
		.and(query_param("q", project_query("T1")))
		.and(header("authorization", "Bearer target-token"))
		.respond_with(response)
		.expect(1)
		.mount(target)
		.await;
}

async fn mount_task_update(target: &MockServer, response: ResponseTemplate, times: u64) {
	Mock::given(method("PATCH"))
		.and(path(TASK_PATH))
		.and(header("authorization", "Bearer target-token"))
		.and(body_json(json!({
			"CloudSpokes_Task_Status__c": "Active",
			"CloudSpokes_Submission_Count__c": 5,
		})))
		.respond_with(response)
		.expect(times)
		.mount(target)
		.await;
}

async fn mount_challenge_update(source: &MockServer, times: u64) {
	Mock::given(method("PATCH"))
		.and(path(CHALLENGE_PATH))
		.and(header("authorization", "Bearer source-token"))
		.and(body_json(json!({ "Reference_Number__c": "P-42" })))
		.respond_with(ResponseTemplate::new(204))
		.expect(times)
		.mount(source)
		.await;
}

fn drain(notifications: &mut broadcast::Receiver<Notification>) -> Vec<String> {
	let mut messages = Vec::new();
	while let Ok(notification) = notifications.try_recv() {
		messages.push(notification.message);
	}
	messages.sort();
	messages
}

#[tokio::test]
#[traced_test]
async fn end_to_end_with_resolvable_chain() {
	let mut fixture = fixture(ReconcileConfig::default()).await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(200).set_body_json(chain(json!("P-42"))),
	)
	.await;
	mount_task_update(&fixture.target, ResponseTemplate::new(204), 1).await;
	mount_challenge_update(&fixture.source, 1).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert_eq!(
		report.mirror.unwrap().unwrap(),
		MirrorOutcome::Updated {
			task_id: "T1".to_string()
		}
	);
	assert_eq!(
		report.propagation.unwrap().unwrap(),
		Propagation::Updated {
			challenge_id: "C1".to_string(),
			project_id: "P-42".to_string(),
		}
	);

	assert_eq!(
		drain(&mut fixture.notifications),
		vec![
			"CMC Task T1 updated with status of Active and 5 submissions.".to_string(),
			"CloudSpokes challenge C1 updated with Reference Number P-42.".to_string(),
		]
	);
}

#[tokio::test]
#[traced_test]
async fn missing_hop_never_updates_the_source() {
	let mut fixture = fixture(ReconcileConfig {
		mirror: false,
		propagate: true,
	})
	.await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(200).set_body_json(json!({
			"totalSize": 1,
			"done": true,
			"records": [{ "Id": "T1", "Story__r": { "Sprint__r": null } }],
		})),
	)
	.await;
	mount_challenge_update(&fixture.source, 0).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert!(report.mirror.is_none());
	assert_eq!(
		report.propagation.unwrap().unwrap(),
		Propagation::NotFound {
			task_id: "T1".to_string(),
			challenge_id: "C1".to_string(),
			hop: "Sprint__r",
		}
	);

	assert!(logs_contain("Could not find a ProjectId for task T1 for challenge C1"));
	assert_eq!(
		drain(&mut fixture.notifications),
		vec!["Could not find a ProjectId for task T1 for challenge C1".to_string()]
	);
}

#[tokio::test]
#[traced_test]
async fn empty_query_result_is_not_an_error() {
	let fixture = fixture(ReconcileConfig::default()).await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(200).set_body_json(json!({ "totalSize": 0, "done": true, "records": [] })),
	)
	.await;
	mount_task_update(&fixture.target, ResponseTemplate::new(204), 1).await;
	mount_challenge_update(&fixture.source, 0).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert!(matches!(
		report.propagation.unwrap(),
		Ok(Propagation::NotFound { hop: "records", .. })
	));
}

#[tokio::test]
#[traced_test]
async fn mirror_failure_does_not_stop_propagation() {
	let mut fixture = fixture(ReconcileConfig::default()).await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(200).set_body_json(chain(json!("P-42"))),
	)
	.await;
	mount_task_update(
		&fixture.target,
		ResponseTemplate::new(400).set_body_json(json!([{
			"message": "Status is invalid",
			"errorCode": "FIELD_CUSTOM_VALIDATION_EXCEPTION",
		}])),
		1,
	)
	.await;
	mount_challenge_update(&fixture.source, 1).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert!(matches!(
		report.mirror.unwrap(),
		Err(pb_org::Error::Update { .. })
	));
	assert!(matches!(
		report.propagation.unwrap(),
		Ok(Propagation::Updated { .. })
	));

	assert!(logs_contain("failed to mirror change onto target task"));

	let messages = drain(&mut fixture.notifications);
	assert_eq!(messages.len(), 2);
	assert!(messages[0].starts_with("CloudSpokes challenge C1 updated"));
	assert!(messages[1].starts_with("Could not update CMC Task T1"));
}

#[tokio::test]
#[traced_test]
async fn propagation_failure_does_not_stop_mirror() {
	let fixture = fixture(ReconcileConfig::default()).await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(500).set_body_string("upstream unavailable"),
	)
	.await;
	mount_task_update(&fixture.target, ResponseTemplate::new(204), 1).await;
	mount_challenge_update(&fixture.source, 0).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert!(matches!(
		report.mirror.unwrap(),
		Ok(MirrorOutcome::Updated { .. })
	));
	assert!(matches!(
		report.propagation.unwrap(),
		Err(pb_org::Error::Query { .. })
	));
}

#[tokio::test]
#[traced_test]
async fn source_authentication_failure_is_contained() {
	let fixture = fixture(ReconcileConfig::default()).await;

	fixture.source.reset().await;
	Mock::given(method("POST"))
		.and(path("/services/oauth2/token"))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!({
			"error": "invalid_grant",
			"error_description": "authentication failure",
		})))
		.mount(&fixture.source)
		.await;

	mount_query(
		&fixture.target,
		ResponseTemplate::new(200).set_body_json(chain(json!("P-42"))),
	)
	.await;
	mount_task_update(&fixture.target, ResponseTemplate::new(204), 1).await;

	let report = fixture.reconciler.reconcile(&event()).await;

	assert!(report.mirror.unwrap().is_ok());
	assert!(matches!(
		report.propagation.unwrap(),
		Err(pb_org::Error::Auth {
			backend: BackendId::Source,
			..
		})
	));
}

#[tokio::test]
#[traced_test]
async fn mirror_is_idempotent() {
	let fixture = fixture(ReconcileConfig {
		mirror: true,
		propagate: false,
	})
	.await;

	mount_task_update(&fixture.target, ResponseTemplate::new(204), 2).await;

	let event = event();
	fixture.reconciler.reconcile(&event).await;
	fixture.reconciler.reconcile(&event).await;

	let bodies = fixture
		.target
		.received_requests()
		.await
		.unwrap()
		.into_iter()
		.filter(|request| request.url.path() == TASK_PATH)
		.map(|request| serde_json::from_slice::<Value>(&request.body).unwrap())
		.collect::<Vec<_>>();

	assert_eq!(bodies.len(), 2);
	assert_eq!(bodies[0], bodies[1]);
	assert_eq!(
		bodies[0],
		json!({
			"CloudSpokes_Task_Status__c": "Active",
			"CloudSpokes_Submission_Count__c": 5,
		})
	);
}

#[tokio::test]
#[traced_test]
async fn change_without_task_touches_nothing() {
	let fixture = fixture(ReconcileConfig::default()).await;

	let event = ChangeEvent::from_payload(&json!({
		"sobject": { "Id": "C1", "Status__c": "Active" },
	}))
	.unwrap();

	let report = fixture.reconciler.reconcile(&event).await;

	assert_eq!(report.mirror.unwrap().unwrap(), MirrorOutcome::Skipped);
	assert_eq!(report.propagation.unwrap().unwrap(), Propagation::Skipped);
	assert!(fixture.source.received_requests().await.unwrap().is_empty());
	assert!(fixture.target.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn change_without_challenge_reference_only_mirrors() {
	let mut fixture = fixture(ReconcileConfig::default()).await;

	mount_task_update(&fixture.target, ResponseTemplate::new(204), 1).await;

	let event = ChangeEvent::from_payload(&json!({
		"sobject": { "CMC_Task__c": "T1", "Status__c": "Active", "Submissions__c": 5 },
	}))
	.unwrap();

	let report = fixture.reconciler.reconcile(&event).await;

	assert_eq!(
		report.mirror.unwrap().unwrap(),
		MirrorOutcome::Updated {
			task_id: "T1".to_string()
		}
	);
	assert_eq!(report.propagation.unwrap().unwrap(), Propagation::Skipped);

	assert!(fixture
		.target
		.received_requests()
		.await
		.unwrap()
		.iter()
		.all(|request| request.url.path() != QUERY_PATH));
	assert!(fixture.source.received_requests().await.unwrap().is_empty());
	assert_eq!(
		drain(&mut fixture.notifications),
		vec!["CMC Task T1 updated with status of Active and 5 submissions.".to_string()]
	);
}
