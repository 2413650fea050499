use pb_org::{BackendId, Error, OrgConfig, OrgConnection, Orgs, SObject};

use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::time::timeout;
use tracing_test::traced_test;
use wiremock::{
	matchers::{body_json, body_string_contains, header, method, path, query_param},
	Mock, MockServer, ResponseTemplate,
};

fn config(server: &MockServer) -> OrgConfig {
	OrgConfig::new("client-id", "client-secret", "user@example.com", "password")
		.with_login_url(server.uri())
		.with_request_timeout(Duration::from_millis(500))
}

async fn mount_token(server: &MockServer, access_token: &str) {
	Mock::given(method("POST"))
		.and(path("/services/oauth2/token"))
		.and(body_string_contains("grant_type=password"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"access_token": access_token,
			"instance_url": server.uri(),
			"token_type": "Bearer",
			"issued_at": "1700000000000",
		})))
		.mount(server)
		.await;
}

#[tokio::test]
#[traced_test]
async fn authenticate_then_query() {
	let server = MockServer::start().await;
	mount_token(&server, "token-1").await;

	Mock::given(method("GET"))
		.and(path("/services/data/v24.0/query"))
		.and(query_param("q", "select Id from CMC_Task__c"))
		.and(header("authorization", "Bearer token-1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"totalSize": 1,
			"done": true,
			"records": [{ "Id": "T1" }],
		})))
		.expect(1)
		.mount(&server)
		.await;

	let connection = OrgConnection::new(BackendId::Target, config(&server)).unwrap();
	let session = connection.authenticate().await.unwrap();
	assert_eq!(session.token().access_token, "token-1");

	let records = session.query("select Id from CMC_Task__c").await.unwrap();
	assert_eq!(records.total_size, 1);
	assert_eq!(records.first().unwrap()["Id"], "T1");
}

#[tokio::test]
#[traced_test]
async fn authentication_rejected() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/services/oauth2/token"))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!({
			"error": "invalid_grant",
			"error_description": "authentication failure",
		})))
		.mount(&server)
		.await;

	let connection = OrgConnection::new(BackendId::Source, config(&server)).unwrap();

	match connection.authenticate().await {
		Err(Error::Auth { backend, message }) => {
			assert_eq!(backend, BackendId::Source);
			assert_eq!(message, "authentication failure");
		}
		Err(e) => panic!("unexpected error: {e}"),
		Ok(_) => panic!("authentication should have failed"),
	};
}

#[tokio::test]
#[traced_test]
async fn update_sends_field_map() {
	let server = MockServer::start().await;
	mount_token(&server, "token-1").await;

	Mock::given(method("PATCH"))
		.and(path("/services/data/v24.0/sobjects/Challenge__c/C1"))
		.and(header("authorization", "Bearer token-1"))
		.and(body_json(json!({ "Reference_Number__c": "P-42" })))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let connection = Arc::new(OrgConnection::new(BackendId::Source, config(&server)).unwrap());
	let target = Arc::new(OrgConnection::new(BackendId::Target, config(&server)).unwrap());
	let orgs = Orgs::new(Arc::clone(&connection), target);

	let session = orgs.authenticate(BackendId::Source).await.unwrap();
	assert_eq!(session.backend(), BackendId::Source);

	session
		.update(&SObject::new("Challenge__c", "C1").with_field("Reference_Number__c", "P-42"))
		.await
		.unwrap();
}

#[tokio::test]
#[traced_test]
async fn update_rejected_carries_upstream_message() {
	let server = MockServer::start().await;
	mount_token(&server, "token-1").await;

	Mock::given(method("PATCH"))
		.and(path("/services/data/v24.0/sobjects/CMC_Task__c/T1"))
		.respond_with(ResponseTemplate::new(400).set_body_json(json!([{
			"message": "Status is invalid",
			"errorCode": "FIELD_CUSTOM_VALIDATION_EXCEPTION",
		}])))
		.mount(&server)
		.await;

	let connection = OrgConnection::new(BackendId::Target, config(&server)).unwrap();
	let session = connection.authenticate().await.unwrap();

	let err = session
		.update(&SObject::new("CMC_Task__c", "T1").with_field("CloudSpokes_Task_Status__c", "Bogus"))
		.await
		.unwrap_err();

	match err {
		Error::Update {
			object_type,
			record_id,
			message,
			..
		} => {
			assert_eq!(object_type, "CMC_Task__c");
			assert_eq!(record_id, "T1");
			assert_eq!(message, "FIELD_CUSTOM_VALIDATION_EXCEPTION: Status is invalid");
		}
		e => panic!("unexpected error: {e}"),
	}
}

#[tokio::test]
#[traced_test]
async fn slow_query_times_out() {
	let server = MockServer::start().await;
	mount_token(&server, "token-1").await;

	Mock::given(method("GET"))
		.and(path("/services/data/v24.0/query"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "totalSize": 0, "done": true, "records": [] }))
				.set_delay(Duration::from_secs(2)),
		)
		.mount(&server)
		.await;

	let connection = OrgConnection::new(BackendId::Target, config(&server)).unwrap();
	let session = connection.authenticate().await.unwrap();

	let err = session.query("select Id from CMC_Task__c").await.unwrap_err();
	assert!(err.is_timeout(), "expected a timeout, got: {err}");
	assert_eq!(err.backend(), Some(BackendId::Target));
}

#[tokio::test]
#[traced_test]
async fn sessions_on_one_org_are_serialized() {
	let server = MockServer::start().await;
	mount_token(&server, "token-1").await;

	let connection = Arc::new(OrgConnection::new(BackendId::Target, config(&server)).unwrap());

	let first = connection.authenticate().await.unwrap();

	let waiting = tokio::spawn({
		let connection = Arc::clone(&connection);
		async move { connection.authenticate().await.map(|session| session.into_token()) }
	});

	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(!waiting.is_finished(), "second authentication must wait for the first session");

	drop(first);

	let token = timeout(Duration::from_secs(2), waiting)
		.await
		.expect("second authentication never completed")
		.unwrap()
		.unwrap();
	assert_eq!(token.access_token, "token-1");
}
