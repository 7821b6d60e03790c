//! SqsMessageQueue against a mocked SQS endpoint (JSON protocol)

use s3mirror_aws::sqs::SqsMessageQueue;
use s3mirror_aws::AwsError;
use s3mirror_core::ports::{IMessageQueue, QueueMessage, ReceiptHandle};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    mount_queue_url, mount_sqs, queue_config, queue_url, setup_session, SQS_CONTENT_TYPE,
};

#[tokio::test]
async fn test_connect_resolves_queue_url() {
    let (server, session) = setup_session().await;
    mount_queue_url(&server).await;

    let queue = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap();

    assert_eq!(queue.queue_url(), queue_url(&server));
}

#[tokio::test]
async fn test_connect_fails_for_unknown_queue() {
    let (server, session) = setup_session().await;
    mount_sqs(
        &server,
        "GetQueueUrl",
        400,
        json!({
            "__type": "com.amazonaws.sqs#QueueDoesNotExist",
            "message": "The specified queue does not exist."
        }),
    )
    .await;

    let err = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap_err();

    assert!(matches!(err, AwsError::QueueUrl { ref queue, .. } if queue == "s3-events"));
}

#[tokio::test]
async fn test_receive_maps_messages() {
    let (server, session) = setup_session().await;
    mount_queue_url(&server).await;
    mount_sqs(
        &server,
        "ReceiveMessage",
        200,
        json!({
            "Messages": [
                { "MessageId": "m-1", "ReceiptHandle": "rh-1", "Body": "{\"Records\":[]}" },
                { "MessageId": "m-2", "Body": "no receipt handle" },
                { "MessageId": "m-3", "ReceiptHandle": "rh-3", "Body": "third" }
            ]
        }),
    )
    .await;

    let queue = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap();
    let messages = queue.receive(10).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message_id.as_deref(), Some("m-1"));
    assert_eq!(messages[0].receipt_handle.as_str(), "rh-1");
    assert_eq!(messages[0].body, "{\"Records\":[]}");
    assert_eq!(messages[1].display_id(), "m-3");
}

#[tokio::test]
async fn test_receive_empty_response() {
    let (server, session) = setup_session().await;
    mount_queue_url(&server).await;
    mount_sqs(&server, "ReceiveMessage", 200, json!({})).await;

    let queue = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap();

    assert!(queue.receive(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_receive_failure_is_error() {
    let (server, session) = setup_session().await;
    mount_queue_url(&server).await;
    mount_sqs(
        &server,
        "ReceiveMessage",
        500,
        json!({ "__type": "com.amazonaws.sqs#InternalError", "message": "boom" }),
    )
    .await;

    let queue = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap();

    assert!(queue.receive(10).await.is_err());
}

#[tokio::test]
async fn test_delete_sends_receipt_handle() {
    let (server, session) = setup_session().await;
    mount_queue_url(&server).await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "AmazonSQS.DeleteMessage"))
        .and(body_partial_json(json!({ "ReceiptHandle": "rh-42" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", SQS_CONTENT_TYPE)
                .set_body_string("{}"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let queue = SqsMessageQueue::connect(&session, &queue_config())
        .await
        .unwrap();
    let message = QueueMessage::new(Some("m-42".into()), "body", ReceiptHandle::new("rh-42"));

    queue.delete(message).await.unwrap();
}
