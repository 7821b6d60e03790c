//! S3ObjectFetcher against a mocked S3 endpoint

use s3mirror_aws::s3::S3ObjectFetcher;
use s3mirror_core::ports::IRemoteStore;

use crate::common::{mount_missing_object, mount_object, serve_once, session_for, setup_session};

#[tokio::test]
async fn test_fetch_object_returns_body() {
    let (server, session) = setup_session().await;
    mount_object(&server, "media", "photos/2024/cat.jpg", b"\x89PNG fake image").await;

    let fetcher = S3ObjectFetcher::new(&session);
    let data = fetcher
        .fetch_object("media", "photos/2024/cat.jpg")
        .await
        .unwrap();

    assert_eq!(data, b"\x89PNG fake image");
}

#[tokio::test]
async fn test_fetch_from_several_buckets() {
    let (server, session) = setup_session().await;
    mount_object(&server, "media", "a.txt", b"a").await;
    mount_object(&server, "backups", "a.txt", b"backup a").await;

    let fetcher = S3ObjectFetcher::new(&session);

    assert_eq!(fetcher.fetch_object("media", "a.txt").await.unwrap(), b"a");
    assert_eq!(
        fetcher.fetch_object("backups", "a.txt").await.unwrap(),
        b"backup a"
    );
}

#[tokio::test]
async fn test_fetch_missing_object_is_error() {
    let (server, session) = setup_session().await;
    mount_missing_object(&server, "media", "gone.txt").await;

    let fetcher = S3ObjectFetcher::new(&session);
    let err = fetcher.fetch_object("media", "gone.txt").await.unwrap_err();

    assert!(err.to_string().contains("s3://media/gone.txt"));
}

#[tokio::test]
async fn test_fetch_keeps_empty_segments() {
    let (server, session) = setup_session().await;
    mount_object(&server, "media", "a//b.txt", b"double-slash object").await;
    mount_object(&server, "media", "a/b.txt", b"different object").await;

    let fetcher = S3ObjectFetcher::new(&session);

    assert_eq!(
        fetcher.fetch_object("media", "a//b.txt").await.unwrap(),
        b"double-slash object"
    );
    assert_eq!(
        fetcher.fetch_object("media", "a/b.txt").await.unwrap(),
        b"different object"
    );
}

#[tokio::test]
async fn test_fetch_keeps_leading_separator() {
    let (server, session) = setup_session().await;
    mount_object(&server, "media", "/lead.txt", b"leading slash object").await;
    mount_object(&server, "media", "lead.txt", b"different object").await;

    let fetcher = S3ObjectFetcher::new(&session);

    assert_eq!(
        fetcher.fetch_object("media", "/lead.txt").await.unwrap(),
        b"leading slash object"
    );
}

#[tokio::test]
async fn test_fetch_keeps_dot_segments() {
    let (endpoint, request) = serve_once(b"dot segment object").await;
    let fetcher = S3ObjectFetcher::new(&session_for(&endpoint).await);

    let data = fetcher.fetch_object("media", "a/./c.txt").await.unwrap();
    let target = request.await.unwrap();

    assert_eq!(data, b"dot segment object");
    assert_eq!(target.split('?').next(), Some("/media/a/./c.txt"));
}
