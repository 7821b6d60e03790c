//! Integration tests for the AWS adapters against wiremock servers

mod common;
mod s3_tests;
mod sqs_tests;
