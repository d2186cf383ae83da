// ABOUTME: Remote backend access: HTTP transport, retrying invoker and wire models
// ABOUTME: All outbound traffic to the comparison backend flows through this module

pub mod client;
pub mod models;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    BackendClient, ConnectionTestOutcome, HttpResponse, HttpTransport, Method, NetworkFailure,
    RequestSpec, Transport,
};
pub use retry::{classify, ErrorClass, Failure, RetryPolicy, RetryingInvoker};
