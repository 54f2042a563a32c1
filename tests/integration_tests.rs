//! Integration tests driving a consumer through simulated request
//! lifecycles, the way an external request-dispatch runtime would.

use http::{HeaderMap, Method, StatusCode};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether::converters::{Converter, SchemaFactory, TypeShape};
use tether::hooks::{AuditorFn, ExceptionFn, ResponderFn};
use tether::metadata::RequestMetadata;
use tether::retry::{after_attempt, after_delay, RetryOnTimeout};
use tether::{Consumer, Error, Response};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tether=debug")
        .try_init();
}

/// Stand-in for the external backoff scheduler.
fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(100 * attempt as u64)
}

/// Simulates the request-dispatch runtime around a scripted transport:
/// audit, attempt, retry under the consumer's predicate and breaker, run
/// responses through the hook pipeline and the resolved body converter.
fn dispatch(
    consumer: &Consumer,
    metadata: &RequestMetadata,
    shape: &TypeShape,
    transport: &mut dyn FnMut(usize) -> Result<Response, Error>,
) -> Result<Value, Error> {
    consumer.audit_request(metadata)?;

    let mut session = consumer.retry_session();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match transport(attempt) {
            Ok(response) => {
                let response = consumer.handle_response(response)?;
                let body = match consumer.registry().resolve_response_body(shape, metadata) {
                    Some(converter) => converter.convert(response.body)?,
                    // Absent converter: the unprocessed body is the result.
                    None => response.body,
                };
                return Ok(body);
            }
            Err(error) => {
                if !consumer.retry_predicate().should_retry(&error, attempt) {
                    consumer.handle_exception(error)?;
                    return Ok(Value::Null);
                }
                session.notify_attempt();
                if session.should_stop(backoff(attempt)) {
                    consumer.handle_exception(error)?;
                    return Ok(Value::Null);
                }
            }
        }
    }
}

fn server_error() -> Error {
    Error::HttpError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        raw_response: "upstream exploded".to_string(),
        headers: HeaderMap::new(),
    }
}

#[test]
fn successful_request_converts_the_response_body() {
    init_tracing();
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .converter_factory(SchemaFactory::<User>::new())
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/users/1");
    let body = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| {
            Ok(Response::new(
                StatusCode::OK,
                HeaderMap::new(),
                json!({"id": 1, "name": "Alice"}),
            ))
        },
    )
    .unwrap();

    let user: User = serde_json::from_value(body).unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "Alice".to_string()
        }
    );
}

#[test]
fn absent_converter_returns_the_unprocessed_body() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/misc");
    let body = dispatch(
        &consumer,
        &metadata,
        // No factory handles this shape.
        &TypeShape::scalar::<User>(),
        &mut |_| {
            Ok(Response::new(
                StatusCode::OK,
                HeaderMap::new(),
                json!({"anything": true}),
            ))
        },
    )
    .unwrap();

    assert_eq!(body, json!({"anything": true}));
}

#[test]
fn conversion_failure_propagates_unchanged() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .converter_factory(SchemaFactory::<User>::new())
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/users/1");
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| {
            Ok(Response::new(
                StatusCode::OK,
                HeaderMap::new(),
                json!({"id": "not-a-number", "name": 7}),
            ))
        },
    );

    assert!(matches!(result, Err(Error::ConversionFailed { .. })));
}

#[test]
fn retries_until_the_breaker_stops() {
    init_tracing();
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .breaker(after_attempt(3))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let metadata = RequestMetadata::new(Method::GET, "/flaky");
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(server_error())
        },
    );

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(result, Err(Error::HttpError { .. })));
}

#[test]
fn non_retryable_errors_stop_immediately() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .breaker(after_attempt(5))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let metadata = RequestMetadata::new(Method::GET, "/bad-request");
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(Error::HttpError {
                status: StatusCode::BAD_REQUEST,
                raw_response: "no".to_string(),
                headers: HeaderMap::new(),
            })
        },
    );

    // 4xx is not retryable: one transport call, error re-raised unmasked.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        result,
        Err(Error::HttpError { status, .. }) if status == StatusCode::BAD_REQUEST
    ));
}

#[test]
fn flaky_request_recovers_before_the_breaker_trips() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .breaker(after_attempt(5))
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/eventually-ok");
    let body = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |attempt| {
            if attempt < 3 {
                Err(server_error())
            } else {
                Ok(Response::new(StatusCode::OK, HeaderMap::new(), json!("ok"))
                    .with_attempts(attempt))
            }
        },
    )
    .unwrap();

    assert_eq!(body, json!("ok"));
}

#[test]
fn or_breaker_stops_on_the_delay_threshold_first() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        // backoff() proposes 100ms * attempt, so the delay threshold trips
        // on the third cycle, well before the attempt threshold.
        .breaker(after_attempt(10) | after_delay(Duration::from_millis(250)))
        .build()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let metadata = RequestMetadata::new(Method::GET, "/slow");
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(server_error())
        },
    );

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(result.is_err());
}

#[test]
fn auditors_run_once_before_the_transport() {
    let audits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&audits);
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .hook(AuditorFn::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/audited");
    dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| Ok(Response::new(StatusCode::OK, HeaderMap::new(), json!(null))),
    )
    .unwrap();

    assert_eq!(audits.load(Ordering::SeqCst), 1);
}

#[test]
fn a_rejecting_auditor_aborts_before_the_transport_runs() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .hook(AuditorFn::new(|_, request| {
            if request.method_annotation("unsafe").is_some() {
                Err(Error::ConfigurationError("unsafe request refused".into()))
            } else {
                Ok(())
            }
        }))
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::POST, "/dangerous")
        .with_method_annotation(tether::Annotation::flag("unsafe"));
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| panic!("transport must not run after an audit rejection"),
    );

    assert!(matches!(result, Err(Error::ConfigurationError(_))));
}

#[test]
fn response_handlers_pipeline_before_conversion() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .converter_factory(SchemaFactory::<User>::new())
        // Unwrap the envelope, then pick the payload field.
        .hook(ResponderFn::new(|_, response: Response| {
            Ok(response.map_body(|body| body["envelope"].clone()))
        }))
        .hook(ResponderFn::new(|_, response: Response| {
            Ok(response.map_body(|body| body["user"].clone()))
        }))
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/users/1");
    let body = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| {
            Ok(Response::new(
                StatusCode::OK,
                HeaderMap::new(),
                json!({"envelope": {"user": {"id": 2, "name": "Bea"}}}),
            ))
        },
    )
    .unwrap();

    assert_eq!(body, json!({"id": 2, "name": "Bea"}));
}

#[test]
fn masked_exceptions_do_not_surface() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .retry_predicate(Box::new(RetryOnTimeout))
        .breaker(after_attempt(1))
        .hook(ExceptionFn::new(|_, error: &Error| {
            matches!(error, Error::Timeout)
        }))
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/timeouty");
    let result = dispatch(
        &consumer,
        &metadata,
        &TypeShape::scalar::<User>(),
        &mut |_| Err(Error::Timeout),
    );

    // The timeout was masked by the hook, so the dispatch reports no error.
    assert_eq!(result.unwrap(), Value::Null);
}

#[test]
fn string_converters_resolve_through_the_default_factory() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::GET, "/search")
        .with_query_param("page", "1");
    let converter = consumer
        .registry()
        .resolve_string(&TypeShape::scalar::<i64>(), &metadata)
        .unwrap();

    assert_eq!(converter.convert(json!(42)).unwrap(), json!("42"));
}

#[test]
fn request_bodies_convert_through_nested_containers() {
    let consumer = Consumer::builder()
        .base_url("https://api.example.com")
        .unwrap()
        .converter_factory(SchemaFactory::<User>::new())
        .build()
        .unwrap();

    let metadata = RequestMetadata::new(Method::POST, "/teams");
    let shape = TypeShape::mapping_of(
        TypeShape::scalar::<String>(),
        TypeShape::sequence_of(TypeShape::scalar::<User>()),
    );
    let converter = consumer
        .registry()
        .resolve_request_body(&shape, &metadata)
        .unwrap();

    let body = converter
        .convert(json!({"admins": [{"id": 1, "name": "Alice"}]}))
        .unwrap();
    assert_eq!(body, json!({"admins": [{"id": 1, "name": "Alice"}]}));

    // A scalar where a sequence is expected is wrapped, not rejected.
    let wrapped = converter
        .convert(json!({"admins": {"id": 2, "name": "Bea"}}))
        .unwrap();
    assert_eq!(wrapped, json!({"admins": [{"id": 2, "name": "Bea"}]}));
}

#[rstest]
#[case(Duration::from_secs(5), false)]
#[case(Duration::from_secs(10), false)]
#[case(Duration::from_secs(15), true)]
fn after_delay_thresholds(#[case] proposed: Duration, #[case] stops: bool) {
    let mut session = after_delay(Duration::from_secs(10)).session();
    session.notify_attempt();
    assert_eq!(session.should_stop(proposed), stops);
}

#[rstest]
#[case(1, 1)]
#[case(3, 3)]
#[case(7, 7)]
fn after_attempt_stops_exactly_on_the_threshold(#[case] threshold: usize, #[case] cycles: usize) {
    let mut session = after_attempt(threshold).session();
    for cycle in 1..=cycles {
        session.notify_attempt();
        let stopped = session.should_stop(Duration::ZERO);
        assert_eq!(stopped, cycle == threshold);
    }
}
