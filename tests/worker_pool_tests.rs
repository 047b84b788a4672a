use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use gantry::config::PipelineConfig;
use gantry::pipeline::MiddlewareRegistry;
use gantry::router::{Route, Router};
use gantry::runtime_config::RuntimeConfig;
use gantry::server::{AppService, RawRequest};
use gantry::worker_pool::{BackpressureMode, WorkerPool};
use http::Method;

fn addr() -> IpAddr {
    "203.0.113.7".parse().unwrap()
}

fn service(route_delay: Option<Duration>) -> Arc<AppService> {
    let router = Router::new();
    router.add_route(
        Route::new(
            Some(Method::GET),
            "/work",
            Arc::new(move |ctx| {
                if let Some(delay) = route_delay {
                    std::thread::sleep(delay);
                }
                ctx.response.body_vec(b"done".to_vec());
                Ok(())
            }),
        )
        .unwrap(),
    );
    let config = PipelineConfig::from_yaml("{}").unwrap();
    Arc::new(
        AppService::new(&config, Arc::new(router), Arc::new(MiddlewareRegistry::new())).unwrap(),
    )
}

#[test]
fn test_pool_processes_submitted_requests() {
    let pool = WorkerPool::start(
        service(None),
        RuntimeConfig {
            workers: 4,
            queue_bound: 16,
            backpressure_mode: BackpressureMode::Block,
        },
    );

    let receivers: Vec<_> = (0..10)
        .map(|_| pool.submit(RawRequest::new("GET", "/work", addr())))
        .collect();
    for rx in receivers {
        let response = rx.recv().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"done");
    }

    assert_eq!(pool.dispatched_count(), 10);
    pool.shutdown();
}

#[test]
fn test_shutdown_drains_in_flight_requests() {
    let pool = WorkerPool::start(
        service(Some(Duration::from_millis(20))),
        RuntimeConfig {
            workers: 2,
            queue_bound: 8,
            backpressure_mode: BackpressureMode::Block,
        },
    );

    let receivers: Vec<_> = (0..4)
        .map(|_| pool.submit(RawRequest::new("GET", "/work", addr())))
        .collect();
    pool.shutdown();
    for rx in receivers {
        assert_eq!(rx.recv().unwrap().status, 200);
    }
}

#[test]
fn test_shed_mode_answers_429_when_queue_full() {
    let pool = WorkerPool::start(
        service(Some(Duration::from_millis(300))),
        RuntimeConfig {
            workers: 1,
            queue_bound: 1,
            backpressure_mode: BackpressureMode::Shed,
        },
    );

    // First request occupies the single worker...
    let first = pool.submit(RawRequest::new("GET", "/work", addr()));
    std::thread::sleep(Duration::from_millis(50));
    // ...second fills the queue slot, third has nowhere to go.
    let second = pool.submit(RawRequest::new("GET", "/work", addr()));
    let third = pool.submit(RawRequest::new("GET", "/work", addr()));

    let shed_response = third.recv().unwrap();
    assert_eq!(shed_response.status, 429);
    assert_eq!(pool.shed_count(), 1);

    assert_eq!(first.recv().unwrap().status, 200);
    assert_eq!(second.recv().unwrap().status, 200);
    pool.shutdown();
}

#[test]
fn test_backpressure_mode_parsing() {
    assert_eq!(
        BackpressureMode::from_str("block"),
        Some(BackpressureMode::Block)
    );
    assert_eq!(
        BackpressureMode::from_str("SHED"),
        Some(BackpressureMode::Shed)
    );
    assert_eq!(BackpressureMode::from_str("other"), None);
    assert_eq!(BackpressureMode::default(), BackpressureMode::Block);
}
