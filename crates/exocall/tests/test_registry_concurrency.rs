//! Tests for concurrent first access to the method registry.

mod common;

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use rand::Rng;

use exocall::Client;
use exocall::ConverterFactory;
use exocall::Error;
use exocall::Lookup;
use exocall::Metadata;
use exocall::RawResponse;
use exocall::ResponseBody;
use exocall::ResponseConverter;
use exocall::ServiceDecl;
use exocall::Shape;
use exocall::Value;
use exocall::mock::MockCallFactory;
use exocall::mock::route;
use exocall::MethodRecord;
use exocall::Verb;

/// Offers a converter for `Slow`, sleeping a random few milliseconds first.
///
/// Every probe for `Slow` is counted, so the count is the number of builds.
struct SlowConverters {
    builds: Arc<AtomicUsize>,
    fail_first: bool,
}

fn discard(_body: ResponseBody) -> anyhow::Result<Value> {
    Ok(Box::new(()))
}

impl ConverterFactory for SlowConverters {
    fn response_converter(
        &self,
        shape: &Shape,
        _metadata: &Metadata,
        _lookup: &Lookup<'_>,
    ) -> anyhow::Result<Option<Arc<dyn ResponseConverter>>> {
        if !shape.raw().is_some_and(|raw| raw.starts_with("Slow")) {
            return Ok(None);
        }
        let jitter = rand::thread_rng().gen_range(0..5);
        thread::sleep(Duration::from_millis(jitter));

        let previous = self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && previous == 0 {
            anyhow::bail!("cold start");
        }
        Ok(Some(Arc::new(discard)))
    }
}

fn slow_client(builds: Arc<AtomicUsize>, fail_first: bool) -> Client {
    common::init_tracing();
    Client::builder()
        .base_url("https://api.test/")
        .call_factory(Arc::new(MockCallFactory::replying(RawResponse::ok(""))))
        .add_converter_factory(SlowConverters { builds, fail_first })
        .build()
        .expect("Failed to build client")
}

fn slow_method(name: &str, payload: &'static str) -> MethodRecord {
    MethodRecord::direct(name, Verb::Get, Shape::call(Shape::named(payload)), route(Verb::Get, "slow"))
}

#[test]
fn test_concurrent_first_access_builds_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = slow_client(builds.clone(), false);
    let service = client
        .register(ServiceDecl::new("Slow").method(slow_method("get", "Slow")))
        .expect("Failed to register service");
    let id = service.id("get").expect("Method not registered");

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let client = client.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                client.resolve(id).expect("Resolve failed")
            })
        })
        .collect();

    let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().expect("Thread panicked")).collect();
    for descriptor in &descriptors {
        assert!(Arc::ptr_eq(descriptor, &descriptors[0]));
    }
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_distinct_methods_build_independently() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = slow_client(builds.clone(), false);
    let service = client
        .register(
            ServiceDecl::new("Slow")
                .method(slow_method("a", "SlowA"))
                .method(slow_method("b", "SlowB")),
        )
        .expect("Failed to register service");
    let ids: Vec<_> = service.ids().collect();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads * ids.len()));
    let mut handles = Vec::new();
    for &id in &ids {
        for _ in 0..threads {
            let client = client.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                client.resolve(id).expect("Resolve failed").id()
            }));
        }
    }

    for handle in handles {
        let id = handle.join().expect("Thread panicked");
        assert!(ids.contains(&id));
    }
    assert_eq!(builds.load(Ordering::SeqCst), 2);

    let a = client.descriptor(ids[0]).expect("Not built");
    let b = client.descriptor(ids[1]).expect("Not built");
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_failed_build_is_retried() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = slow_client(builds.clone(), true);
    let service = client
        .register(ServiceDecl::new("Slow").method(slow_method("get", "Slow")))
        .expect("Failed to register service");
    let id = service.id("get").expect("Method not registered");

    let err = client.resolve(id).unwrap_err();
    assert!(matches!(err, Error::Factory { method: Some(m), .. } if m == "Slow.get"));
    assert!(client.descriptor(id).is_none());

    let first = client.resolve(id).expect("Retry failed");
    let second = client.resolve(id).expect("Cached resolve failed");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_clones_share_the_registry() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = slow_client(builds.clone(), false);
    let twin = client.clone();
    let service = client
        .register(ServiceDecl::new("Slow").method(slow_method("get", "Slow")))
        .expect("Failed to register service");
    let id = service.id("get").expect("Method not registered");

    let a = client.resolve(id).expect("Resolve failed");
    let b = twin.resolve(id).expect("Resolve failed");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}
