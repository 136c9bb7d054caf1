use std::time::Duration;

use reqwest::{Method, StatusCode};
use restful_loadtest::{Feeder, HttpRemote, Injection, Step, run};
use restful_test::server::{Faults, TestServer};

fn injection() -> Injection {
    Injection {
        users: 4,
        duration: Duration::from_millis(300),
    }
}

async fn run_against(server: &TestServer) -> restful_loadtest::Report {
    let remote = HttpRemote::new(&server.url("/objects"), Duration::from_secs(5)).unwrap();
    let feeder = Feeder::sample().unwrap();
    run(remote, feeder, injection()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn healthy_api_passes_all_iterations() {
    restful_test::tracing::init();
    let server = TestServer::new().await;

    let report = run_against(&server).await;
    let metrics = &report.metrics;

    assert_eq!(report.users, 4);
    assert!(metrics.successes > 0);
    assert_eq!(metrics.failures(), 0);
    assert!(report.elapsed >= Duration::from_millis(300));

    // every started user ran to completion before the run returned
    let iterations = metrics.iterations() as usize;
    assert_eq!(server.request_count(Method::POST), iterations);
    assert_eq!(server.request_count(Method::PUT), iterations);
    assert_eq!(server.request_count(Method::GET), iterations);

    for step in Step::ALL {
        assert_eq!(metrics.step(step).timing.count(), iterations);
        assert_eq!(metrics.step(step).failures, 0);
    }
    assert_eq!(metrics.iteration_timing.count(), iterations);

    report.print();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn feeder_wraps_around_the_dataset() {
    let server = TestServer::new().await;

    let report = run_against(&server).await;

    let names: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == Method::POST)
        .map(|r| r.body.unwrap()["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names.len() as u64, report.metrics.iterations());

    // every iteration consumed exactly one record, wrapping around the dataset
    let sample = Feeder::sample().unwrap();
    let total = names.len();
    for i in 0..sample.len() {
        let name = sample.next_record().name;
        let expected = total / sample.len() + usize::from(i < total % sample.len());
        let actual = names.iter().filter(|n| **n == name).count();
        assert_eq!(actual, expected, "record {name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_update_is_counted_and_skips_read() {
    let server = TestServer::with_faults(Faults {
        update_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        ..Default::default()
    })
    .await;

    let report = run_against(&server).await;
    let metrics = &report.metrics;

    assert_eq!(metrics.successes, 0);
    assert!(metrics.status_failures > 0);
    assert_eq!(metrics.failures(), metrics.status_failures);
    assert_eq!(metrics.step(Step::Update).failures, metrics.status_failures);
    assert_eq!(metrics.step(Step::Read).timing.count(), 0);
    assert_eq!(server.request_count(Method::GET), 0);

    report.print();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inconsistent_reads_are_counted() {
    let server = TestServer::with_faults(Faults {
        stale_read: true,
        ..Default::default()
    })
    .await;

    let report = run_against(&server).await;

    assert_eq!(report.metrics.successes, 0);
    assert!(report.metrics.consistency_failures > 0);
    assert_eq!(report.metrics.failures(), report.metrics.consistency_failures);
    assert_eq!(
        report.metrics.step(Step::Read).timing.count() as u64,
        report.metrics.iterations()
    );
}

#[tokio::test]
async fn zero_users_is_rejected() {
    let server = TestServer::new().await;
    let remote = HttpRemote::new(&server.url("/objects"), Duration::from_secs(1)).unwrap();

    let injection = Injection {
        users: 0,
        duration: Duration::from_millis(10),
    };
    assert!(run(remote, Feeder::sample().unwrap(), injection).await.is_err());
}
