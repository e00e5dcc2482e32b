// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router tests, including the submit→reply scenarios end to end against a
//! real engine with a recording publisher standing in for the broker.

use super::*;
use gn_core::{JobError, OutputStream};
use gn_engine::{EngineConfig, JobEngine};
use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::rc::Rc;
use yare::parameterized;

#[derive(Debug, Clone, PartialEq)]
enum Published {
    Startup(Jid),
    Reject(Jid, String),
    Chunk(Jid, OutputStream, Vec<u8>),
    Stopped(Jid, i32),
    Announce(String),
    Json(String, serde_json::Value),
    Presence,
}

#[derive(Clone, Default)]
struct RecordingPublisher {
    events: Rc<RefCell<Vec<Published>>>,
}

impl RecordingPublisher {
    fn events(&self) -> Vec<Published> {
        self.events.borrow().clone()
    }

    fn stopped_status(&self, jid: Jid) -> Option<i32> {
        self.events().iter().find_map(|e| match e {
            Published::Stopped(j, status) if *j == jid => Some(*status),
            _ => None,
        })
    }
}

impl GridPublisher for RecordingPublisher {
    fn job_startup(&self, jid: Jid) {
        self.events.borrow_mut().push(Published::Startup(jid));
    }

    fn job_reject(&self, jid: Jid, reason: &str) {
        self.events
            .borrow_mut()
            .push(Published::Reject(jid, reason.to_string()));
    }

    fn job_chunk(&self, jid: Jid, stream: OutputStream, data: &[u8]) {
        self.events
            .borrow_mut()
            .push(Published::Chunk(jid, stream, data.to_vec()));
    }

    fn job_stopped(&self, jid: Jid, status: i32) {
        self.events.borrow_mut().push(Published::Stopped(jid, status));
    }

    fn announce(&self, text: &str) {
        self.events
            .borrow_mut()
            .push(Published::Announce(text.to_string()));
    }

    fn publish_json(&self, topic: &str, value: &serde_json::Value) {
        self.events
            .borrow_mut()
            .push(Published::Json(topic.to_string(), value.clone()));
    }

    fn presence(&self) {
        self.events.borrow_mut().push(Published::Presence);
    }
}

const NODE: &str = "nodeA";

fn setup(max_jobs: usize) -> (JobEngine, RecordingPublisher) {
    let publisher = RecordingPublisher::default();
    let sink = publisher.clone();
    let config = EngineConfig {
        job_shell: PathBuf::from("/bin/sh"),
        job_cwd: std::env::temp_dir(),
        max_jobs,
        buffer_size: 256,
        poll_delay_ms: 10,
        script_limit: 4096,
        stdout_limit: None,
        proc_limit: None,
    };
    let engine = JobEngine::new(
        config,
        Box::new(move |jid, status| sink.job_stopped(jid, status)),
    )
    .unwrap();
    (engine, publisher)
}

fn route(
    engine: &mut JobEngine,
    publisher: &RecordingPublisher,
    topic: &str,
    payload: &[u8],
) -> Flow {
    handle_message(topic, payload, engine, publisher, NODE)
}

fn pump_until_stopped(engine: &mut JobEngine, publisher: &RecordingPublisher, jid: Jid) {
    for _ in 0..1000 {
        engine.pump_once();
        if publisher.stopped_status(jid).is_some() {
            return;
        }
    }
    panic!("job {jid} did not stop in time");
}

// -- parsing --

#[parameterized(
    submit = { "nodeA/submit/0", Command::Submit { jid: Jid::new(0) } },
    submit_explicit = { "nodeA/submit/42", Command::Submit { jid: Jid::new(42) } },
    stdin = { "nodeA/stdin/9", Command::StdinWrite { jid: Jid::new(9) } },
    eof = { "nodeA/eof/9", Command::StdinEof { jid: Jid::new(9) } },
    signal = { "nodeA/signal/42/15", Command::Signal { jid: Jid::new(42), signum: 15 } },
    scram = { "nodeA/scram", Command::Scram },
    exit = { "nodeA/exit", Command::Exit },
    reload = { "nodeA/reload", Command::Reload },
    ping = { "grid/ping", Command::Ping },
    grid_scram = { "grid/scram", Command::Scram },
)]
fn parse_accepts(topic: &str, expected: Command) {
    assert_eq!(parse(NODE, topic), Some(expected));
}

#[parameterized(
    bad_jid = { "nodeA/submit/abc" },
    negative_jid = { "nodeA/stdin/-1" },
    bad_signum = { "nodeA/signal/5/hup" },
    missing_signum = { "nodeA/signal/5" },
    extra_segment = { "nodeA/submit/5/more" },
    unknown_verb = { "nodeA/bogus" },
    other_node = { "nodeB/submit/5" },
    bare_grid = { "grid/announce" },
    job_reply_namespace = { "job/5/stdout" },
)]
fn parse_rejects(topic: &str) {
    assert_eq!(parse(NODE, topic), None);
}

#[test]
fn unknown_topics_are_ignored() {
    let (mut engine, publisher) = setup(2);
    let flow = route(&mut engine, &publisher, "nodeA/bogus", b"");
    assert_eq!(flow, Flow::Continue);
    assert!(publisher.events().is_empty());
}

// -- submit→reply scenarios --

#[test]
fn happy_path_publishes_startup_stdout_stopped() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/0", b"echo hello");
    let jid = Jid::new(777);
    pump_until_stopped(&mut engine, &publisher, jid);

    assert_eq!(
        publisher.events(),
        vec![
            Published::Startup(jid),
            Published::Chunk(jid, OutputStream::Stdout, b"hello\n".to_vec()),
            Published::Stopped(jid, 0),
        ]
    );
}

#[test]
fn exit_code_is_published_as_raw_wait_status() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/5", b"exit 3");
    let jid = Jid::new(5);
    pump_until_stopped(&mut engine, &publisher, jid);

    let status = publisher.stopped_status(jid).unwrap();
    assert_eq!(ExitStatus::from_raw(status).code(), Some(3));
}

#[test]
fn stdin_and_eof_feed_the_job() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/9", b"cat");
    route(&mut engine, &publisher, "nodeA/stdin/9", b"abc");
    route(&mut engine, &publisher, "nodeA/eof/9", b"");
    let jid = Jid::new(9);
    pump_until_stopped(&mut engine, &publisher, jid);

    let events = publisher.events();
    assert!(events.contains(&Published::Chunk(jid, OutputStream::Stdout, b"abc".to_vec())));
    assert_eq!(publisher.stopped_status(jid), Some(0));
}

#[test]
fn signal_stops_the_job_with_sigterm_status() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/42", b"sleep 60");
    route(&mut engine, &publisher, "nodeA/signal/42/15", b"");
    let jid = Jid::new(42);
    pump_until_stopped(&mut engine, &publisher, jid);

    let status = publisher.stopped_status(jid).unwrap();
    assert_eq!(ExitStatus::from_raw(status).signal(), Some(15));
}

#[test]
fn submit_over_capacity_is_rejected_with_the_error_text() {
    let (mut engine, publisher) = setup(1);
    route(&mut engine, &publisher, "nodeA/submit/0", b"cat");
    route(&mut engine, &publisher, "nodeA/submit/0", b"cat");

    let reject = Published::Reject(Jid::new(778), JobError::CapacityExhausted.to_string());
    assert!(publisher.events().contains(&reject));

    route(&mut engine, &publisher, "nodeA/eof/777", b"");
    pump_until_stopped(&mut engine, &publisher, Jid::new(777));
}

#[test]
fn grid_scram_kills_every_running_job() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/0", b"sleep 60");
    route(&mut engine, &publisher, "nodeA/submit/0", b"sleep 60");
    route(&mut engine, &publisher, "grid/scram", b"");

    for jid in [Jid::new(777), Jid::new(778)] {
        pump_until_stopped(&mut engine, &publisher, jid);
        let status = publisher.stopped_status(jid).unwrap();
        assert_eq!(ExitStatus::from_raw(status).signal(), Some(9));
    }
    // SIGKILLed sleeps never produced output.
    assert!(!publisher
        .events()
        .iter()
        .any(|e| matches!(e, Published::Chunk(..))));
}

// -- the other verbs --

#[test]
fn duplicate_jid_submission_is_rejected_in_use() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/5", b"cat");
    route(&mut engine, &publisher, "nodeA/submit/5", b"true");

    let reject = Published::Reject(Jid::new(5), JobError::JidInUse.to_string());
    assert!(publisher.events().contains(&reject));

    route(&mut engine, &publisher, "nodeA/eof/5", b"");
    pump_until_stopped(&mut engine, &publisher, Jid::new(5));
}

#[test]
fn stdin_to_an_unknown_job_is_announced() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/stdin/404", b"data");

    let events = publisher.events();
    assert!(matches!(
        events.as_slice(),
        [Published::Announce(text)] if text.contains("404") && text.contains("no such job")
    ));
}

#[test]
fn ping_publishes_presence_and_a_roll_call() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/0", b"cat");
    route(&mut engine, &publisher, "grid/ping", b"");

    let events = publisher.events();
    assert!(events.contains(&Published::Presence));
    let expected = serde_json::json!({ "node": "nodeA", "jobs": [777] });
    assert!(events.contains(&Published::Json("node/rollcall".to_string(), expected)));

    route(&mut engine, &publisher, "nodeA/eof/777", b"");
    pump_until_stopped(&mut engine, &publisher, Jid::new(777));
}

#[test]
fn exit_requests_shutdown() {
    let (mut engine, publisher) = setup(2);
    let flow = route(&mut engine, &publisher, "nodeA/exit", b"");
    assert_eq!(flow, Flow::Shutdown);
}

#[test]
fn reload_is_refused_while_jobs_run() {
    let (mut engine, publisher) = setup(2);
    route(&mut engine, &publisher, "nodeA/submit/0", b"cat");

    let flow = route(&mut engine, &publisher, "nodeA/reload", b"");
    assert_eq!(flow, Flow::Continue);
    assert!(publisher
        .events()
        .contains(&Published::Announce("reload refused: jobs active".to_string())));

    route(&mut engine, &publisher, "nodeA/eof/777", b"");
    pump_until_stopped(&mut engine, &publisher, Jid::new(777));

    let flow = route(&mut engine, &publisher, "nodeA/reload", b"");
    assert_eq!(flow, Flow::Reload);
}

#[test]
fn scram_on_an_idle_node_just_announces() {
    let (mut engine, publisher) = setup(2);
    let flow = route(&mut engine, &publisher, "nodeA/scram", b"");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(
        publisher.events(),
        vec![Published::Announce("scram: killed all local jobs".to_string())]
    );
}
