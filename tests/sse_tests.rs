mod common;

use common::http::{body, get, status};
use common::sse::{frame, SseClient};
use common::test_server::{serving_root, start_server};
use obs_sse_server::{Event, Lifecycle, ServerConfig, ServerError, ServerState};
use std::io::{ErrorKind, Read};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

fn welcome() -> String {
    frame("welcome", "Connected to OBS SSE Stream")
}

#[test]
fn test_welcome_then_one_copy_of_each_broadcast() {
    let (state, addr, _root) = start_server();
    let mut clients: Vec<SseClient> = (0..3).map(|_| SseClient::connect(&addr)).collect();
    for client in &mut clients {
        assert_eq!(client.next_frame(WAIT), Some(welcome()));
    }
    assert!(state.wait_for_clients(3, WAIT));
    assert_eq!(state.client_count(), 3);

    let report = state.broadcast(&Event::new("scene", "intro"));
    assert_eq!(report.delivered, 3);
    assert_eq!(report.dropped, 0);
    let report = state.broadcast(&Event::new("scene", "outro"));
    assert_eq!(report.delivered, 3);

    for client in &mut clients {
        assert_eq!(client.next_frame(WAIT), Some(frame("scene", "intro")));
        assert_eq!(client.next_frame(WAIT), Some(frame("scene", "outro")));
        assert_eq!(client.next_frame(Duration::from_millis(200)), None);
    }
    state.stop();
}

#[test]
fn test_status_page_counts_stream_clients() {
    let (state, addr, _root) = start_server();
    let mut a = SseClient::connect(&addr);
    let mut b = SseClient::connect(&addr);
    a.next_frame(WAIT).unwrap();
    b.next_frame(WAIT).unwrap();
    assert!(state.wait_for_clients(2, WAIT));

    let resp = get(&addr, "/status");
    assert_eq!(status(&resp), 200);
    assert!(body(&resp).contains("Connected SSE clients: <b>2</b>"));
    state.stop();
}

#[test]
fn test_hotkey_payload() {
    let (state, addr, _root) = start_server();
    let mut client = SseClient::connect(&addr);
    client.next_frame(WAIT).unwrap();
    assert!(state.wait_for_clients(1, WAIT));

    assert!(state.on_hotkey(true).is_none());
    let report = state.on_hotkey(false).unwrap();
    assert_eq!(report.delivered, 1);
    state.on_external_trigger("Final Round");

    let hotkey = client.next_frame(WAIT).unwrap();
    let data = hotkey
        .strip_prefix("event: hotkey_trigger\ndata: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .unwrap_or_else(|| panic!("unexpected frame {hotkey:?}"));
    let payload: serde_json::Value = serde_json::from_str(data).unwrap();
    assert_eq!(payload["press_count"], 1);
    assert_eq!(payload["message"], "OBS Hotkey Pressed!");
    let time = payload["time"].as_str().unwrap();
    assert_eq!(time.len(), 8, "{time}");
    assert_eq!(payload.as_object().unwrap().len(), 3);

    let text = client.next_frame(WAIT).unwrap();
    assert!(text.starts_with("event: hotkey_trigger\ndata: "), "{text}");
    assert!(text.contains("\"message\":\"FinalRound\""), "{text}");
    assert!(text.contains("\"press_count\":1"), "{text}");
    state.stop();
}

#[test]
fn test_disconnected_client_is_pruned() {
    let (state, addr, _root) = start_server();
    let mut stays = SseClient::connect(&addr);
    let leaves = SseClient::connect(&addr);
    stays.next_frame(WAIT).unwrap();
    assert!(state.wait_for_clients(2, WAIT));

    drop(leaves);
    let deadline = Instant::now() + Duration::from_secs(3);
    while state.client_count() > 1 && Instant::now() < deadline {
        state.broadcast(&Event::new("tick", "x"));
        thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(state.client_count(), 1);

    let report = state.broadcast(&Event::new("after", "prune"));
    assert_eq!(report.delivered, 1);
    let last = loop {
        let f = stays.next_frame(WAIT).unwrap();
        if !f.starts_with("event: tick") {
            break f;
        }
    };
    assert_eq!(last, frame("after", "prune"));
    state.stop();
}

#[test]
fn test_stop_with_open_streams_is_prompt() {
    let (state, addr, root) = start_server();
    let mut clients: Vec<SseClient> = (0..5).map(|_| SseClient::connect(&addr)).collect();
    for client in &mut clients {
        client.next_frame(WAIT).unwrap();
    }
    assert!(state.wait_for_clients(5, WAIT));

    let started = Instant::now();
    state.stop();
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    assert_eq!(state.lifecycle(), Lifecycle::Stopped);
    assert_eq!(state.client_count(), 0);
    for client in &mut clients {
        assert!(client.wait_closed(WAIT));
    }

    // Same port is free again.
    let again = state.start("127.0.0.1", addr.port(), root.path()).unwrap();
    assert_eq!(again, addr);
    assert_eq!(status(&get(&addr, "/json-data")), 200);
    state.stop();
}

#[test]
fn test_stop_before_start_and_twice() {
    let state = ServerState::new();
    state.stop();
    assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);

    let root = serving_root();
    state.start("127.0.0.1", 0, root.path()).unwrap();
    state.stop();
    state.stop();
    assert_eq!(state.lifecycle(), Lifecycle::Stopped);
}

#[test]
fn test_port_in_use_then_retry() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let root = serving_root();
    let state = ServerState::new();

    let err = state.start("127.0.0.1", port, root.path()).unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }), "{err}");
    assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(state.local_addr(), None);

    let addr = state.start("127.0.0.1", 0, root.path()).unwrap();
    assert_ne!(addr.port(), port);
    assert_eq!(status(&get(&addr, "/json-data")), 200);
    state.stop();
}

#[test]
fn test_broadcast_from_many_threads() {
    let (state, addr, _root) = start_server();
    let mut client = SseClient::connect(&addr);
    client.next_frame(WAIT).unwrap();
    assert!(state.wait_for_clients(1, WAIT));

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..5 {
                    state.on_hotkey_pressed();
                }
            });
        }
    });
    assert_eq!(state.press_count(), 20);

    let mut counts = Vec::new();
    for _ in 0..20 {
        let f = client.next_frame(WAIT).unwrap();
        let data = f
            .strip_prefix("event: hotkey_trigger\ndata: ")
            .and_then(|d| d.strip_suffix("\n\n"))
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(data).unwrap();
        counts.push(v["press_count"].as_u64().unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=20).collect::<Vec<u64>>());
    state.stop();
}

#[test]
fn test_stalled_client_does_not_hold_up_broadcasts() {
    let root = serving_root();
    let mut config = ServerConfig::new("127.0.0.1", 0, root.path());
    config.write_timeout = Duration::from_millis(300);
    config.heartbeat_interval = None;
    let state = ServerState::new();
    let addr = state.start_with_config(&config).unwrap();

    let mut healthy = SseClient::connect(&addr);
    let mut stalled = SseClient::connect(&addr);
    assert_eq!(healthy.next_frame(WAIT), Some(welcome()));
    assert_eq!(stalled.next_frame(WAIT), Some(welcome()));
    assert!(state.wait_for_clients(2, WAIT));

    // Enough data to fill every socket buffer of the client that never reads.
    let events: Vec<Event> = (0..16)
        .map(|i| Event::new("bulk", format!("{i}:{}", "x".repeat(1 << 20))))
        .collect();
    let expected: Vec<u8> = events.iter().flat_map(|e| e.to_frame()).collect();

    let total = expected.len();
    let mut stream = healthy.stream.try_clone().unwrap();
    let reader = thread::spawn(move || {
        let mut got = Vec::with_capacity(total);
        let mut tmp = vec![0u8; 64 * 1024];
        let deadline = Instant::now() + Duration::from_secs(30);
        while got.len() < total && Instant::now() < deadline {
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => got.extend_from_slice(&tmp[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(_) => break,
            }
        }
        got
    });

    let mut dropped = 0;
    for event in &events {
        let started = Instant::now();
        let report = state.broadcast(event);
        let elapsed = started.elapsed();
        assert!(
            elapsed < config.write_timeout + Duration::from_millis(700),
            "broadcast took {elapsed:?}"
        );
        assert!(report.delivered >= 1, "{report:?}");
        dropped += report.dropped;
    }

    let got = reader.join().unwrap();
    assert_eq!(got.len(), expected.len());
    assert!(got == expected, "healthy client saw a corrupted stream");
    assert_eq!(dropped, 1);
    assert_eq!(state.client_count(), 1);
    drop(stalled);
    state.stop();
}
