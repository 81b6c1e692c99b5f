//! End-to-end scenarios against a stubbed CDB, per the `PV-only descent`,
//! `unknown enqueue`, `width expansion`, and `mate proof` properties.
//!
//! No crate in this lineage pulls in an HTTP-mocking dependency, so the
//! stub here is a bare `std::net::TcpListener` speaking just enough
//! HTTP/1.1 to answer a `GET` with a canned body keyed off the `board=`
//! query parameter.

use cdb::CdbClient;
use engine::{Config, Engine, Position};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_stream::StreamExt;

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Maps a `board=` EPD (as sent on the wire, `+` for spaces) to the body the
/// stub should answer with for any `action=queryall` request.
struct Stub {
    responses: HashMap<String, String>,
    default: String,
}

impl Stub {
    fn spawn(self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let addr = listener.local_addr().expect("local addr");

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                self.handle(stream);
            }
        });

        format!("http://{addr}")
    }

    fn handle(&self, mut stream: TcpStream) {
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }

        // Drain the rest of the headers.
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).is_err() || line == "\r\n" || line.is_empty() {
                break;
            }
        }

        let path = request_line.split_whitespace().nth(1).unwrap_or("/");
        let board = path
            .split("board=")
            .nth(1)
            .map(|rest| rest.split('&').next().unwrap_or("").to_string())
            .unwrap_or_default();

        let body = if path.contains("action=queue") {
            "ok".to_string()
        } else {
            self.responses.get(&board).cloned().unwrap_or_else(|| self.default.clone())
        };

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).ok();
    }
}

#[tokio::test]
async fn pv_only_descent_reaches_depth_one() {
    let mut responses = HashMap::new();
    // board= uses '+' for spaces, matching Fingerprint::as_query_param.
    responses.insert(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR+w+KQkq+-".to_string(),
        "move:g2g4, score:10".to_string(),
    );

    let base_url = Stub { responses, default: "unknown".to_string() }.spawn();

    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let root = Position::from_fen(STARTPOS, chess::board::Variant::Standard).unwrap();

    let config = Config { depth_limit: Some(1), eval_decay: 0, ..Config::default() };
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut snapshots = Box::pin(engine.search(root, config, shutdown));
    let snapshot = snapshots.next().await.expect("one snapshot for depth 1");

    assert_eq!(snapshot.depth, 1);
    assert_eq!(snapshot.pv.len(), 1);
    assert_eq!(snapshot.pv[0], "g2g4");
}

#[tokio::test]
async fn unknown_position_triggers_a_queue() {
    let base_url = Stub { responses: HashMap::new(), default: "unknown".to_string() }.spawn();

    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let root = Position::from_fen(STARTPOS, chess::board::Variant::Standard).unwrap();

    let config = Config { depth_limit: Some(1), eval_decay: 0, ..Config::default() };
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut snapshots = Box::pin(engine.search(root, config, shutdown));
    let snapshot = snapshots.next().await.expect("one snapshot");

    assert_eq!(snapshot.stats.enqueued, 1);
    assert!(snapshot.pv.is_empty());
}

#[tokio::test]
async fn under_populated_position_is_requeued_not_enqueued() {
    let mut responses = HashMap::new();
    // Known, but far fewer than 5 scored moves out of startpos's 20 legal
    // ones: should requeue, not treat as unknown.
    responses.insert(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR+w+KQkq+-".to_string(),
        "move:g2g4, score:10, move:e2e4, score:8".to_string(),
    );
    let base_url = Stub { responses, default: "unknown".to_string() }.spawn();

    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let root = Position::from_fen(STARTPOS, chess::board::Variant::Standard).unwrap();

    let config = Config { depth_limit: Some(1), eval_decay: 0, ..Config::default() };
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut snapshots = Box::pin(engine.search(root, config, shutdown));
    let snapshot = snapshots.next().await.expect("one snapshot");

    assert_eq!(snapshot.stats.requeued, 1);
    assert_eq!(snapshot.stats.enqueued, 0);
}

#[tokio::test]
async fn width_expansion_explores_more_than_the_pv_only_move() {
    let mut responses = HashMap::new();
    // Three candidate moves at the root, with gaps (from the best) of 0, 2,
    // and 8 centipawns. Unmatched positions (every child) fall back to a
    // generic single-move reply via `default`.
    responses.insert(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR+w+KQkq+-".to_string(),
        "move:g2g4, score:10, move:e2e4, score:8, move:d2d4, score:2".to_string(),
    );
    let base_url = Stub { responses, default: "move:a2a3, score:0".to_string() }.spawn();
    let root = Position::from_fen(STARTPOS, chess::board::Variant::Standard).unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));

    // evalDecay=0 (PV-only): only the best move (gap 0) is ever expanded.
    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let pv_only = Config { depth_limit: Some(1), eval_decay: 0, ..Config::default() };
    let mut snapshots = Box::pin(engine.search(root.clone(), pv_only, shutdown.clone()));
    let pv_only_snapshot = snapshots.next().await.expect("pv-only snapshot");

    // evalDecay=5: moves within 5 centipawns per ply of the best are also
    // expanded. At remaining=1, that admits the gap-0 and gap-2 moves
    // (floor(2/5)=0) but not the gap-8 move (floor(8/5)=1 pushes r_child
    // below zero), so exactly two children are explored instead of one.
    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let widened = Config { depth_limit: Some(1), eval_decay: 5, ..Config::default() };
    let mut snapshots = Box::pin(engine.search(root, widened, shutdown));
    let widened_snapshot = snapshots.next().await.expect("widened snapshot");

    assert_eq!(pv_only_snapshot.stats.queryall, 2);
    assert_eq!(widened_snapshot.stats.queryall, 3);
    assert!(widened_snapshot.stats.queryall > pv_only_snapshot.stats.queryall);
}

#[tokio::test]
async fn mate_proof_confirms_a_forced_mate_in_one() {
    // Fool's mate: after 1.f3 e5 2.g4, Black's only reported move is the
    // real mating move Qh4#. The position after it is checkmate per the
    // board model itself, with no CDB data needed for that leaf, so a
    // single canned reply suffices for every request the run makes.
    let base_url = Stub {
        responses: HashMap::new(),
        default: "move:d8h4, score:900".to_string(),
    }
    .spawn();

    let root = Position::from_fen(STARTPOS, chess::board::Variant::Standard)
        .unwrap()
        .apply_uci("f2f3")
        .unwrap()
        .apply_uci("e7e5")
        .unwrap()
        .apply_uci("g2g4")
        .unwrap();

    let client = CdbClient::with_base_url(&base_url, 4, None, false, false);
    let engine = Engine::with_client(client);
    let config = Config {
        depth_limit: Some(1),
        eval_decay: 0,
        prove_mates: true,
        ..Config::default()
    };
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut snapshots = Box::pin(engine.search(root, config, shutdown));
    let snapshot = snapshots.next().await.expect("one snapshot");

    assert_eq!(snapshot.pv, vec!["d8h4".to_string()]);
    assert_eq!(snapshot.mate_proven, Some(true));
    assert!(snapshot.to_string().contains("CHECKMATE"));
}
