//! Integration tests for the bridge worker and the line transport.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::thread;

use tether_engine::{
    Bridge, BridgeConfig, BridgeError, Client, DiscoveryOptions, Engine, Reply, RuntimeError, Server, SimRuntime,
    PONG,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn spawn_bridge() -> Bridge {
    let path = fixture("game.json");
    Bridge::spawn(move || {
        let runtime = SimRuntime::load(&path).map_err(|e| RuntimeError::Unavailable(e.to_string()))?;
        let player = runtime.root("player").expect("player root");
        let mut engine = Engine::new(runtime, DiscoveryOptions::default());
        engine.register_root(Some("player"), &player)?;
        Ok(engine)
    })
    .expect("bridge starts")
}

/// Serve `bridge` on an ephemeral port; returns the bound address
fn serve(bridge: &Bridge, max_frame: usize) -> std::net::SocketAddr {
    let server = Server::bind("127.0.0.1:0", bridge.handle(), max_frame).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.serve());
    addr
}

// ────────────────────────────────────────────────────────────────────────────
// Bridge
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bridge_evaluates_on_worker() {
    let bridge = spawn_bridge();
    assert_eq!(bridge.evaluate("player.getName()"), Reply::ok("Alice"));
    assert_eq!(bridge.evaluate("player.getStats().getLevel()"), Reply::ok("12"));
    assert_eq!(bridge.roots().unwrap(), vec!["player *".to_string()]);
}

#[test]
fn test_bridge_shared_across_threads() {
    let bridge = spawn_bridge();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let handle = bridge.handle();
            thread::spawn(move || {
                for _ in 0..10 {
                    assert!(handle.evaluate("player.bump()").is_ok());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    // Every bump ran exactly once, one at a time
    assert_eq!(bridge.evaluate("player.bump()"), Reply::ok("41"));
}

#[test]
fn test_bridge_factory_error() {
    let result = Bridge::spawn(|| -> tether_engine::BridgeResult<Engine<SimRuntime>> {
        Err(BridgeError::UnknownRoot("nothing".to_string()))
    });
    assert!(result.is_err());
}

#[test]
fn test_bridge_after_shutdown() {
    let bridge = spawn_bridge();
    let handle = bridge.handle();
    bridge.shutdown();
    let reply = handle.evaluate("player.getName()");
    assert_eq!(reply.error.as_deref(), Some("Bridge worker disconnected"));
}

#[test]
fn test_control_commands() {
    let bridge = spawn_bridge();
    let handle = bridge.handle();
    assert_eq!(handle.handle_request(":ping"), Reply::ok(PONG));

    handle.handle_request("player.getName()");
    let cache = handle.handle_request(":cache");
    assert!(cache.value.lines().any(|l| l == "app.Player.getName ()Ljava/lang/String;"));

    let unknown = handle.handle_request(":frobnicate");
    assert_eq!(unknown.error.as_deref(), Some("Unknown command: :frobnicate"));
}

// ────────────────────────────────────────────────────────────────────────────
// Transport
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_client_round_trip() {
    let bridge = spawn_bridge();
    let addr = serve(&bridge, BridgeConfig::default().transport.max_frame);

    let mut client = Client::connect(addr).unwrap();
    assert_eq!(client.send(":ping").unwrap(), Reply::ok(PONG));
    assert_eq!(client.send("Root.getName()").unwrap(), Reply::ok("Alice"));
    assert_eq!(client.send("Root.getCount()").unwrap(), Reply::ok("42"));

    let missing = client.send("Root.missingMethod()").unwrap();
    assert_eq!(missing.value, "");
    assert!(missing.error.is_some());

    assert!(client.send("a\nb").is_err());
}

#[test]
fn test_oversized_request_gets_error_reply() {
    let bridge = spawn_bridge();
    let addr = serve(&bridge, 64);

    let mut stream = TcpStream::connect(addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request = format!("player.greet(\"{}\")", "x".repeat(200));
    request.push_str("\nplayer.getName()\n");
    stream.write_all(request.as_bytes()).unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let reply: Reply = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(reply.error.as_deref(), Some("Request exceeds 64 bytes"));

    // The connection stays usable
    line.clear();
    reader.read_line(&mut line).unwrap();
    let reply: Reply = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(reply, Reply::ok("Alice"));
}
