use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use lostfound_server::{
    Acceptor, AppError, ItemStatus, ItemStore, JsonFileStore, Persistence, ServerConfig,
    ShutdownHandle,
};

const WAIT: Duration = Duration::from_secs(5);

const FOUND_WALLET: &str = r#"REPORT_FOUND {"name": "Wallet", "color": "Black", "location": "Library", "description": "found near the stairs"}"#;
const LOST_WALLET: &str = r#"REPORT_LOST {"name": "wallet", "color": "BLACK", "location": "Library", "description": "brown stitching"}"#;

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<(), AppError>>,
}

impl TestServer {
    async fn start(data_file: &Path) -> Self {
        Self::start_with(data_file, |_| {}).await
    }

    async fn start_with(data_file: &Path, tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
            data_file: data_file.to_path_buf(),
            read_timeout_ms: 50,
            write_timeout_ms: 200,
            accept_poll_ms: 20,
            shutdown_grace_ms: 20,
            drain_timeout_ms: 500,
            ..ServerConfig::default()
        };
        tweak(&mut config);
        let store = ItemStore::load(
            config.locations.clone(),
            Box::new(JsonFileStore::new(data_file)),
        );
        let acceptor = Acceptor::bind(config).await.expect("bind");
        let addr = acceptor.local_addr().expect("local addr");
        let shutdown = acceptor.shutdown_handle();
        let task = tokio::spawn(acceptor.run(store));
        Self {
            addr,
            shutdown,
            task,
        }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        timeout(WAIT, self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect and consume the greeting
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        };
        assert!(client.next_line().await.starts_with("WELCOME "));
        let locations = client.next_line().await;
        assert!(locations.starts_with("LOCATIONS ["), "{}", locations);
        assert!(locations.contains("\"Library\""));
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write");
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn next_line(&mut self) -> String {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")
            .expect("connection closed")
    }

    /// Read lines up to and including the first one starting with `prefix`
    async fn read_until(&mut self, prefix: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let line = self.next_line().await;
            let done = line.starts_with(prefix);
            seen.push(line);
            if done {
                return seen;
            }
        }
    }

    /// Skip whatever is still buffered, then expect the close
    async fn drain_until_closed(&mut self) {
        loop {
            let next = timeout(WAIT, self.lines.next_line())
                .await
                .expect("timed out waiting for close");
            if !matches!(next, Ok(Some(_))) {
                return;
            }
        }
    }

    async fn expect_closed(&mut self) {
        let next = timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for close");
        assert!(matches!(next, Ok(None) | Err(_)), "unexpected: {:?}", next);
    }
}

fn count_prefix(lines: &[String], prefix: &str) -> usize {
    lines.iter().filter(|l| l.starts_with(prefix)).count()
}

#[tokio::test]
async fn wallet_match_chat_and_exit() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;

    let mut x = TestClient::connect(server.addr).await;
    let mut y = TestClient::connect(server.addr).await;

    x.send(FOUND_WALLET).await;
    assert!(x.next_line().await.starts_with("SUCCESS Item "));
    assert!(x.next_line().await.starts_with("INFO No immediate match"));

    y.send(LOST_WALLET).await;
    assert!(y.next_line().await.starts_with("SUCCESS "));
    assert!(y.next_line().await.starts_with("MATCH_FOUND "));
    assert!(x.next_line().await.starts_with("MATCH_FOUND "));
    // Chat instructions
    y.read_until("INFO Type '/exit_chat'").await;
    x.read_until("INFO Type '/exit_chat'").await;

    x.send("Is it a black leather one?").await;
    let relayed = y.next_line().await;
    assert!(relayed.starts_with("CHAT_MSG ["), "{}", relayed);
    assert!(relayed.ends_with("]: Is it a black leather one?"));

    y.send("/exit_chat").await;
    assert!(y.next_line().await.starts_with("INFO You are exiting"));
    assert!(y.next_line().await.starts_with("CHAT_ENDED "));
    assert!(x.next_line().await.starts_with("CHAT_ENDED "));

    for client in [&mut x, &mut y] {
        client.send("GET_ALL_ITEMS").await;
        let listing = client.read_until("ALL_ITEMS_END").await;
        assert_eq!(listing[0], "ALL_ITEMS_START");
        let items: Vec<_> = listing.iter().filter(|l| l.starts_with("ITEM: ")).collect();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|l| l.ends_with("Matched: Yes")), "{:?}", items);
    }

    server.stop().await;
}

#[tokio::test]
async fn unknown_command_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;
    let mut x = TestClient::connect(server.addr).await;

    x.send("FOO").await;
    assert!(x.next_line().await.starts_with("ERROR Unknown command"));

    x.send("REPORT_LOST {not json").await;
    assert!(x.next_line().await.starts_with("ERROR Invalid item data format"));

    x.send_raw(b"\xff\xfe\n").await;
    assert_eq!(x.next_line().await, "ERROR Invalid data encoding. Please use UTF-8.");

    x.send("GET_ALL_ITEMS").await;
    let listing = x.read_until("ALL_ITEMS_END").await;
    assert_eq!(
        listing,
        vec!["ALL_ITEMS_START", "ITEM: No items reported yet.", "ALL_ITEMS_END"]
    );

    server.stop().await;
}

#[tokio::test]
async fn same_reporter_never_matches_itself() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;
    let mut x = TestClient::connect(server.addr).await;

    x.send(FOUND_WALLET).await;
    x.read_until("INFO No immediate match").await;
    x.send(LOST_WALLET).await;
    assert!(x.next_line().await.starts_with("SUCCESS "));
    assert!(x.next_line().await.starts_with("INFO No immediate match"));

    x.send("GET_MY_ITEMS").await;
    let mine = x.read_until("END_YOUR_ITEMS").await;
    assert_eq!(mine[0], "YOUR_ITEMS");
    assert_eq!(count_prefix(&mine, "ID: "), 2);
    assert_eq!(count_prefix(&mine[1..3], "ID: "), 2);
    assert!(mine.iter().filter(|l| l.starts_with("ID: ")).all(|l| l.ends_with("Matched: No")));

    server.stop().await;
}

#[tokio::test]
async fn partner_drop_ends_chat_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;

    let mut x = TestClient::connect(server.addr).await;
    let mut y = TestClient::connect(server.addr).await;

    x.send(FOUND_WALLET).await;
    x.read_until("INFO No immediate match").await;
    y.send(LOST_WALLET).await;
    y.read_until("INFO Type '/exit_chat'").await;
    x.read_until("INFO Type '/exit_chat'").await;

    drop(x);

    let ended = y.read_until("CHAT_ENDED").await;
    assert_eq!(
        ended.last().map(String::as_str),
        Some("CHAT_ENDED Your chat partner has disconnected. Returning to main menu.")
    );

    // Back in Command mode: a new report is accepted straight away
    y.send(r#"REPORT_LOST {"name": "Umbrella", "color": "Red", "location": "Cafe", "description": ""}"#)
        .await;
    let after = y.read_until("INFO").await;
    assert_eq!(count_prefix(&after, "CHAT_ENDED"), 0);
    assert!(after.iter().any(|l| l.starts_with("SUCCESS ")));

    server.stop().await;
}

#[tokio::test]
async fn unmatched_item_survives_reporter_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;

    let mut x = TestClient::connect(server.addr).await;
    x.send(r#"REPORT_LOST {"name": "Keys", "color": "Silver", "location": "Cafe", "description": "3 keys"}"#)
        .await;
    x.read_until("INFO No immediate match").await;
    drop(x);

    let mut y = TestClient::connect(server.addr).await;
    // A matching report finds no live counterpart
    y.send(r#"REPORT_FOUND {"name": "Keys", "color": "Silver", "location": "Cafe", "description": "on a table"}"#)
        .await;
    assert!(y.next_line().await.starts_with("SUCCESS "));
    assert!(y.next_line().await.starts_with("INFO No immediate match"));

    y.send("GET_ALL_ITEMS").await;
    let listing = y.read_until("ALL_ITEMS_END").await;
    assert!(listing
        .iter()
        .any(|l| l.starts_with("ITEM: Type: Lost, Name: Keys") && l.ends_with("Matched: No")));

    server.stop().await;
}

#[tokio::test]
async fn shutdown_notifies_clients_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("items.json");
    let server = TestServer::start(&data_file).await;

    let mut x = TestClient::connect(server.addr).await;
    let mut y = TestClient::connect(server.addr).await;
    x.send(FOUND_WALLET).await;
    x.read_until("INFO No immediate match").await;
    y.send(LOST_WALLET).await;
    y.read_until("INFO Type '/exit_chat'").await;
    x.read_until("INFO Type '/exit_chat'").await;

    server.stop().await;

    for client in [&mut x, &mut y] {
        let rest = client.read_until("SERVER_SHUTDOWN").await;
        assert_eq!(
            rest.last().map(String::as_str),
            Some("SERVER_SHUTDOWN The server is shutting down. Goodbye.")
        );
        client.expect_closed().await;
    }

    // Persisted-then-reloaded items keep their fields and match links
    let items = JsonFileStore::new(&data_file).load().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.status == ItemStatus::Matched));
    assert_eq!(items[0].matched_with, Some(items[1].id));
    assert_eq!(items[1].matched_with, Some(items[0].id));
    assert_eq!(items[0].name, "Wallet");
    assert_eq!(items[1].name, "wallet");

    let restarted = TestServer::start(&data_file).await;
    let mut z = TestClient::connect(restarted.addr).await;
    z.send("GET_ALL_ITEMS").await;
    let listing = z.read_until("ALL_ITEMS_END").await;
    assert_eq!(count_prefix(&listing, "ITEM: "), 2);
    restarted.stop().await;
}

#[tokio::test]
async fn overlong_line_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;
    let mut x = TestClient::connect(server.addr).await;

    let long = "A".repeat(10_000);
    x.send(&long).await;
    assert_eq!(x.next_line().await, "ERROR Line too long (maximum 4096 bytes).");

    // The rest of the long line is skipped; the next line is a fresh command
    x.send("GET_MY_ITEMS").await;
    let mine = x.read_until("END_YOUR_ITEMS").await;
    assert_eq!(
        mine,
        vec!["YOUR_ITEMS", "You have not reported any items.", "END_YOUR_ITEMS"]
    );

    server.stop().await;
}

#[tokio::test]
async fn client_that_stops_reading_does_not_stall_others() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(&dir.path().join("items.json")).await;

    // Y floods the server with requests for large listings and never reads
    let mut y = TestClient::connect(server.addr).await;
    let mut flood = String::new();
    for i in 0..60 {
        flood.push_str(&format!(
            "REPORT_LOST {{\"name\": \"Umbrella {}\", \"color\": \"Red\", \"location\": \"Cafe\", \"description\": \"a long description to make every listing line heavier\"}}\n",
            i
        ));
    }
    for _ in 0..4000 {
        flood.push_str("GET_ALL_ITEMS\n");
    }
    y.send_raw(flood.as_bytes()).await;

    // An unrelated client is still greeted and served
    let mut z = TestClient::connect(server.addr).await;
    z.send("GET_MY_ITEMS").await;
    let mine = z.read_until("END_YOUR_ITEMS").await;
    assert_eq!(mine[1], "You have not reported any items.");

    // Y's connection is eventually closed by the server
    y.drain_until_closed().await;

    server.stop().await;
}

#[tokio::test]
async fn idle_client_is_disconnected_and_partner_told_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start_with(&dir.path().join("items.json"), |config| {
        config.read_timeout_ms = 100;
        config.max_idle_polls = Some(3);
    })
    .await;

    let mut x = TestClient::connect(server.addr).await;
    let mut y = TestClient::connect(server.addr).await;
    x.send(FOUND_WALLET).await;
    x.read_until("INFO No immediate match").await;
    y.send(LOST_WALLET).await;
    y.read_until("INFO Type '/exit_chat'").await;

    // Y keeps its connection alive with blank chat lines while X stays silent
    let mut ended = Vec::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    while ended.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "partner never left");
        y.send("").await;
        if let Ok(line) = timeout(Duration::from_millis(40), y.lines.next_line()).await {
            let line = line.expect("read error").expect("connection closed");
            if line.starts_with("CHAT_ENDED") {
                ended.push(line);
            }
        }
    }
    assert_eq!(
        ended,
        vec!["CHAT_ENDED Your chat partner has disconnected. Returning to main menu."]
    );

    x.drain_until_closed().await;

    // Y is back in Command mode and hears nothing more about the chat
    y.send("GET_MY_ITEMS").await;
    let after = y.read_until("END_YOUR_ITEMS").await;
    assert_eq!(count_prefix(&after, "CHAT_ENDED"), 0);
    assert!(after.iter().any(|l| l.starts_with("ID: ") && l.ends_with("Matched: Yes")));

    server.stop().await;
}
