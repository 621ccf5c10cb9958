use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embed_http::connection::{Connection, ConnectionId};
use embed_http::handler::Handler;
use embed_http::protocol::{HttpError, Request, Response, ResponseError, SendError};
use indoc::indoc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visits(usize);

/// Answers every request with its url, recording everything it is told.
#[derive(Default)]
struct Recorder {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    requests: Mutex<Vec<Arc<Request>>>,
    data: Mutex<Vec<u8>>,
    errors: Mutex<Vec<String>>,
    chunked: bool,
    deferred: bool,
    failing: bool,
    dropping: bool,
}

impl Recorder {
    fn chunked() -> Self {
        Self { chunked: true, ..Self::default() }
    }

    fn deferred() -> Self {
        Self { deferred: true, ..Self::default() }
    }

    fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    fn dropping() -> Self {
        Self { dropping: true, ..Self::default() }
    }

    fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|request| request.url().to_string()).collect()
    }
}

impl Handler for Recorder {
    fn on_connected(&self, connection: &Connection) {
        self.connected.fetch_add(1, Ordering::SeqCst);
        connection.set_extension(Visits(0));
    }

    fn on_request(&self, connection: &Connection, request: Arc<Request>, mut response: Response) -> Result<(), ResponseError> {
        let Visits(visits) = connection.extension::<Visits>().unwrap();
        connection.set_extension(Visits(visits + 1));
        self.requests.lock().unwrap().push(Arc::clone(&request));

        if self.failing {
            // beginning twice is rejected, failing the handler with a half built response
            response.begin(200)?;
            response.begin(200)?;
        }
        if self.dropping {
            drop(response);
            return Ok(());
        }

        if request.is_upgrade() {
            response.begin(101)?.header("Upgrade", "echo")?.header("Connection", "Upgrade")?;
            return response.end();
        }

        let body = format!("{}:{}", request.url(), String::from_utf8_lossy(request.body()));
        if self.chunked {
            response.begin(200)?.make_chunked()?;
            let mut chunk = response.begin_chunk()?;
            chunk.write(&body);
            chunk.end()?;
            return response.end();
        }

        response.begin(200)?.header("Content-Length", body.len())?.write(&body)?;
        if self.deferred {
            tokio::spawn(async move {
                sleep(Duration::from_millis(20)).await;
                response.end().unwrap();
            });
            return Ok(());
        }
        response.end()
    }

    fn on_data(&self, _connection: &Connection, data: &[u8]) {
        self.data.lock().unwrap().extend_from_slice(data);
    }

    fn on_disconnected(&self, _connection: &Connection) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _connection: Option<&Connection>, error: &HttpError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn start(recorder: &Arc<Recorder>) -> (Connection, DuplexStream) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    let handler: Arc<dyn Handler> = Arc::<Recorder>::clone(recorder);
    let connection = Connection::new(ConnectionId::new(1), None, handler, 1024);
    tokio::spawn(connection.clone().run(server));
    (connection, client)
}

async fn read_until(client: &mut DuplexStream, expected: &str) -> String {
    let mut received = Vec::new();
    let mut buf = [0_u8; 1024];
    timeout(Duration::from_secs(5), async {
        while !String::from_utf8_lossy(&received).contains(expected) {
            let n = client.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "connection closed before {expected:?}, got {:?}", String::from_utf8_lossy(&received));
            received.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .unwrap();
    String::from_utf8(received).unwrap()
}

async fn read_to_close(client: &mut DuplexStream) -> String {
    let mut received = Vec::new();
    timeout(Duration::from_secs(5), client.read_to_end(&mut received)).await.unwrap().unwrap();
    String::from_utf8(received).unwrap()
}

async fn eventually(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn pipelined_requests_are_answered_in_order() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);

    client.write_all(b"GET /a HTTP/1.1\r\n\r\nPOST /b HTTP/1.1\r\nContent-Length: 3\r\n\r\nxyzGET /c HTTP/1.1\r\n\r\n").await.unwrap();

    let received = read_until(&mut client, "/c:").await;
    let expected = indoc! {"
        HTTP/1.1 200 OK\r
        Content-Length: 3\r
        \r
        /a:HTTP/1.1 200 OK\r
        Content-Length: 6\r
        \r
        /b:xyzHTTP/1.1 200 OK\r
        Content-Length: 3\r
        \r
        /c:"};
    assert_eq!(received, expected);
    assert_eq!(recorder.urls(), ["/a", "/b", "/c"]);
    assert_eq!(connection.extension::<Visits>(), Some(Visits(3)));
    assert!(!connection.is_disconnected());
}

#[tokio::test]
async fn request_split_across_reads() {
    let recorder = Arc::new(Recorder::default());
    let (_connection, mut client) = start(&recorder);

    for part in [&b"GET /sp"[..], b"lit HTTP/1.1\r\nHo", b"st: a\r\n", b"\r\n"] {
        client.write_all(part).await.unwrap();
        client.flush().await.unwrap();
        sleep(Duration::from_millis(5)).await;
    }

    read_until(&mut client, "/split:").await;
    let requests = recorder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("host").unwrap(), "a");
}

#[tokio::test]
async fn connection_close_ends_after_response() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);

    client.write_all(b"GET /bye HTTP/1.1\r\nConnection: close\r\n\r\nGET /ignored HTTP/1.1\r\n\r\n").await.unwrap();

    let received = read_to_close(&mut client).await;
    assert_eq!(received, "HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n/bye:");
    assert_eq!(recorder.urls(), ["/bye"]);

    eventually(|| connection.is_disconnected()).await;
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn http_10_closes_by_default() {
    let recorder = Arc::new(Recorder::default());
    let (_connection, mut client) = start(&recorder);

    client.write_all(b"GET /old HTTP/1.0\r\n\r\n").await.unwrap();

    let received = read_to_close(&mut client).await;
    assert!(received.ends_with("/old:"));
}

#[tokio::test]
async fn malformed_request_gets_bad_request() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);

    client.write_all(b"GET / HTTP/1.1\r\nbad header\r\n\r\n").await.unwrap();

    let received = read_to_close(&mut client).await;
    assert_eq!(received, "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    assert!(recorder.urls().is_empty());
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);

    eventually(|| connection.is_disconnected()).await;
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expect_continue_before_body() {
    let recorder = Arc::new(Recorder::default());
    let (_connection, mut client) = start(&recorder);

    client.write_all(b"PUT /upload HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n").await.unwrap();
    let interim = read_until(&mut client, "\r\n\r\n").await;
    assert_eq!(interim, "HTTP/1.1 100 Continue\r\n\r\n");
    assert!(recorder.urls().is_empty());

    client.write_all(b"data").await.unwrap();
    let received = read_until(&mut client, "/upload:data").await;
    assert_eq!(received, "HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\n/upload:data");
}

#[tokio::test]
async fn chunked_request_and_response() {
    let recorder = Arc::new(Recorder::chunked());
    let (_connection, mut client) = start(&recorder);

    client.write_all(b"POST /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n").await.unwrap();

    let received = read_until(&mut client, "0\r\n\r\n").await;
    let expected = indoc! {"
        HTTP/1.1 200 OK\r
        Transfer-Encoding: chunked\r
        \r
        8\r
        /c:abcde\r
        0\r
        \r
    "};
    assert_eq!(received, expected);
}

#[tokio::test]
async fn response_ended_from_another_task() {
    let recorder = Arc::new(Recorder::deferred());
    let (_connection, mut client) = start(&recorder);

    client.write_all(b"GET /later HTTP/1.1\r\n\r\n").await.unwrap();

    let received = read_until(&mut client, "/later:").await;
    assert_eq!(received, "HTTP/1.1 200 OK\r\nContent-Length: 7\r\n\r\n/later:");
}

#[tokio::test]
async fn upgrade_hands_over_raw_bytes() {
    let recorder = Arc::new(Recorder::default());
    let (_connection, mut client) = start(&recorder);

    client.write_all(b"GET /echo HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: echo\r\n\r\nraw").await.unwrap();
    let received = read_until(&mut client, "\r\n\r\n").await;
    assert!(received.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));

    client.write_all(b" GET /not-http HTTP/1.1\r\n\r\n").await.unwrap();
    eventually(|| recorder.data.lock().unwrap().ends_with(b"\r\n\r\n")).await;

    assert_eq!(&recorder.data.lock().unwrap()[..], b"raw GET /not-http HTTP/1.1\r\n\r\n");
    assert_eq!(recorder.urls(), ["/echo"]);
}

#[tokio::test]
async fn writes_reach_peer_in_order() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);

    for part in ["B1", "B2", "B3"] {
        connection.write(part).unwrap();
    }

    assert_eq!(read_until(&mut client, "B3").await, "B1B2B3");
    eventually(|| connection.queued_writes() == 0).await;
}

#[tokio::test]
async fn disconnect_notifies_once() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);
    eventually(|| recorder.connected.load(Ordering::SeqCst) == 1).await;

    connection.disconnect();
    connection.disconnect();

    assert!(connection.is_disconnected());
    assert!(matches!(connection.write("late"), Err(SendError::ConnectionClosed)));
    assert_eq!(read_to_close(&mut client).await, "");
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn peer_close_disconnects() {
    let recorder = Arc::new(Recorder::default());
    let (connection, client) = start(&recorder);
    eventually(|| recorder.connected.load(Ordering::SeqCst) == 1).await;

    drop(client);

    eventually(|| connection.is_disconnected()).await;
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
    assert!(recorder.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_handler_closes_connection() {
    for request in [&b"GET /fail HTTP/1.1\r\nConnection: close\r\n\r\n"[..], b"GET /fail HTTP/1.1\r\n\r\n"] {
        let recorder = Arc::new(Recorder::failing());
        let (connection, mut client) = start(&recorder);

        client.write_all(request).await.unwrap();

        assert_eq!(read_to_close(&mut client).await, "");
        eventually(|| connection.is_disconnected()).await;
        assert_eq!(recorder.urls(), ["/fail"]);
        assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn dropped_response_closes_non_persistent_connection() {
    let recorder = Arc::new(Recorder::dropping());
    let (connection, mut client) = start(&recorder);

    client.write_all(b"GET /dropped HTTP/1.0\r\n\r\n").await.unwrap();

    assert_eq!(read_to_close(&mut client).await, "");
    eventually(|| connection.is_disconnected()).await;
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disconnect_drops_queued_writes() {
    let recorder = Arc::new(Recorder::default());
    let (connection, mut client) = start(&recorder);
    eventually(|| recorder.connected.load(Ordering::SeqCst) == 1).await;

    connection.write("queued").unwrap();
    connection.disconnect();

    assert_eq!(read_to_close(&mut client).await, "");
    assert_eq!(recorder.disconnected.load(Ordering::SeqCst), 1);
    eventually(|| connection.queued_writes() == 0).await;
    assert!(matches!(connection.write("late"), Err(SendError::ConnectionClosed)));
}
