//! Shared helpers for integration tests

#![allow(dead_code, unreachable_pub)]

use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// 500x500 cut-out: opaque red disc in the middle, fully transparent border
pub fn cutout_500() -> RgbaImage {
    RgbaImage::from_fn(500, 500, |x, y| {
        let (dx, dy) = (x as i64 - 250, y as i64 - 250);
        if dx * dx + dy * dy <= 150 * 150 {
            Rgba([200, 30, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// PNG-encoded bytes of an image
pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding should succeed");
    out.into_inner()
}

/// A request captured by [`serve_once`]
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canned HTTP response
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn image(body: Vec<u8>, original_id: &str, processed_id: &str) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type".into(), "image/png".into()),
                ("X-Original-ID".into(), original_id.into()),
                ("X-Processed-ID".into(), processed_id.into()),
            ],
            body,
        }
    }
}

/// Serve exactly one request on a local port; returns the base URL and the captured request
pub async fn serve_once(
    response: CannedResponse,
) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind local port");
    let base_url = format!("http://{}", listener.local_addr().expect("local address"));

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let captured = read_request(&mut socket).await;

        let mut head = format!("HTTP/1.1 {} Test\r\n", response.status);
        for (name, value) in &response.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            response.body.len()
        ));
        socket.write_all(head.as_bytes()).await.expect("write head");
        socket.write_all(&response.body).await.expect("write body");
        socket.shutdown().await.ok();
        captured
    });

    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.expect("read request");
        assert!(n > 0, "connection closed before headers were complete");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buffer, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
    let lower = head.to_ascii_lowercase();
    let content_length = lower
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = lower.contains("transfer-encoding: chunked");

    loop {
        let body_so_far = buffer.len() - head_end;
        let complete = match content_length {
            Some(len) => body_so_far >= len,
            None if chunked => buffer.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
        let n = socket.read(&mut chunk).await.expect("read body");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        head,
        body: buffer[head_end..].to_vec(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
