use color_eyre::eyre::Result;
use http::StatusCode;
use reqecho::common::spawn_test_server;
use reqecho::encoding;
use reqecho::http::{EchoClient, HttpConfig};
use reqecho::store::StorageStrategy;
use std::time::Duration;

const EXAMPLE_DOCUMENT: &str = r#"{"method":"R0VU","uri":"L2Zvbz9iYXI9YmF6","version":"SFRUUC8xLjE=","headers":[["SG9zdA==","ZXhhbXBsZS5jb20="]],"body":""}"#;

fn test_config() -> HttpConfig {
    HttpConfig::builder()
        .read_timeout(Duration::from_secs(5))
        .write_timeout(Duration::from_secs(5))
        .build()
        .expect("valid test config")
}

#[tokio::test]
async fn test_example_request_produces_exact_document() -> Result<()> {
    let (server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let response = client
        .send_raw(b"GET /foo?bar=baz HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("content-type").map(|v| &v[..]),
        Some(&b"application/json"[..])
    );
    assert_eq!(
        response.header("content-length").map(|v| &v[..]),
        Some(EXAMPLE_DOCUMENT.len().to_string().as_bytes())
    );
    assert_eq!(&response.body[..], EXAMPLE_DOCUMENT.as_bytes());

    let _ = shutdown.send(());
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_oversized_header_value_is_rejected() -> Result<()> {
    let config = HttpConfig::builder().max_field_length(16).build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;
    let mut client = EchoClient::connect(addr).await?;

    let response = client
        .send_raw(b"GET / HTTP/1.1\r\nX-Long: 0123456789abcdefXYZ\r\n\r\n")
        .await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.header("content-type").map(|v| &v[..]),
        Some(&b"text/plain"[..])
    );
    assert!(
        serde_json::from_slice::<serde_json::Value>(&response.body).is_err(),
        "diagnostic must not be a JSON document"
    );
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_oversized_body_is_rejected() -> Result<()> {
    let config = HttpConfig::builder().max_body_length(16).build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;
    let mut client = EchoClient::connect(addr).await?;

    let mut request = b"POST /upload HTTP/1.1\r\nContent-Length: 32\r\n\r\n".to_vec();
    request.extend_from_slice(&[b'z'; 32]);
    let response = client.send_raw(&request).await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&response.body).contains("16"));
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_body_at_exact_limit_is_accepted() -> Result<()> {
    let config = HttpConfig::builder().max_body_length(16).build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;
    let mut client = EchoClient::connect(addr).await?;

    let document = client
        .echo(b"POST / HTTP/1.1\r\nContent-Length: 16\r\n\r\n0123456789abcdef")
        .await?;
    assert_eq!(&document.body[..], b"0123456789abcdef");

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_chunked_and_content_length_bodies_match() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let chunked = client
        .echo(b"PUT /x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\n\x00\xff\x01\r\n2\r\nhi\r\n0\r\n\r\n")
        .await?;
    let sized = client
        .echo(b"PUT /x HTTP/1.1\r\nContent-Length: 5\r\n\r\n\x00\xff\x01hi")
        .await?;

    assert_eq!(chunked.body, sized.body);
    assert_eq!(&chunked.body[..], b"\x00\xff\x01hi");
    assert_eq!(chunked.method, sized.method);
    assert_eq!(chunked.uri, sized.uri);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_body_sent_in_pieces() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    client.send(b"POST /slow HTTP/1.1\r\nContent-Length: 6\r\n\r\nab").await?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send(b"cd").await?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.send(b"ef").await?;
    let response = client.read_response().await?;

    let document = reqecho::document::parse(&response.body)?;
    assert_eq!(&document.body[..], b"abcdef");

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_headers_keep_case_order_and_duplicates() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let document = client
        .echo(b"GET / HTTP/1.1\r\nx-A: 1\r\nX-B: 2\r\nX-a: 3\r\n\r\n")
        .await?;

    let headers: Vec<(&[u8], &[u8])> = document
        .headers
        .iter()
        .map(|(n, v)| (&n[..], &v[..]))
        .collect();
    assert_eq!(
        headers,
        vec![
            (&b"x-A"[..], &b"1"[..]),
            (&b"X-B"[..], &b"2"[..]),
            (&b"X-a"[..], &b"3"[..]),
        ]
    );

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_keep_alive_serves_several_requests() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    for i in 0..3 {
        let request = format!("GET /req/{i} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let document = client.echo(request.as_bytes()).await?;
        assert_eq!(document.uri, format!("/req/{i}").into_bytes());
    }
    assert!(!client.is_closed(Duration::from_millis(100)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_connection_close_is_honored() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let response = client
        .send_raw(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.header("connection").map(|v| &v[..]),
        Some(&b"close"[..])
    );
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_http_10_version_is_echoed() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let document = client.echo(b"GET / HTTP/1.0\r\n\r\n").await?;
    assert_eq!(&document.version[..], b"HTTP/1.0");
    assert_eq!(encoding::encode(&document.version), "SFRUUC8xLjA=");
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_malformed_request_line() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;
    let mut client = EchoClient::connect(addr).await?;

    let response = client.send_raw(b"NOT A REQUEST\r\n\r\n").await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_keep_open_after_error() -> Result<()> {
    let config = HttpConfig::builder()
        .max_field_length(8)
        .close_after_error(false)
        .build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;
    let mut client = EchoClient::connect(addr).await?;

    let rejected = client
        .send_raw(b"GET /far-too-long-path HTTP/1.1\r\n\r\n")
        .await?;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert!(rejected.header("connection").is_none());

    let document = client.echo(b"GET /ok HTTP/1.1\r\n\r\n").await?;
    assert_eq!(&document.uri[..], b"/ok");

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_keep_open_after_error_still_honors_connection_close() -> Result<()> {
    let config = HttpConfig::builder()
        .max_field_length(8)
        .close_after_error(false)
        .build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;

    let mut client = EchoClient::connect(addr).await?;
    let rejected = client
        .send_raw(b"GET /far-too-long HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await?;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        rejected.header("connection").map(|v| &v[..]),
        Some(&b"close"[..])
    );
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let mut client = EchoClient::connect(addr).await?;
    let rejected = client.send_raw(b"GET /far-too-long HTTP/1.0\r\n\r\n").await?;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert!(client.is_closed(Duration::from_secs(2)).await?);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_spill_storage_end_to_end() -> Result<()> {
    let config = HttpConfig::builder()
        .storage(StorageStrategy::Spill { threshold: 64 })
        .build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;
    let mut client = EchoClient::connect(addr).await?;

    let body: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    let mut request = format!("POST /big HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
    request.extend_from_slice(&body);

    let document = client.echo(&request).await?;
    assert_eq!(&document.body[..], &body[..]);

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_clients() -> Result<()> {
    let (_server_handle, addr, shutdown) = spawn_test_server(test_config()).await?;

    let mut handles = Vec::new();
    for i in 0..10 {
        handles.push(tokio::spawn(async move {
            let mut client = EchoClient::connect(addr).await?;
            let body = format!("client {i}");
            let request = format!(
                "POST /c/{i} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            let document = client.echo(request.as_bytes()).await?;
            assert_eq!(document.body, body.into_bytes());
            assert_eq!(document.uri, format!("/c/{i}").into_bytes());
            Ok::<_, reqecho::EchoError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let _ = shutdown.send(());
    Ok(())
}

#[tokio::test]
async fn test_connection_limit() -> Result<()> {
    let config = HttpConfig::builder().max_connections(2).build()?;
    let (_server_handle, addr, shutdown) = spawn_test_server(config).await?;

    // Two clients hold their connections open
    let mut first = EchoClient::connect(addr).await?;
    let mut second = EchoClient::connect(addr).await?;
    first.echo(b"GET /1 HTTP/1.1\r\n\r\n").await?;
    second.echo(b"GET /2 HTTP/1.1\r\n\r\n").await?;

    let mut third = EchoClient::connect(addr).await?;
    assert!(third.is_closed(Duration::from_secs(2)).await?);

    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut fourth = EchoClient::connect(addr).await?;
    let document = fourth.echo(b"GET /4 HTTP/1.1\r\n\r\n").await?;
    assert_eq!(&document.uri[..], b"/4");

    let _ = shutdown.send(());
    Ok(())
}
