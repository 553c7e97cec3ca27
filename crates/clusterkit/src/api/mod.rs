//! REST clients for the cluster manager and the YARN daemons.
//!
//! Every client converts transport and decoding failures into
//! [`Error`](crate::error::Error) before returning.

pub mod cm;
pub mod mutation;
pub mod nm;
pub mod queue;
pub mod rm;

pub use cm::CmApi;
pub use mutation::MutationRequest;
pub use nm::NmApi;
pub use queue::QueueNode;
pub use rm::RmApi;

use ureq::Body;
use ureq::http::Response;

use crate::error::{Error, Result};

/// Query parameter for simple (non-Kerberos) authentication.
pub(crate) const SIMPLE_AUTH: &str = "user.name=yarn";

/// `http://host:port` for an address that may lack the scheme or the port.
pub(crate) fn http_address(address: &str, default_port: u16) -> String {
    let host = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"))
        .unwrap_or(address)
        .trim_end_matches('/');
    let scheme = if address.starts_with("https://") { "https" } else { "http" };
    if host.contains(':') {
        format!("{scheme}://{host}")
    } else {
        format!("{scheme}://{host}:{default_port}")
    }
}

/// Agent that returns error statuses as responses, so their body stays readable.
pub(crate) fn agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder().http_status_as_error(false).build();
    ureq::Agent::new_with_config(config)
}

/// Pass a successful response through; turn any other status into
/// [`Error::Api`] with the response body as reason.
pub(crate) fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    let reason = match body.trim() {
        "" => status.canonical_reason().unwrap_or("unknown status").to_string(),
        text => text.to_string(),
    };
    Err(Error::Api {
        status: status.as_u16(),
        reason,
    })
}

/// Answer a single HTTP request on a local port with `status` and `body`.
///
/// Returns the `host:port` to point a client at.
#[cfg(test)]
pub(crate) fn serve_once(status: &'static str, body: &'static str) -> String {
    use std::io::{Read, Write};
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        // Headers, then as much body as Content-Length announces
        loop {
            let n = stream.read(&mut buf).unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length || n == 0 {
                    break;
                }
            } else if n == 0 {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).unwrap();
    });
    address
}
