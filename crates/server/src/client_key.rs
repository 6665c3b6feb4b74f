//! Derives the rate limit key of a request.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use http::{HeaderMap, Request};
use rate_limit::ClientKey;

/// The key a request is rate limited under.
///
/// Uses the peer address of the connection. With `trust_forwarded_headers`,
/// the first `X-Forwarded-For` entry or `X-Real-IP` takes precedence.
pub(crate) fn extract_client_key<B>(req: &Request<B>, trust_forwarded_headers: bool) -> ClientKey {
    if trust_forwarded_headers && let Some(ip) = forwarded_ip(req.headers()) {
        return ClientKey::Ip(ip.to_canonical());
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => ClientKey::Ip(peer.ip().to_canonical()),
        None => ClientKey::Unidentified,
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use axum::{body::Body, extract::ConnectInfo};
    use http::Request;
    use rate_limit::ClientKey;

    use super::extract_client_key;

    fn request(peer: Option<&str>, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");

        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let mut request = builder.body(Body::empty()).unwrap();

        if let Some(peer) = peer {
            let peer: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(peer));
        }

        request
    }

    fn ip(value: &str) -> ClientKey {
        ClientKey::Ip(value.parse().unwrap())
    }

    #[test]
    fn peer_address() {
        let request = request(Some("203.0.113.9:50123"), &[]);
        assert_eq!(extract_client_key(&request, false), ip("203.0.113.9"));
    }

    #[test]
    fn forwarded_headers_ignored_by_default() {
        let request = request(
            Some("203.0.113.9:50123"),
            &[("x-forwarded-for", "198.51.100.1"), ("x-real-ip", "198.51.100.2")],
        );

        assert_eq!(extract_client_key(&request, false), ip("203.0.113.9"));
    }

    #[test]
    fn first_forwarded_for_entry_wins() {
        let request = request(
            Some("10.0.0.1:443"),
            &[
                ("x-forwarded-for", " 198.51.100.1 , 10.0.0.5, 10.0.0.1"),
                ("x-real-ip", "198.51.100.2"),
            ],
        );

        assert_eq!(extract_client_key(&request, true), ip("198.51.100.1"));
    }

    #[test]
    fn real_ip_when_forwarded_for_is_unusable() {
        let request = request(
            Some("10.0.0.1:443"),
            &[("x-forwarded-for", "unknown"), ("x-real-ip", "2001:db8::7")],
        );

        assert_eq!(extract_client_key(&request, true), ip("2001:db8::7"));
    }

    #[test]
    fn peer_address_when_headers_are_missing() {
        let request = request(Some("10.0.0.1:443"), &[]);
        assert_eq!(extract_client_key(&request, true), ip("10.0.0.1"));
    }

    #[test]
    fn ipv4_mapped_peer_is_canonicalized() {
        let request = request(Some("[::ffff:192.0.2.4]:8443"), &[]);

        assert_eq!(
            extract_client_key(&request, false),
            ClientKey::Ip(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 4)))
        );
    }

    #[test]
    fn unidentified_without_connection_info() {
        let request = request(None, &[("x-forwarded-for", "198.51.100.1")]);
        assert_eq!(extract_client_key(&request, false), ClientKey::Unidentified);
    }
}
