//! Client identity used to bucket requests.

use std::{fmt, net::IpAddr};

/// Identity a request is rate limited under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// The client's network address.
    Ip(IpAddr),
    /// No address could be determined. All such requests share one bucket.
    Unidentified,
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self::Ip(ip)
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "ip:{ip}"),
            Self::Unidentified => f.write_str("unidentified"),
        }
    }
}
