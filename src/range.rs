use cidr::{Cidr, Ipv4Cidr};
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid IPv4 address or CIDR range: {0}")]
    InvalidAddressFormat(String),
}

/// Expands an IPv4 literal or CIDR block into every address it covers, in
/// ascending order. A bare address is treated as /32. The network and
/// broadcast addresses of the block are included: the block entered here is
/// an enumeration convenience, unrelated to the real network layout at the
/// destination.
pub fn expand(input: &str) -> Result<Vec<Ipv4Addr>, RangeError> {
    let invalid = || RangeError::InvalidAddressFormat(input.to_string());

    let mut parts = input.splitn(2, '/');
    let addr: Ipv4Addr = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| invalid())?;

    let len: u8 = match parts.next() {
        None => 32,
        Some(len) => len.parse().map_err(|_| invalid())?,
    };
    if len > 32 {
        return Err(invalid());
    }

    // Any address inside the block is accepted as the base, so mask down to
    // the network address before enumerating.
    let mask = u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0);
    let network = Ipv4Addr::from(u32::from(addr) & mask);
    let block = Ipv4Cidr::new(network, len).map_err(|_| invalid())?;

    Ok(block.iter().collect())
}
