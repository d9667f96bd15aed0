//! IP routing table with longest-prefix match over CIDR blocks.
//!
//! A route is stored under the key `address-bytes || prefix-length`, so
//! IPv4 routes occupy 5-byte keys and IPv6 routes 17-byte keys. The two
//! families live in disjoint key-length regions of the trie and never
//! match each other.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use log::{debug, trace};

use crate::errors::Error;
use crate::trie::{External, Node, Trie};

/// IP routing table.
pub struct RouteTable<V> {
    trie: Trie<V>,
}

impl<V> Default for RouteTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RouteTable<V> {
    pub fn new() -> Self {
        RouteTable { trie: Trie::new() }
    }

    /// Adds a route, replacing any previous value stored for it.
    ///
    /// The network is canonicalized (host bits zeroed) before encoding.
    /// A `/0` route encodes to a NUL-tailed key and is rejected with
    /// [`Error::KeyTailNull`].
    pub fn add(&mut self, net: IpNet, value: V) -> Result<(), Error> {
        trace!("route add: {net}");
        self.trie.set(&net_to_key(net), value).map(|_| ())
    }

    /// Parses a CIDR string and adds the route.
    pub fn add_cidr(&mut self, cidr: &str, value: V) -> Result<(), Error> {
        self.add(cidr.parse::<IpNet>()?, value)
    }

    /// Removes a specific route, returning its value.
    pub fn delete(&mut self, net: IpNet) -> Option<V> {
        self.trie.delete(&net_to_key(net))
    }

    /// Parses a CIDR string and removes the route.
    pub fn delete_cidr(&mut self, cidr: &str) -> Result<Option<V>, Error> {
        Ok(self.delete(cidr.parse::<IpNet>()?))
    }

    /// Exact-match lookup of a specific route.
    pub fn get(&self, net: IpNet) -> Option<&V> {
        self.trie.get(&net_to_key(net))
    }

    /// Parses a CIDR string and looks up the exact route.
    pub fn get_cidr(&self, cidr: &str) -> Result<Option<&V>, Error> {
        Ok(self.get(cidr.parse::<IpNet>()?))
    }

    /// Longest-prefix match: the most specific stored route covering the
    /// given network.
    pub fn lookup(&self, net: IpNet) -> Option<(IpNet, &V)> {
        self.match_key(&net_to_key(net))
    }

    /// Parses a CIDR string and performs a longest-prefix match.
    pub fn lookup_cidr(&self, cidr: &str) -> Result<Option<(IpNet, &V)>, Error> {
        Ok(self.lookup(cidr.parse::<IpNet>()?))
    }

    /// Longest-prefix match for a bare address, treated as `/32` or
    /// `/128`. IPv4-mapped IPv6 addresses are matched against the IPv4
    /// routes.
    pub fn lookup_ip(&self, ip: IpAddr) -> Option<(IpNet, &V)> {
        self.match_key(&ip_to_key(ip))
    }

    /// Whether any stored route covers the given address.
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        self.lookup_ip(ip).is_some()
    }

    fn match_key(&self, key: &[u8]) -> Option<(IpNet, &V)> {
        let root = self.trie.root.as_deref()?;
        let leaf = lpm(root, key, false)?;
        debug!("route match: key={:02x?} -> {:02x?}", key, leaf.key);
        Some((key_to_net(&leaf.key), &leaf.value))
    }

    /// In-order traversal over all routes, or over the suffix starting
    /// at `start`. A start route that is not stored visits nothing.
    /// Returns `false` iff the visitor aborted.
    pub fn walk<F>(&self, start: Option<IpNet>, mut handle: F) -> bool
    where
        F: FnMut(IpNet, &V) -> bool,
    {
        let start_key = start.map(net_to_key);
        self.trie
            .walk(start_key.as_deref(), |k, v| handle(key_to_net(k), v))
    }

    /// Visits the stored routes of the same family whose network address
    /// lies inside the given block, in key order. Returns `false` iff
    /// the visitor aborted.
    pub fn walk_prefix<F>(&self, net: IpNet, mut handle: F) -> bool
    where
        F: FnMut(IpNet, &V) -> bool,
    {
        let key = net_to_key(net);
        let mask = key[key.len() - 1];
        let div = (mask >> 3) as usize;
        let rem = mask & 0x07;
        self.trie.all_prefixed(&key[..div], |k, v| {
            if k.len() != key.len() {
                return true; // other family, same leading bytes
            }
            if rem > 0 {
                let shift = 8 - rem;
                let m = 0xffu8 >> shift << shift;
                if k[div] & m != key[div] & m {
                    return true;
                }
            }
            handle(key_to_net(k), v)
        })
    }

    /// Visits every stored route covering the given block, from least to
    /// most specific. Returns `false` iff the visitor aborted.
    pub fn walk_match<F>(&self, net: IpNet, mut handle: F) -> bool
    where
        F: FnMut(IpNet, &V) -> bool,
    {
        let key = net_to_key(net);
        let iplen = key.len() - 1;
        let mut probe = vec![0u8; key.len()];
        for mask in 0..=key[iplen] {
            let div = (mask >> 3) as usize;
            let rem = mask & 0x07;
            probe[..iplen].fill(0);
            probe[..div].copy_from_slice(&key[..div]);
            if rem > 0 {
                let shift = 8 - rem;
                probe[div] = key[div] >> shift << shift;
            }
            probe[iplen] = mask;
            if let Some(value) = self.trie.get(&probe) {
                if !handle(key_to_net(&probe), value) {
                    return false;
                }
            }
        }
        true
    }

    /// Number of stored routes.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Drops all routes.
    pub fn clear(&mut self) {
        self.trie.clear();
    }
}

/// Longest-prefix-match descent. Plain crit-bit lookup cannot express
/// LPM: an address matches a shorter stored prefix even when the mask
/// bytes differ, so the traversal must backtrack.
///
/// When a split sits on the mask byte itself, the larger-mask side is
/// tried first; once backtracking, only zero-bit sides are taken, since
/// shorter masks live there. The first accepted leaf is therefore the
/// longest covering prefix.
fn lpm<'a, V>(node: &'a Node<V>, key: &[u8], backtracking: bool) -> Option<&'a External<V>> {
    match node {
        Node::Internal(inner) => {
            let dir = if inner.offset + 1 == key.len() {
                1
            } else if backtracking {
                0
            } else {
                inner.direction(key)
            };
            if let Some(found) = lpm(&inner.child[dir], key, backtracking) {
                return Some(found);
            }
            if dir == 1 {
                return lpm(&inner.child[0], key, true);
            }
            None
        }
        Node::External(leaf) => {
            let klen = key.len();
            if leaf.key.len() != klen {
                return None;
            }
            let mask = leaf.key[klen - 1];
            if mask > key[klen - 1] {
                return None;
            }
            let div = (mask >> 3) as usize;
            if leaf.key[..div] != key[..div] {
                return None;
            }
            let rem = mask & 0x07;
            if rem > 0 {
                let shift = 8 - rem;
                if leaf.key[div] != key[div] >> shift << shift {
                    return None;
                }
            }
            Some(leaf)
        }
    }
}

fn net_to_key(net: IpNet) -> Vec<u8> {
    let net = net.trunc();
    let mut key = match net.addr() {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    };
    key.push(net.prefix_len());
    key
}

fn ip_to_key(ip: IpAddr) -> Vec<u8> {
    match normalize(ip) {
        IpAddr::V4(addr) => {
            let mut key = addr.octets().to_vec();
            key.push(32);
            key
        }
        IpAddr::V6(addr) => {
            let mut key = addr.octets().to_vec();
            key.push(128);
            key
        }
    }
}

/// IPv4-mapped IPv6 addresses collapse to their 4-byte form so they hit
/// the IPv4 region of the trie.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

fn key_to_net(key: &[u8]) -> IpNet {
    let plen = key[key.len() - 1];
    if key.len() == 5 {
        let octets: [u8; 4] = key[..4].try_into().expect("IPv4 route key");
        IpNet::V4(Ipv4Net::new(Ipv4Addr::from(octets), plen).expect("mask fits the family"))
    } else {
        let octets: [u8; 16] = key[..16].try_into().expect("IPv6 route key");
        IpNet::V6(Ipv6Net::new(Ipv6Addr::from(octets), plen).expect("mask fits the family"))
    }
}
