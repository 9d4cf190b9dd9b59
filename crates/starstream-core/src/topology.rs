//! Static resource topology: nodes and weighted links

use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A directed link between two nodes
///
/// Adjacency treats links as undirected; the declared direction is kept
/// because telemetry keys measurements by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub destination: String,
    pub capacity_gbps: f64,
    pub base_latency_ms: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        capacity_gbps: f64,
        base_latency_ms: f64,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            capacity_gbps,
            base_latency_ms,
            tags: BTreeMap::new(),
        }
    }

    /// Attach a tag to the link
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Snapshot key for this link in its declared direction
    pub fn key(&self) -> LinkKey {
        LinkKey::new(&self.source, &self.destination)
    }

    /// True if the link touches `node`
    pub fn touches(&self, node: &str) -> bool {
        self.source == node || self.destination == node
    }

    /// The endpoint opposite `node`, if the link touches it
    pub fn other_end(&self, node: &str) -> Option<&str> {
        if self.source == node {
            Some(&self.destination)
        } else if self.destination == node {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Ordered pair of nodes used to key per-link telemetry
///
/// Serialized as `"A->B"` so it can be used as a JSON map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LinkKey {
    pub source: String,
    pub destination: String,
}

impl LinkKey {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// The same pair in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            source: self.destination.clone(),
            destination: self.source.clone(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.destination)
    }
}

impl From<LinkKey> for String {
    fn from(key: LinkKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for LinkKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once("->") {
            Some((src, dst)) if !src.is_empty() && !dst.is_empty() => Ok(Self::new(src, dst)),
            _ => Err(format!("invalid link key '{}', expected 'SRC->DST'", value)),
        }
    }
}

/// Static graph of nodes and links
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: BTreeSet<String>,
    pub links: Vec<Link>,
}

impl Topology {
    /// Build a topology without checking link endpoints
    pub fn new<I, S>(nodes: I, links: Vec<Link>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            links,
        }
    }

    /// Three-node reference fabric: a direct but thin A-C link and a two-hop A-B-C route
    pub fn reference() -> Self {
        Self::new(
            ["A", "B", "C"],
            vec![
                Link::new("A", "B", 100.0, 8.0),
                Link::new("B", "C", 100.0, 12.0),
                Link::new("A", "C", 50.0, 30.0),
            ],
        )
    }

    /// Build a topology, failing if any link references an undeclared node
    pub fn validated<I, S>(nodes: I, links: Vec<Link>) -> Result<Self, TopologyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topology = Self::new(nodes, links);
        topology.validate()?;
        Ok(topology)
    }

    /// Check that every link endpoint is a declared node
    pub fn validate(&self) -> Result<(), TopologyError> {
        for link in &self.links {
            for endpoint in [&link.source, &link.destination] {
                if !self.nodes.contains(endpoint) {
                    return Err(TopologyError::UnknownEndpoint {
                        from: link.source.clone(),
                        to: link.destination.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// Sorted, deduplicated neighbors of `node` over links in either direction
    pub fn neighbors(&self, node: &str) -> Vec<String> {
        self.links
            .iter()
            .filter_map(|l| l.other_end(node))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Links touching `node`, in declaration order
    pub fn links_from(&self, node: &str) -> Vec<&Link> {
        self.links.iter().filter(|l| l.touches(node)).collect()
    }

    /// First declared link joining `a` and `b` in either direction
    pub fn link_between(&self, a: &str, b: &str) -> Option<&Link> {
        self.links.iter().find(|l| {
            (l.source == a && l.destination == b) || (l.source == b && l.destination == a)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Topology {
        Topology::new(
            ["A", "B", "C"],
            vec![
                Link::new("A", "B", 100.0, 8.0),
                Link::new("B", "C", 100.0, 12.0),
                Link::new("A", "C", 50.0, 30.0),
            ],
        )
    }

    #[test]
    fn test_neighbors_sorted_and_deduplicated() {
        let mut topo = triangle();
        topo.links.push(Link::new("C", "A", 10.0, 40.0));

        assert_eq!(topo.neighbors("A"), vec!["B", "C"]);
        assert_eq!(topo.neighbors("C"), vec!["A", "B"]);
        assert!(topo.neighbors("Z").is_empty());
    }

    #[test]
    fn test_neighbors_symmetric() {
        let topo = triangle();
        for a in &topo.nodes {
            for b in topo.neighbors(a) {
                assert!(
                    topo.neighbors(&b).contains(a),
                    "{} lists {} but not the reverse",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_validate_rejects_unknown_endpoint() {
        let result = Topology::validated(["A", "B"], vec![Link::new("A", "X", 10.0, 1.0)]);

        match result {
            Err(TopologyError::UnknownEndpoint { node, .. }) => assert_eq!(node, "X"),
            other => panic!("expected UnknownEndpoint, got {:?}", other),
        }
    }

    #[test]
    fn test_lenient_constructor_keeps_dangling_links() {
        let topo = Topology::new(["A"], vec![Link::new("A", "X", 10.0, 1.0)]);
        assert_eq!(topo.neighbors("A"), vec!["X"]);
        assert!(topo.validate().is_err());
    }

    #[test]
    fn test_link_between_either_direction() {
        let topo = triangle();
        assert_eq!(topo.link_between("C", "B").unwrap().base_latency_ms, 12.0);
        assert!(topo.link_between("A", "Z").is_none());
    }

    #[test]
    fn test_link_key_string_form() {
        let key = LinkKey::new("A", "B");
        assert_eq!(key.to_string(), "A->B");
        assert_eq!(LinkKey::try_from("A->B".to_string()).unwrap(), key);
        assert!(LinkKey::try_from("AB".to_string()).is_err());
        assert_eq!(key.reversed(), LinkKey::new("B", "A"));
    }
}
