//! Platform context derived from knowledge-file paths.
//!
//! A rule file living under a platform directory implicitly requires that
//! platform to come up in the conversation. The catalog maps a platform
//! name to the alias tokens people actually type for it.

use herald_match::{Combinator, MatchNode};

const PLATFORM_ALIASES: &[(&str, &[&str])] = &[
    ("aws", &["aws", "amazon", "ec2"]),
    ("azure", &["azure", "azurestack"]),
    ("baremetal", &["baremetal", "metal"]),
    ("gcp", &["gcp", "google"]),
    ("ibmcloud", &["ibmcloud", "ibm"]),
    ("nutanix", &["nutanix", "prism"]),
    ("openstack", &["openstack", "osp"]),
    ("powervs", &["powervs", "power"]),
    ("vsphere", &["vsphere", "vcenter", "vmware", "esxi", "govmomi"]),
];

fn matched_platforms(
    path: &str,
) -> impl Iterator<Item = (&'static str, &'static [&'static str])> + '_ {
    PLATFORM_ALIASES.iter().copied().filter(move |(name, _)| {
        path.split(['/', '\\'])
            .map(|segment| segment.strip_suffix(".yaml").unwrap_or(segment))
            .any(|segment| segment == *name)
    })
}

/// Match terms for every platform named by a path segment: one any-of node
/// over the platform's alias tokens per matched platform.
pub fn path_context_terms(path: &str) -> Vec<MatchNode> {
    matched_platforms(path)
        .map(|(_, aliases)| MatchNode {
            combinator: Combinator::Or,
            tokens: aliases.iter().map(|alias| alias.to_string()).collect(),
            ..MatchNode::default()
        })
        .collect()
}

/// Flattened alias tokens for every platform named by a path segment.
/// Channel-context dispatch injects these into the candidate tokens.
pub fn path_context_tokens(path: &str) -> Vec<String> {
    matched_platforms(path)
        .flat_map(|(_, aliases)| aliases.iter().map(|alias| alias.to_string()))
        .collect()
}

/// A `containsAny` clause per matched platform, `and`-joined. `None` when
/// the path names no known platform.
pub fn path_context_expression(path: &str) -> Option<String> {
    let clauses: Vec<String> = matched_platforms(path)
        .map(|(_, aliases)| {
            let quoted: Vec<String> = aliases
                .iter()
                .map(|alias| format!("\"{alias}\""))
                .collect();
            format!("containsAny(tokens, [{}])", quoted.join(", "))
        })
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" and "))
    }
}
