//! Neighbour proposals used to keep a worker busy along one path.

use tracing::debug;

use crate::element::{insert_sorted, render_path, Element};
use crate::trie::Trie;

/// Features added one at a time by [`Trie::mutate_up`], strongest channel
/// mode first, then user tokens, security modes, hardening options and leaks.
pub const STRENGTHEN_ORDER: [Element; 12] = [
    Element::Encrypt,
    Element::Sign,
    Element::ChannelNone,
    Element::Certificate,
    Element::Password,
    Element::Anonymous,
    Element::AppAuth,
    Element::NoAppAuth,
    Element::Reopen,
    Element::Switch,
    Element::LongTermLeak,
    Element::ChannelLeak,
];

/// Removals applied cumulatively by [`Trie::mutate_down`]. An element is
/// dropped only when one of its companions keeps the facet non-empty; an
/// empty companion list marks an optional feature.
pub const WEAKEN_STEPS: [(Element, &[Element]); 10] = [
    (Element::Ecc, &[Element::Rsa]),
    (Element::ChannelNone, &[Element::Sign, Element::Encrypt]),
    (Element::Sign, &[Element::Encrypt]),
    (Element::Reopen, &[]),
    (Element::AppAuth, &[Element::NoAppAuth]),
    (Element::Password, &[Element::Anonymous, Element::Certificate]),
    (Element::Certificate, &[Element::Anonymous]),
    (Element::Switch, &[]),
    (Element::LongTermLeak, &[]),
    (Element::ChannelLeak, &[]),
];

impl Trie {
    /// Propose an open configuration one step above `path`.
    ///
    /// Candidates that were pruned (or never existed below the supremum) are
    /// skipped. When no single feature can be added, the crypto family is
    /// switched: RSA alone becomes ECC, ECC alone gains RSA.
    pub fn mutate_up(&self, path: &[Element]) -> Option<Vec<Element>> {
        for element in STRENGTHEN_ORDER {
            if path.contains(&element) {
                continue;
            }
            let candidate = insert_sorted(path, element);
            if self.find(&candidate) {
                debug!(from = %render_path(path), to = %render_path(&candidate), "mutate up");
                return Some(candidate);
            }
        }
        let has_rsa = path.contains(&Element::Rsa);
        let has_ecc = path.contains(&Element::Ecc);
        let candidate = match (has_rsa, has_ecc) {
            (true, false) => {
                let mut switched: Vec<Element> =
                    path.iter().copied().filter(|&e| e != Element::Rsa).collect();
                switched.insert(0, Element::Ecc);
                switched
            }
            (false, true) => insert_sorted(path, Element::Rsa),
            _ => return None,
        };
        self.find(&candidate).then(|| {
            debug!(from = %render_path(path), to = %render_path(&candidate), "mutate up (crypto)");
            candidate
        })
    }

    /// Propose an open configuration below `path`, weakening it one facet at
    /// a time. Facets the supremum fixes are left alone.
    pub fn mutate_down(&self, path: &[Element]) -> Option<Vec<Element>> {
        let supremum = *self.supremum();
        let mut current = path.to_vec();
        for (element, companions) in WEAKEN_STEPS {
            if !supremum.varies(element.facet()) {
                continue;
            }
            let Some(pos) = current.iter().position(|&e| e == element) else {
                continue;
            };
            if !companions.is_empty() && !companions.iter().any(|c| current.contains(c)) {
                continue;
            }
            current.remove(pos);
            if self.find(&current) {
                debug!(from = %render_path(path), to = %render_path(&current), "mutate down");
                return Some(current);
            }
        }
        None
    }
}
