//! Atomic configuration features and their canonical order.
//!
//! Every configuration expands into a strictly increasing sequence of
//! [`Element`]s. That sequence is the configuration's path in the
//! [`Trie`](crate::trie::Trie), and subsequence containment between two
//! paths is exactly the `⊑` relation between the configurations.

use std::fmt;

/// Number of distinct atomic features.
pub const ELEMENT_COUNT: usize = 14;

/// One atomic feature of a configuration.
///
/// The discriminant is the element's rank in the canonical order, so the
/// derived `Ord` is the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Element {
    Rsa = 0,
    Ecc = 1,
    ChannelNone = 2,
    Sign = 3,
    Encrypt = 4,
    Reopen = 5,
    NoAppAuth = 6,
    AppAuth = 7,
    Anonymous = 8,
    Password = 9,
    Certificate = 10,
    Switch = 11,
    ChannelLeak = 12,
    LongTermLeak = 13,
}

/// The dimension of the configuration space an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacetKind {
    Crypto,
    ChannelMode,
    Reopen,
    SecurityMode,
    UserToken,
    Switch,
    Leaks,
}

const TOKENS: [&str; ELEMENT_COUNT] = [
    "RSA", "ECC", "None", "Sign", "Encrypt", "reopen", "SNoAA", "SSec", "anon", "pwd", "cert",
    "switch", "ch_leaks", "lt_leaks",
];

const FACETS: [FacetKind; ELEMENT_COUNT] = [
    FacetKind::Crypto,
    FacetKind::Crypto,
    FacetKind::ChannelMode,
    FacetKind::ChannelMode,
    FacetKind::ChannelMode,
    FacetKind::Reopen,
    FacetKind::SecurityMode,
    FacetKind::SecurityMode,
    FacetKind::UserToken,
    FacetKind::UserToken,
    FacetKind::UserToken,
    FacetKind::Switch,
    FacetKind::Leaks,
    FacetKind::Leaks,
];

impl Element {
    /// All elements in canonical order (indexable by [`Element::rank`]).
    pub const ALL: [Element; ELEMENT_COUNT] = [
        Element::Rsa,
        Element::Ecc,
        Element::ChannelNone,
        Element::Sign,
        Element::Encrypt,
        Element::Reopen,
        Element::NoAppAuth,
        Element::AppAuth,
        Element::Anonymous,
        Element::Password,
        Element::Certificate,
        Element::Switch,
        Element::ChannelLeak,
        Element::LongTermLeak,
    ];

    pub fn rank(self) -> usize {
        self as usize
    }

    /// Textual token used in configuration strings.
    pub fn token(self) -> &'static str {
        TOKENS[self.rank()]
    }

    pub fn facet(self) -> FacetKind {
        FACETS[self.rank()]
    }

    pub fn from_token(token: &str) -> Option<Element> {
        TOKENS
            .iter()
            .position(|t| *t == token)
            .map(|rank| Element::ALL[rank])
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Whether `path` is strictly increasing in canonical order.
pub fn is_canonical(path: &[Element]) -> bool {
    path.windows(2).all(|w| w[0] < w[1])
}

/// Insert `element` at its canonical position. Returns the path unchanged
/// (as a copy) when the element is already present.
pub fn insert_sorted(path: &[Element], element: Element) -> Vec<Element> {
    let mut out = path.to_vec();
    if let Err(pos) = out.binary_search(&element) {
        out.insert(pos, element);
    }
    out
}

/// Whether every element of `needle` occurs in `haystack` in the same order.
pub fn is_subsequence(needle: &[Element], haystack: &[Element]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|e| rest.any(|h| h == e))
}

/// Render a path as `RSA, None, SSec, anon` for diagnostics.
pub fn render_path(path: &[Element]) -> String {
    path.iter()
        .map(|e| e.token())
        .collect::<Vec<_>>()
        .join(", ")
}
