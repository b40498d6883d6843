//! Configurations: one point of the search space.
//!
//! A [`Configuration`] selects a set of values for each set-valued facet and
//! a flag for each boolean option. Configurations form a half-lattice under
//! facet-wise inclusion: joins always exist, meets do not (the intersection of
//! two mandatory facets may be empty).

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::element::{Element, FacetKind};

/// Errors raised while building a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("expected 7 comma-separated facets, found {found}")]
    FacetCount { found: usize },
    #[error("unknown {facet} token '{token}'")]
    UnknownToken { facet: &'static str, token: String },
    #[error("{facet} must select at least one value")]
    EmptyFacet { facet: &'static str },
}

/// A set-valued dimension of the configuration space.
pub trait Facet: Copy + Eq + Hash + fmt::Debug + 'static {
    const KIND: FacetKind;
    const NAME: &'static str;
    /// Members in canonical order.
    const MEMBERS: &'static [Self];
    /// Token that stands for "no member" in configuration text.
    const NEUTRAL: Option<&'static str> = None;

    fn element(self) -> Element;

    fn from_element(element: Element) -> Option<Self> {
        Self::MEMBERS.iter().copied().find(|m| m.element() == element)
    }

    fn from_token(token: &str) -> Option<Self> {
        Element::from_token(token).and_then(Self::from_element)
    }

    fn bit(self) -> u8 {
        let index = Self::MEMBERS
            .iter()
            .position(|m| *m == self)
            .unwrap_or_default();
        1 << index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crypto {
    Rsa,
    Ecc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    None,
    Sign,
    Encrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    NoAppAuth,
    AppAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserToken {
    Anonymous,
    Password,
    Certificate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leak {
    Channel,
    LongTerm,
}

impl Facet for Crypto {
    const KIND: FacetKind = FacetKind::Crypto;
    const NAME: &'static str = "crypto";
    const MEMBERS: &'static [Self] = &[Crypto::Rsa, Crypto::Ecc];

    fn element(self) -> Element {
        match self {
            Crypto::Rsa => Element::Rsa,
            Crypto::Ecc => Element::Ecc,
        }
    }
}

impl Facet for ChannelMode {
    const KIND: FacetKind = FacetKind::ChannelMode;
    const NAME: &'static str = "channel mode";
    const MEMBERS: &'static [Self] = &[ChannelMode::None, ChannelMode::Sign, ChannelMode::Encrypt];

    fn element(self) -> Element {
        match self {
            ChannelMode::None => Element::ChannelNone,
            ChannelMode::Sign => Element::Sign,
            ChannelMode::Encrypt => Element::Encrypt,
        }
    }
}

impl Facet for SecurityMode {
    const KIND: FacetKind = FacetKind::SecurityMode;
    const NAME: &'static str = "security mode";
    const MEMBERS: &'static [Self] = &[SecurityMode::NoAppAuth, SecurityMode::AppAuth];
    const NEUTRAL: Option<&'static str> = Some("SNone");

    fn element(self) -> Element {
        match self {
            SecurityMode::NoAppAuth => Element::NoAppAuth,
            SecurityMode::AppAuth => Element::AppAuth,
        }
    }
}

impl Facet for UserToken {
    const KIND: FacetKind = FacetKind::UserToken;
    const NAME: &'static str = "user token";
    const MEMBERS: &'static [Self] = &[
        UserToken::Anonymous,
        UserToken::Password,
        UserToken::Certificate,
    ];

    fn element(self) -> Element {
        match self {
            UserToken::Anonymous => Element::Anonymous,
            UserToken::Password => Element::Password,
            UserToken::Certificate => Element::Certificate,
        }
    }
}

impl Facet for Leak {
    const KIND: FacetKind = FacetKind::Leaks;
    const NAME: &'static str = "leaks";
    const MEMBERS: &'static [Self] = &[Leak::Channel, Leak::LongTerm];
    const NEUTRAL: Option<&'static str> = Some("no_leaks");

    fn element(self) -> Element {
        match self {
            Leak::Channel => Element::ChannelLeak,
            Leak::LongTerm => Element::LongTermLeak,
        }
    }
}

/// A subset of one facet's members, stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacetSet<T: Facet> {
    bits: u8,
    _facet: PhantomData<T>,
}

impl<T: Facet> FacetSet<T> {
    pub fn empty() -> Self {
        Self::from_bits(0)
    }

    pub fn full() -> Self {
        Self::from_bits((1u8 << T::MEMBERS.len()) - 1)
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        Self {
            bits,
            _facet: PhantomData,
        }
    }

    pub fn from_members(members: impl IntoIterator<Item = T>) -> Self {
        let mut set = Self::empty();
        for m in members {
            set.insert(m);
        }
        set
    }

    pub fn insert(&mut self, member: T) {
        self.bits |= member.bit();
    }

    pub fn contains(self, member: T) -> bool {
        self.bits & member.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_subset(self, other: Self) -> bool {
        self.bits & !other.bits == 0
    }

    pub fn union(self, other: Self) -> Self {
        Self::from_bits(self.bits | other.bits)
    }

    /// Members in canonical order.
    pub fn members(self) -> impl Iterator<Item = T> {
        T::MEMBERS.iter().copied().filter(move |m| self.contains(*m))
    }

    /// Every subset of `self`, the empty set included.
    pub fn subsets(self) -> impl Iterator<Item = Self> {
        let bits = self.bits;
        (0..=bits)
            .rev()
            .filter(move |b| b & !bits == 0)
            .map(Self::from_bits)
    }

    fn parse_group(group: &str) -> Result<Self, ConfigurationError> {
        let mut set = Self::empty();
        for token in group.split('|') {
            if T::NEUTRAL == Some(token) {
                continue;
            }
            let member = T::from_token(token).ok_or_else(|| ConfigurationError::UnknownToken {
                facet: T::NAME,
                token: token.to_string(),
            })?;
            set.insert(member);
        }
        Ok(set)
    }

    /// Members joined by `|`, sorted by token text.
    fn render(self) -> String {
        let mut tokens: Vec<&str> = self.members().map(|m| m.element().token()).collect();
        tokens.sort_unstable();
        tokens.join("|")
    }
}

impl<T: Facet> fmt::Debug for FacetSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.members()).finish()
    }
}

/// Result of comparing two configurations under `⊑`.
///
/// Equal configurations compare as [`Dominance::Lesser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    Lesser,
    Greater,
    Incomparable,
}

impl Dominance {
    /// `-1`, `+1` or `0`.
    pub fn signum(self) -> i8 {
        match self {
            Dominance::Lesser => -1,
            Dominance::Greater => 1,
            Dominance::Incomparable => 0,
        }
    }
}

/// One point of the configuration space.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Configuration {
    crypto: FacetSet<Crypto>,
    channel_mode: FacetSet<ChannelMode>,
    reopen: bool,
    security_mode: FacetSet<SecurityMode>,
    user_token: FacetSet<UserToken>,
    switch: bool,
    leaks: FacetSet<Leak>,
}

impl Configuration {
    /// Build a configuration, rejecting empty mandatory facets.
    pub fn new(
        crypto: FacetSet<Crypto>,
        channel_mode: FacetSet<ChannelMode>,
        reopen: bool,
        security_mode: FacetSet<SecurityMode>,
        user_token: FacetSet<UserToken>,
        switch: bool,
        leaks: FacetSet<Leak>,
    ) -> Result<Self, ConfigurationError> {
        require_nonempty(crypto)?;
        require_nonempty(channel_mode)?;
        require_nonempty(security_mode)?;
        require_nonempty(user_token)?;
        Ok(Self {
            crypto,
            channel_mode,
            reopen,
            security_mode,
            user_token,
            switch,
            leaks,
        })
    }

    /// Build a configuration from its atomic features, in any order.
    pub fn from_elements(elements: &[Element]) -> Result<Self, ConfigurationError> {
        let mut crypto = FacetSet::empty();
        let mut channel_mode = FacetSet::empty();
        let mut reopen = false;
        let mut security_mode = FacetSet::empty();
        let mut user_token = FacetSet::empty();
        let mut switch = false;
        let mut leaks = FacetSet::empty();
        for &element in elements {
            match element.facet() {
                FacetKind::Crypto => add_element(&mut crypto, element),
                FacetKind::ChannelMode => add_element(&mut channel_mode, element),
                FacetKind::Reopen => reopen = true,
                FacetKind::SecurityMode => add_element(&mut security_mode, element),
                FacetKind::UserToken => add_element(&mut user_token, element),
                FacetKind::Switch => switch = true,
                FacetKind::Leaks => add_element(&mut leaks, element),
            }
        }
        Self::new(
            crypto,
            channel_mode,
            reopen,
            security_mode,
            user_token,
            switch,
            leaks,
        )
    }

    pub fn crypto(&self) -> FacetSet<Crypto> {
        self.crypto
    }

    pub fn channel_mode(&self) -> FacetSet<ChannelMode> {
        self.channel_mode
    }

    pub fn reopen(&self) -> bool {
        self.reopen
    }

    pub fn security_mode(&self) -> FacetSet<SecurityMode> {
        self.security_mode
    }

    pub fn user_token(&self) -> FacetSet<UserToken> {
        self.user_token
    }

    pub fn switch(&self) -> bool {
        self.switch
    }

    pub fn leaks(&self) -> FacetSet<Leak> {
        self.leaks
    }

    /// Whether the facet admits more than one value below `self`, i.e. whether
    /// weakening that facet can ever produce a distinct configuration.
    pub fn varies(&self, kind: FacetKind) -> bool {
        match kind {
            FacetKind::Crypto => self.crypto.len() > 1,
            FacetKind::ChannelMode => self.channel_mode.len() > 1,
            FacetKind::Reopen => self.reopen,
            FacetKind::SecurityMode => self.security_mode.len() > 1,
            FacetKind::UserToken => self.user_token.len() > 1,
            FacetKind::Switch => self.switch,
            FacetKind::Leaks => !self.leaks.is_empty(),
        }
    }

    /// The canonical element path.
    pub fn elements(&self) -> Vec<Element> {
        let mut out = Vec::with_capacity(crate::element::ELEMENT_COUNT);
        out.extend(self.crypto.members().map(Facet::element));
        out.extend(self.channel_mode.members().map(Facet::element));
        if self.reopen {
            out.push(Element::Reopen);
        }
        out.extend(self.security_mode.members().map(Facet::element));
        out.extend(self.user_token.members().map(Facet::element));
        if self.switch {
            out.push(Element::Switch);
        }
        out.extend(self.leaks.members().map(Facet::element));
        out
    }

    /// Least upper bound: unions every set, ORs every flag.
    pub fn join(&self, other: &Self) -> Self {
        Self {
            crypto: self.crypto.union(other.crypto),
            channel_mode: self.channel_mode.union(other.channel_mode),
            reopen: self.reopen || other.reopen,
            security_mode: self.security_mode.union(other.security_mode),
            user_token: self.user_token.union(other.user_token),
            switch: self.switch || other.switch,
            leaks: self.leaks.union(other.leaks),
        }
    }

    /// `self ⊑ other`.
    pub fn leq(&self, other: &Self) -> bool {
        self.crypto.is_subset(other.crypto)
            && self.channel_mode.is_subset(other.channel_mode)
            && (!self.reopen || other.reopen)
            && self.security_mode.is_subset(other.security_mode)
            && self.user_token.is_subset(other.user_token)
            && (!self.switch || other.switch)
            && self.leaks.is_subset(other.leaks)
    }

    pub fn compare(&self, other: &Self) -> Dominance {
        if self.leq(other) {
            Dominance::Lesser
        } else if other.leq(self) {
            Dominance::Greater
        } else {
            Dominance::Incomparable
        }
    }
}

fn require_nonempty<T: Facet>(set: FacetSet<T>) -> Result<(), ConfigurationError> {
    if set.is_empty() {
        Err(ConfigurationError::EmptyFacet { facet: T::NAME })
    } else {
        Ok(())
    }
}

fn add_element<T: Facet>(set: &mut FacetSet<T>, element: Element) {
    if let Some(member) = T::from_element(element) {
        set.insert(member);
    }
}

fn parse_flag(group: &str, name: &'static str) -> Result<bool, ConfigurationError> {
    match group.strip_prefix("no_") {
        Some(rest) if rest == name => Ok(false),
        None if group == name => Ok(true),
        _ => Err(ConfigurationError::UnknownToken {
            facet: name,
            token: group.to_string(),
        }),
    }
}

fn render_flag(f: &mut fmt::Formatter<'_>, set: bool, name: &str) -> fmt::Result {
    if set {
        write!(f, "{name}")
    } else {
        write!(f, "no_{name}")
    }
}

impl PartialOrd for Configuration {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (self.leq(other), other.leq(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    /// Parse `RSA|ECC, None|Sign, no_reopen, SSec, anon, no_switch, no_leaks`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let groups: Vec<&str> = compact.split(',').collect();
        if groups.len() != 7 {
            return Err(ConfigurationError::FacetCount {
                found: groups.len(),
            });
        }
        Self::new(
            FacetSet::parse_group(groups[0])?,
            FacetSet::parse_group(groups[1])?,
            parse_flag(groups[2], "reopen")?,
            FacetSet::parse_group(groups[3])?,
            FacetSet::parse_group(groups[4])?,
            parse_flag(groups[5], "switch")?,
            FacetSet::parse_group(groups[6])?,
        )
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, ",
            self.crypto.render(),
            self.channel_mode.render()
        )?;
        render_flag(f, self.reopen, "reopen")?;
        write!(
            f,
            ", {}, {}, ",
            self.security_mode.render(),
            self.user_token.render()
        )?;
        render_flag(f, self.switch, "switch")?;
        if self.leaks.is_empty() {
            write!(f, ", no_leaks")
        } else {
            write!(f, ", {}", self.leaks.render())
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration({self})")
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
