//! Proptest strategies for configurations.

use proptest::prelude::*;

use crate::config::{Configuration, FacetSet};

fn nonempty_bits(width: u32) -> impl Strategy<Value = u8> {
    1u8..(1u8 << width)
}

/// Any valid configuration of the full space.
pub fn arb_configuration() -> impl Strategy<Value = Configuration> {
    (
        nonempty_bits(2),
        nonempty_bits(3),
        any::<bool>(),
        nonempty_bits(2),
        nonempty_bits(3),
        any::<bool>(),
        0u8..4,
    )
        .prop_filter_map(
            "mandatory facets are non-empty",
            |(crypto, channel, reopen, security, token, switch, leaks)| {
                Configuration::new(
                    FacetSet::from_bits(crypto),
                    FacetSet::from_bits(channel),
                    reopen,
                    FacetSet::from_bits(security),
                    FacetSet::from_bits(token),
                    switch,
                    FacetSet::from_bits(leaks),
                )
                .ok()
            },
        )
}

/// A pair `(low, high)` with `low ⊑ high`.
pub fn arb_ordered_pair() -> impl Strategy<Value = (Configuration, Configuration)> {
    (arb_configuration(), arb_configuration()).prop_map(|(a, b)| (a, a.join(&b)))
}

/// A supremum small enough to materialise quickly in property tests.
pub fn arb_small_supremum() -> impl Strategy<Value = Configuration> {
    arb_configuration().prop_filter("small lattice", |c| {
        c.crypto().len() + c.channel_mode().len() + c.user_token().len() + c.leaks().len() <= 7
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::test_runner::{Config as ProptestConfig, RngAlgorithm};

    use super::*;
    use crate::config::Dominance;
    use crate::element::is_subsequence;
    use crate::trie::Trie;
    use crate::verdict::Verdict;

    fn lattice_proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 64,
            rng_algorithm: RngAlgorithm::ChaCha,
            ..ProptestConfig::default()
        }
    }

    proptest! {
        #![proptest_config(lattice_proptest_config())]

        #[test]
        fn rendered_text_parses_back(c in arb_configuration()) {
            let text = c.to_string();
            prop_assert_eq!(text.parse::<Configuration>().unwrap(), c);
        }

        #[test]
        fn element_path_round_trips(c in arb_configuration()) {
            prop_assert_eq!(Configuration::from_elements(&c.elements()).unwrap(), c);
        }

        #[test]
        fn compare_is_antisymmetric(a in arb_configuration(), b in arb_configuration()) {
            let ab = a.compare(&b).signum();
            let ba = b.compare(&a).signum();
            if a == b {
                prop_assert_eq!(a.compare(&b), Dominance::Lesser);
            } else {
                prop_assert_eq!(ab > 0, ba < 0);
                prop_assert_eq!(ab < 0, ba > 0);
            }
            prop_assert!(a.leq(&a));
        }

        #[test]
        fn order_matches_subsequence_inclusion(a in arb_configuration(), b in arb_configuration()) {
            prop_assert_eq!(a.leq(&b), is_subsequence(&a.elements(), &b.elements()));
        }

        #[test]
        fn join_is_an_upper_bound(a in arb_configuration(), b in arb_configuration()) {
            let j = a.join(&b);
            prop_assert!(a.leq(&j));
            prop_assert!(b.leq(&j));
        }

        #[test]
        fn ordered_pairs_are_ordered((low, high) in arb_ordered_pair()) {
            prop_assert!(low.leq(&high));
        }

        #[test]
        fn true_settles_every_weaker_configuration(sup in arb_small_supremum(), pick in any::<prop::sample::Index>()) {
            let mut trie = Trie::from_configuration(sup);
            let members = members_of(&sup);
            let proven = members[pick.index(members.len())];
            trie.record(&proven.elements(), Verdict::True, Duration::ZERO).unwrap();
            for c in &members {
                if c.leq(&proven) {
                    prop_assert!(!trie.find(&c.elements()));
                    prop_assert_eq!(trie.verdict(&c.elements()), Some(Verdict::True));
                } else {
                    prop_assert!(trie.find(&c.elements()));
                }
            }
        }

        #[test]
        fn failure_settles_every_stronger_configuration(sup in arb_small_supremum(), pick in any::<prop::sample::Index>()) {
            let mut trie = Trie::from_configuration(sup);
            let members = members_of(&sup);
            let refuted = members[pick.index(members.len())];
            trie.record(&refuted.elements(), Verdict::False, Duration::ZERO).unwrap();
            for c in &members {
                if refuted.leq(c) {
                    prop_assert!(!trie.find(&c.elements()));
                } else {
                    prop_assert!(trie.find(&c.elements()));
                }
            }
        }
    }

    fn members_of(sup: &Configuration) -> Vec<Configuration> {
        let mut out = Vec::new();
        for crypto in sup.crypto().subsets() {
            for channel in sup.channel_mode().subsets() {
                for reopen in [false, true] {
                    for security in sup.security_mode().subsets() {
                        for token in sup.user_token().subsets() {
                            for switch in [false, true] {
                                for leaks in sup.leaks().subsets() {
                                    if let Ok(c) = Configuration::new(
                                        crypto, channel, reopen, security, token, switch, leaks,
                                    ) {
                                        if c.leq(sup) {
                                            out.push(c);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}
