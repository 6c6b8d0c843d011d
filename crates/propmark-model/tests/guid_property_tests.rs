//! Property tests for identifier classification.

use propmark_model::guid::{classify, normalize};
use propmark_model::GuidKind;
use proptest::prelude::*;

fn ifc_strategy() -> impl Strategy<Value = String> {
    "[0-9A-Za-z_$]{22}"
}

fn ms_hyphenated_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"
}

fn ms_compact_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{32}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn ifc_alphabet_of_22_is_ifc(s in ifc_strategy()) {
        prop_assert_eq!(classify(&s), GuidKind::Ifc);
    }

    #[test]
    fn canonical_hex_guids_are_ms(a in ms_hyphenated_strategy(), b in ms_compact_strategy()) {
        prop_assert_eq!(classify(&a), GuidKind::Ms);
        prop_assert_eq!(classify(&b), GuidKind::Ms);
    }

    #[test]
    fn urn_prefix_and_padding_do_not_change_kind(s in ms_hyphenated_strategy(), pad in " {0,3}") {
        let wrapped = format!("{pad}urn:uuid:{s}{pad}");
        prop_assert_eq!(classify(&wrapped), GuidKind::Ms);
        prop_assert_eq!(normalize(&wrapped), s);
    }

    #[test]
    fn classify_is_stable_under_normalize(s in ".{0,40}") {
        let once = normalize(&s);
        prop_assert_eq!(classify(&once), classify(&s));
        prop_assert_eq!(classify(&normalize(&once)), classify(&once));
    }

    #[test]
    fn other_lengths_are_unknown(s in "[0-9A-Za-z_$]{1,21}") {
        prop_assume!(s.len() != 22);
        prop_assert_eq!(classify(&s), GuidKind::Unknown);
    }
}
