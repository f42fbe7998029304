use diamond_selector::{canonicalize, ModuleInterface, Selector, SelectorExtractor};
use proptest::prelude::*;

fn elementary() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("address"),
        Just("bool"),
        Just("string"),
        Just("bytes"),
        Just("uint256"),
        Just("uint8"),
        Just("int64"),
        Just("bytes4"),
        Just("bytes32"),
    ]
}

fn parameter() -> impl Strategy<Value = String> {
    (elementary(), prop_oneof![Just(""), Just("[]"), Just("[3]")])
        .prop_map(|(ty, suffix)| format!("{ty}{suffix}"))
}

fn signature() -> impl Strategy<Value = (String, Vec<String>)> {
    ("[a-z][a-zA-Z0-9_]{0,12}", prop::collection::vec(parameter(), 0..5))
}

#[test]
fn test_loupe_interface_selectors() {
    let loupe = ModuleInterface::new(
        "DiamondLoupeFacet",
        [
            "function facets() external view returns (tuple(address,bytes4[])[])",
            "function facetFunctionSelectors(address _facet) external view returns (bytes4[])",
            "function facetAddresses() external view returns (address[])",
            "function facetAddress(bytes4 _functionSelector) external view returns (address)",
            "function supportsInterface(bytes4 _interfaceId) external view returns (bool)",
        ],
    );
    let selectors = SelectorExtractor::new().extract(&loupe).unwrap().to_vec();
    assert_eq!(
        selectors,
        vec![
            Selector::from_u32(0x7a0e_d627),
            Selector::from_u32(0xadfc_a15e),
            Selector::from_u32(0x52ef_6b2c),
            Selector::from_u32(0xcdff_acc6),
            Selector::from_u32(0x01ff_c9a7),
        ]
    );
}

#[test]
fn test_cut_entry_point_in_both_spellings() {
    let a = Selector::from_signature("diamondCut(tuple(address,uint8,bytes4[])[],address,bytes)").unwrap();
    let b = Selector::from_signature(
        "function diamondCut((address facetAddress, uint8 action, bytes4[] functionSelectors)[] calldata _diamondCut, address _init, bytes calldata _calldata) external",
    )
    .unwrap();
    assert_eq!(a, Selector::from_u32(0x1f93_1c1c));
    assert_eq!(a, b);
}

proptest! {
    #[test]
    fn prop_canonical_form_is_fixed_point((name, params) in signature()) {
        let sig = format!("{name}({})", params.join(","));
        let once = canonicalize(&sig).unwrap();
        let twice = canonicalize(&once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once, sig);
    }

    #[test]
    fn prop_names_and_whitespace_do_not_change_selector((name, params) in signature()) {
        let bare = format!("{name}({})", params.join(","));
        let decorated = format!(
            "function {name}( {} ) external",
            params
                .iter()
                .enumerate()
                .map(|(i, ty)| format!("{ty} arg{i}"))
                .collect::<Vec<_>>()
                .join(" , ")
        );
        prop_assert_eq!(
            Selector::from_signature(&bare).unwrap(),
            Selector::from_signature(&decorated).unwrap()
        );
    }

    #[test]
    fn prop_extraction_is_deterministic_and_deduplicated(
        sigs in prop::collection::vec(signature(), 0..8)
    ) {
        let rendered: Vec<String> = sigs
            .iter()
            .map(|(name, params)| format!("{name}({})", params.join(",")))
            .collect();
        let interface = ModuleInterface::new("Generated", rendered.iter().chain(rendered.iter()).cloned());
        let extractor = SelectorExtractor::new();
        let first = extractor.extract(&interface).unwrap();
        let second = extractor.extract(&interface).unwrap();
        prop_assert_eq!(&first, &second);

        let mut distinct = rendered.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(first.len(), distinct.len());
    }
}
