//! Interfaces of the standard cut and loupe modules and the sample character module

use diamond_selector::ModuleInterface;

/// `DiamondCutFacet`: the single upgrade entry point
#[must_use]
pub fn cut_interface() -> ModuleInterface {
    ModuleInterface::new(
        "DiamondCutFacet",
        ["diamondCut((address,uint8,bytes4[])[] _diamondCut, address _init, bytes _calldata)"],
    )
}

/// `DiamondLoupeFacet`: table introspection
#[must_use]
pub fn loupe_interface() -> ModuleInterface {
    ModuleInterface::new(
        "DiamondLoupeFacet",
        [
            "facets()",
            "facetFunctionSelectors(address _facet)",
            "facetAddresses()",
            "facetAddress(bytes4 _functionSelector)",
            "supportsInterface(bytes4 _interfaceId)",
        ],
    )
}

/// First `CharacterFacet`
#[must_use]
pub fn character_interface() -> ModuleInterface {
    ModuleInterface::new(
        "CharacterFacet",
        [
            "createCharacter(string name)",
            "getCharacter(uint256 id)",
            "levelUp(uint256 id)",
        ],
    )
}

/// Second `CharacterFacet`; `levelUp` gains a level count
#[must_use]
pub fn character_v2_interface() -> ModuleInterface {
    ModuleInterface::new(
        "CharacterFacet",
        [
            "createCharacter(string name)",
            "getCharacter(uint256 id)",
            "levelUp(uint256 id, uint32 levels)",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_selector::SelectorExtractor;

    #[test]
    fn character_versions_share_two_selectors() {
        let extractor = SelectorExtractor::new();
        let v1 = extractor.extract(&character_interface()).unwrap();
        let v2 = extractor.extract(&character_v2_interface()).unwrap();
        let shared = v1.iter().filter(|s| v2.iter().any(|t| t == *s)).count();
        assert_eq!(shared, 2);
        assert_eq!(extractor.extract(&loupe_interface()).unwrap().len(), 5);
        assert_eq!(extractor.extract(&cut_interface()).unwrap().len(), 1);
    }
}
