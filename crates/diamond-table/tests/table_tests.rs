use diamond_selector::{ModuleAddress, Selector};
use diamond_table::{CutError, DispatchTable, FacetCut, TableReader};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

fn addr(n: u8) -> ModuleAddress {
    ModuleAddress::new([n; 20])
}

/// Readers never observe a half-applied transaction
#[test]
fn test_readers_see_whole_transactions() {
    let selectors: Vec<Selector> = (0..64).map(Selector::from_u32).collect();
    let table = Arc::new(DispatchTable::new());
    table
        .transact(|staged| staged.apply_cut(&FacetCut::add(addr(1), selectors.clone())))
        .unwrap();

    let reader = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for _ in 0..2_000 {
                let routes = table.list_all();
                let owners: std::collections::HashSet<_> = routes.iter().map(|(_, m)| *m).collect();
                assert_eq!(routes.len(), 64);
                assert_eq!(owners.len(), 1, "mixed owners observed");
            }
        })
    };

    for round in 0..200u32 {
        let target = if round % 2 == 0 { addr(2) } else { addr(1) };
        table
            .transact(|staged| staged.apply_cut(&FacetCut::replace(target, selectors.clone())))
            .unwrap();
    }

    reader.join().unwrap();
    assert_eq!(table.revision(), 201);
}

#[test]
fn test_initializer_style_failure_rolls_back_cuts() {
    let table = DispatchTable::new();
    let result: Result<(), &str> = table.transact(|staged| {
        staged
            .apply_cut(&FacetCut::add(addr(1), [Selector::from_u32(1)]))
            .map_err(|_| "cut")?;
        assert_eq!(staged.resolve(Selector::from_u32(1)), Some(addr(1)));
        Err("initializer reverted")
    });
    assert_eq!(result, Err("initializer reverted"));
    assert!(table.is_empty());
    assert_eq!(table.revision(), 0);
}

proptest! {
    /// At most one owner per selector after any accepted sequence of cuts
    #[test]
    fn prop_single_owner(ops in prop::collection::vec((0u8..3, 1u8..4, 0u32..8), 1..40)) {
        let table = DispatchTable::new();
        for (action, module, selector) in ops {
            let selector = Selector::from_u32(selector);
            let cut = match action {
                0 => FacetCut::add(addr(module), [selector]),
                1 => FacetCut::replace(addr(module), [selector]),
                _ => FacetCut::remove([selector]),
            };
            let before = table.snapshot();
            match table.transact(|staged| staged.apply_cut(&cut)) {
                Ok(()) => prop_assert_eq!(table.resolve(selector), cut.resulting_owner()),
                Err(CutError::AlreadyOwned { .. } | CutError::SameModule { .. } | CutError::NotOwned { .. }) => {
                    prop_assert_eq!(table.snapshot(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }

            let routes = table.list_all();
            let mut seen = std::collections::HashSet::new();
            for (selector, _) in &routes {
                prop_assert!(seen.insert(*selector));
            }
        }
    }
}
