use pretty_assertions::assert_eq;
use slir_ir::ast::ContractKind;
use slir_ir::{ContractId, StringInterner};

use super::Pool;
use crate::{Elementary, Idx, TypeData, TypeFlags};

#[test]
fn fixed_indices_match_their_types() {
    let pool = Pool::new();
    let expected = [
        (Idx::BOOL, Elementary::Bool),
        (Idx::ADDRESS, Elementary::Address),
        (Idx::ADDRESS_PAYABLE, Elementary::AddressPayable),
        (Idx::STRING, Elementary::String),
        (Idx::BYTES, Elementary::Bytes),
        (Idx::UINT256, Elementary::uint(256)),
        (Idx::INT256, Elementary::int(256)),
        (Idx::UINT8, Elementary::uint(8)),
        (Idx::BYTES32, Elementary::FixedBytes(32)),
        (Idx::BYTES4, Elementary::FixedBytes(4)),
    ];
    for (idx, elementary) in expected {
        assert_eq!(pool.elementary(elementary), idx);
    }
    assert_eq!(pool.get(Idx::ERROR), TypeData::Error);
    assert_eq!(pool.tuple(vec![]), Idx::UNIT);
}

#[test]
fn structural_identity_is_index_identity() {
    let pool = Pool::new();
    let a = pool.mapping(Idx::ADDRESS, Idx::UINT256);
    let b = pool.mapping(Idx::ADDRESS, Idx::UINT256);
    let c = pool.mapping(Idx::ADDRESS, Idx::BOOL);
    assert_eq!(a, b);
    assert_ne!(a, c);

    let before = pool.len();
    let _ = pool.array(a, None);
    let _ = pool.array(a, None);
    assert_eq!(pool.len(), before + 1);
}

#[test]
fn single_element_tuple_collapses() {
    let pool = Pool::new();
    assert_eq!(pool.tuple(vec![Idx::BOOL]), Idx::BOOL);
    let pair = pool.tuple(vec![Idx::BOOL, Idx::UINT256]);
    assert_eq!(pool.tuple_elems(pair), vec![Idx::BOOL, Idx::UINT256]);
    assert_eq!(pool.tuple_elems(Idx::BOOL), vec![Idx::BOOL]);
}

#[test]
fn flags_propagate_through_aggregates() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    assert!(pool.flags(Idx::UINT256).contains(TypeFlags::VALUE));
    assert!(pool.flags(Idx::STRING).contains(TypeFlags::DYNAMIC));

    let map = pool.mapping(Idx::ADDRESS, Idx::UINT256);
    let arr = pool.array(map, Some(3));
    assert!(pool.flags(arr).contains(TypeFlags::HAS_MAPPING));
    assert!(pool.is_reference(arr));

    let fixed = pool.array(Idx::UINT256, Some(4));
    assert!(!pool.flags(fixed).contains(TypeFlags::DYNAMIC));

    let s = pool.struct_type(
        interner.intern("Vault.Position"),
        vec![(interner.intern("bad"), Idx::ERROR)],
    );
    assert!(pool.flags(s).contains(TypeFlags::HAS_ERROR));
    assert!(pool.flags(s).contains(TypeFlags::USER_DEFINED));
}

#[test]
fn element_and_field_queries() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let map = pool.mapping(Idx::ADDRESS, Idx::UINT256);
    assert_eq!(pool.index_result(map), Some(Idx::UINT256));
    assert_eq!(
        pool.index_result(Idx::BYTES),
        Some(pool.elementary(Elementary::FixedBytes(1)))
    );
    assert_eq!(pool.index_result(Idx::BOOL), None);

    let amount = interner.intern("amount");
    let s = pool.struct_type(interner.intern("Position"), vec![(amount, Idx::UINT256)]);
    assert_eq!(pool.struct_field(s, amount), Some(Idx::UINT256));
    assert_eq!(pool.struct_field(s, interner.intern("missing")), None);
}

#[test]
fn struct_refs_follow_their_definition() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let node = interner.intern("List.Node");
    let next = interner.intern("next");
    let back = pool.struct_ref(node);
    let children = pool.array(back, None);
    let def = pool.struct_type(node, vec![(next, children)]);

    assert_eq!(pool.canonical(back), def);
    assert_eq!(pool.canonical(Idx::BOOL), Idx::BOOL);
    assert_eq!(pool.index_result(children), Some(def));
    let field = pool.struct_field(back, next);
    assert_eq!(field, Some(children));
}

#[test]
fn display_uses_canonical_spellings() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let map = pool.mapping(Idx::ADDRESS, Idx::UINT256);
    assert_eq!(pool.display(map, &interner), "mapping(address => uint256)");
    assert_eq!(
        pool.display(pool.array(Idx::UINT256, None), &interner),
        "uint256[]"
    );
    assert_eq!(
        pool.display(pool.array(Idx::BOOL, Some(2)), &interner),
        "bool[2]"
    );
    let token = pool.contract(ContractId::new(0), interner.intern("Token"), ContractKind::Contract);
    assert_eq!(pool.display(token, &interner), "contract Token");
    let s = pool.struct_ref(interner.intern("Vault.Position"));
    assert_eq!(pool.display(s, &interner), "struct Vault.Position");
    let pair = pool.tuple(vec![Idx::UINT256, Idx::BOOL]);
    assert_eq!(pool.display(pair, &interner), "(uint256,bool)");
}

#[test]
fn concurrent_interning_agrees() {
    let pool = Pool::new();
    let results: Vec<Idx> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| pool.array(Idx::ADDRESS, Some(7))))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
