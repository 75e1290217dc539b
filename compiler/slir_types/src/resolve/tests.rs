use pretty_assertions::assert_eq;
use slir_diagnostic::TypeErrorKind;
use slir_ir::ast::{ContractKind, TypeName, VarDecl};
use slir_ir::{ContractId, Name, StringInterner};

use super::{ScopedType, TypeResolver, TypeScope};
use crate::{Elementary, Idx, Pool, TypeData, TypeFlags};

enum Entry {
    Contract(ContractId, Name, ContractKind),
    Enum(Name, Vec<Name>),
    Struct(Name, Vec<VarDecl>, Option<ContractId>),
}

/// Flat scope: every entry is visible from everywhere, keyed by full path.
#[derive(Default)]
struct FlatScope {
    entries: Vec<(Vec<Name>, Entry)>,
}

impl TypeScope for FlatScope {
    fn lookup(&self, _contract: Option<ContractId>, path: &[Name]) -> Option<ScopedType<'_>> {
        let (_, entry) = self.entries.iter().find(|(p, _)| p.as_slice() == path)?;
        Some(match entry {
            Entry::Contract(id, name, kind) => ScopedType::Contract {
                id: *id,
                name: *name,
                kind: *kind,
            },
            Entry::Enum(qualified, variants) => ScopedType::Enum {
                qualified: *qualified,
                variants,
            },
            Entry::Struct(qualified, fields, owner) => ScopedType::Struct {
                qualified: *qualified,
                fields,
                owner: *owner,
            },
        })
    }
}

fn elem(interner: &StringInterner, s: &str) -> TypeName {
    TypeName::Elementary(interner.intern(s))
}

fn user(interner: &StringInterner, s: &str) -> TypeName {
    TypeName::UserDefined(s.split('.').map(|p| interner.intern(p)).collect())
}

#[test]
fn spelling_variants_share_an_index() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let scope = FlatScope::default();
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);

    let a = resolver
        .resolve(&TypeName::mapping(elem(&interner, "address"), elem(&interner, "uint")))
        .unwrap();
    let b = resolver
        .resolve(&TypeName::Descriptor(
            interner.intern("mapping(address => uint256) storage ref"),
        ))
        .unwrap();
    assert_eq!(a, b);
    let byte = resolver.resolve(&elem(&interner, "byte")).unwrap();
    assert_eq!(byte, pool.elementary(Elementary::FixedBytes(1)));
}

#[test]
fn unknown_user_type_reports_its_spelling() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let scope = FlatScope::default();
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);

    let err = resolver
        .resolve(&TypeName::array(user(&interner, "Vault.Missing"), None))
        .unwrap_err();
    assert_eq!(err.spelling, "Vault.Missing");
    assert_eq!(err.kind, TypeErrorKind::UnknownName);
}

#[test]
fn malformed_spelling_and_var() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let scope = FlatScope::default();
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);

    let err = resolver.resolve(&elem(&interner, "uint7")).unwrap_err();
    assert_eq!(err.kind, TypeErrorKind::Malformed);

    let err = resolver.resolve(&TypeName::Inferred).unwrap_err();
    assert_eq!(err.kind, TypeErrorKind::Undeterminable);
    assert_eq!(err.spelling, "var");
}

#[test]
fn contract_can_name_itself() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let token = interner.intern("Token");
    let id = ContractId::new(3);
    let scope = FlatScope {
        entries: vec![(vec![token], Entry::Contract(id, token, ContractKind::Contract))],
    };
    let mut resolver = TypeResolver::new(&pool, &interner, &scope).in_contract(Some(id));
    let idx = resolver.resolve(&user(&interner, "Token")).unwrap();
    assert_eq!(pool.contract_of(idx), Some((id, ContractKind::Contract)));
}

#[test]
fn recursive_struct_uses_back_reference() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let node = interner.intern("List.Node");
    let children = interner.intern("children");
    let fields = vec![
        VarDecl::new(interner.intern("value"), elem(&interner, "uint")),
        VarDecl::new(children, TypeName::array(user(&interner, "Node"), None)),
    ];
    let scope = FlatScope {
        entries: vec![(vec![interner.intern("Node")], Entry::Struct(node, fields, None))],
    };
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);
    let idx = resolver.resolve(&user(&interner, "Node")).unwrap();

    let TypeData::Struct { fields, .. } = pool.get(idx) else {
        panic!("expected a struct");
    };
    assert_eq!(fields.len(), 2);
    let back = pool.struct_ref(node);
    assert_eq!(fields[1].1, pool.array(back, None));
    // following the field lands back on the definition
    let child = pool.index_result(pool.struct_field(idx, children).unwrap());
    assert_eq!(child, Some(idx));
}

#[test]
fn mutually_referencing_structs_are_canonical() {
    let interner = StringInterner::new();
    let a = interner.intern("A");
    let b = interner.intern("B");
    let make_scope = || FlatScope {
        entries: vec![
            (
                vec![a],
                Entry::Struct(a, vec![VarDecl::new(interner.intern("b"), user(&interner, "B"))], None),
            ),
            (
                vec![b],
                Entry::Struct(b, vec![VarDecl::new(interner.intern("a"), user(&interner, "A"))], None),
            ),
        ],
    };

    let field_a = interner.intern("a");
    let field_b = interner.intern("b");

    // Resolve in both orders; fields always lead back to the definitions.
    let pool = Pool::new();
    let scope = make_scope();
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);
    let a_first = resolver.resolve(&user(&interner, "A")).unwrap();
    let b_second = resolver.resolve(&user(&interner, "B")).unwrap();
    assert_eq!(pool.struct_field(a_first, field_b), Some(b_second));
    assert_eq!(pool.struct_field(b_second, field_a), Some(a_first));

    let pool2 = Pool::new();
    let scope2 = make_scope();
    let mut resolver2 = TypeResolver::new(&pool2, &interner, &scope2);
    let b_first = resolver2.resolve(&user(&interner, "B")).unwrap();
    let a_second = resolver2.resolve(&user(&interner, "A")).unwrap();
    assert_eq!(pool2.struct_field(a_second, field_b), Some(b_first));
    assert_eq!(pool2.struct_field(b_first, field_a), Some(a_second));
}

#[test]
fn enum_and_function_types() {
    let interner = StringInterner::new();
    let pool = Pool::new();
    let state = interner.intern("Auction.State");
    let variants = vec![interner.intern("Open"), interner.intern("Closed")];
    let scope = FlatScope {
        entries: vec![(vec![interner.intern("State")], Entry::Enum(state, variants))],
    };
    let mut resolver = TypeResolver::new(&pool, &interner, &scope);

    let e = resolver.resolve(&user(&interner, "State")).unwrap();
    assert!(pool.flags(e).contains(TypeFlags::USER_DEFINED));
    assert_eq!(pool.display(e, &interner), "enum Auction.State");

    let f = resolver
        .resolve(&TypeName::Function {
            params: vec![user(&interner, "State")],
            returns: vec![elem(&interner, "bool")],
            external: false,
        })
        .unwrap();
    assert_eq!(
        pool.get(f),
        TypeData::Function {
            params: vec![e],
            returns: vec![Idx::BOOL],
            external: false
        }
    );
}
