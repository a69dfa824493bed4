//! Function synthesis and emission.

mod common;

use common::interface;
use cxxi::{BuiltinKind, InterfaceError, LiteralType, Numeric, SymbolLinkage};

const HEADER: &str = "struct Point { int x; int y; };";

#[test]
fn test_identity_is_emitted() {
    let (_dir, mut iface) = interface(HEADER);
    let int = iface.builtin(BuiltinKind::Int);
    let identity = iface
        .declare_function("identity", &[int.clone()], Some(&int))
        .unwrap();
    iface.add_parameter("x", &int, identity).unwrap();
    let zero = iface.literal(32, 0).unwrap();
    iface.set_return(Some(zero), identity).unwrap();

    let module = iface.emit().unwrap();
    let symbol = module.function("identity").unwrap();
    assert_eq!(symbol.linkage, SymbolLinkage::Export);
    assert_eq!(symbol.signature.params.len(), 1);
    assert!(symbol.ir.as_deref().unwrap().contains("iconst.i32 0"));
    assert!(!module.object.is_empty());
}

#[test]
fn test_declared_function_is_visible_in_the_unit() {
    let (_dir, mut iface) = interface(HEADER);
    let int = iface.builtin(BuiltinKind::Int);
    let function = iface.declare_function("later", &[], Some(&int)).unwrap();

    let unit = iface.unit().unwrap();
    assert!(unit.functions().contains(&function.decl()));
    assert_eq!(unit.decl(function.decl()).name, "later");
    assert!(unit.function(function.decl()).unwrap().body.is_none());
}

#[test]
fn test_parameters_accumulate_in_order() {
    let (_dir, mut iface) = interface(HEADER);
    let int = iface.builtin(BuiltinKind::Int);
    let double = iface.builtin(BuiltinKind::Double);
    let function = iface
        .declare_function("mix", &[int.clone(), double.clone()], None)
        .unwrap();

    let mismatch = iface.add_parameter("a", &double, function).unwrap_err();
    assert!(matches!(
        mismatch,
        InterfaceError::ParameterMismatch { index: 0, .. }
    ));

    let a = iface.add_parameter("a", &int, function).unwrap();
    let b = iface.add_parameter("b", &double, function).unwrap();
    let extra = iface.add_parameter("c", &int, function).unwrap_err();
    assert!(matches!(extra, InterfaceError::ParameterMismatch { index: 2, .. }));

    let unit = iface.unit().unwrap();
    let params = &unit.function(function.decl()).unwrap().params;
    assert_eq!(params.as_slice(), [a.decl(), b.decl()]);
}

#[test]
fn test_returning_a_parameter() {
    let (_dir, mut iface) = interface(HEADER);
    let short = iface.builtin(BuiltinKind::Short);
    let long_long = iface.builtin(BuiltinKind::LongLong);
    let widen = iface
        .declare_function("widen", &[short.clone()], Some(&long_long))
        .unwrap();
    let x = iface.add_parameter("x", &short, widen).unwrap();
    let value = iface.param_ref(x).unwrap();
    iface.set_return(Some(value), widen).unwrap();

    let module = iface.emit().unwrap();
    let ir = module.function("widen").unwrap().ir.clone().unwrap();
    assert!(ir.contains("sextend.i64"), "{ir}");
}

#[test]
fn test_set_return_replaces_the_body() {
    let (_dir, mut iface) = interface(HEADER);
    let int = iface.builtin(BuiltinKind::Int);
    let function = iface.declare_function("answer", &[], Some(&int)).unwrap();
    let first = iface.literal(32, 1).unwrap();
    iface.set_return(Some(first), function).unwrap();
    let second = iface.literal(32, 42).unwrap();
    iface.set_return(Some(second), function).unwrap();

    let module = iface.emit().unwrap();
    let ir = module.function("answer").unwrap().ir.clone().unwrap();
    assert!(ir.contains("iconst.i32 42"), "{ir}");
    assert!(!ir.contains("iconst.i32 1\n"), "{ir}");
}

#[test]
fn test_literal_types() {
    let (_dir, mut iface) = interface(HEADER);
    assert!(iface.literal(8, -1).is_ok());
    assert!(iface.literal(64, i64::MAX).is_ok());
    assert!(matches!(
        iface.literal(24, 0),
        Err(InterfaceError::UnsupportedLiteralType(_))
    ));

    let double = LiteralType::Type(iface.builtin(BuiltinKind::Double));
    assert!(iface.literal_of(&double, Numeric::Float(0.5)).is_ok());
    assert!(matches!(
        iface.literal_of(&double, Numeric::Integer(1)),
        Err(InterfaceError::LiteralPayloadMismatch(_))
    ));
    assert!(iface.literal_of(&LiteralType::Index, Numeric::Integer(3)).is_ok());
    assert!(matches!(
        iface.literal_of(&LiteralType::Index, Numeric::Float(3.0)),
        Err(InterfaceError::LiteralPayloadMismatch(_))
    ));

    let point = iface.resolve_type("Point").unwrap();
    assert!(matches!(
        iface.literal_of(&LiteralType::Type(point), Numeric::Integer(0)),
        Err(InterfaceError::UnsupportedLiteralType(_))
    ));
}

#[test]
fn test_index_literal_is_pointer_sized() {
    let (_dir, mut iface) = interface(HEADER);
    let unsigned_long = iface.builtin(BuiltinKind::ULong);
    let function = iface
        .declare_function("count", &[], Some(&unsigned_long))
        .unwrap();
    let three = iface.literal_of(&LiteralType::Index, Numeric::Integer(3)).unwrap();
    iface.set_return(Some(three), function).unwrap();

    let module = iface.emit().unwrap();
    let ir = module.function("count").unwrap().ir.clone().unwrap();
    assert!(ir.contains("iconst.i64 3"), "{ir}");
}

#[test]
fn test_anonymous_names_are_per_instance() {
    let (_dir_a, mut first) = interface(HEADER);
    let (_dir_b, mut second) = interface(HEADER);
    let a0 = first.declare_function("", &[], None).unwrap();
    let a1 = first.declare_function("", &[], None).unwrap();
    let b0 = second.declare_function("", &[], None).unwrap();

    assert_eq!(first.unit().unwrap().decl(a0.decl()).name, "__cxxi_anon0");
    assert_eq!(first.unit().unwrap().decl(a1.decl()).name, "__cxxi_anon1");
    assert_eq!(second.unit().unwrap().decl(b0.decl()).name, "__cxxi_anon0");
}

#[test]
fn test_body_less_functions_are_imports() {
    let (_dir, mut iface) = interface("int from_header(int);");
    let int = iface.builtin(BuiltinKind::Int);
    iface.declare_function("external", &[int.clone()], Some(&int)).unwrap();

    let module = iface.emit().unwrap();
    assert_eq!(module.functions.len(), 1);
    let external = module.function("external").unwrap();
    assert_eq!(external.linkage, SymbolLinkage::Import);
    assert!(external.ir.is_none());
    assert!(module.function("from_header").is_none());
}

#[test]
fn test_emission_is_deterministic() {
    let (_dir, mut iface) = interface(HEADER);
    let int = iface.builtin(BuiltinKind::Int);
    let function = iface.declare_function("seven", &[], Some(&int)).unwrap();
    let seven = iface.literal(32, 7).unwrap();
    iface.set_return(Some(seven), function).unwrap();

    let first = iface.emit().unwrap();
    let second = iface.emit().unwrap();
    assert_eq!(first.object, second.object);
}

#[test]
fn test_record_parameters_are_rejected_at_emission() {
    let (_dir, mut iface) = interface(HEADER);
    let point = iface.resolve_type("Point").unwrap();
    iface.declare_function("take", &[point], None).unwrap();
    assert!(matches!(iface.emit(), Err(InterfaceError::Codegen(_))));
}

#[test]
fn test_handles_of_another_interface_are_rejected() {
    let (_dir_a, mut first) = interface(HEADER);
    let (_dir_b, mut second) = interface(HEADER);
    let point = first.resolve_type("Point").unwrap();
    assert!(matches!(
        second.declare_function("f", &[point], None),
        Err(InterfaceError::StaleHandle)
    ));

    let function = first.declare_function("g", &[], None).unwrap();
    let value = second.literal(32, 0).unwrap();
    assert!(matches!(
        first.set_return(Some(value), function),
        Err(InterfaceError::StaleHandle)
    ));
    assert!(matches!(
        second.set_return(None, function),
        Err(InterfaceError::StaleHandle)
    ));
}

#[test]
fn test_duplicate_synthesized_name_is_rejected() {
    let (_dir, mut iface) = interface("int from_header(int);");
    let int = iface.builtin(BuiltinKind::Int);
    iface.declare_function("f", &[], Some(&int)).unwrap();

    let error = iface.declare_function("f", &[int.clone()], None).unwrap_err();
    assert!(matches!(error, InterfaceError::DuplicateFunction(ref name) if name == "f"));

    iface.declare_function("from_header", &[int.clone()], Some(&int)).unwrap();
    assert_eq!(iface.emit().unwrap().functions.len(), 2);
}
