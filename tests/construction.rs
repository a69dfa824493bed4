//! Building the translation unit: precompiled state, wrapper unit and the
//! build state machine.

mod common;

use common::{options, write_header};
use cxxi::{BuildState, CxxInterface, HandleKind, InterfaceError, LanguageVariant};
use cxxi_front::pch::pch_name;

#[test]
fn test_construct_reaches_ready() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(&dir, "shapes.h", "struct Square { int side; };");

    let mut iface = CxxInterface::new(options(LanguageVariant::Cxx));
    assert_eq!(iface.state(), BuildState::Unbuilt);
    iface.construct(&header).unwrap();
    assert_eq!(iface.state(), BuildState::Ready);
    assert_eq!(iface.header(), Some(header.canonicalize().unwrap().as_path()));

    assert!(matches!(
        iface.construct(&header),
        Err(InterfaceError::AlreadyBuilt)
    ));
}

#[test]
fn test_operations_before_construction_are_not_ready() {
    let mut iface = CxxInterface::new(options(LanguageVariant::Cxx));
    assert!(matches!(
        iface.resolve_type("Anything"),
        Err(InterfaceError::NotReady(BuildState::Unbuilt))
    ));
    assert!(matches!(
        iface.declare_function("f", &[], None),
        Err(InterfaceError::NotReady(_))
    ));
    assert!(matches!(iface.emit(), Err(InterfaceError::NotReady(_))));
}

#[test]
fn test_parse_error_carries_diagnostics_and_allows_retry() {
    let dir = tempfile::tempdir().unwrap();
    let broken = write_header(&dir, "broken.h", "struct Broken { int x }");
    let fixed = write_header(&dir, "fixed.h", "struct Fixed { int x; };");

    let mut iface = CxxInterface::new(options(LanguageVariant::Cxx));
    let error = iface.construct(&broken).unwrap_err();
    assert!(matches!(error, InterfaceError::PrecompileError { .. }));
    assert!(error.diagnostics().iter().any(|d| d.is_error()));
    assert_eq!(iface.state(), BuildState::Unbuilt);

    iface.construct(&fixed).unwrap();
    assert!(iface.resolve_type("Fixed").unwrap().is_valid());
}

#[test]
fn test_missing_header_is_a_system_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut iface = CxxInterface::new(options(LanguageVariant::Cxx));
    let error = iface.construct(dir.path().join("absent.h")).unwrap_err();
    assert!(matches!(error, InterfaceError::SystemError { .. }));
}

#[test]
fn test_precompiled_header_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(
        &dir,
        "lib.h",
        "namespace lib { struct Node { Node* next; int value; }; }",
    );
    let iface = CxxInterface::new(options(LanguageVariant::Cxx));
    let pch = iface.build_precompiled_header(&header).unwrap();
    assert!(!pch.bytes.is_empty());
    assert_eq!(iface.build_precompiled_header(&header).unwrap(), pch);

    let unit = pch.to_unit().unwrap();
    assert!(unit.dump().contains("Node"));
}

#[test]
fn test_header_includes_are_precompiled() {
    let dir = tempfile::tempdir().unwrap();
    write_header(&dir, "base.h", "struct Base { long id; };");
    let header = write_header(
        &dir,
        "derived.h",
        "#include \"base.h\"\nstruct Derived : Base { int extra; };",
    );

    let mut iface = CxxInterface::open(&header, options(LanguageVariant::Cxx)).unwrap();
    let derived = iface.resolve_type("Derived").unwrap();
    assert_eq!(iface.type_size(&derived).unwrap(), 16);
    assert!(matches!(
        iface.resolve_type("Base").unwrap().kind(),
        HandleKind::Class(_)
    ));
}

#[test]
fn test_wrapper_declares_the_internal_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(&dir, "a.h", "struct A { char c; };");
    let iface = CxxInterface::open(
        &header,
        options(LanguageVariant::Cxx).with_wrapper_name("shim"),
    )
    .unwrap();

    let session = iface.session().unwrap();
    assert_eq!(session.root_unit_name(), "shim.cc");
    assert!(session.end_of_unit_location().is_some());
    assert!(iface.unit().unwrap().dump().contains("__ffi_internal"));
}

#[test]
fn test_c_headers_use_a_c_wrapper() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(&dir, "c.h", "struct Pair { short a; short b; };");
    let mut iface = CxxInterface::open(&header, options(LanguageVariant::C)).unwrap();
    assert_eq!(iface.session().unwrap().root_unit_name(), "__cxxi_wrapper.c");

    let pair = iface.resolve_type("Pair").unwrap();
    assert_eq!(iface.type_size(&pair).unwrap(), 4);
}

#[test]
fn test_precompiled_state_is_registered_for_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(&dir, "p.h", "struct P { int v; };");
    let iface = CxxInterface::open(&header, options(LanguageVariant::Cxx)).unwrap();
    let canonical = iface.header().unwrap().display().to_string();
    assert!(pch_name(&canonical).ends_with("p.h.gch"));
}
