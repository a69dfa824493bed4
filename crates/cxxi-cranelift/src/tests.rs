//! Tests for the Cranelift lowering

use cxxi_core::{LanguageVariant, TargetInfo};
use cxxi_front::{BuiltinKind, DeclRef, QualType, Sema, SourceLocation, TranslationUnit};

use crate::{CompilationErrorKind, SymbolLinkage, lower_unit};

const INT: QualType = QualType::Builtin(BuiltinKind::Int);
const SHORT: QualType = QualType::Builtin(BuiltinKind::Short);
const LONG_LONG: QualType = QualType::Builtin(BuiltinKind::LongLong);

/// Declares `name(params) -> ret` and returns the function with its
/// attached parameters.
fn declare(
    unit: &mut TranslationUnit,
    target: &TargetInfo,
    name: &str,
    params: &[QualType],
    ret: QualType,
) -> (DeclRef, Vec<DeclRef>) {
    let file = unit.add_file("synthesized.cc");
    let location = SourceLocation::new(file, 0);
    let mut sema = Sema::new(unit, target, LanguageVariant::Cxx);
    let function = sema.create_function(name, params.to_vec(), ret, location);
    let params = params
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let param = sema.create_param(function, &format!("p{i}"), ty.clone(), location);
            sema.attach_param(function, param);
            param
        })
        .collect();
    (function, params)
}

fn return_literal(unit: &mut TranslationUnit, target: &TargetInfo, function: DeclRef, value: u64) {
    let location = unit.decl(function).location;
    let mut sema = Sema::new(unit, target, LanguageVariant::Cxx);
    let literal = sema.create_integer_literal(value, INT);
    let ret = sema.create_return(Some(literal), location);
    sema.set_body(function, ret);
}

fn return_param(unit: &mut TranslationUnit, target: &TargetInfo, function: DeclRef, param: DeclRef) {
    let location = unit.decl(function).location;
    let mut sema = Sema::new(unit, target, LanguageVariant::Cxx);
    let value = sema.create_param_ref(param).unwrap();
    let ret = sema.create_return(Some(value), location);
    sema.set_body(function, ret);
}

#[test]
fn test_literal_return_is_exported() {
    let target = TargetInfo::host();
    let mut unit = TranslationUnit::new("wrapper.cc");
    let (function, _) = declare(&mut unit, &target, "answer", &[INT], INT);
    return_literal(&mut unit, &target, function, 42);

    let module = lower_unit(&unit, &target, "wrapper").unwrap();
    assert_eq!(module.functions.len(), 1);
    assert!(!module.object.is_empty());

    let answer = module.function("answer").unwrap();
    assert_eq!(answer.linkage, SymbolLinkage::Export);
    assert_eq!(answer.signature.params.len(), 1);
    assert_eq!(answer.signature.returns.len(), 1);
    assert!(answer.ir.as_deref().unwrap().contains("iconst.i32 42"));
}

#[test]
fn test_parameter_is_widened_to_the_return_type() {
    let target = TargetInfo::host();
    let mut unit = TranslationUnit::new("wrapper.cc");
    let (function, params) = declare(&mut unit, &target, "widen", &[SHORT], LONG_LONG);
    return_param(&mut unit, &target, function, params[0]);

    let module = lower_unit(&unit, &target, "wrapper").unwrap();
    let ir = module.function("widen").unwrap().ir.clone().unwrap();
    assert!(ir.contains("sextend.i64"), "{ir}");
}

#[test]
fn test_body_less_function_is_imported() {
    let target = TargetInfo::host();
    let mut unit = TranslationUnit::new("wrapper.cc");
    declare(&mut unit, &target, "external", &[INT, INT], QualType::Void);

    let module = lower_unit(&unit, &target, "wrapper").unwrap();
    let external = module.function("external").unwrap();
    assert_eq!(external.linkage, SymbolLinkage::Import);
    assert!(external.signature.returns.is_empty());
    assert!(external.ir.is_none());
}

#[test]
fn test_record_by_value_is_rejected() {
    let target = TargetInfo::host();
    let mut unit = TranslationUnit::new("wrapper.cc");
    let record = {
        let mut sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        let mut diagnostics = Vec::new();
        cxxi_front::parser::parse_unit(
            &mut sema,
            &mut NoIncludes,
            "wrapper.cc",
            "struct Pair { int a; int b; };",
            &mut diagnostics,
        )
        .unwrap();
        let root = sema.unit().root();
        sema.lookup_in(root, "Pair")[0]
    };
    declare(&mut unit, &target, "take", &[QualType::Record(record)], INT);

    let error = lower_unit(&unit, &target, "wrapper").unwrap_err();
    assert!(matches!(
        error.kind(),
        CompilationErrorKind::UnsupportedType(message) if message.contains("Pair")
    ));
}

#[test]
fn test_parsed_functions_are_not_lowered() {
    let target = TargetInfo::host();
    let mut unit = TranslationUnit::new("wrapper.cc");
    {
        let mut sema = Sema::new(&mut unit, &target, LanguageVariant::Cxx);
        let mut diagnostics = Vec::new();
        cxxi_front::parser::parse_unit(
            &mut sema,
            &mut NoIncludes,
            "wrapper.cc",
            "int from_header(int x);",
            &mut diagnostics,
        )
        .unwrap();
    }

    let module = lower_unit(&unit, &target, "wrapper").unwrap();
    assert!(module.is_empty());
}

struct NoIncludes;

impl cxxi_front::parser::IncludeHandler for NoIncludes {
    fn include(
        &mut self,
        _: &mut Sema<'_>,
        path: &str,
        _: &str,
    ) -> Result<cxxi_front::parser::Included, String> {
        Err(format!("'{path}' file not found"))
    }
}
