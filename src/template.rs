//! Class template instantiation on demand.

use cxxi_front::{DeclRef, Sema, SemaError, SpecializationKind, TemplateArgument};

use crate::errors::{InterfaceError, InterfaceResult};
use crate::interface::CxxInterface;
use crate::types::{HandleKind, TypeHandle};

/// A template argument before it is checked against a template.
#[derive(Clone, Copy, Debug)]
pub enum ArgumentValue<'a> {
    Type(&'a TypeHandle),
    /// A constant of the given builtin type.
    Integral(&'a TypeHandle, i64),
}

impl CxxInterface {
    pub fn create_template_argument(
        &self,
        value: ArgumentValue<'_>,
    ) -> InterfaceResult<TemplateArgument> {
        match value {
            ArgumentValue::Type(handle) => {
                self.check_handle(handle)?;
                self.to_semantic_type(handle)
                    .map(TemplateArgument::Type)
                    .ok_or_else(|| {
                        InterfaceError::InvalidHandle(format!(
                            "{:?} cannot be a template argument",
                            handle.kind()
                        ))
                    })
            }
            ArgumentValue::Integral(handle, value) => match handle.kind() {
                HandleKind::Builtin(kind) if kind.is_integral() => {
                    let (bytes, _) = kind.size_align(self.target());
                    Ok(TemplateArgument::integral(
                        value as u64,
                        (bytes * 8) as u32,
                        kind.is_signed(self.target()),
                    ))
                }
                HandleKind::Builtin(kind) => Err(InterfaceError::InvalidArgumentKind(
                    kind.spelling().to_owned(),
                )),
                other => Err(InterfaceError::InvalidArgumentKind(format!("{other:?}"))),
            },
        }
    }

    /// Find or create the specialization of `template` for `args` and make
    /// sure it is defined.
    ///
    /// Anything but a class template handle yields `Invalid`.
    pub fn instantiate_class_template(
        &mut self,
        template: &TypeHandle,
        args: &[TemplateArgument],
    ) -> InterfaceResult<TypeHandle> {
        self.check_handle(template)?;
        let HandleKind::TemplateClass(decl) = template.kind() else {
            return Ok(TypeHandle::invalid());
        };
        let location = self.end_of_unit()?;

        let spec = self.with_sema(|sema| {
            let checked = sema
                .check_template_arguments(decl, args)
                .map_err(|e| instantiation_failure(sema, decl, e))?;
            let spec = sema
                .require_specialization(decl, checked)
                .map_err(|e| instantiation_failure(sema, decl, e))?;

            if sema.specialization_kind(spec) == Some(SpecializationKind::Undeclared) {
                sema.instantiate_attrs(spec)
                    .map_err(|e| instantiation_failure(sema, spec, e))?;
            }
            sema.instantiate_class_template_specialization(
                location,
                spec,
                SpecializationKind::ExplicitInstantiationDefinition,
            )
            .map_err(|e| instantiation_failure(sema, spec, e))?;
            tracing::debug!(specialization = %sema.display_name(spec), "specialization ready");
            Ok::<_, InterfaceError>(spec)
        })??;

        Ok(TypeHandle::in_unit(
            HandleKind::SpecializedTemplateClass(spec),
            self.id(),
        ))
    }
}

fn instantiation_failure(sema: &Sema<'_>, decl: DeclRef, source: SemaError) -> InterfaceError {
    InterfaceError::InstantiationFailure {
        name: sema.display_name(decl),
        source,
    }
}
