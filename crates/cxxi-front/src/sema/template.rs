//! Class template argument checking, specialization and instantiation.
//!
//! A specialization moves through `SpecializationKind` states:
//! `Undeclared` when first registered, `Declared` once the template's
//! attributes are substituted, and one of the instantiation kinds once its
//! definition exists. Each step runs at most once per specialization.

use cxxi_core::TargetInfo;

use crate::errors::{SemaError, SemaResult};
use crate::refs::DeclRef;
use crate::tree::{
    Attr, AttrArg, Decl, DeclKind, FieldDecl, RecordDecl, SpecializationInfo, SpecializationKind,
    TagKind, TemplateParamKind,
};
use crate::types::{ArrayBound, BuiltinKind, QualType, SourceLocation, TemplateArgument};

use super::Sema;

/// Nesting limit for instantiations triggered by other instantiations.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

impl Sema<'_> {
    /// Check `args` against the parameter list of `template`, converting
    /// integral constants to their parameter's type.
    pub fn check_template_arguments(
        &self,
        template: DeclRef,
        args: &[TemplateArgument],
    ) -> SemaResult<Vec<TemplateArgument>> {
        let name = self.unit().qualified_name(template);
        let Some(decl) = self.unit().class_template(template) else {
            return Err(SemaError::NotATemplate { name });
        };
        if decl.params.len() != args.len() {
            return Err(SemaError::ArgumentCount {
                name,
                expected: decl.params.len(),
                found: args.len(),
            });
        }

        let mut checked = Vec::with_capacity(args.len());
        for (index, (param, arg)) in decl.params.iter().zip(args).enumerate() {
            let converted = match (param.kind, arg) {
                (TemplateParamKind::Type, TemplateArgument::Type(_)) => arg.clone(),
                (TemplateParamKind::NonType(kind), TemplateArgument::Integral { .. }) => {
                    convert_integral(arg, kind, self.target())
                }
                (TemplateParamKind::NonType(_), TemplateArgument::Param(_)) => arg.clone(),
                (TemplateParamKind::Type, _) => {
                    return Err(SemaError::ArgumentKind {
                        name,
                        index,
                        expected: "a type",
                    });
                }
                (TemplateParamKind::NonType(_), _) => {
                    return Err(SemaError::ArgumentKind {
                        name,
                        index,
                        expected: "an integral constant",
                    });
                }
            };
            checked.push(converted);
        }
        Ok(checked)
    }

    /// Existing specialization of `template` for a checked argument list.
    pub fn find_specialization(
        &self,
        template: DeclRef,
        args: &[TemplateArgument],
    ) -> Option<DeclRef> {
        self.unit()
            .class_template(template)?
            .specializations
            .get(args)
            .copied()
    }

    /// Register a new, `Undeclared` specialization of `template`.
    pub fn create_specialization(
        &mut self,
        template: DeclRef,
        args: Vec<TemplateArgument>,
    ) -> SemaResult<DeclRef> {
        let pattern = self.pattern_of(template)?;
        let tag = self
            .unit()
            .record(pattern)
            .map_or(TagKind::Class, |r| r.tag);
        let template_decl = self.unit().decl(template);
        let (name, parent, location) = (
            template_decl.name.clone(),
            template_decl.parent,
            template_decl.location,
        );

        let mut record = RecordDecl::new(tag);
        record.specialization = Some(SpecializationInfo {
            template,
            args: args.clone(),
            kind: SpecializationKind::Undeclared,
        });
        let spec = self.unit_mut().push_decl(Decl {
            name,
            parent,
            location,
            kind: DeclKind::Record(record),
        });
        if let Some(decl) = self.unit_mut().class_template_mut(template) {
            decl.specializations.insert(args, spec);
        }
        tracing::debug!(specialization = %self.display_name(spec), "created specialization");
        Ok(spec)
    }

    /// Find or create the specialization for a checked argument list,
    /// without defining it.
    pub fn require_specialization(
        &mut self,
        template: DeclRef,
        args: Vec<TemplateArgument>,
    ) -> SemaResult<DeclRef> {
        match self.find_specialization(template, &args) {
            Some(spec) => Ok(spec),
            None => self.create_specialization(template, args),
        }
    }

    pub fn specialization_kind(&self, spec: DeclRef) -> Option<SpecializationKind> {
        self.unit()
            .record(spec)?
            .specialization
            .as_ref()
            .map(|info| info.kind)
    }

    /// Copy the template's attributes into an `Undeclared` specialization,
    /// substituting template arguments.
    pub fn instantiate_attrs(&mut self, spec: DeclRef) -> SemaResult<()> {
        let Some(info) = self.specialization_info(spec) else {
            return Ok(());
        };
        if info.kind != SpecializationKind::Undeclared {
            return Ok(());
        }

        let pattern = self.pattern_of(info.template)?;
        let pattern_attrs = self
            .unit()
            .record(pattern)
            .map(|r| r.attrs.clone())
            .unwrap_or_default();
        let attrs = pattern_attrs
            .into_iter()
            .map(|attr| subst_attr(attr, &info.args))
            .collect::<SemaResult<Vec<_>>>()?;

        if let Some(record) = self.unit_mut().record_mut(spec) {
            record.attrs = attrs;
            if let Some(info) = record.specialization.as_mut() {
                info.kind = SpecializationKind::Declared;
            }
        }
        Ok(())
    }

    /// Give `spec` a definition by substituting its arguments into the
    /// template pattern. Does nothing if it already has one.
    pub fn instantiate_class_template_specialization(
        &mut self,
        location: SourceLocation,
        spec: DeclRef,
        kind: SpecializationKind,
    ) -> SemaResult<()> {
        let Some(info) = self.specialization_info(spec) else {
            return Err(SemaError::unsupported(format!(
                "'{}' is not a template specialization",
                self.display_name(spec)
            )));
        };
        if self.unit().record(spec).and_then(|r| r.definition).is_some() {
            return Ok(());
        }

        let name = self.display_name(spec);
        if self.instantiating.contains(&spec) {
            return Err(SemaError::RecursiveInstantiation { name });
        }
        if self.instantiating.len() >= MAX_INSTANTIATION_DEPTH {
            return Err(SemaError::InstantiationDepth {
                limit: MAX_INSTANTIATION_DEPTH,
            });
        }

        let pattern = self.pattern_of(info.template)?;
        let Some(pattern_def) = self.unit().record(pattern).and_then(|r| r.definition) else {
            return Err(SemaError::UndefinedTemplate { name });
        };
        self.instantiate_attrs(spec)?;
        let Some(pattern_record) = self.unit().record(pattern_def).cloned() else {
            return Err(SemaError::UndefinedTemplate { name });
        };

        self.instantiating.push(spec);
        let members = self.instantiate_members(&pattern_record, &info.args, location);
        self.instantiating.pop();
        let (bases, fields) = members?;

        let is_dynamic = pattern_record.methods.iter().any(|m| m.is_virtual)
            || bases.iter().any(|b| self.is_dynamic_type(b));

        self.unit_mut().decl_mut(spec).location = location;
        if let Some(record) = self.unit_mut().record_mut(spec) {
            record.bases = bases;
            record.fields = fields;
            record.methods = pattern_record.methods.clone();
            record.is_dynamic = is_dynamic;
            record.definition = Some(spec);
            if let Some(info) = record.specialization.as_mut() {
                info.kind = kind;
            }
        }
        tracing::debug!(specialization = %name, ?kind, "instantiated class template");
        Ok(())
    }

    fn instantiate_members(
        &mut self,
        pattern: &RecordDecl,
        args: &[TemplateArgument],
        location: SourceLocation,
    ) -> SemaResult<(Vec<QualType>, Vec<FieldDecl>)> {
        let mut bases = Vec::with_capacity(pattern.bases.len());
        for base in &pattern.bases {
            let ty = self.subst_type(base, args)?;
            self.require_complete_type(&ty, location)?;
            bases.push(ty);
        }

        let mut fields = Vec::with_capacity(pattern.fields.len());
        for field in &pattern.fields {
            let ty = self.subst_type(&field.ty, args)?;
            self.require_complete_type(&ty, location)?;
            fields.push(FieldDecl {
                name: field.name.clone(),
                ty,
                location: field.location,
            });
        }
        Ok((bases, fields))
    }

    /// Replace template parameters in `ty` with `args`. Template-ids become
    /// declared specializations; nothing is defined here.
    pub fn subst_type(&mut self, ty: &QualType, args: &[TemplateArgument]) -> SemaResult<QualType> {
        Ok(match ty {
            QualType::TemplateParam(index) => match args.get(*index as usize) {
                Some(TemplateArgument::Type(arg)) => arg.clone(),
                _ => {
                    return Err(SemaError::unsupported(format!(
                        "template parameter {index} has no type argument"
                    )));
                }
            },
            QualType::Pointer(inner) => self.subst_type(inner, args)?.pointer_to(),
            QualType::LValueReference(inner) => self.subst_type(inner, args)?.reference_to(),
            QualType::Array(inner, bound) => {
                let element = self.subst_type(inner, args)?;
                let bound = match *bound {
                    ArrayBound::Fixed(n) => n,
                    ArrayBound::Param(index) => array_extent(args, index)?,
                };
                QualType::Array(Box::new(element), ArrayBound::Fixed(bound))
            }
            QualType::TemplateSpecialization {
                template,
                args: template_args,
            } => {
                let substituted = template_args
                    .iter()
                    .map(|arg| self.subst_argument(arg, args))
                    .collect::<SemaResult<Vec<_>>>()?;
                let checked = self.check_template_arguments(*template, &substituted)?;
                QualType::Record(self.require_specialization(*template, checked)?)
            }
            QualType::Function { ret, params } => QualType::Function {
                ret: Box::new(self.subst_type(ret, args)?),
                params: params
                    .iter()
                    .map(|p| self.subst_type(p, args))
                    .collect::<SemaResult<Vec<_>>>()?,
            },
            QualType::Void | QualType::Builtin(_) | QualType::Record(_) | QualType::Enum(_) => {
                ty.clone()
            }
        })
    }

    fn subst_argument(
        &mut self,
        arg: &TemplateArgument,
        args: &[TemplateArgument],
    ) -> SemaResult<TemplateArgument> {
        match arg {
            TemplateArgument::Type(ty) => Ok(TemplateArgument::Type(self.subst_type(ty, args)?)),
            TemplateArgument::Param(index) => match args.get(*index as usize) {
                Some(value @ TemplateArgument::Integral { .. }) => Ok(value.clone()),
                _ => Err(SemaError::unsupported(format!(
                    "template parameter {index} has no integral argument"
                ))),
            },
            TemplateArgument::Integral { .. } => Ok(arg.clone()),
        }
    }

    /// Demand that `ty` be complete, implicitly instantiating any template
    /// specialization it names by value.
    pub fn require_complete_type(
        &mut self,
        ty: &QualType,
        location: SourceLocation,
    ) -> SemaResult<()> {
        match ty {
            QualType::Record(decl) => {
                let needs_definition = self
                    .unit()
                    .record(*decl)
                    .is_some_and(|r| r.specialization.is_some() && r.definition.is_none());
                if needs_definition {
                    self.instantiate_class_template_specialization(
                        location,
                        *decl,
                        SpecializationKind::ImplicitInstantiation,
                    )?;
                }
                self.size_align(ty).map(|_| ())
            }
            QualType::Array(inner, bound) => {
                self.require_complete_type(inner, location)?;
                match bound {
                    ArrayBound::Fixed(_) => self.size_align(ty).map(|_| ()),
                    ArrayBound::Param(_) => Ok(()),
                }
            }
            QualType::TemplateParam(_) | QualType::TemplateSpecialization { .. } => Ok(()),
            _ => self.size_align(ty).map(|_| ()),
        }
    }

    fn specialization_info(&self, spec: DeclRef) -> Option<SpecializationInfo> {
        self.unit().record(spec)?.specialization.clone()
    }

    fn pattern_of(&self, template: DeclRef) -> SemaResult<DeclRef> {
        self.unit()
            .class_template(template)
            .map(|t| t.pattern)
            .ok_or_else(|| SemaError::NotATemplate {
                name: self.unit().qualified_name(template),
            })
    }
}

fn convert_integral(arg: &TemplateArgument, kind: BuiltinKind, target: &TargetInfo) -> TemplateArgument {
    let value = arg.integral_value().unwrap_or_default();
    let (bytes, _) = kind.size_align(target);
    let value = if kind == BuiltinKind::Bool {
        u64::from(value != 0)
    } else {
        value as u64
    };
    TemplateArgument::integral(value, (bytes * 8) as u32, kind.is_signed(target))
}

fn array_extent(args: &[TemplateArgument], index: u32) -> SemaResult<u64> {
    match args.get(index as usize).and_then(TemplateArgument::integral_value) {
        Some(value) if value >= 0 => Ok(value as u64),
        Some(value) => Err(SemaError::unsupported(format!(
            "array extent {value} is negative"
        ))),
        None => Err(SemaError::unsupported(format!(
            "template parameter {index} has no integral argument"
        ))),
    }
}

fn subst_attr(attr: Attr, args: &[TemplateArgument]) -> SemaResult<Attr> {
    match attr {
        Attr::Aligned(AttrArg::Fixed(value)) => checked_alignment(value).map(|_| attr),
        Attr::Aligned(AttrArg::Param(index)) => {
            let value = args
                .get(index as usize)
                .and_then(TemplateArgument::integral_value)
                .ok_or_else(|| {
                    SemaError::unsupported(format!(
                        "template parameter {index} has no integral argument"
                    ))
                })?;
            let value = u64::try_from(value).map_err(|_| SemaError::InvalidAlignment { value: 0 })?;
            checked_alignment(value).map(|v| Attr::Aligned(AttrArg::Fixed(v)))
        }
    }
}

pub(crate) fn checked_alignment(value: u64) -> SemaResult<u64> {
    if value.is_power_of_two() {
        Ok(value)
    } else {
        Err(SemaError::InvalidAlignment { value })
    }
}
