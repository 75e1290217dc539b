//! Annotation resolution.
//!
//! Turns a [`TypeName`] as written into a canonical [`Idx`], looking user
//! types up through a [`TypeScope`] supplied by the entity model.
//!
//! Struct-typed fields inside a struct definition are always interned as
//! [`TypeData::StructRef`](crate::TypeData::StructRef) back-references. A struct therefore has one
//! canonical index no matter which variable first mentions it, and a
//! self-referential struct never recurses.

use slir_diagnostic::{AnalysisError, TypeErrorKind};
use slir_ir::ast::{ContractKind, TypeName, VarDecl};
use slir_ir::{ensure_sufficient_stack, ContractId, Name, Span, StringInterner};
use tracing::trace;

use crate::normalize::{normalize_elementary, parse_descriptor, NormalizeError};
use crate::{Idx, Pool};

/// A user-defined type visible from some scope.
#[derive(Clone, Copy, Debug)]
pub enum ScopedType<'a> {
    Contract {
        id: ContractId,
        name: Name,
        kind: ContractKind,
    },
    Enum {
        qualified: Name,
        variants: &'a [Name],
    },
    Struct {
        qualified: Name,
        fields: &'a [VarDecl],
        /// Contract the struct is declared in; its fields resolve there.
        owner: Option<ContractId>,
    },
}

/// Symbol lookup for user-defined type paths.
pub trait TypeScope {
    /// Look `path` up as seen from inside `contract` (`None` at file level).
    ///
    /// Implementations search the contract's own and inherited declarations,
    /// then the file-level and contract-qualified names.
    fn lookup(&self, contract: Option<ContractId>, path: &[Name]) -> Option<ScopedType<'_>>;
}

/// A failed resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeError {
    pub spelling: String,
    pub reason: String,
    pub kind: TypeErrorKind,
}

impl TypeError {
    fn new(spelling: String, reason: impl Into<String>, kind: TypeErrorKind) -> Self {
        Self {
            spelling,
            reason: reason.into(),
            kind,
        }
    }

    fn from_normalize(spelling: String, err: &NormalizeError) -> Self {
        Self::new(spelling, err.to_string(), TypeErrorKind::Malformed)
    }

    pub fn into_analysis(self, span: Span) -> AnalysisError {
        AnalysisError::UnresolvedType {
            spelling: self.spelling,
            reason: self.reason,
            code: self.kind,
            span,
        }
    }
}

pub struct TypeResolver<'a> {
    pool: &'a Pool,
    interner: &'a StringInterner,
    scope: &'a dyn TypeScope,
    context: Option<ContractId>,
    /// Non-zero while resolving the fields of a struct definition.
    field_depth: u32,
    /// Structs mentioned by fields whose definitions still need interning.
    pending: Vec<(Name, &'a [VarDecl], Option<ContractId>)>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(pool: &'a Pool, interner: &'a StringInterner, scope: &'a dyn TypeScope) -> Self {
        Self {
            pool,
            interner,
            scope,
            context: None,
            field_depth: 0,
            pending: Vec::new(),
        }
    }

    /// Resolve annotations as seen from inside `contract`.
    #[must_use]
    pub fn in_contract(mut self, contract: Option<ContractId>) -> Self {
        self.context = contract;
        self
    }

    pub fn resolve(&mut self, ty: &TypeName) -> Result<Idx, TypeError> {
        ensure_sufficient_stack(|| self.resolve_inner(ty))
    }

    fn resolve_inner(&mut self, ty: &TypeName) -> Result<Idx, TypeError> {
        match ty {
            TypeName::Elementary(name) => {
                let spelled = self.interner.lookup(*name);
                let elementary = normalize_elementary(spelled)
                    .map_err(|e| TypeError::from_normalize(spelled.to_string(), &e))?;
                Ok(self.pool.elementary(elementary))
            }
            TypeName::UserDefined(path) => self.resolve_path(path),
            TypeName::Array { elem, len } => {
                let elem = self.resolve(elem)?;
                Ok(self.pool.array(elem, *len))
            }
            TypeName::Mapping { key, value } => {
                let key = self.resolve(key)?;
                let value = self.resolve(value)?;
                Ok(self.pool.mapping(key, value))
            }
            TypeName::Function {
                params,
                returns,
                external,
            } => {
                let params = self.resolve_all(params)?;
                let returns = self.resolve_all(returns)?;
                Ok(self.pool.function(params, returns, *external))
            }
            TypeName::Descriptor(text) => {
                let text = self.interner.lookup(*text);
                let parsed = parse_descriptor(text, self.interner)
                    .map_err(|e| TypeError::from_normalize(text.to_string(), &e))?;
                self.resolve(&parsed)
            }
            TypeName::Inferred => Err(TypeError::new(
                "var".to_string(),
                "the declared type depends on the initializer",
                TypeErrorKind::Undeterminable,
            )),
        }
    }

    pub fn resolve_all(&mut self, tys: &[TypeName]) -> Result<Vec<Idx>, TypeError> {
        tys.iter().map(|ty| self.resolve(ty)).collect()
    }

    fn resolve_path(&mut self, path: &[Name]) -> Result<Idx, TypeError> {
        let scope = self.scope;
        let Some(found) = scope.lookup(self.context, path) else {
            return Err(TypeError::new(
                self.spell_path(path),
                "no type with this name is visible here",
                TypeErrorKind::UnknownName,
            ));
        };
        match found {
            ScopedType::Contract { id, name, kind } => Ok(self.pool.contract(id, name, kind)),
            ScopedType::Enum {
                qualified,
                variants,
            } => Ok(self.pool.enum_type(qualified, variants.to_vec())),
            ScopedType::Struct {
                qualified,
                fields,
                owner,
            } if self.field_depth > 0 => {
                let back = self.pool.struct_ref(qualified);
                if self.pool.canonical(back) == back {
                    self.pending.push((qualified, fields, owner));
                }
                Ok(back)
            }
            ScopedType::Struct {
                qualified,
                fields,
                owner,
            } => self.resolve_struct(qualified, fields, owner),
        }
    }

    fn resolve_struct(
        &mut self,
        qualified: Name,
        fields: &'a [VarDecl],
        owner: Option<ContractId>,
    ) -> Result<Idx, TypeError> {
        trace!(name = self.interner.lookup(qualified), "resolving struct");
        let saved = self.context;
        self.context = owner;
        self.field_depth += 1;
        let resolved: Result<Vec<(Name, Idx)>, TypeError> = fields
            .iter()
            .map(|field| Ok((field.name, self.resolve(&field.ty)?)))
            .collect();
        self.field_depth -= 1;
        self.context = saved;
        let idx = self.pool.struct_type(qualified, resolved?);

        if self.field_depth == 0 {
            while let Some((name, fields, owner)) = self.pending.pop() {
                let back = self.pool.struct_ref(name);
                if self.pool.canonical(back) == back {
                    self.resolve_struct(name, fields, owner)?;
                }
            }
        }
        Ok(idx)
    }

    fn spell_path(&self, path: &[Name]) -> String {
        path.iter()
            .map(|segment| self.interner.lookup(*segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Render an annotation as written, for diagnostics.
pub fn spell(ty: &TypeName, interner: &StringInterner) -> String {
    match ty {
        TypeName::Elementary(name) | TypeName::Descriptor(name) => {
            interner.lookup(*name).to_string()
        }
        TypeName::UserDefined(path) => path
            .iter()
            .map(|segment| interner.lookup(*segment))
            .collect::<Vec<_>>()
            .join("."),
        TypeName::Array { elem, len } => match len {
            Some(n) => format!("{}[{n}]", spell(elem, interner)),
            None => format!("{}[]", spell(elem, interner)),
        },
        TypeName::Mapping { key, value } => format!(
            "mapping({} => {})",
            spell(key, interner),
            spell(value, interner)
        ),
        TypeName::Function {
            params, returns, ..
        } => {
            let list = |tys: &[TypeName]| {
                tys.iter()
                    .map(|t| spell(t, interner))
                    .collect::<Vec<_>>()
                    .join(",")
            };
            if returns.is_empty() {
                format!("function ({})", list(params))
            } else {
                format!("function ({}) returns ({})", list(params), list(returns))
            }
        }
        TypeName::Inferred => "var".to_string(),
    }
}

#[cfg(test)]
mod tests;
