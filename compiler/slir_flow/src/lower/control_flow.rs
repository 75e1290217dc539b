//! Statement lowering.
//!
//! Structured control flow becomes labels plus `Jump`/`Branch`. Loops push
//! their break and continue targets; `break`/`continue` jump to the
//! innermost pair.

use slir_ir::ast::{StmtKind, TypeName, VarDecl};
use slir_ir::{ensure_sufficient_stack, ExprId, Span, StmtId};

use super::{LoopTargets, Lowerer, Value};
use crate::ir::{Constant, InstrKind, LabelId, Operand, VarId, VarKind};

impl Lowerer<'_> {
    pub(super) fn lower_stmt(&mut self, id: StmtId) {
        ensure_sufficient_stack(|| self.lower_stmt_inner(id));
    }

    fn lower_stmt_inner(&mut self, id: StmtId) {
        let arena = self.arena;
        let stmt = arena.stmt(id);
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Block(stmts) | StmtKind::Unchecked(stmts) => {
                self.enter_block();
                for s in stmts {
                    self.lower_stmt(*s);
                }
                self.exit_block();
            }
            StmtKind::Expr(expr) => {
                self.lower_expr(*expr);
            }
            StmtKind::VarDecl { decls, init } => self.lower_var_decl(id, decls, *init, span),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(*cond, *then_branch, *else_branch, span),
            StmtKind::While { cond, body } => self.lower_while(*cond, *body, span),
            StmtKind::DoWhile { body, cond } => self.lower_do_while(*body, *cond, span),
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => self.lower_for(*init, *cond, *update, *body, span),
            StmtKind::Break | StmtKind::Continue => {
                let is_break = matches!(stmt.kind, StmtKind::Break);
                match self.loops.last().copied() {
                    Some(targets) => {
                        let target = if is_break {
                            targets.break_label
                        } else {
                            targets.continue_label
                        };
                        self.emit(InstrKind::Jump { target }, span);
                    }
                    None => self.unsupported_stmt(stmt.kind.describe(), span),
                }
            }
            StmtKind::Return(value) => self.lower_return(*value, span),
            StmtKind::Emit { event, args } => {
                let args = self.lower_args(args);
                self.emit(
                    InstrKind::Emit {
                        event: *event,
                        args,
                    },
                    span,
                );
            }
            StmtKind::Revert { error, args } => {
                let args = self.lower_args(args);
                self.emit(
                    InstrKind::Revert {
                        error: *error,
                        args,
                    },
                    span,
                );
            }
            StmtKind::Throw => {
                self.emit(
                    InstrKind::Revert {
                        error: None,
                        args: Vec::new(),
                    },
                    span,
                );
            }
            StmtKind::Placeholder => {
                self.emit(InstrKind::Placeholder, span);
            }
            StmtKind::InlineAssembly | StmtKind::Try => {
                self.unsupported_stmt(stmt.kind.describe(), span);
            }
            StmtKind::Opaque(kind) => {
                let construct = self.name(*kind);
                self.unsupported_stmt(construct, span);
            }
        }
    }

    /// Statement-level stand-in: an `Opaque` with no result.
    fn unsupported_stmt(&mut self, construct: &str, span: Span) {
        self.report_unsupported(construct.to_string(), span);
        self.emit(InstrKind::Opaque { dst: None }, span);
    }

    fn enter_block(&mut self) {
        if self.block_scoped {
            self.scope.push();
        }
    }

    fn exit_block(&mut self) {
        if self.block_scoped {
            self.scope.pop();
        }
    }

    fn jump_unless_terminated(&mut self, target: LabelId, span: Span) {
        if !self.builder.is_terminated() {
            self.emit(InstrKind::Jump { target }, span);
        }
    }

    // Declarations

    fn lower_var_decl(
        &mut self,
        stmt: StmtId,
        decls: &[Option<VarDecl>],
        init: Option<ExprId>,
        span: Span,
    ) {
        if decls
            .iter()
            .flatten()
            .any(|d| matches!(d.ty, TypeName::Inferred))
        {
            self.unsupported_stmt("var declaration", span);
        }

        let function = self.function;
        let mut slots: Vec<Option<(VarId, &VarDecl)>> = Vec::with_capacity(decls.len());
        for (i, decl) in decls.iter().enumerate() {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            let slot = decl
                .as_ref()
                .and_then(|d| function.local_at(stmt, index).map(|v| (self.slot(v), d)));
            slots.push(slot);
        }

        match (slots.as_slice(), init) {
            ([Some((slot, _))], Some(init)) => self.lower_single_init(*slot, init, span),
            (_, Some(init)) => {
                let values = self.lower_tuple_parts(slots.len(), init, span);
                for (slot, value) in slots.iter().zip(values) {
                    if let (Some((slot, _)), Some(value)) = (slot, value) {
                        self.emit(
                            InstrKind::Assign {
                                dst: *slot,
                                value: value.op,
                            },
                            span,
                        );
                    }
                }
            }
            (_, None) => {
                for (slot, _) in slots.iter().flatten() {
                    let zero = Operand::Const(Constant::Zero(self.var_ty(*slot)));
                    self.emit(
                        InstrKind::Assign {
                            dst: *slot,
                            value: zero,
                        },
                        span,
                    );
                }
            }
        }

        // Bound after the initializer, so `uint x = x;` reads the outer `x`.
        if self.block_scoped {
            for (slot, decl) in slots.into_iter().flatten() {
                self.scope.bind(decl.name, slot);
            }
        }
    }

    /// A storage pointer initialized from a state-rooted location aliases
    /// that state variable: later writes through it store into the root.
    fn lower_single_init(&mut self, slot: VarId, init: ExprId, span: Span) {
        let is_pointer = self
            .builder
            .var(slot)
            .kind
            .variable()
            .is_some_and(|v| self.program.variable(v).is_storage_pointer());

        let value = if is_pointer {
            match self.lower_place(init) {
                Some(place) => {
                    let root = self.root_of(place);
                    if matches!(self.builder.var(root).kind, VarKind::State(_)) {
                        self.builder.set_root(slot, root);
                    }
                    Operand::Var(Self::place_var(place))
                }
                None => self.lower_expr(init).op,
            }
        } else {
            self.lower_expr(init).op
        };
        self.emit(InstrKind::Assign { dst: slot, value }, span);
    }

    // Branches and loops

    fn lower_if(&mut self, cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId>, span: Span) {
        let c = self.lower_expr(cond);
        let then_label = self.builder.new_label();
        let end_label = self.builder.new_label();
        let else_label = match else_branch {
            Some(_) => self.builder.new_label(),
            None => end_label,
        };
        self.emit(
            InstrKind::Branch {
                cond: c.op,
                then_label,
                else_label,
            },
            span,
        );

        self.builder.place_label(then_label, span);
        self.lower_branch_body(then_branch);
        self.jump_unless_terminated(end_label, span);

        if let Some(else_branch) = else_branch {
            self.builder.place_label(else_label, span);
            self.lower_branch_body(else_branch);
            self.jump_unless_terminated(end_label, span);
        }
        self.builder.place_label(end_label, span);
    }

    /// A branch or loop body gets its own scope even when it is a single
    /// statement rather than a block.
    fn lower_branch_body(&mut self, body: StmtId) {
        self.enter_block();
        self.lower_stmt(body);
        self.exit_block();
    }

    fn lower_loop_body(&mut self, body: StmtId, targets: LoopTargets) {
        self.loops.push(targets);
        self.lower_branch_body(body);
        self.loops.pop();
    }

    fn lower_while(&mut self, cond: ExprId, body: StmtId, span: Span) {
        let head = self.builder.new_label();
        let body_label = self.builder.new_label();
        let exit = self.builder.new_label();

        self.builder.place_label(head, span);
        let c = self.lower_expr(cond);
        self.emit(
            InstrKind::Branch {
                cond: c.op,
                then_label: body_label,
                else_label: exit,
            },
            span,
        );
        self.builder.place_label(body_label, span);
        self.lower_loop_body(
            body,
            LoopTargets {
                break_label: exit,
                continue_label: head,
            },
        );
        self.jump_unless_terminated(head, span);
        self.builder.place_label(exit, span);
    }

    /// The body runs once before the condition; `continue` jumps to the
    /// condition. The back edge is an explicit jump.
    fn lower_do_while(&mut self, body: StmtId, cond: ExprId, span: Span) {
        let body_label = self.builder.new_label();
        let cond_label = self.builder.new_label();
        let again = self.builder.new_label();
        let exit = self.builder.new_label();

        self.builder.place_label(body_label, span);
        self.lower_loop_body(
            body,
            LoopTargets {
                break_label: exit,
                continue_label: cond_label,
            },
        );
        self.builder.place_label(cond_label, span);
        let c = self.lower_expr(cond);
        self.emit(
            InstrKind::Branch {
                cond: c.op,
                then_label: again,
                else_label: exit,
            },
            span,
        );
        self.builder.place_label(again, span);
        self.emit(InstrKind::Jump { target: body_label }, span);
        self.builder.place_label(exit, span);
    }

    fn lower_for(
        &mut self,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        update: Option<ExprId>,
        body: StmtId,
        span: Span,
    ) {
        self.enter_block();
        if let Some(init) = init {
            self.lower_stmt(init);
        }

        let head = self.builder.new_label();
        let body_label = self.builder.new_label();
        let update_label = self.builder.new_label();
        let exit = self.builder.new_label();

        self.builder.place_label(head, span);
        if let Some(cond) = cond {
            let c = self.lower_expr(cond);
            self.emit(
                InstrKind::Branch {
                    cond: c.op,
                    then_label: body_label,
                    else_label: exit,
                },
                span,
            );
        }
        self.builder.place_label(body_label, span);
        self.lower_loop_body(
            body,
            LoopTargets {
                break_label: exit,
                continue_label: update_label,
            },
        );
        self.builder.place_label(update_label, span);
        if let Some(update) = update {
            self.lower_expr(update);
        }
        self.emit(InstrKind::Jump { target: head }, span);
        self.builder.place_label(exit, span);
        self.exit_block();
    }

    // Exits

    /// Returned values are assigned to the return slots first, so named
    /// and positional returns look the same downstream.
    fn lower_return(&mut self, value: Option<ExprId>, span: Span) {
        let function = self.function;
        let slots: Vec<VarId> = function.returns.iter().map(|r| self.slot(*r)).collect();

        let values = match (value, slots.as_slice()) {
            (None, _) => slots.iter().map(|s| Operand::Var(*s)).collect(),
            (Some(expr), []) => vec![self.lower_expr(expr).op],
            (Some(expr), [slot]) => {
                let Value { op, .. } = self.lower_expr(expr);
                self.emit(InstrKind::Assign { dst: *slot, value: op }, span);
                vec![Operand::Var(*slot)]
            }
            (Some(expr), several) => {
                let parts = self.lower_tuple_parts(several.len(), expr, span);
                for (slot, part) in several.iter().zip(parts) {
                    if let Some(part) = part {
                        self.emit(
                            InstrKind::Assign {
                                dst: *slot,
                                value: part.op,
                            },
                            span,
                        );
                    }
                }
                several.iter().map(|s| Operand::Var(*s)).collect()
            }
        };
        self.emit(InstrKind::Return { values }, span);
    }
}
