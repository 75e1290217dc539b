//! Name resolution for locals during lowering.
//!
//! [`LocalScope`] is a stack of frames. Under block scoping a declaration
//! binds in the innermost frame when its statement is reached, and the
//! binding disappears with the block. Under function scoping every local is
//! bound in the outermost frame before the body is walked, so a use that
//! precedes its declaration still resolves.

use rustc_hash::FxHashMap;
use slir_ir::Name;

use crate::ir::VarId;

pub struct LocalScope {
    frames: Vec<FxHashMap<Name, VarId>>,
}

impl LocalScope {
    /// A scope with one (function-level) frame.
    pub fn new() -> Self {
        Self {
            frames: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(FxHashMap::default());
    }

    /// Drop the innermost frame. The function-level frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind in the innermost frame, shadowing outer bindings.
    pub fn bind(&mut self, name: Name, var: VarId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, var);
        }
    }

    pub fn lookup(&self, name: Name) -> Option<VarId> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(&name).copied())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for LocalScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn inner_bindings_shadow_and_expire() {
        let x = Name::from_raw(7);
        let mut scope = LocalScope::new();
        scope.bind(x, VarId::new(0));
        scope.push();
        scope.bind(x, VarId::new(1));
        assert_eq!(scope.lookup(x), Some(VarId::new(1)));
        scope.pop();
        assert_eq!(scope.lookup(x), Some(VarId::new(0)));
    }

    #[test]
    fn function_frame_survives_extra_pops() {
        let mut scope = LocalScope::new();
        scope.pop();
        scope.pop();
        assert_eq!(scope.depth(), 1);
        scope.bind(Name::from_raw(3), VarId::new(2));
        assert_eq!(scope.lookup(Name::from_raw(3)), Some(VarId::new(2)));
    }
}
