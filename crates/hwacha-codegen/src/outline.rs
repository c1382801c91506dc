// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Outlining of block loops.
//!
//! The body of a `.__block_id_x` loop becomes its own function taking the
//! enclosing kernel's arguments. Inside it the loop variable is the block
//! lane index. The enclosing function only gets a call.

use hwacha_ir::{ScalarType, Stmt};
use tracing::debug;

use crate::emitter::{Binding, DeviceKernelEmitter, FunctionContext};
use crate::lane::IntrinsicId;
use crate::module::{FuncIndex, KernelRole};
use crate::scope::SymbolScope;
use crate::CodegenResult;

impl DeviceKernelEmitter {
    /// Emit `body` as `<enclosing>_stripmine_<n>` and return its index.
    ///
    /// Runs the full function emission sequence with a fresh context; the
    /// caller's context is not touched, and `scope` is left exactly as it
    /// was found whether or not emission succeeds.
    pub(crate) fn outline(
        &mut self,
        scope: &mut SymbolScope<Binding>,
        enclosing: &FunctionContext<'_>,
        loop_var: &str,
        index_ty: ScalarType,
        body: &Stmt,
    ) -> CodegenResult<FuncIndex> {
        let name = self.module_mut()?.next_outlined_name(&enclosing.name);
        debug!(parent = %enclosing.name, outlined = %name, var = loop_var, "outlining block loop");
        self.emit_function(
            scope,
            &name,
            &enclosing.args,
            KernelRole::Outlined { parent: enclosing.name.clone() },
            Some((loop_var, IntrinsicId::BlockIdX, index_ty)),
            body,
        )
    }
}
