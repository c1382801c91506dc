// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Device kernel emitter.
//!
//! Walks a kernel's statement tree through the handler table and builds one
//! Cranelift function per kernel, plus one per outlined block loop. The
//! function being built is a [`FunctionContext`] on the Rust call stack;
//! outlining builds the nested function in a fresh context while the
//! enclosing one waits untouched in its caller's frame.

use std::collections::HashMap;

use cranelift::prelude::*;
use cranelift_codegen::ir::{ExtFuncData, ExternalName, FuncRef, Function, Inst, UserExternalName, UserFuncName};
use cranelift_codegen::verifier::verify_function;
use hwacha_ir::{DeviceArgument, Expr, ScalarType, Stmt};
use tracing::{debug, trace, warn};

use crate::dispatch::HandlerTable;
use crate::lane::IntrinsicId;
use crate::module::{FuncIndex, KernelFunction, KernelModule, KernelRole, ParamAttrs, SymbolKind};
use crate::scope::SymbolScope;
use crate::target::{BackendOptions, TargetDescriptor};
use crate::types::{abi_value_type, int_type_of_width, scalar_to_cranelift_type};
use crate::{BackendInvoker, CodegenError, CodegenResult};

/// A value bound to an IR name, tagged with the function it lives in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding {
    pub owner: FuncIndex,
    pub value: Value,
}

/// Per-function emission state.
pub(crate) struct FunctionContext<'f> {
    pub index: FuncIndex,
    pub name: String,
    pub args: Vec<DeviceArgument>,
    pub builder: FunctionBuilder<'f>,
    /// Raw entry-block parameters, in signature order.
    pub params: Vec<Value>,
    func_refs: HashMap<FuncIndex, FuncRef>,
    callees: Vec<String>,
}

impl FunctionContext<'_> {
    /// Value bound to `name`. Names bound while emitting a different
    /// function are not visible here.
    pub fn lookup(&self, scope: &SymbolScope<Binding>, name: &str) -> CodegenResult<Value> {
        let binding = scope.get(name)?;
        if binding.owner != self.index {
            return Err(CodegenError::InvariantViolation(format!(
                "'{}' belongs to another function and cannot be used inside '{}'",
                name, self.name
            )));
        }
        Ok(binding.value)
    }

    pub fn bind(&self, name: &str, value: Value) -> (String, Binding) {
        (name.to_string(), Binding { owner: self.index, value })
    }

    pub fn buffer_arg(&self, name: &str) -> CodegenResult<&DeviceArgument> {
        self.args.iter().find(|a| a.is_buffer && a.name == name).ok_or_else(|| {
            CodegenError::InvariantViolation(format!(
                "'{}' is not a buffer argument of '{}'",
                name, self.name
            ))
        })
    }

    fn callee_ref(&mut self, module: &KernelModule, index: FuncIndex) -> CodegenResult<FuncRef> {
        if let Some(&fref) = self.func_refs.get(&index) {
            return Ok(fref);
        }
        let symbol = module.symbol(index)?;
        let signature = self.builder.import_signature(symbol.signature.clone());
        let name = self
            .builder
            .func
            .declare_imported_user_function(UserExternalName::new(0, index.0));
        let fref = self.builder.import_function(ExtFuncData {
            name: ExternalName::user(name),
            signature,
            colocated: symbol.kind == SymbolKind::Kernel,
        });
        self.func_refs.insert(index, fref);
        Ok(fref)
    }
}

pub struct DeviceKernelEmitter {
    target: TargetDescriptor,
    module: Option<KernelModule>,
    handlers: HandlerTable,
    scope: SymbolScope<Binding>,
    /// Names of the functions being emitted, innermost last.
    active: Vec<String>,
    verifier_flags: settings::Flags,
}

impl DeviceKernelEmitter {
    /// Emitter for `target`. Fails if Cranelift was built without it.
    pub fn new(target: TargetDescriptor) -> CodegenResult<Self> {
        target.isa_builder()?;
        let mut handlers = HandlerTable::generic();
        crate::device::install(&mut handlers);
        Ok(DeviceKernelEmitter {
            target,
            module: None,
            handlers,
            scope: SymbolScope::new(),
            active: Vec::new(),
            verifier_flags: settings::Flags::new(settings::builder()),
        })
    }

    /// Start a fresh module, discarding any previous one.
    pub fn init_module(&mut self, name: &str) -> CodegenResult<()> {
        debug!(module = name, triple = %self.target.triple, "initializing kernel module");
        self.module = Some(KernelModule::new(name, self.target.clone())?);
        self.active.clear();
        Ok(())
    }

    pub fn module(&self) -> CodegenResult<&KernelModule> {
        self.module.as_ref().ok_or_else(not_initialized)
    }

    pub(crate) fn module_mut(&mut self) -> CodegenResult<&mut KernelModule> {
        self.module.as_mut().ok_or_else(not_initialized)
    }

    #[cfg(test)]
    pub(crate) fn handlers_mut(&mut self) -> &mut HandlerTable {
        &mut self.handlers
    }

    #[cfg(test)]
    pub(crate) fn live_bindings(&self) -> usize {
        self.scope.len()
    }

    /// Lower `stmt` as kernel `name` taking `args` in order.
    ///
    /// On success the module holds the kernel and every unit outlined from
    /// it. On failure nothing this call added remains in the module.
    pub fn add_kernel(&mut self, stmt: &Stmt, name: &str, args: &[DeviceArgument]) -> CodegenResult<()> {
        debug!(kernel = name, args = args.len(), "adding kernel");
        let checkpoint = self.module()?.checkpoint();
        let mut scope = std::mem::take(&mut self.scope);
        let result = self.emit_function(&mut scope, name, args, KernelRole::Launcher, None, stmt);
        debug_assert!(scope.is_empty(), "bindings leaked from '{}'", name);
        self.scope = scope;
        if let Err(e) = &result {
            warn!(kernel = name, error = %e, "kernel rejected; rolling back");
            self.module_mut()?.rollback(checkpoint);
            self.active.clear();
        }
        result.map(|_| ())
    }

    /// Name of the innermost function being emitted, if any.
    pub fn get_current_kernel_name(&self) -> Option<&str> {
        self.active.last().map(String::as_str)
    }

    /// Compile the module for the configured target.
    pub fn compile_to_src(&mut self, options: &BackendOptions) -> CodegenResult<Vec<u8>> {
        let invoker = BackendInvoker::new(self.target.clone(), options.clone());
        let module = self.module_mut()?;
        let output = invoker.emit(module)?;
        trace!(ir = %module.dump(), "compiled module");
        Ok(output)
    }

    /// Textual IR of the current module.
    pub fn dump(&self) -> CodegenResult<String> {
        Ok(self.module()?.dump())
    }

    /// Name the host runtime uses for this device API.
    pub fn api_unique_name(&self) -> &'static str {
        "hwacha"
    }

    /// Kernel names are emitted as given.
    pub fn print_gpu_name(&self, name: &str) -> String {
        name.to_string()
    }

    /// Width in bits of the widest native vector element. The widest
    /// scalar type is a double.
    pub fn native_vector_bits(&self) -> u32 {
        64
    }

    /// Emit one complete function: declare, bind parameters, walk, verify,
    /// and register. Used for launcher kernels and outlined units alike.
    pub(crate) fn emit_function(
        &mut self,
        scope: &mut SymbolScope<Binding>,
        name: &str,
        args: &[DeviceArgument],
        role: KernelRole,
        lane: Option<(&str, IntrinsicId, ScalarType)>,
        body: &Stmt,
    ) -> CodegenResult<FuncIndex> {
        let module = self.module_mut()?;
        let signature = module.kernel_signature(args)?;
        let index = module.declare_kernel(name, signature.clone())?;
        if matches!(role, KernelRole::Outlined { .. }) {
            module.register_aux_entry_point(name);
        }

        let mut func = Function::with_name_signature(UserFuncName::user(0, index.0), signature);
        let mut fctx = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut func, &mut fctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);
        let params = builder.block_params(entry).to_vec();

        let mut cx = FunctionContext {
            index,
            name: name.to_string(),
            args: args.to_vec(),
            builder,
            params,
            func_refs: HashMap::new(),
            callees: Vec::new(),
        };

        self.active.push(name.to_string());
        let walked = self.emit_body(&mut cx, scope, lane, body);
        self.active.pop();
        walked?;

        cx.builder.ins().return_(&[]);
        cx.builder.seal_all_blocks();
        let FunctionContext { builder, callees, .. } = cx;
        builder.finalize();

        verify_function(&func, &self.verifier_flags).map_err(|errors| {
            CodegenError::InvariantViolation(format!("'{}' failed verification:\n{}", name, errors))
        })?;

        let mut function = KernelFunction {
            name: name.to_string(),
            index,
            role,
            params: args.iter().map(|a| ParamAttrs { no_alias: a.is_buffer }).collect(),
            args: args.to_vec(),
            no_inline: false,
            callees,
            ir: func,
        };
        function.no_inline = function.is_outlined();
        debug!(function = name, outlined = function.no_inline, callees = ?function.callees, "function complete");
        self.module_mut()?.define(function)?;
        Ok(index)
    }

    fn emit_body(
        &mut self,
        cx: &mut FunctionContext<'_>,
        scope: &mut SymbolScope<Binding>,
        lane: Option<(&str, IntrinsicId, ScalarType)>,
        body: &Stmt,
    ) -> CodegenResult<()> {
        let soft_float = self.target.soft_float_abi();
        let mut bindings = Vec::with_capacity(cx.args.len());
        for (i, arg) in cx.args.clone().iter().enumerate() {
            let raw = cx.params[i];
            let value = if soft_float && !arg.is_buffer && arg.ty.is_float() {
                let ty = scalar_to_cranelift_type(arg.ty)?;
                cx.builder.ins().bitcast(ty, MemFlags::new(), raw)
            } else {
                raw
            };
            bindings.push(cx.bind(&arg.name, value));
        }
        let mut scope = scope.bind(bindings);

        match lane {
            Some((var, intrinsic, ty)) => {
                let index = self.lane_index(cx, intrinsic, ty)?;
                let mut scope = scope.bind([cx.bind(var, index)]);
                self.emit_stmt(cx, &mut scope, body)
            }
            None => self.emit_stmt(cx, &mut scope, body),
        }
    }

    pub(crate) fn emit_stmt(
        &mut self,
        cx: &mut FunctionContext<'_>,
        scope: &mut SymbolScope<Binding>,
        stmt: &Stmt,
    ) -> CodegenResult<()> {
        let handler = self.handlers.stmt(stmt.kind()).ok_or_else(|| {
            CodegenError::UnsupportedConstruct(format!(
                "no lowering for {:?} statements in kernel '{}'",
                stmt.kind(),
                cx.name
            ))
        })?;
        handler(self, cx, scope, stmt)
    }

    pub(crate) fn emit_expr(
        &mut self,
        cx: &mut FunctionContext<'_>,
        scope: &mut SymbolScope<Binding>,
        expr: &Expr,
    ) -> CodegenResult<Value> {
        let handler = self.handlers.expr(expr.kind()).ok_or_else(|| {
            CodegenError::UnsupportedConstruct(format!(
                "no lowering for {:?} expressions in kernel '{}'",
                expr.kind(),
                cx.name
            ))
        })?;
        handler(self, cx, scope, expr)
    }

    /// Call `callee` and record the call edge.
    pub(crate) fn emit_call(
        &mut self,
        cx: &mut FunctionContext<'_>,
        callee: FuncIndex,
        args: &[Value],
    ) -> CodegenResult<Inst> {
        let module = self.module()?;
        let fref = cx.callee_ref(module, callee)?;
        let name = module.symbol(callee)?.name.clone();
        let inst = cx.builder.ins().call(fref, args);
        cx.callees.push(name);
        Ok(inst)
    }

    /// Declare (or reuse) an imported symbol and call it.
    ///
    /// Under the soft-float ABI, float arguments and results cross the call
    /// as same-width integers.
    pub(crate) fn call_import(
        &mut self,
        cx: &mut FunctionContext<'_>,
        name: &str,
        params: &[Type],
        ret: Option<Type>,
        args: &[Value],
    ) -> CodegenResult<Option<Value>> {
        let soft_float = self.target.soft_float_abi();
        let abi_params = params
            .iter()
            .map(|&ty| abi_value_type(ty, soft_float))
            .collect::<CodegenResult<Vec<_>>>()?;
        let abi_ret = ret.map(|ty| abi_value_type(ty, soft_float)).transpose()?;

        let module = self.module_mut()?;
        let signature = module.signature(&abi_params, abi_ret);
        let callee = module.declare_import(name, signature)?;

        let mut abi_args = Vec::with_capacity(args.len());
        for (&arg, &abi_ty) in args.iter().zip(&abi_params) {
            abi_args.push(if cx.builder.func.dfg.value_type(arg) == abi_ty {
                arg
            } else {
                cx.builder.ins().bitcast(abi_ty, MemFlags::new(), arg)
            });
        }
        let inst = self.emit_call(cx, callee, &abi_args)?;
        let result = cx.builder.inst_results(inst).first().copied();
        Ok(match (result, ret, abi_ret) {
            (Some(raw), Some(ty), Some(abi_ty)) if ty != abi_ty => {
                Some(cx.builder.ins().bitcast(ty, MemFlags::new(), raw))
            }
            _ => result,
        })
    }

    /// Current lane index as a value of `ty`.
    pub(crate) fn lane_index(
        &mut self,
        cx: &mut FunctionContext<'_>,
        intrinsic: IntrinsicId,
        ty: ScalarType,
    ) -> CodegenResult<Value> {
        if !ty.is_int() {
            return Err(CodegenError::InvariantViolation(format!(
                "lane loop index in '{}' must be an integer, found {}",
                cx.name, ty
            )));
        }
        let native = self.module()?.pointer_type();
        let raw = self
            .call_import(cx, intrinsic.symbol(), &[], Some(native), &[])?
            .ok_or_else(|| {
                CodegenError::InvariantViolation(format!("{} returned no value", intrinsic))
            })?;
        let want = int_type_of_width(u32::from(ty.bits()))?;
        Ok(if want.bits() < native.bits() {
            cx.builder.ins().ireduce(want, raw)
        } else if want.bits() > native.bits() {
            cx.builder.ins().uextend(want, raw)
        } else {
            raw
        })
    }
}

fn not_initialized() -> CodegenError {
    CodegenError::Configuration("no kernel module; call init_module first".to_string())
}
