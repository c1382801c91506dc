// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! The kernel module: every function emitted for one pipeline, plus the
//! symbols they reference.
//!
//! Symbols are numbered in declaration order. A function body refers to a
//! callee by that number (`UserExternalName { namespace: 0, index }`), and
//! the backend declares symbols in the same order, so the number doubles as
//! the object-module `FuncId`.

use std::fmt::Write as _;

use cranelift::prelude::*;
use cranelift_codegen::ir::Function;
use cranelift_codegen::isa::CallConv;
use hwacha_ir::DeviceArgument;

use crate::target::TargetDescriptor;
use crate::types::param_abi_type;
use crate::{CodegenError, CodegenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Defined in this module.
    Kernel,
    /// Lane intrinsic or extern; resolved at link time.
    Import,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelRole {
    /// Registered by `add_kernel`; called by the host runtime.
    Launcher,
    /// Body of a block loop, called by `parent`.
    Outlined { parent: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamAttrs {
    /// Buffers never alias each other within a kernel.
    pub no_alias: bool,
}

/// A finished, verified function.
#[derive(Debug, Clone)]
pub struct KernelFunction {
    pub name: String,
    pub index: FuncIndex,
    pub role: KernelRole,
    pub args: Vec<DeviceArgument>,
    pub params: Vec<ParamAttrs>,
    pub no_inline: bool,
    /// Symbols called from the body, in emission order.
    pub callees: Vec<String>,
    pub ir: Function,
}

impl KernelFunction {
    pub fn is_outlined(&self) -> bool {
        matches!(self.role, KernelRole::Outlined { .. })
    }
}

/// Pointer size and byte order, recorded once a backend is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pub pointer_bits: u8,
    pub big_endian: bool,
}

/// One slot of the launch argument array the host fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSlot {
    pub name: String,
    pub size_bytes: u32,
    pub is_buffer: bool,
}

/// Marker for [`KernelModule::rollback`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    symbols: usize,
    aux_entry_points: usize,
    outlined: u32,
}

#[derive(Debug)]
pub struct KernelModule {
    name: String,
    target: TargetDescriptor,
    call_conv: CallConv,
    pointer_type: Type,
    symbols: Vec<Symbol>,
    /// Sorted by index.
    functions: Vec<KernelFunction>,
    aux_entry_points: Vec<String>,
    data_layout: Option<DataLayout>,
    outlined: u32,
}

impl KernelModule {
    pub fn new(name: impl Into<String>, target: TargetDescriptor) -> CodegenResult<Self> {
        let triple = target.parse_triple()?;
        let pointer_type = match triple.pointer_width() {
            Ok(width) => Type::int(u16::from(width.bits())).ok_or_else(|| {
                CodegenError::Configuration(format!("unusable pointer width {}", width.bits()))
            })?,
            Err(()) => {
                return Err(CodegenError::Configuration(format!(
                    "target '{}' has no known pointer width",
                    target.triple
                )))
            }
        };
        Ok(KernelModule {
            name: name.into(),
            call_conv: CallConv::triple_default(&triple),
            target,
            pointer_type,
            symbols: Vec::new(),
            functions: Vec::new(),
            aux_entry_points: Vec::new(),
            data_layout: None,
            outlined: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.target
    }

    pub fn pointer_type(&self) -> Type {
        self.pointer_type
    }

    pub fn call_conv(&self) -> CallConv {
        self.call_conv
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, index: FuncIndex) -> CodegenResult<&Symbol> {
        self.symbols.get(index.0 as usize).ok_or_else(|| {
            CodegenError::InvariantViolation(format!("no symbol #{}", index.0))
        })
    }

    pub fn functions(&self) -> &[KernelFunction] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&KernelFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn aux_entry_points(&self) -> &[String] {
        &self.aux_entry_points
    }

    pub fn data_layout(&self) -> Option<DataLayout> {
        self.data_layout
    }

    /// Signature of a kernel entry point taking `args`.
    pub fn kernel_signature(&self, args: &[DeviceArgument]) -> CodegenResult<Signature> {
        let mut sig = Signature::new(self.call_conv);
        for arg in args {
            let ty = param_abi_type(arg, self.pointer_type, self.target.soft_float_abi())?;
            sig.params.push(AbiParam::new(ty));
        }
        Ok(sig)
    }

    pub fn signature(&self, params: &[Type], ret: Option<Type>) -> Signature {
        let mut sig = Signature::new(self.call_conv);
        sig.params.extend(params.iter().map(|&ty| AbiParam::new(ty)));
        sig.returns.extend(ret.map(AbiParam::new));
        sig
    }

    /// Reserve a symbol for a function defined in this module.
    pub(crate) fn declare_kernel(&mut self, name: &str, signature: Signature) -> CodegenResult<FuncIndex> {
        if let Some(existing) = self.symbols.iter().find(|s| s.name == name) {
            return Err(CodegenError::Configuration(format!(
                "symbol '{}' is already declared as {}",
                name,
                match existing.kind {
                    SymbolKind::Kernel => "a kernel",
                    SymbolKind::Import => "an import",
                }
            )));
        }
        Ok(self.push_symbol(name, SymbolKind::Kernel, signature))
    }

    /// Declare an external symbol, or reuse an identical earlier declaration.
    pub(crate) fn declare_import(&mut self, name: &str, signature: Signature) -> CodegenResult<FuncIndex> {
        if let Some((i, existing)) = self.symbols.iter().enumerate().find(|(_, s)| s.name == name) {
            if existing.kind == SymbolKind::Import && existing.signature == signature {
                return Ok(FuncIndex(i as u32));
            }
            return Err(CodegenError::Configuration(format!(
                "import '{}' conflicts with an earlier declaration",
                name
            )));
        }
        Ok(self.push_symbol(name, SymbolKind::Import, signature))
    }

    fn push_symbol(&mut self, name: &str, kind: SymbolKind, signature: Signature) -> FuncIndex {
        let index = FuncIndex(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.to_string(), kind, signature });
        index
    }

    pub(crate) fn define(&mut self, function: KernelFunction) -> CodegenResult<()> {
        let symbol = self.symbol(function.index)?;
        if symbol.kind != SymbolKind::Kernel || symbol.name != function.name {
            return Err(CodegenError::InvariantViolation(format!(
                "function '{}' does not match symbol #{}",
                function.name, function.index.0
            )));
        }
        let at = self.functions.partition_point(|f| f.index < function.index);
        self.functions.insert(at, function);
        Ok(())
    }

    /// Record an outlined unit so tooling can find it as an entry point.
    pub(crate) fn register_aux_entry_point(&mut self, name: &str) {
        self.aux_entry_points.push(name.to_string());
    }

    /// `<enclosing>_stripmine_<n>`, with `n` unique across the module.
    pub(crate) fn next_outlined_name(&mut self, enclosing: &str) -> String {
        let name = format!("{}_stripmine_{}", enclosing, self.outlined);
        self.outlined += 1;
        name
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            symbols: self.symbols.len(),
            aux_entry_points: self.aux_entry_points.len(),
            outlined: self.outlined,
        }
    }

    /// Discard every symbol, function, and entry point added since `cp`.
    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.symbols.truncate(cp.symbols);
        self.functions.retain(|f| (f.index.0 as usize) < cp.symbols);
        self.aux_entry_points.truncate(cp.aux_entry_points);
        self.outlined = cp.outlined;
    }

    pub(crate) fn set_data_layout(&mut self, layout: DataLayout) -> CodegenResult<()> {
        if u32::from(layout.pointer_bits) != self.pointer_type.bits() {
            return Err(CodegenError::Backend(format!(
                "backend pointers are {} bits but kernels were emitted with {}",
                layout.pointer_bits,
                self.pointer_type.bits()
            )));
        }
        self.data_layout = Some(layout);
        Ok(())
    }

    /// Launch argument layout of kernel `name`, in parameter order.
    ///
    /// Buffers occupy a pointer-sized slot; scalars their own size.
    pub fn launch_layout(&self, name: &str) -> Option<Vec<ArgSlot>> {
        let function = self.function(name)?;
        let pointer_bytes = self.pointer_type.bytes();
        Some(
            function
                .args
                .iter()
                .map(|arg| ArgSlot {
                    name: arg.name.clone(),
                    size_bytes: if arg.is_buffer { pointer_bytes } else { arg.ty.bytes() },
                    is_buffer: arg.is_buffer,
                })
                .collect(),
        )
    }

    /// Textual IR of every function, in symbol order.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; module {} ({})", self.name, self.target.triple);
        for symbol in self.symbols.iter().filter(|s| s.kind == SymbolKind::Import) {
            let _ = writeln!(out, "; import {} {}", symbol.name, symbol.signature);
        }
        for function in &self.functions {
            out.push('\n');
            match &function.role {
                KernelRole::Launcher => {
                    let _ = writeln!(out, "; kernel {}", function.name);
                }
                KernelRole::Outlined { parent } => {
                    let _ = writeln!(out, "; kernel {} (outlined from {}, noinline)", function.name, parent);
                }
            }
            let _ = write!(out, "{}", function.ir.display());
        }
        out
    }
}
