// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Backend invocation: configure a Cranelift ISA for the target, compile
//! every function of a kernel module, and produce assembly text or an
//! object file.

use std::fmt::Write as _;
use std::sync::Arc;

use cranelift_codegen::ir::Endianness;
use cranelift_codegen::isa::TargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_module::{default_libcall_names, FuncId, Linkage, Module};
use cranelift_object::{ObjectBuilder, ObjectModule};
use tracing::{debug, info};

use crate::module::{DataLayout, FuncIndex, KernelModule, KernelRole, SymbolKind};
use crate::target::{BackendOptions, OutputKind, RelocModel, TargetDescriptor};
use crate::{CodegenError, CodegenResult};

/// Compiled code of one function, kept for the assembly listing.
struct Listing {
    name: String,
    role: KernelRole,
    size: u32,
    vcode: String,
    /// Symbol name of each external function the body references, by
    /// reference number.
    externs: Vec<String>,
}

pub struct BackendInvoker {
    target: TargetDescriptor,
    options: BackendOptions,
}

impl BackendInvoker {
    pub fn new(target: TargetDescriptor, options: BackendOptions) -> Self {
        BackendInvoker { target, options }
    }

    /// Configure the ISA: optimization tier, relocation model, verifier,
    /// then the target feature flags in order.
    pub fn build_isa(&self) -> CodegenResult<Arc<dyn TargetIsa>> {
        if let Some(cpu) = &self.target.cpu {
            return Err(CodegenError::Backend(format!(
                "cpu '{}' requested, but cranelift selects instructions by feature flags only",
                cpu
            )));
        }

        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", self.options.opt_level.as_setting())
            .map_err(|e| CodegenError::Backend(format!("opt_level: {}", e)))?;
        let pic = if self.options.reloc == RelocModel::Pic { "true" } else { "false" };
        flag_builder
            .set("is_pic", pic)
            .map_err(|e| CodegenError::Backend(format!("is_pic: {}", e)))?;
        flag_builder
            .enable("enable_verifier")
            .map_err(|e| CodegenError::Backend(format!("enable_verifier: {}", e)))?;

        let mut isa_builder = self.target.isa_builder()?;
        for (name, enabled) in self.target.feature_flags() {
            let applied = if enabled {
                isa_builder.enable(&name)
            } else {
                isa_builder.set(&name, "false")
            };
            applied.map_err(|e| {
                CodegenError::Backend(format!("target feature '{}': {}", name, e))
            })?;
        }

        let advisory = self.options.advisory_flags();
        if !advisory.is_empty() {
            debug!(flags = ?advisory, "floating-point and vectorization flags are not applied by cranelift");
        }

        isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| CodegenError::Backend(e.to_string()))
    }

    /// Compile `module` and return the requested output. The module records
    /// the backend's data layout.
    pub fn emit(&self, module: &mut KernelModule) -> CodegenResult<Vec<u8>> {
        let isa = self.build_isa()?;
        module.set_data_layout(DataLayout {
            pointer_bits: isa.pointer_bits(),
            big_endian: isa.endianness() == Endianness::Big,
        })?;
        info!(
            module = module.name(),
            triple = %isa.triple(),
            functions = module.functions().len(),
            "compiling kernel module"
        );

        let builder = ObjectBuilder::new(isa.clone(), module.name(), default_libcall_names())
            .map_err(|e| CodegenError::Backend(e.to_string()))?;
        let mut object = ObjectModule::new(builder);
        let ids = declare_symbols(&mut object, module)?;

        // Function stage.
        let mut listings = Vec::with_capacity(module.functions().len());
        for function in module.functions() {
            let id = ids[function.index.0 as usize];
            let mut ctx = Context::for_function(function.ir.clone());
            ctx.set_disasm(true);
            ctx.verify(isa.as_ref()).map_err(|errors| {
                CodegenError::Backend(format!("'{}' failed verification:\n{}", function.name, errors))
            })?;
            object.define_function(id, &mut ctx).map_err(|e| {
                CodegenError::Backend(format!("compiling '{}': {}", function.name, e))
            })?;
            let externs = function
                .ir
                .params
                .user_named_funcs()
                .values()
                .map(|name| module.symbol(FuncIndex(name.index)).map(|s| s.name.clone()))
                .collect::<CodegenResult<Vec<_>>>()?;
            let compiled = ctx.compiled_code();
            listings.push(Listing {
                name: function.name.clone(),
                role: function.role.clone(),
                size: compiled.map(|c| c.code_info().total_size).unwrap_or(0),
                vcode: compiled.and_then(|c| c.vcode.clone()).unwrap_or_default(),
                externs,
            });
            debug!(function = %function.name, "compiled");
        }

        // Module stage.
        let product = object.finish();
        let bytes = product
            .emit()
            .map_err(|e| CodegenError::Backend(format!("writing object: {}", e)))?;

        let output = match self.options.output {
            OutputKind::Object => bytes,
            OutputKind::Assembly => self.render_assembly(module, &listings).into_bytes(),
        };

        if let Some(path) = &self.options.debug_artifact {
            std::fs::write(path, &output).map_err(|e| {
                CodegenError::Backend(format!("writing {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), "wrote debug artifact");
        }
        Ok(output)
    }

    fn render_assembly(&self, module: &KernelModule, listings: &[Listing]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\t.file\t\"{}\"", module.name());
        let _ = writeln!(
            out,
            "\t.option\t{}",
            if self.options.reloc == RelocModel::Pic { "pic" } else { "nopic" }
        );
        let _ = writeln!(out, "# target: {}", self.target.triple);
        let _ = writeln!(out, "# features: {}", self.target.features);
        let _ = writeln!(
            out,
            "# abi: {}",
            if self.target.soft_float_abi() { "soft-float" } else { "hard-float" }
        );
        let _ = writeln!(out, "# opt_level: {}", self.options.opt_level.as_setting());
        for flag in self.options.advisory_flags() {
            let _ = writeln!(out, "# requested: {}", flag);
        }
        for symbol in module.symbols().iter().filter(|s| s.kind == SymbolKind::Import) {
            let _ = writeln!(out, "# import: {}", symbol.name);
        }

        let _ = writeln!(out, "\t.text");
        for listing in listings {
            let function = module.function(&listing.name);
            let _ = writeln!(out);
            let _ = writeln!(out, "\t.globl\t{}", listing.name);
            let _ = writeln!(out, "\t.type\t{},@function", listing.name);
            match &listing.role {
                KernelRole::Launcher => {
                    let _ = writeln!(out, "# hwacha.kernel launcher");
                }
                KernelRole::Outlined { parent } => {
                    let _ = writeln!(out, "# hwacha.kernel outlined from {} noinline", parent);
                }
            }
            if let Some(function) = function {
                for (arg, attrs) in function.args.iter().zip(&function.params) {
                    let _ = writeln!(
                        out,
                        "# arg {}{}",
                        arg,
                        if attrs.no_alias { " noalias" } else { "" }
                    );
                }
            }
            let _ = writeln!(out, "{}:", listing.name);
            for line in assembler_lines(listing) {
                let _ = writeln!(out, "{}", line);
            }
            let _ = writeln!(out, "\t.size\t{}, {}", listing.name, listing.size);
        }

        if !module.aux_entry_points().is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "\t.section\t.hwacha.entry_points,\"\",@progbits");
            for name in module.aux_entry_points() {
                let _ = writeln!(out, "\t.asciz\t\"{}\"", name);
            }
        }
        out
    }
}

/// Declare every symbol in index order so `FuncId` equals the index the
/// function bodies reference.
fn declare_symbols(object: &mut ObjectModule, module: &KernelModule) -> CodegenResult<Vec<FuncId>> {
    let mut ids = Vec::with_capacity(module.symbols().len());
    for (i, symbol) in module.symbols().iter().enumerate() {
        let linkage = match symbol.kind {
            SymbolKind::Kernel => Linkage::Export,
            SymbolKind::Import => Linkage::Import,
        };
        let id = object
            .declare_function(&symbol.name, linkage, &symbol.signature)
            .map_err(|e| CodegenError::Backend(format!("declaring '{}': {}", symbol.name, e)))?;
        if id.as_u32() as usize != i {
            return Err(CodegenError::Backend(format!(
                "symbol '{}' was numbered {} by the object module, expected {}",
                symbol.name,
                id.as_u32(),
                i
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Rewrite Cranelift's VCode listing of one function into assembler input.
///
/// External name references become symbol names, block labels become
/// `.L<function>_block<n>`, branch and symbol pseudo-instructions become
/// their RISC-V forms, and unwind directives are kept as comments.
fn assembler_lines(listing: &Listing) -> Vec<String> {
    let mut lines = Vec::new();
    for line in listing.vcode.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("unwind ") {
            lines.push(format!("\t# {}", line));
            continue;
        }
        if let Some((n, len)) = numbered(line, "block") {
            if &line[len..] == ":" {
                lines.push(format!("{}:", block_label(&listing.name, n)));
                continue;
            }
        }
        let line = resolve_names(line, &listing.name, &listing.externs);
        if let Some(operands) = line.strip_prefix("load_sym ") {
            let operands = operands.strip_suffix("+0").unwrap_or(operands);
            lines.push(format!("\tla {}", operands));
        } else if let Some(reg) = line.strip_prefix("callind ") {
            lines.push(format!("\tjalr {}", reg));
        } else if let Some((cond, taken, not_taken)) = split_cond_branch(&line) {
            lines.push(format!("\t{},{}", cond, taken));
            lines.push(format!("\tj {}", not_taken));
        } else {
            lines.push(format!("\t{}", line));
        }
    }
    lines
}

fn block_label(function: &str, block: usize) -> String {
    format!(".L{}_block{}", function, block)
}

/// `prefix` followed by a decimal number at the start of `s`, as
/// (number, matched length).
fn numbered(s: &str, prefix: &str) -> Option<(usize, usize)> {
    let digits = s.strip_prefix(prefix)?;
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    let n = digits[..len].parse().ok()?;
    Some((n, prefix.len() + len))
}

/// Replace `userextname<n>` with the referenced symbol and `label<n>` with
/// the function-local block label.
fn resolve_names(line: &str, function: &str, externs: &[String]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut word_start = true;
    while let Some(c) = rest.chars().next() {
        if word_start {
            if let Some((n, len)) = numbered(rest, "userextname") {
                if let Some(name) = externs.get(n) {
                    out.push_str(name);
                    rest = &rest[len..];
                    continue;
                }
            }
            if let Some((n, len)) = numbered(rest, "label") {
                out.push_str(&block_label(function, n));
                rest = &rest[len..];
                continue;
            }
        }
        word_start = !(c.is_ascii_alphanumeric() || c == '_' || c == '.');
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Split `op a,b,taken(L1),not_taken(L2)` into (`op a,b`, `L1`, `L2`).
fn split_cond_branch(line: &str) -> Option<(&str, &str, &str)> {
    let (cond, targets) = line.split_once(",taken(")?;
    let (taken, rest) = targets.split_once("),not_taken(")?;
    let not_taken = rest.strip_suffix(')')?;
    Some((cond, taken, not_taken))
}
