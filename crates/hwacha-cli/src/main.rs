// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Hwacha CLI - compile device kernels described as JSON.

mod output;
mod request;

use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use hwacha_codegen::{CodegenError, DeviceKernelEmitter, OutputKind};

use crate::request::CompileRequest;

fn main() {
    output::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "compile" | "dump" | "layout" => {
            let flags = match Flags::parse(&args[2..]) {
                Ok(flags) => flags,
                Err(msg) => {
                    eprintln!("{}: {}", output::error_label(), msg);
                    eprintln!("Usage: hwacha {} <request.json> [options]", args[1]);
                    process::exit(1);
                }
            };
            let verbose = flags.verbose.then_some("hwacha_codegen=debug");
            hwacha_codegen::init_tracing(verbose);
            match args[1].as_str() {
                "compile" => cmd_compile(&flags),
                "dump" => cmd_dump(&flags),
                _ => cmd_layout(&flags),
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("hwacha {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("{} {} - Hwacha device kernel compiler", output::title("hwacha"), env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: hwacha <command> <request.json> [options]");
    println!();
    println!("{}", output::section_header("Commands:"));
    println!("  {}   Compile every kernel to assembly or an object file", output::command("compile"));
    println!("  {}      Print the Cranelift IR of every emitted function", output::command("dump"));
    println!("  {}    Print the launch argument layout of each kernel", output::command("layout"));
    println!("  {}      Show this help", output::command("help"));
    println!("  {}   Show version", output::command("version"));
    println!();
    println!("{}", output::section_header("Options:"));
    println!("  -o <path>               Write output to <path> instead of stdout");
    println!("  --emit asm|obj          Output kind (default: asm)");
    println!("  --triple <triple>       Target triple, or 'host'");
    println!("  --features <list>       Comma-separated ISA flags, e.g. +has_v,-has_c");
    println!("  --pic                   Position-independent code");
    println!("  --debug-artifact <path> Also write the emitted buffer to <path>");
    println!("  --verbose               Log lowering steps to stderr");
}

#[derive(Debug, Default)]
struct Flags {
    input: PathBuf,
    output: Option<PathBuf>,
    emit: Option<OutputKind>,
    triple: Option<String>,
    features: Option<String>,
    pic: bool,
    debug_artifact: Option<PathBuf>,
    verbose: bool,
}

impl Flags {
    fn parse(args: &[String]) -> Result<Flags, String> {
        let mut flags = Flags::default();
        let mut input = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next().cloned().ok_or_else(|| format!("{} needs a value", name))
            };
            match arg.as_str() {
                "-o" => flags.output = Some(PathBuf::from(value("-o")?)),
                "--emit" => {
                    flags.emit = Some(match value("--emit")?.as_str() {
                        "asm" => OutputKind::Assembly,
                        "obj" => OutputKind::Object,
                        other => return Err(format!("unknown output kind '{}'", other)),
                    })
                }
                "--triple" => flags.triple = Some(value("--triple")?),
                "--features" => flags.features = Some(value("--features")?),
                "--debug-artifact" => flags.debug_artifact = Some(PathBuf::from(value("--debug-artifact")?)),
                "--pic" => flags.pic = true,
                "--verbose" | "-v" => flags.verbose = true,
                other if other.starts_with('-') => return Err(format!("unknown option '{}'", other)),
                other if input.is_none() => input = Some(PathBuf::from(other)),
                other => return Err(format!("unexpected argument '{}'", other)),
            }
        }
        flags.input = input.ok_or_else(|| "missing request file".to_string())?;
        Ok(flags)
    }
}

fn load(flags: &Flags) -> CompileRequest {
    match CompileRequest::load(&flags.input) {
        Ok(req) => req,
        Err(msg) => {
            eprintln!("{}: {}", output::error_label(), msg);
            process::exit(1);
        }
    }
}

/// Lower every kernel of `req` into a fresh module.
fn emit_kernels(req: &CompileRequest, flags: &Flags) -> Result<DeviceKernelEmitter, CodegenError> {
    let mut target = req.target.descriptor();
    if let Some(triple) = &flags.triple {
        target.triple = triple.clone();
    }
    if let Some(features) = &flags.features {
        target.features = features.clone();
    }
    let mut emitter = DeviceKernelEmitter::new(target)?;
    emitter.init_module(&req.module)?;
    for kernel in &req.kernels {
        emitter
            .add_kernel(&kernel.body, &kernel.name, &kernel.args)
            .map_err(|e| with_kernel(e, &kernel.name))?;
    }
    Ok(emitter)
}

fn with_kernel(e: CodegenError, kernel: &str) -> CodegenError {
    match e {
        CodegenError::Configuration(m) => CodegenError::Configuration(format!("{} (while adding '{}')", m, kernel)),
        other => other,
    }
}

fn fail(phase: &str, e: CodegenError) -> ! {
    eprintln!("{}: {}", output::error_label(), e);
    eprintln!("{}", output::banner_fail(phase));
    process::exit(1);
}

fn cmd_compile(flags: &Flags) {
    let req = load(flags);
    let mut emitter = emit_kernels(&req, flags).unwrap_or_else(|e| fail("Lowering", e));

    let mut options = req.options.backend_options();
    if let Some(emit) = flags.emit {
        options.output = emit;
    }
    if flags.pic {
        options.reloc = hwacha_codegen::RelocModel::Pic;
    }
    options.debug_artifact = flags.debug_artifact.clone();

    let bytes = emitter.compile_to_src(&options).unwrap_or_else(|e| fail("Backend", e));

    match &flags.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &bytes) {
                eprintln!("{}: writing {}: {}", output::error_label(), path.display(), e);
                process::exit(1);
            }
            eprintln!(
                "{} {} kernel(s) -> {}",
                output::banner_ok("Compile"),
                req.kernels.len(),
                output::file_path(&path.display().to_string())
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&bytes).and_then(|_| stdout.flush()) {
                eprintln!("{}: writing output: {}", output::error_label(), e);
                process::exit(1);
            }
        }
    }
}

fn cmd_dump(flags: &Flags) {
    let req = load(flags);
    let emitter = emit_kernels(&req, flags).unwrap_or_else(|e| fail("Lowering", e));
    match emitter.dump() {
        Ok(text) => print!("{}", text),
        Err(e) => fail("Dump", e),
    }
}

fn cmd_layout(flags: &Flags) {
    let req = load(flags);
    let emitter = emit_kernels(&req, flags).unwrap_or_else(|e| fail("Lowering", e));
    let module = emitter.module().unwrap_or_else(|e| fail("Layout", e));
    for kernel in &req.kernels {
        println!("{}", output::kernel_name(&emitter.print_gpu_name(&kernel.name)));
        for slot in module.launch_layout(&kernel.name).unwrap_or_default() {
            println!(
                "  {:<12} {:>2} bytes{}",
                slot.name,
                slot.size_bytes,
                if slot.is_buffer { "  buffer" } else { "" }
            );
        }
    }
    let aux = module.aux_entry_points();
    if !aux.is_empty() {
        println!("{} {}", output::section_header("entry points:"), aux.join(", "));
    }
}
