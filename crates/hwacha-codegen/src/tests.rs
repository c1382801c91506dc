// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Codegen tests: kernels lower to verified Cranelift IR with lane loops
//! mapped onto intrinsics, and the backend turns them into riscv64 output.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use cranelift::prelude::*;
    use cranelift_codegen::ir::{Function, Inst, Opcode};
    use hwacha_ir::{CallKind, DeviceArgument, Expr, ForKind, ScalarType, Stmt, StmtKind};
    use object::{Object, ObjectSymbol};
    use pretty_assertions::assert_eq;

    use crate::{
        ArgSlot, BackendOptions, CodegenError, DeviceKernelEmitter, KernelRole, OutputKind,
        ParamAttrs, TargetDescriptor,
    };

    const BLOCK_X: &str = "f.s0.x.__block_id_x";
    const THREAD_X: &str = "f.s0.x.__thread_id_x";

    // ── IR construction helpers ────────────────────────────────

    fn saxpy_args() -> Vec<DeviceArgument> {
        vec![
            DeviceArgument::scalar("a", ScalarType::F32),
            DeviceArgument::buffer("x", ScalarType::F32),
            DeviceArgument::buffer("y", ScalarType::F32),
        ]
    }

    /// y[i] = a * x[i] + y[i], i = block * 64 + thread
    fn saxpy_update() -> Stmt {
        let i = Expr::var("i", ScalarType::I32);
        let a = Expr::var("a", ScalarType::F32);
        let update = Stmt::store(
            "y",
            Expr::add(
                Expr::mul(a, Expr::load("x", i.clone(), ScalarType::F32)),
                Expr::load("y", i.clone(), ScalarType::F32),
            ),
            i,
        );
        let index = Expr::add(
            Expr::mul(Expr::var(BLOCK_X, ScalarType::I32), Expr::int(64)),
            Expr::var(THREAD_X, ScalarType::I32),
        );
        Stmt::let_stmt("i", index, update)
    }

    fn block_loop(name: &str, min: Expr, body: Stmt) -> Stmt {
        Stmt::for_loop(name, min, Expr::int(16), ForKind::GpuBlock, body)
    }

    fn thread_loop(body: Stmt) -> Stmt {
        Stmt::for_loop(THREAD_X, Expr::int(0), Expr::int(64), ForKind::GpuThread, body)
    }

    fn saxpy() -> Stmt {
        block_loop(BLOCK_X, Expr::int(0), thread_loop(saxpy_update()))
    }

    fn emitter() -> DeviceKernelEmitter {
        let mut em = DeviceKernelEmitter::new(TargetDescriptor::hwacha()).unwrap();
        em.init_module("pipeline").unwrap();
        em
    }

    fn insts(func: &Function) -> Vec<Inst> {
        func.layout.blocks().flat_map(|b| func.layout.block_insts(b)).collect()
    }

    fn count_opcode(func: &Function, opcode: Opcode) -> usize {
        insts(func).into_iter().filter(|&i| func.dfg.insts[i].opcode() == opcode).count()
    }

    // ═══════════════════════════════════════════════════════════
    // Lane loops and outlining
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn saxpy_emits_launcher_and_outlined_unit() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();

        let module = em.module().unwrap();
        let names: Vec<&str> = module.functions().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["saxpy", "saxpy_stripmine_0"]);
        assert_eq!(module.aux_entry_points(), &["saxpy_stripmine_0".to_string()]);

        let launcher = module.function("saxpy").unwrap();
        assert_eq!(launcher.role, KernelRole::Launcher);
        assert!(!launcher.no_inline);
        assert_eq!(launcher.callees, vec!["saxpy_stripmine_0".to_string()]);

        let outlined = module.function("saxpy_stripmine_0").unwrap();
        assert_eq!(outlined.role, KernelRole::Outlined { parent: "saxpy".to_string() });
        assert!(outlined.no_inline);
        assert_eq!(
            outlined.callees,
            vec!["__hwacha_block_id_x".to_string(), "__hwacha_thread_id_x".to_string()]
        );
        assert_eq!(outlined.ir.signature, launcher.ir.signature);
    }

    #[test]
    fn launcher_forwards_its_parameters_in_order() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let func = &em.module().unwrap().function("saxpy").unwrap().ir;

        let calls: Vec<Inst> = insts(func)
            .into_iter()
            .filter(|&i| func.dfg.insts[i].opcode() == Opcode::Call)
            .collect();
        assert_eq!(calls.len(), 1);

        let entry = func.layout.entry_block().unwrap();
        assert_eq!(func.dfg.inst_args(calls[0]), func.dfg.block_params(entry));
        // The launcher itself never reads a lane index.
        assert_eq!(em.module().unwrap().function("saxpy").unwrap().callees.len(), 1);
    }

    #[test]
    fn thread_loop_alone_stays_inline() {
        let mut em = emitter();
        let body = thread_loop(Stmt::store(
            "y",
            Expr::load("x", Expr::var(THREAD_X, ScalarType::I32), ScalarType::F32),
            Expr::var(THREAD_X, ScalarType::I32),
        ));
        em.add_kernel(&body, "copy", &saxpy_args()).unwrap();

        let module = em.module().unwrap();
        assert_eq!(module.functions().len(), 1);
        assert!(module.aux_entry_points().is_empty());
        let copy = module.function("copy").unwrap();
        assert_eq!(copy.callees, vec!["__hwacha_thread_id_x".to_string()]);
        // Lane index is pointer-width and narrowed to the loop type.
        assert_eq!(count_opcode(&copy.ir, Opcode::Ireduce), 1);
    }

    #[test]
    fn outlined_names_count_across_the_module() {
        let mut em = emitter();
        let two_loops = Stmt::block(vec![saxpy(), saxpy()]);
        em.add_kernel(&two_loops, "k", &saxpy_args()).unwrap();
        em.add_kernel(&saxpy(), "j", &saxpy_args()).unwrap();
        assert_eq!(
            em.module().unwrap().aux_entry_points(),
            &["k_stripmine_0".to_string(), "k_stripmine_1".to_string(), "j_stripmine_2".to_string()]
        );
    }

    #[test]
    fn nested_block_loops_outline_twice() {
        let mut em = emitter();
        let inner = block_loop("g.s0.x.__block_id_x", Expr::int(0), thread_loop(saxpy_update()));
        let outer = block_loop("h.s0.x.__block_id_x", Expr::int(0), inner);
        // saxpy_update reads BLOCK_X, which these loops do not bind.
        let result = em.add_kernel(&outer, "nested", &saxpy_args());
        assert!(matches!(result, Err(CodegenError::InvariantViolation(_))));

        let inner = block_loop(BLOCK_X, Expr::int(0), thread_loop(saxpy_update()));
        let outer = block_loop("h.s0.x.__block_id_x", Expr::int(0), inner);
        em.add_kernel(&outer, "nested", &saxpy_args()).unwrap();
        let module = em.module().unwrap();
        assert_eq!(module.function("nested").unwrap().callees, vec!["nested_stripmine_0".to_string()]);
        let middle = module.function("nested_stripmine_0").unwrap();
        assert_eq!(
            middle.callees,
            vec!["__hwacha_block_id_x".to_string(), "nested_stripmine_0_stripmine_1".to_string()]
        );
        assert_eq!(
            module.function("nested_stripmine_0_stripmine_1").unwrap().role,
            KernelRole::Outlined { parent: "nested_stripmine_0".to_string() }
        );
    }

    // ═══════════════════════════════════════════════════════════
    // Rejected kernels
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn nonzero_lane_minimum_is_rejected() {
        let mut em = emitter();
        let bad = block_loop(BLOCK_X, Expr::int(1), thread_loop(saxpy_update()));
        let err = em.add_kernel(&bad, "bad", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::InvariantViolation(_)), "{}", err);
        let module = em.module().unwrap();
        assert!(module.functions().is_empty());
        assert!(module.symbols().is_empty());

        // A non-literal zero does not count either.
        let bad = block_loop(BLOCK_X, Expr::add(Expr::int(0), Expr::int(0)), thread_loop(saxpy_update()));
        assert!(matches!(
            em.add_kernel(&bad, "bad", &saxpy_args()),
            Err(CodegenError::InvariantViolation(_))
        ));
    }

    #[test]
    fn failure_inside_outlined_body_rolls_back_everything() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let symbols_before = em.module().unwrap().symbols().len();

        let alloc = Stmt::Allocate {
            name: "tmp".to_string(),
            ty: ScalarType::F32,
            extents: vec![Expr::int(4)],
            body: Box::new(Stmt::Evaluate { value: Expr::int(0) }),
        };
        let bad = block_loop(BLOCK_X, Expr::int(0), alloc);
        let err = em.add_kernel(&bad, "bad", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedConstruct(_)), "{}", err);

        let module = em.module().unwrap();
        assert_eq!(module.functions().len(), 2);
        assert_eq!(module.symbols().len(), symbols_before);
        assert_eq!(module.aux_entry_points(), &["saxpy_stripmine_0".to_string()]);
        assert_eq!(em.get_current_kernel_name(), None);
        assert_eq!(em.live_bindings(), 0);

        // The outlined-name counter was rolled back too.
        em.add_kernel(&saxpy(), "next", &saxpy_args()).unwrap();
        assert!(em.module().unwrap().function("next_stripmine_1").is_some());
    }

    #[test]
    fn only_x_lanes_are_supported() {
        for name in ["f.s0.y.__block_id_y", "f.s0.z.__thread_id_z", "f.s0.w.__block_id_w"] {
            let mut em = emitter();
            let kernel = block_loop(name, Expr::int(0), Stmt::Evaluate { value: Expr::int(0) });
            let err = em.add_kernel(&kernel, "k", &saxpy_args()).unwrap_err();
            assert!(matches!(err, CodegenError::UnsupportedConstruct(_)), "{}: {}", name, err);
            assert!(em.module().unwrap().functions().is_empty());
        }
    }

    #[test]
    fn device_code_cannot_allocate_free_or_assert() {
        let cases = vec![
            Stmt::Allocate {
                name: "tmp".to_string(),
                ty: ScalarType::I32,
                extents: vec![Expr::int(8)],
                body: Box::new(Stmt::Evaluate { value: Expr::int(0) }),
            },
            Stmt::Free { name: "tmp".to_string() },
            Stmt::Assert {
                condition: Expr::cmp(hwacha_ir::CmpOp::Lt, Expr::int(0), Expr::int(1)),
                message: "never".to_string(),
            },
        ];
        for stmt in cases {
            let mut em = emitter();
            let err = em.add_kernel(&stmt, "k", &saxpy_args()).unwrap_err();
            match err {
                CodegenError::UnsupportedConstruct(msg) => assert!(msg.contains("'k'"), "{}", msg),
                other => panic!("expected unsupported construct, got {}", other),
            }
        }
    }

    #[test]
    fn outlined_body_cannot_see_launcher_locals() {
        let mut em = emitter();
        let body = Stmt::store("y", Expr::var("t", ScalarType::F32), Expr::var(BLOCK_X, ScalarType::I32));
        let kernel = Stmt::let_stmt("t", Expr::f32(2.0), block_loop(BLOCK_X, Expr::int(0), body));
        let err = em.add_kernel(&kernel, "k", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::InvariantViolation(_)), "{}", err);
        assert_eq!(em.live_bindings(), 0);
    }

    #[test]
    fn duplicate_kernel_name_is_a_configuration_error() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let err = em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::Configuration(_)));
        assert_eq!(em.module().unwrap().functions().len(), 2);
    }

    #[test]
    fn add_kernel_requires_a_module() {
        let mut em = DeviceKernelEmitter::new(TargetDescriptor::hwacha()).unwrap();
        let err = em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::Configuration(_)));
    }

    #[test]
    fn unknown_intrinsic_is_unsupported() {
        let mut em = emitter();
        let call = Expr::call("sin", vec![Expr::f32(1.0)], ScalarType::F32, CallKind::PureIntrinsic);
        let err = em.add_kernel(&Stmt::Evaluate { value: call }, "k", &saxpy_args()).unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedConstruct(_)));
    }

    // ═══════════════════════════════════════════════════════════
    // Parameters and ABI
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn only_buffers_are_no_alias() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        for f in em.module().unwrap().functions() {
            assert_eq!(
                f.params,
                vec![
                    ParamAttrs { no_alias: false },
                    ParamAttrs { no_alias: true },
                    ParamAttrs { no_alias: true },
                ]
            );
        }
    }

    #[test]
    fn float_scalars_arrive_in_integer_registers() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let module = em.module().unwrap();
        let launcher = &module.function("saxpy").unwrap().ir;
        let params: Vec<Type> = launcher.signature.params.iter().map(|p| p.value_type).collect();
        assert_eq!(params, vec![types::I32, types::I64, types::I64]);
        // Each function reinterprets `a` once on entry.
        let outlined = &module.function("saxpy_stripmine_0").unwrap().ir;
        assert_eq!(count_opcode(launcher, Opcode::Bitcast), 1);
        assert_eq!(count_opcode(outlined, Opcode::Bitcast), 1);
    }

    #[test]
    fn launch_layout_follows_argument_order() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let layout = em.module().unwrap().launch_layout("saxpy").unwrap();
        assert_eq!(
            layout,
            vec![
                ArgSlot { name: "a".to_string(), size_bytes: 4, is_buffer: false },
                ArgSlot { name: "x".to_string(), size_bytes: 8, is_buffer: true },
                ArgSlot { name: "y".to_string(), size_bytes: 8, is_buffer: true },
            ]
        );
        assert!(em.module().unwrap().launch_layout("missing").is_none());
    }

    // ═══════════════════════════════════════════════════════════
    // Emission context
    // ═══════════════════════════════════════════════════════════

    thread_local! {
        static SEEN: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record_kernel_name(
        em: &mut DeviceKernelEmitter,
        _cx: &mut crate::emitter::FunctionContext<'_>,
        _scope: &mut crate::scope::SymbolScope<crate::emitter::Binding>,
        _stmt: &Stmt,
    ) -> crate::CodegenResult<()> {
        let name = em.get_current_kernel_name().unwrap_or("<none>").to_string();
        SEEN.with(|seen| seen.borrow_mut().push(name));
        Ok(())
    }

    #[test]
    fn current_kernel_name_follows_outlining() {
        let mut em = emitter();
        em.handlers_mut().set_stmt(StmtKind::Evaluate, record_kernel_name);
        let probe = || Stmt::Evaluate { value: Expr::int(0) };
        let kernel = Stmt::block(vec![
            probe(),
            block_loop(BLOCK_X, Expr::int(0), probe()),
            probe(),
        ]);

        assert_eq!(em.get_current_kernel_name(), None);
        em.add_kernel(&kernel, "k", &saxpy_args()).unwrap();
        assert_eq!(em.get_current_kernel_name(), None);

        let seen = SEEN.with(|seen| seen.borrow().clone());
        assert_eq!(seen, vec!["k", "k_stripmine_0", "k"]);
        assert_eq!(em.live_bindings(), 0);
    }

    #[test]
    fn naming_hooks() {
        let em = emitter();
        assert_eq!(em.api_unique_name(), "hwacha");
        assert_eq!(em.print_gpu_name("saxpy"), "saxpy");
        assert_eq!(em.native_vector_bits(), 64);
    }

    // ═══════════════════════════════════════════════════════════
    // Generic lowering
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn serial_loops_and_branches_lower_generically() {
        use hwacha_ir::{BinOp, CmpOp};

        let j = Expr::var("j", ScalarType::I32);
        let x_j = Expr::load("x", j.clone(), ScalarType::F32);
        let clamped = Expr::select(
            Expr::cmp(CmpOp::Gt, x_j.clone(), Expr::f32(0.0)),
            x_j.clone(),
            Expr::binary(BinOp::Sub, Expr::f32(0.0), x_j),
        );
        let body = Stmt::IfThenElse {
            cond: Expr::cmp(CmpOp::Lt, j.clone(), Expr::int(8)),
            then_case: Box::new(Stmt::store("y", clamped, j.clone())),
            else_case: Some(Box::new(Stmt::store(
                "y",
                Expr::call("sqrt", vec![Expr::var("a", ScalarType::F32)], ScalarType::F32, CallKind::PureIntrinsic),
                j,
            ))),
        };
        let kernel = Stmt::for_loop("j", Expr::int(0), Expr::int(32), ForKind::Serial, body);

        let mut em = emitter();
        em.add_kernel(&kernel, "abs_or_sqrt", &saxpy_args()).unwrap();
        let f = em.module().unwrap().function("abs_or_sqrt").unwrap();
        assert!(f.callees.is_empty());
        assert_eq!(count_opcode(&f.ir, Opcode::Sqrt), 1);
        assert_eq!(count_opcode(&f.ir, Opcode::Store), 2);
    }

    #[test]
    fn extern_calls_are_imported_once() {
        let call = || Expr::call("expf", vec![Expr::var("a", ScalarType::F32)], ScalarType::F32, CallKind::Extern);
        let kernel = Stmt::block(vec![
            Stmt::store("y", call(), Expr::int(0)),
            Stmt::store("y", call(), Expr::int(1)),
        ]);
        let mut em = emitter();
        em.add_kernel(&kernel, "k", &saxpy_args()).unwrap();
        let module = em.module().unwrap();
        assert_eq!(module.symbols().iter().filter(|s| s.name == "expf").count(), 1);
        assert_eq!(module.function("k").unwrap().callees, vec!["expf".to_string(), "expf".to_string()]);
    }

    #[test]
    fn extern_float_calls_use_integer_registers() {
        let a = Expr::var("a", ScalarType::F32);
        let kernel = Stmt::if_then(
            Expr::cmp(hwacha_ir::CmpOp::Gt, a.clone(), Expr::f32(0.0)),
            Stmt::store("y", Expr::call("expf", vec![a], ScalarType::F32, CallKind::Extern), Expr::int(0)),
        );
        let mut em = emitter();
        em.add_kernel(&kernel, "k", &saxpy_args()).unwrap();
        let module = em.module().unwrap();

        let expf = module.symbols().iter().find(|s| s.name == "expf").unwrap();
        let params: Vec<Type> = expf.signature.params.iter().map(|p| p.value_type).collect();
        let returns: Vec<Type> = expf.signature.returns.iter().map(|p| p.value_type).collect();
        assert_eq!(params, vec![types::I32]);
        assert_eq!(returns, vec![types::I32]);

        // a on entry, the argument to expf, and its result.
        let f = &module.function("k").unwrap().ir;
        assert_eq!(count_opcode(f, Opcode::Bitcast), 3);
    }

    #[test]
    fn dump_lists_every_function() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let text = em.dump().unwrap();
        assert!(text.starts_with("; module pipeline (riscv64gc-unknown-linux-gnu)"));
        assert!(text.contains("; import __hwacha_block_id_x"));
        assert!(text.contains("; kernel saxpy\n"));
        assert!(text.contains("; kernel saxpy_stripmine_0 (outlined from saxpy, noinline)"));
        assert!(text.contains("function u0:0("));
    }

    // ═══════════════════════════════════════════════════════════
    // Backend
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn compile_to_assembly() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let asm = String::from_utf8(em.compile_to_src(&BackendOptions::default()).unwrap()).unwrap();

        assert!(asm.contains("\t.globl\tsaxpy\n"));
        assert!(asm.contains("\t.globl\tsaxpy_stripmine_0\n"));
        assert!(asm.contains("# hwacha.kernel outlined from saxpy noinline"));
        assert!(asm.contains("# arg x: *f32 noalias"));
        assert!(asm.contains("# abi: soft-float"));
        assert!(asm.contains("\t.section\t.hwacha.entry_points"));
        assert!(asm.contains("\t.asciz\t\"saxpy_stripmine_0\""));

        let layout = em.module().unwrap().data_layout().unwrap();
        assert_eq!(layout.pointer_bits, 64);
        assert!(!layout.big_endian);
    }

    #[test]
    fn assembly_calls_symbols_by_name() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let asm = String::from_utf8(em.compile_to_src(&BackendOptions::default()).unwrap()).unwrap();

        assert!(asm.contains("\tcall saxpy_stripmine_0"), "{}", asm);
        assert!(asm.contains(",__hwacha_block_id_x"), "{}", asm);
        assert!(asm.contains(",__hwacha_thread_id_x"), "{}", asm);
        assert!(!asm.contains("userextname"), "{}", asm);
        assert!(!asm.contains("load_sym") && !asm.contains("callind"), "{}", asm);

        assert!(asm.contains("\n.Lsaxpy_block0:\n"), "{}", asm);
        assert!(asm.contains("\n.Lsaxpy_stripmine_0_block0:\n"), "{}", asm);
        for line in asm.lines() {
            assert!(!line.starts_with("block") && !line.trim_start().starts_with("unwind"), "{}", line);
        }
    }

    #[test]
    fn compile_to_object() {
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let options = BackendOptions { output: OutputKind::Object, ..Default::default() };
        let bytes = em.compile_to_src(&options).unwrap();

        let file = object::File::parse(&*bytes).unwrap();
        assert_eq!(file.architecture(), object::Architecture::Riscv64);
        let defined: Vec<String> = file
            .symbols()
            .filter(|s| s.is_definition())
            .filter_map(|s| s.name().ok().map(str::to_string))
            .collect();
        assert!(defined.contains(&"saxpy".to_string()));
        assert!(defined.contains(&"saxpy_stripmine_0".to_string()));
        assert!(file
            .symbols()
            .any(|s| s.is_undefined() && s.name().map_or(false, |n| n == "__hwacha_block_id_x")));
    }

    #[test]
    fn debug_artifact_mirrors_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.s");
        let mut em = emitter();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let options = BackendOptions { debug_artifact: Some(path.clone()), ..Default::default() };
        let out = em.compile_to_src(&options).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), out);
    }

    #[test]
    fn unknown_feature_is_a_backend_error() {
        let target = TargetDescriptor { features: "+has_warp_drive".to_string(), ..TargetDescriptor::hwacha() };
        let mut em = DeviceKernelEmitter::new(target).unwrap();
        em.init_module("m").unwrap();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let err = em.compile_to_src(&BackendOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::Backend(_)), "{}", err);
    }

    #[test]
    fn cpu_names_are_rejected() {
        let target = TargetDescriptor { cpu: Some("rocket".to_string()), ..TargetDescriptor::hwacha() };
        let mut em = DeviceKernelEmitter::new(target).unwrap();
        em.init_module("m").unwrap();
        let err = em.compile_to_src(&BackendOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::Backend(_)));
    }

    #[test]
    fn host_target_compiles() {
        let mut em = DeviceKernelEmitter::new(TargetDescriptor::host()).unwrap();
        em.init_module("native").unwrap();
        em.add_kernel(&saxpy(), "saxpy", &saxpy_args()).unwrap();
        let options = BackendOptions { output: OutputKind::Object, ..Default::default() };
        let bytes = em.compile_to_src(&options).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn target_without_a_backend_is_rejected() {
        let target = TargetDescriptor { triple: "mips-unknown-linux-gnu".to_string(), ..TargetDescriptor::hwacha() };
        assert!(matches!(DeviceKernelEmitter::new(target), Err(CodegenError::Backend(_))));
    }
}
