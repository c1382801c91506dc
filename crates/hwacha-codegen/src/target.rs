// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Target descriptor and backend options.

use std::path::PathBuf;
use std::str::FromStr;

use cranelift_codegen::isa::{self, LookupError};
use target_lexicon::Triple;

use crate::{CodegenError, CodegenResult};

/// Triple, CPU, and feature string handed to the backend.
///
/// The kernel entry ABI is always soft-float on this target family: float
/// scalars are passed in integer registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// Target triple, or `"host"` for the machine running the compiler.
    pub triple: String,
    /// Cranelift has no CPU models. Must be `None`.
    pub cpu: Option<String>,
    /// Comma-separated ISA flags, `+name` / `-name` / `name`.
    pub features: String,
}

impl TargetDescriptor {
    pub const HWACHA_TRIPLE: &'static str = "riscv64gc-unknown-linux-gnu";
    pub const HWACHA_FEATURES: &'static str = "has_m,has_a,has_f,has_d,has_c,has_v";

    /// riscv64 with the vector extension.
    pub fn hwacha() -> Self {
        TargetDescriptor {
            triple: Self::HWACHA_TRIPLE.to_string(),
            cpu: None,
            features: Self::HWACHA_FEATURES.to_string(),
        }
    }

    /// The machine running the compiler, with its native ISA flags.
    pub fn host() -> Self {
        TargetDescriptor { triple: "host".to_string(), cpu: None, features: String::new() }
    }

    pub fn soft_float_abi(&self) -> bool {
        true
    }

    pub fn is_host(&self) -> bool {
        self.triple == "host"
    }

    pub fn parse_triple(&self) -> CodegenResult<Triple> {
        if self.is_host() {
            return Ok(Triple::host());
        }
        Triple::from_str(&self.triple).map_err(|e| {
            CodegenError::Backend(format!("invalid target triple '{}': {}", self.triple, e))
        })
    }

    /// Feature flags in order, as (`name`, `enabled`).
    pub fn feature_flags(&self) -> Vec<(String, bool)> {
        self.features
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| match f.as_bytes()[0] {
                b'+' => (f[1..].to_string(), true),
                b'-' => (f[1..].to_string(), false),
                _ => (f.to_string(), true),
            })
            .collect()
    }

    /// ISA builder for this triple, without flags applied.
    ///
    /// Support compiled out of Cranelift is a configuration problem; any
    /// other lookup failure is reported by the backend.
    pub fn isa_builder(&self) -> CodegenResult<isa::Builder> {
        if self.is_host() {
            return cranelift_native::builder().map_err(|msg| {
                CodegenError::Configuration(format!("host machine is not supported: {}", msg))
            });
        }
        let triple = self.parse_triple()?;
        isa::lookup(triple).map_err(|e| match e {
            LookupError::SupportDisabled => CodegenError::Configuration(format!(
                "support for '{}' is not compiled into this build",
                self.triple
            )),
            LookupError::Unsupported => {
                CodegenError::Backend(format!("unsupported target triple '{}'", self.triple))
            }
        })
    }
}

impl Default for TargetDescriptor {
    fn default() -> Self {
        Self::hwacha()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Assembly,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelocModel {
    #[default]
    Static,
    Pic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    Speed,
    /// Highest tier Cranelift offers.
    #[default]
    SpeedAndSize,
}

impl OptLevel {
    pub fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

/// Options for one compile of a kernel module.
///
/// The floating-point and vectorization flags have no Cranelift
/// counterpart; they are recorded in the assembly header only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    pub output: OutputKind,
    pub reloc: RelocModel,
    pub opt_level: OptLevel,
    pub fp_fusion_fast: bool,
    pub unsafe_fp_math: bool,
    pub no_infs: bool,
    pub no_nans: bool,
    pub loop_vectorize: bool,
    pub slp_vectorize: bool,
    /// Also write the emitted buffer here.
    pub debug_artifact: Option<PathBuf>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        BackendOptions {
            output: OutputKind::Assembly,
            reloc: RelocModel::Static,
            opt_level: OptLevel::SpeedAndSize,
            fp_fusion_fast: true,
            unsafe_fp_math: true,
            no_infs: true,
            no_nans: true,
            loop_vectorize: true,
            slp_vectorize: true,
            debug_artifact: None,
        }
    }
}

impl BackendOptions {
    /// Flags that are requested but not applied by Cranelift.
    pub fn advisory_flags(&self) -> Vec<&'static str> {
        [
            (self.fp_fusion_fast, "fp-fusion=fast"),
            (self.unsafe_fp_math, "unsafe-fp-math"),
            (self.no_infs, "no-infs-fp-math"),
            (self.no_nans, "no-nans-fp-math"),
            (self.loop_vectorize, "loop-vectorize"),
            (self.slp_vectorize, "slp-vectorize"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}
