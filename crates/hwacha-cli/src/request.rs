// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! JSON compile requests: the kernels of one module plus target settings.

use std::path::Path;

use hwacha_codegen::{BackendOptions, OptLevel, RelocModel, TargetDescriptor};
use hwacha_ir::{DeviceArgument, Stmt};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub module: String,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub options: OptionsConfig,
    pub kernels: Vec<KernelSpec>,
}

#[derive(Debug, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    pub args: Vec<DeviceArgument>,
    pub body: Stmt,
}

/// Overrides of the hwacha defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub triple: Option<String>,
    pub cpu: Option<String>,
    pub features: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsConfig {
    pub pic: bool,
    pub opt_level: OptLevelConfig,
    pub fast_math: bool,
    pub vectorize: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        OptionsConfig { pic: false, opt_level: OptLevelConfig::SpeedAndSize, fast_math: true, vectorize: true }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevelConfig {
    None,
    Speed,
    SpeedAndSize,
}

impl CompileRequest {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading {}: {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl TargetConfig {
    pub fn descriptor(&self) -> TargetDescriptor {
        let defaults = TargetDescriptor::hwacha();
        TargetDescriptor {
            triple: self.triple.clone().unwrap_or(defaults.triple),
            cpu: self.cpu.clone(),
            features: self.features.clone().unwrap_or(defaults.features),
        }
    }
}

impl OptionsConfig {
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            reloc: if self.pic { RelocModel::Pic } else { RelocModel::Static },
            opt_level: match self.opt_level {
                OptLevelConfig::None => OptLevel::None,
                OptLevelConfig::Speed => OptLevel::Speed,
                OptLevelConfig::SpeedAndSize => OptLevel::SpeedAndSize,
            },
            fp_fusion_fast: self.fast_math,
            unsafe_fp_math: self.fast_math,
            no_infs: self.fast_math,
            no_nans: self.fast_math,
            loop_vectorize: self.vectorize,
            slp_vectorize: self.vectorize,
            ..BackendOptions::default()
        }
    }
}
