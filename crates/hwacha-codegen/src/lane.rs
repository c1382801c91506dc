// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Lane variables: loop names that map onto hardware lane indices.
//!
//! A loop variable whose name ends in one of eight reserved suffixes
//! (`.__thread_id_{x,y,z,w}`, `.__block_id_{x,y,z,w}`) runs across lanes
//! instead of iterating. Hwacha exposes only the x dimension.

use std::fmt;

use crate::{CodegenError, CodegenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Thread,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneDim {
    X,
    Y,
    Z,
    W,
}

/// A recognized lane suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneVar {
    pub kind: LaneKind,
    pub dim: LaneDim,
}

/// Device intrinsic producing the current lane index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicId {
    BlockIdX,
    ThreadIdX,
}

impl IntrinsicId {
    /// Name of the imported symbol. Each returns a pointer-width integer.
    pub fn symbol(self) -> &'static str {
        match self {
            IntrinsicId::BlockIdX => "__hwacha_block_id_x",
            IntrinsicId::ThreadIdX => "__hwacha_thread_id_x",
        }
    }
}

impl fmt::Display for IntrinsicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

const LANE_SUFFIXES: [(&str, LaneVar); 8] = [
    (".__thread_id_x", LaneVar { kind: LaneKind::Thread, dim: LaneDim::X }),
    (".__thread_id_y", LaneVar { kind: LaneKind::Thread, dim: LaneDim::Y }),
    (".__thread_id_z", LaneVar { kind: LaneKind::Thread, dim: LaneDim::Z }),
    (".__thread_id_w", LaneVar { kind: LaneKind::Thread, dim: LaneDim::W }),
    (".__block_id_x", LaneVar { kind: LaneKind::Block, dim: LaneDim::X }),
    (".__block_id_y", LaneVar { kind: LaneKind::Block, dim: LaneDim::Y }),
    (".__block_id_z", LaneVar { kind: LaneKind::Block, dim: LaneDim::Z }),
    (".__block_id_w", LaneVar { kind: LaneKind::Block, dim: LaneDim::W }),
];

/// Which lane suffix `name` ends with, if any.
pub fn classify(name: &str) -> Option<LaneVar> {
    LANE_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, lane)| *lane)
}

/// Map a lane variable name to the intrinsic that yields its index.
///
/// Only x lanes exist on this target; y/z/w are unsupported. A name with
/// no lane suffix means the caller dispatched a non-lane loop here.
pub fn resolve(name: &str) -> CodegenResult<IntrinsicId> {
    match classify(name) {
        Some(LaneVar { kind: LaneKind::Block, dim: LaneDim::X }) => Ok(IntrinsicId::BlockIdX),
        Some(LaneVar { kind: LaneKind::Thread, dim: LaneDim::X }) => Ok(IntrinsicId::ThreadIdX),
        Some(lane) => Err(CodegenError::UnsupportedConstruct(format!(
            "lane variable '{}' uses the {:?} dimension; only x lanes exist on hwacha",
            name, lane.dim
        ))),
        None => Err(CodegenError::InvariantViolation(format!(
            "'{}' is not a lane variable",
            name
        ))),
    }
}
