use openraft::BasicNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;

use crate::models::{Command, CommandResponse};

/// Node ID type
pub type NodeId = u64;

/// OpenRaft type configuration for Quarry
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[derive(Serialize, Deserialize)]
pub struct TypeConfig;

impl fmt::Display for TypeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeConfig")
    }
}

impl openraft::RaftTypeConfig for TypeConfig {
    type D = Command;
    type R = CommandResponse;
    type Node = BasicNode;
    type NodeId = NodeId;
    type Entry = openraft::Entry<TypeConfig>;
    type SnapshotData = Cursor<Vec<u8>>;
    type AsyncRuntime = openraft::TokioRuntime;
    type Responder = openraft::impls::OneshotResponder<TypeConfig>;
}

/// Log ID as used throughout this crate
pub type QuarryLogId = openraft::LogId<NodeId>;
