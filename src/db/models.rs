use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of monitored target, stored in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    Ip,
    Url,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Ip => "IP",
            TargetKind::Url => "URL",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known state of one monitored target.
/// Corresponds to the `status` table.
#[derive(Debug, Clone, FromRow)]
pub struct StatusRecord {
    pub id: i64,
    pub kind: String,
    pub address: String,
    pub down: bool,
}
