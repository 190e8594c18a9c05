//! Ticket identifiers.
//!
//! caller が渡す label は一意である必要がないので、キュー内部では
//! submit 時に払い出す ULID ベースの `TicketId` でレコードを識別します。
//!
//! ## ULID を使う理由
//! - 生成順にソートできる（ログを並べたときに submit 順と一致する）
//! - 調整なしで生成できる（複数の queue インスタンスがあっても衝突しない）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one submitted task inside a queue.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(Ulid);

impl TicketId {
    /// Allocate a fresh ticket.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TicketId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}
