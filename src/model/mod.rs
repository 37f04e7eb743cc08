//! Types that represent the core data model, such as `Transaction`, `ShardKey`
//! and `CategoryIndex`.

mod amount;
mod category;
mod shard;
mod transaction;

pub use amount::Amount;
pub use category::CategoryIndex;
pub use shard::{category_path, parse_date, MonthShard, ShardKey};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionPatch};

pub(crate) use transaction::{generate_id, id_shard_hint};
