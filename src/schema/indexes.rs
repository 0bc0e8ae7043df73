//! Sorted indexes available per collection
//!
//! The trailing `_key` index every collection carries is appended by
//! `CollectionInfo`, not listed here.

/// Index field sets declared for `collection`; unknown collections have none.
pub fn declared_indexes(collection: &str) -> Vec<Vec<String>> {
    let sets: &[&[&str]] = match collection {
        "blocks" => &[
            &["seq_no", "gen_utime"],
            &["gen_utime"],
            &["workchain_id", "shard", "seq_no"],
            &["workchain_id", "seq_no"],
            &["workchain_id", "gen_utime"],
            &["master.min_shard_gen_utime"],
        ],
        "accounts" => &[&["last_trans_lt"], &["balance"]],
        "messages" => &[
            &["block_id"],
            &["value", "created_at"],
            &["src", "value", "created_at"],
            &["dst", "value", "created_at"],
            &["src", "created_at"],
            &["dst", "created_at"],
            &["created_lt"],
            &["created_at"],
        ],
        "transactions" => &[
            &["block_id"],
            &["in_msg"],
            &["out_msgs[*]"],
            &["account_addr", "now"],
            &["now"],
            &["lt"],
            &["account_addr", "orig_status", "end_status"],
        ],
        _ => &[],
    };
    sets.iter()
        .map(|set| set.iter().map(|f| f.to_string()).collect())
        .collect()
}
