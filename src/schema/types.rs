//! Blockchain document types
//!
//! Integer widths map to filter types as follows:
//! - u8..u32, i8..i32: plain numbers
//! - u64: big-uint with a 1-digit length prefix
//! - u128 and wider (grams): big-uint with a 2-digit length prefix
//!
//! Join fields reference a join-free "base" variant of the target type so the
//! type graph stays acyclic.

use std::sync::Arc;

use crate::filter::{Condition, U1024_PREFIX, U64_PREFIX};

pub const ACCOUNT_TYPE: &[(&str, i64)] = &[("uninit", 0), ("active", 1), ("frozen", 2)];

pub const ACCOUNT_STATUS: &[(&str, i64)] = &[
    ("uninit", 0),
    ("active", 1),
    ("frozen", 2),
    ("nonExist", 3),
];

pub const ACCOUNT_STATUS_CHANGE: &[(&str, i64)] =
    &[("unchanged", 0), ("frozen", 1), ("deleted", 2)];

pub const SKIP_REASON: &[(&str, i64)] = &[("noState", 0), ("badState", 1), ("noGas", 2)];

pub const MESSAGE_TYPE: &[(&str, i64)] = &[("internal", 0), ("extIn", 1), ("extOut", 2)];

pub const MESSAGE_PROCESSING_STATUS: &[(&str, i64)] = &[
    ("unknown", 0),
    ("queued", 1),
    ("processing", 2),
    ("preliminary", 3),
    ("proposed", 4),
    ("finalized", 5),
    ("refused", 6),
    ("transiting", 7),
];

pub const TRANSACTION_TYPE: &[(&str, i64)] = &[
    ("ordinary", 0),
    ("storage", 1),
    ("tick", 2),
    ("tock", 3),
    ("splitPrepare", 4),
    ("splitInstall", 5),
    ("mergePrepare", 6),
    ("mergeInstall", 7),
];

pub const TRANSACTION_PROCESSING_STATUS: &[(&str, i64)] = &[
    ("unknown", 0),
    ("preliminary", 1),
    ("proposed", 2),
    ("finalized", 3),
    ("refused", 4),
];

pub const COMPUTE_TYPE: &[(&str, i64)] = &[("skipped", 0), ("vm", 1)];

pub const BOUNCE_TYPE: &[(&str, i64)] = &[("negFunds", 0), ("noFunds", 1), ("ok", 2)];

pub const BLOCK_PROCESSING_STATUS: &[(&str, i64)] = &[
    ("unknown", 0),
    ("proposed", 1),
    ("finalized", 2),
    ("refused", 3),
];

fn u64() -> Condition {
    Condition::BigUInt(U64_PREFIX)
}

fn grams() -> Condition {
    Condition::BigUInt(U1024_PREFIX)
}

/// `name` + `name_name` field pair for an enum stored as a number
fn with_enum(
    fields: &mut Vec<(&'static str, Condition)>,
    name: &'static str,
    name_field: &'static str,
    values: &[(&str, i64)],
) {
    fields.push((name, Condition::number()));
    fields.push((name_field, Condition::enum_name(name, values)));
}

fn other_currency_collection() -> Condition {
    Condition::array(Condition::structure([
        ("currency", Condition::number()),
        ("value", grams()),
    ]))
}

/// `accounts` documents
pub fn account() -> Condition {
    let mut fields = vec![("id", Condition::string())];
    with_enum(&mut fields, "acc_type", "acc_type_name", ACCOUNT_TYPE);
    fields.extend([
        ("last_paid", Condition::number()),
        ("due_payment", grams()),
        ("last_trans_lt", u64()),
        ("balance", grams()),
        ("balance_other", other_currency_collection()),
        ("split_depth", Condition::number()),
        ("tick", Condition::boolean()),
        ("tock", Condition::boolean()),
        ("code", Condition::string()),
        ("data", Condition::string()),
        ("library", Condition::string()),
        ("proof", Condition::string()),
        ("boc", Condition::string()),
    ]);
    Condition::collection(fields)
}

fn message_fields() -> Vec<(&'static str, Condition)> {
    let mut fields = vec![("id", Condition::string())];
    with_enum(&mut fields, "msg_type", "msg_type_name", MESSAGE_TYPE);
    with_enum(&mut fields, "status", "status_name", MESSAGE_PROCESSING_STATUS);
    fields.extend([
        ("transaction_id", Condition::string()),
        ("block_id", Condition::string()),
        ("body", Condition::string()),
        ("split_depth", Condition::number()),
        ("tick", Condition::boolean()),
        ("tock", Condition::boolean()),
        ("code", Condition::string()),
        ("data", Condition::string()),
        ("library", Condition::string()),
        ("src", Condition::string()),
        ("dst", Condition::string()),
        ("created_lt", u64()),
        ("created_at", Condition::number()),
        ("ihr_disabled", Condition::boolean()),
        ("ihr_fee", grams()),
        ("fwd_fee", grams()),
        ("import_fee", grams()),
        ("bounce", Condition::boolean()),
        ("bounced", Condition::boolean()),
        ("value", grams()),
        ("value_other", other_currency_collection()),
        ("proof", Condition::string()),
        ("boc", Condition::string()),
    ]);
    fields
}

/// `messages` documents without joins
pub fn message_base() -> Condition {
    Condition::collection(message_fields())
}

/// `messages` documents; `block` joins through `block_id`
pub fn message() -> Condition {
    let mut fields = message_fields();
    fields.push((
        "block",
        Condition::join("block_id", "blocks", Arc::new(block_base())),
    ));
    Condition::collection(fields)
}

fn transaction_fields() -> Vec<(&'static str, Condition)> {
    let mut fields = vec![("id", Condition::string())];
    with_enum(&mut fields, "tr_type", "tr_type_name", TRANSACTION_TYPE);
    with_enum(&mut fields, "status", "status_name", TRANSACTION_PROCESSING_STATUS);
    with_enum(&mut fields, "orig_status", "orig_status_name", ACCOUNT_STATUS);
    with_enum(&mut fields, "end_status", "end_status_name", ACCOUNT_STATUS);

    let mut storage = vec![
        ("storage_fees_collected", grams()),
        ("storage_fees_due", grams()),
    ];
    with_enum(&mut storage, "status_change", "status_change_name", ACCOUNT_STATUS_CHANGE);

    let mut compute = Vec::new();
    with_enum(&mut compute, "compute_type", "compute_type_name", COMPUTE_TYPE);
    with_enum(&mut compute, "skipped_reason", "skipped_reason_name", SKIP_REASON);
    compute.extend([
        ("success", Condition::boolean()),
        ("msg_state_used", Condition::boolean()),
        ("account_activated", Condition::boolean()),
        ("gas_fees", grams()),
        ("gas_used", u64()),
        ("gas_limit", u64()),
        ("gas_credit", Condition::number()),
        ("mode", Condition::number()),
        ("exit_code", Condition::number()),
        ("exit_arg", Condition::number()),
        ("vm_steps", Condition::number()),
        ("vm_init_state_hash", Condition::string()),
        ("vm_final_state_hash", Condition::string()),
    ]);

    let mut action = vec![
        ("success", Condition::boolean()),
        ("valid", Condition::boolean()),
        ("no_funds", Condition::boolean()),
        ("total_fwd_fees", grams()),
        ("total_action_fees", grams()),
        ("result_code", Condition::number()),
        ("tot_actions", Condition::number()),
        ("msgs_created", Condition::number()),
    ];
    with_enum(&mut action, "status_change", "status_change_name", ACCOUNT_STATUS_CHANGE);

    let mut bounce = Vec::new();
    with_enum(&mut bounce, "bounce_type", "bounce_type_name", BOUNCE_TYPE);
    bounce.extend([
        ("msg_size_cells", Condition::number()),
        ("msg_size_bits", Condition::number()),
        ("req_fwd_fees", grams()),
        ("msg_fees", grams()),
        ("fwd_fees", grams()),
    ]);

    fields.extend([
        ("block_id", Condition::string()),
        ("account_addr", Condition::string()),
        ("lt", u64()),
        ("prev_trans_hash", Condition::string()),
        ("prev_trans_lt", u64()),
        ("now", Condition::number()),
        ("outmsg_cnt", Condition::number()),
        ("in_msg", Condition::string()),
        ("out_msgs", Condition::array(Condition::string())),
        ("total_fees", grams()),
        ("total_fees_other", other_currency_collection()),
        ("old_hash", Condition::string()),
        ("new_hash", Condition::string()),
        ("credit_first", Condition::boolean()),
        ("storage", Condition::structure(storage)),
        (
            "credit",
            Condition::structure([
                ("due_fees_collected", grams()),
                ("credit", grams()),
                ("credit_other", other_currency_collection()),
            ]),
        ),
        ("compute", Condition::structure(compute)),
        ("action", Condition::structure(action)),
        ("bounce", Condition::structure(bounce)),
        ("aborted", Condition::boolean()),
        ("destroyed", Condition::boolean()),
        ("tt", Condition::string()),
        ("installed", Condition::boolean()),
        ("proof", Condition::string()),
        ("boc", Condition::string()),
    ]);
    fields
}

/// `transactions` documents; `in_message` / `out_messages` join `messages`
pub fn transaction() -> Condition {
    let message = Arc::new(message_base());
    let mut fields = transaction_fields();
    fields.push((
        "in_message",
        Condition::join("in_msg", "messages", message.clone()),
    ));
    fields.push((
        "out_messages",
        Condition::join_array("out_msgs", "messages", message),
    ));
    Condition::collection(fields)
}

fn ext_blk_ref() -> Condition {
    Condition::structure([
        ("end_lt", u64()),
        ("seq_no", Condition::number()),
        ("root_hash", Condition::string()),
        ("file_hash", Condition::string()),
    ])
}

/// `blocks` documents
pub fn block_base() -> Condition {
    let mut fields = vec![("id", Condition::string())];
    with_enum(&mut fields, "status", "status_name", BLOCK_PROCESSING_STATUS);
    fields.extend([
        ("global_id", Condition::number()),
        ("want_split", Condition::boolean()),
        ("seq_no", Condition::number()),
        ("after_merge", Condition::boolean()),
        ("gen_utime", Condition::number()),
        ("gen_catchain_seqno", Condition::number()),
        ("flags", Condition::number()),
        ("master_ref", ext_blk_ref()),
        ("prev_ref", ext_blk_ref()),
        ("version", Condition::number()),
        ("before_split", Condition::boolean()),
        ("after_split", Condition::boolean()),
        ("want_merge", Condition::boolean()),
        ("vert_seq_no", Condition::number()),
        ("start_lt", u64()),
        ("end_lt", u64()),
        ("workchain_id", Condition::number()),
        ("shard", Condition::string()),
        ("min_ref_mc_seqno", Condition::number()),
        (
            "master",
            Condition::structure([("min_shard_gen_utime", Condition::number())]),
        ),
        (
            "value_flow",
            Condition::structure([
                ("to_next_blk", grams()),
                ("exported", grams()),
                ("fees_collected", grams()),
                ("created", grams()),
                ("imported", grams()),
                ("from_prev_blk", grams()),
                ("minted", grams()),
                ("fees_imported", grams()),
            ]),
        ),
        (
            "account_blocks",
            Condition::array(Condition::structure([
                ("account_addr", Condition::string()),
                ("transactions", Condition::array(Condition::string())),
                ("tr_count", Condition::number()),
            ])),
        ),
        ("rand_seed", Condition::string()),
    ]);
    Condition::collection(fields)
}

/// `blocks_signatures` documents
pub fn block_signatures() -> Condition {
    Condition::collection([
        ("id", Condition::string()),
        ("gen_utime", Condition::number()),
        ("seq_no", Condition::number()),
        ("shard", Condition::string()),
        ("workchain_id", Condition::number()),
        ("proof", Condition::string()),
        ("validator_list_hash_short", Condition::number()),
        ("catchain_seqno", Condition::number()),
        ("sig_weight", u64()),
        (
            "signatures",
            Condition::array(Condition::structure([
                ("node_id", Condition::string()),
                ("r", Condition::string()),
                ("s", Condition::string()),
            ])),
        ),
    ])
}
