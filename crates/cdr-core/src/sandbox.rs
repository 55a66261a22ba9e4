//! Sandbox datasets hold copies of every row a rule removes or rewrites.

use cdr_warehouse::{DatasetOptions, Warehouse};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::Result;

pub const SANDBOX_SUFFIX: &str = "_sandbox";

/// Hex digits of the digest appended to lossy sandbox table names.
const DIGEST_CHARS: usize = 8;

/// Identifier of the sandbox dataset paired with `dataset_id`.
pub fn sandbox_dataset_id(dataset_id: &str) -> String {
    format!("{dataset_id}{SANDBOX_SUFFIX}")
}

/// Make sure the sandbox dataset for `dataset_id` exists and return its id.
///
/// Existing sandboxes are left untouched; nothing is ever deleted or
/// truncated here.
pub fn ensure_sandbox(
    warehouse: &dyn Warehouse,
    project_id: &str,
    dataset_id: &str,
) -> Result<String> {
    let sandbox_id = sandbox_dataset_id(dataset_id);
    let existing = warehouse.list_datasets(project_id)?;
    if existing.iter().any(|dataset| *dataset == sandbox_id) {
        debug!(project = project_id, sandbox = %sandbox_id, "sandbox dataset already exists");
        return Ok(sandbox_id);
    }

    let description = format!(
        "Sandbox created for storing records affected by the cleaning rules applied to {dataset_id}"
    );
    let options = DatasetOptions::new()
        .with_description(description)
        .with_label("phase", "sandbox")
        .with_label("parent", dataset_id)
        .exists_ok(true);
    warehouse.create_dataset(project_id, &sandbox_id, &options)?;
    info!(project = project_id, sandbox = %sandbox_id, "created sandbox dataset");
    Ok(sandbox_id)
}

/// Sandbox table name for `base_table` as written by the rule named `namer`.
///
/// The name is `{namer}_{base_table}`, lower-cased with characters outside
/// `[a-z0-9_]` replaced by `_`. When that normalisation changes either
/// input, a short digest of the raw inputs is appended so distinct inputs
/// keep distinct names.
pub fn sandbox_table_for(namer: &str, base_table: &str) -> String {
    let clean_namer = normalize(namer);
    let clean_table = normalize(base_table);
    let lossy = clean_namer != namer || clean_table != base_table;

    let mut name = format!("{clean_namer}_{clean_table}");
    if lossy {
        let digest = Sha256::new()
            .chain_update(namer.as_bytes())
            .chain_update([0u8])
            .chain_update(base_table.as_bytes())
            .finalize();
        let mut suffix = hex::encode(digest);
        suffix.truncate(DIGEST_CHARS);
        name.push('_');
        name.push_str(&suffix);
    }
    name
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
