use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use super::in_list;
use crate::model::ImageBlob;
use crate::store::CanonicalCapabilities;

const IMAGE_BATCH_SIZE: usize = 500;

/// Images for each block id, ordered by image id. Blocks without images
/// are absent from the map.
pub fn load_block_images(
    connection: &Connection,
    capabilities: CanonicalCapabilities,
    block_ids: &[i64],
) -> Result<HashMap<i64, Vec<ImageBlob>>> {
    let mut images: HashMap<i64, Vec<ImageBlob>> = HashMap::new();
    if block_ids.is_empty() || !capabilities.image_table {
        return Ok(images);
    }
    if !capabilities.image_map && !capabilities.legacy_image_column {
        return Ok(images);
    }

    for batch in block_ids.chunks(IMAGE_BATCH_SIZE) {
        let placeholders = in_list(batch.len());
        let mut sources = Vec::new();
        let mut values = Vec::new();

        if capabilities.image_map {
            sources.push(format!(
                "SELECT block_id, image_id FROM brhc_image_block_map
                 WHERE block_id IN ({placeholders})"
            ));
            values.extend(batch.iter().map(|id| Value::Integer(*id)));
        }
        if capabilities.legacy_image_column {
            sources.push(format!(
                "SELECT block_id, image_blob_id AS image_id FROM doc_blocks
                 WHERE image_blob_id IS NOT NULL AND block_id IN ({placeholders})"
            ));
            values.extend(batch.iter().map(|id| Value::Integer(*id)));
        }

        let sql = format!(
            "
            SELECT links.block_id, i.image_id, i.image_blob
            FROM ({}) AS links
            JOIN brhc_images i ON i.image_id = links.image_id
            ORDER BY links.block_id ASC, i.image_id ASC
            ",
            sources.join(" UNION ")
        );
        let mut statement = connection
            .prepare(&sql)
            .context("failed to prepare block image lookup")?;
        let mut rows = statement.query(params_from_iter(values))?;

        while let Some(row) = rows.next()? {
            let block_id: i64 = row.get(0)?;
            let image_id: i64 = row.get(1)?;
            let Some(data) = row.get::<_, Option<Vec<u8>>>(2)? else {
                continue;
            };
            images
                .entry(block_id)
                .or_default()
                .push(ImageBlob { image_id, data });
        }
    }

    debug!(
        requested = block_ids.len(),
        with_images = images.len(),
        "loaded block images"
    );
    Ok(images)
}
