use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::model::{FeatureCollection, FeatureRecord};
use crate::parser::ParseOptions;

pub const FID_HEADER: &str = "FID";
pub const CONTEXT_ID_HEADER: &str = "CONTEXT_ID";
pub const GEOMETRY_HEADER: &str = "GEOMETRY";

#[derive(Default)]
pub struct CsvWriter {}

impl CsvWriter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn write(
        &self,
        collection: &FeatureCollection,
        options: &ParseOptions,
        output_path: &Path,
    ) -> Result<()> {
        let file = File::create(output_path)
            .with_context(|| format!("Failed to create {:?}", output_path))?;
        self.write_to(collection, options, file)
    }

    pub fn write_to<W: Write>(
        &self,
        collection: &FeatureCollection,
        options: &ParseOptions,
        output: W,
    ) -> Result<()> {
        tracing::info!(
            "Writing {} features with {} attribute columns",
            collection.len(),
            options.attributes.len()
        );

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(output);

        // ヘッダー行
        writer
            .write_record(header(options))
            .context("Failed to write CSV header")?;

        // 1フィーチャー = 1行
        for record in &collection.features {
            writer
                .write_record(row(record, options))
                .with_context(|| format!("Failed to write CSV row for feature {:?}", record.fid))?;
        }

        writer.flush().context("Failed to flush CSV output")?;
        Ok(())
    }
}

fn header(options: &ParseOptions) -> Vec<String> {
    let mut columns = Vec::with_capacity(options.attributes.len() + 3);
    columns.push(FID_HEADER.to_string());
    columns.push(CONTEXT_ID_HEADER.to_string());
    columns.extend(options.attributes.iter().cloned());
    columns.push(GEOMETRY_HEADER.to_string());
    columns
}

fn row(record: &FeatureRecord, options: &ParseOptions) -> Vec<String> {
    let mut fields = Vec::with_capacity(options.attributes.len() + 3);
    fields.push(record.fid.clone().unwrap_or_default());
    fields.push(record.context_id.clone().unwrap_or_default());
    // 属性は指定された順序で出力
    for name in &options.attributes {
        fields.push(record.attribute(name).unwrap_or_default().to_string());
    }
    fields.push(record.geometry.wkt());
    fields
}
