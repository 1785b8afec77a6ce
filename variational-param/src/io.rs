use crate::traits::*;
use nalgebra::DMatrix;
use tabular_util::traits::IoOps;

use parquet::basic::Type as ParquetType;
use parquet::basic::{Compression, ConvertedType, ZstdLevel};
use parquet::data_type::{ByteArray, ByteArrayType, FloatType};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type;
use std::fs::File;
use std::sync::Arc;

/// consolidated input and output
pub trait ParamIo: Inference<Mat = DMatrix<f32>, Scalar = f32> {
    fn to_tsv(&self, header: &str) -> anyhow::Result<()> {
        self.posterior_mean()
            .to_tsv(&(header.to_string() + ".mean.gz"))?;

        self.posterior_sd()
            .to_tsv(&(header.to_string() + ".sd.gz"))?;

        Ok(())
    }

    /// Write `(row, column, mean, sd)` records to one parquet file
    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        // define schema
        let fields = vec![
            ("row", ParquetType::BYTE_ARRAY, ConvertedType::UTF8),
            ("column", ParquetType::BYTE_ARRAY, ConvertedType::UTF8),
            ("mean", ParquetType::FLOAT, ConvertedType::NONE),
            ("sd", ParquetType::FLOAT, ConvertedType::NONE),
        ];

        let schema = Arc::new(
            Type::group_type_builder("PosteriorMatrix")
                .with_fields(
                    fields
                        .into_iter()
                        .map(|(name, parquet_type, converted_type)| {
                            Arc::new(
                                Type::primitive_type_builder(name, parquet_type)
                                    .with_repetition(parquet::basic::Repetition::REQUIRED)
                                    .with_converted_type(converted_type)
                                    .build()
                                    .unwrap(),
                            )
                        })
                        .collect(),
                )
                .build()?,
        );

        // prepare data in column-major order
        let (mean, row_idx, col_idx) = melt_with_indexes(self.posterior_mean());
        let (sd, _, _) = melt_with_indexes(self.posterior_sd());

        let rows = row_idx
            .iter()
            .map(|&i| {
                if let Some(row_names) = row_names {
                    ByteArray::from(row_names[i].as_ref())
                } else {
                    ByteArray::from(i.to_string().as_bytes())
                }
            })
            .collect::<Vec<_>>();

        let cols = col_idx
            .iter()
            .map(|&j| {
                if let Some(column_names) = column_names {
                    ByteArray::from(column_names[j].as_ref())
                } else {
                    ByteArray::from(j.to_string().as_bytes())
                }
            })
            .collect::<Vec<_>>();

        let nelem = mean.len();
        assert_eq!(nelem, sd.len());

        // write data to parquet
        let file = File::create(file_path)?;
        let zstd_level = ZstdLevel::try_new(5)?;
        let writer_properties = Arc::new(
            WriterProperties::builder()
                .set_compression(Compression::ZSTD(zstd_level))
                .build(),
        );
        let mut writer = SerializedFileWriter::new(file, schema, writer_properties)?;

        let mut row_group_writer = writer.next_row_group()?;

        for data in [&rows, &cols] {
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                let typed_writer = column_writer.typed::<ByteArrayType>();
                typed_writer.write_batch(data, None, None)?;
                column_writer.close()?;
            }
        }

        for data in [mean.as_slice(), sd.as_slice()] {
            if let Some(mut column_writer) = row_group_writer.next_column()? {
                let typed_writer = column_writer.typed::<FloatType>();
                typed_writer.write_batch(data, None, None)?;
                column_writer.close()?;
            }
        }

        row_group_writer.close()?;
        writer.close()?;

        Ok(())
    }
}

/// Flatten a matrix in column-major order, together with the row and
/// column index of each element
fn melt_with_indexes(mat: &DMatrix<f32>) -> (Vec<f32>, Vec<usize>, Vec<usize>) {
    let (nrows, ncols) = (mat.nrows(), mat.ncols());
    let mut values = Vec::with_capacity(nrows * ncols);
    let mut row_idx = Vec::with_capacity(nrows * ncols);
    let mut col_idx = Vec::with_capacity(nrows * ncols);

    for j in 0..ncols {
        for i in 0..nrows {
            values.push(mat[(i, j)]);
            row_idx.push(i);
            col_idx.push(j);
        }
    }

    (values, row_idx, col_idx)
}
