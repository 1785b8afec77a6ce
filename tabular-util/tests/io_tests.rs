use tabular_util::common_io::{create_temp_dir_file, read_lines, write_lines};
use tabular_util::traits::{IoOps, SampleOps};

#[test]
fn dmatrix_io_test() -> anyhow::Result<()> {
    let xx = nalgebra::DMatrix::<f32>::runif(50, 20);

    let tsv_file = create_temp_dir_file("txt.gz")?;
    xx.to_tsv(tsv_file.to_str().unwrap())?;

    let yy = nalgebra::DMatrix::<f32>::read_file_delim(tsv_file.to_str().unwrap(), "\t", None)?;

    approx::assert_abs_diff_eq!(xx, yy);

    Ok(())
}

#[test]
fn gzipped_lines_round_trip() -> anyhow::Result<()> {
    let lines: Vec<Box<str>> = vec!["a\t1".into(), "b\t2".into(), "c\t3".into()];

    let gz_file = create_temp_dir_file("txt.gz")?;
    write_lines(&lines, gz_file.to_str().unwrap())?;

    let back = read_lines(gz_file.to_str().unwrap())?;
    assert_eq!(lines, back);

    Ok(())
}

#[test]
fn comment_lines_are_skipped() -> anyhow::Result<()> {
    use tabular_util::common_io::read_lines_of_words_delim;

    let lines: Vec<Box<str>> = vec![
        "# comment".into(),
        "s1\ti1\td1\t0\t3.5".into(),
        "s2\ti1\td1\t1\t4.0".into(),
    ];

    let file = create_temp_dir_file(".tsv")?;
    write_lines(&lines, file.to_str().unwrap())?;

    let out = read_lines_of_words_delim(file.to_str().unwrap(), &['\t', ',', ' '], -1)?;
    assert_eq!(out.lines.len(), 2);
    assert_eq!(out.lines[0].len(), 5);

    Ok(())
}
