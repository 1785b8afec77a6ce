use lentil::input::{read_rating_data, split_rows, RatingInputArgs};
use tabular_util::common_io::{create_temp_dir_file, write_lines};

#[test]
fn split_is_disjoint_and_exhaustive() {
    let n = 1000;
    let (train, test) = split_rows(n, 0.2, 42);

    assert_eq!(train.len() + test.len(), n);
    assert_eq!(test.len(), 200);

    let mut all: Vec<usize> = train.iter().chain(test.iter()).cloned().collect();
    all.sort_unstable();
    assert_eq!(all, (0..n).collect::<Vec<_>>());
}

#[test]
fn split_is_reproducible() {
    let (train_a, test_a) = split_rows(500, 0.25, 7);
    let (train_b, test_b) = split_rows(500, 0.25, 7);
    assert_eq!(train_a, train_b);
    assert_eq!(test_a, test_b);

    let (_, test_c) = split_rows(500, 0.25, 8);
    assert_ne!(test_a, test_c);
}

#[test]
fn zero_fraction_keeps_every_row() {
    let (train, test) = split_rows(100, 0.0, 1);
    assert_eq!(train.len(), 100);
    assert!(test.is_empty());
}

fn toy_table() -> Vec<Box<str>> {
    vec![
        "student\tinstructor\tdepartment\tservice\trating".into(),
        "s2\ti1\td1\t0\t3.5".into(),
        "s1\ti1\td1\t1\t4.0".into(),
        "s1\ti2\td2\t0\t2.5".into(),
        "s3\ti2\td1\t1\t3.0".into(),
        "s2\ti3\td2\t0\t3.8".into(),
    ]
}

#[test]
fn remapped_ids_are_dense() -> anyhow::Result<()> {
    let file = create_temp_dir_file(".tsv")?;
    write_lines(&toy_table(), file.to_str().unwrap())?;

    let data = read_rating_data(&RatingInputArgs {
        data_file: file.to_str().unwrap().into(),
        test_fraction: 0.0,
        rseed: 1,
    })?;

    assert_eq!(data.train.len(), 5);
    assert!(data.test.is_empty());

    assert_eq!(data.students.len(), 3);
    assert_eq!(data.instructors.len(), 3);
    assert_eq!(data.departments.len(), 2);

    // names are sorted before dense remapping
    assert_eq!(data.students.index_of("s1"), Some(0));
    assert_eq!(data.students.index_of("s3"), Some(2));

    for r in 0..data.train.len() {
        assert!(data.train.student[r] < data.students.len());
        assert!(data.train.instructor[r] < data.instructors.len());
        assert!(data.train.department[r] < data.departments.len());
    }

    Ok(())
}

#[test]
fn loader_partitions_rows() -> anyhow::Result<()> {
    let file = create_temp_dir_file(".tsv")?;
    write_lines(&toy_table(), file.to_str().unwrap())?;

    let data = read_rating_data(&RatingInputArgs {
        data_file: file.to_str().unwrap().into(),
        test_fraction: 0.4,
        rseed: 3,
    })?;

    assert_eq!(data.train.len() + data.test.len(), 5);
    assert_eq!(data.test.len(), 2);

    Ok(())
}

#[test]
fn bad_service_flag_fails() -> anyhow::Result<()> {
    let lines: Vec<Box<str>> = vec!["s1\ti1\td1\t2\t3.5".into()];

    let file = create_temp_dir_file(".tsv")?;
    write_lines(&lines, file.to_str().unwrap())?;

    let out = read_rating_data(&RatingInputArgs {
        data_file: file.to_str().unwrap().into(),
        test_fraction: 0.0,
        rseed: 1,
    });

    assert!(out.is_err());
    Ok(())
}
