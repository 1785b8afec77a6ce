use crate::common::*;
use fnv::FnvHashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tabular_util::common_io::read_lines_of_words_delim;

/// Dense remapping of categorical names to `[0, len)` indices
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    names: Vec<Box<str>>,
    index: FnvHashMap<Box<str>, usize>,
}

impl Vocabulary {
    /// Build from raw names; duplicates collapse, ordering is sorted
    /// so the remapping is reproducible
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = Box<str>>,
    {
        let uniq: std::collections::HashSet<Box<str>> = names.into_iter().collect();
        let mut names: Vec<Box<str>> = uniq.into_iter().collect();
        names.sort();

        let index = names
            .iter()
            .enumerate()
            .map(|(k, name)| (name.clone(), k))
            .collect();

        Self { names, index }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, k: usize) -> Option<&str> {
        self.names.get(k).map(|x| x.as_ref())
    }

    pub fn names(&self) -> &[Box<str>] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Remapped observations; immutable once loaded
#[derive(Clone, Debug, Default)]
pub struct RatingTable {
    pub student: Vec<usize>,
    pub instructor: Vec<usize>,
    pub department: Vec<usize>,
    pub service: Vec<f32>,
    pub rating: Vec<f32>,
}

impl RatingTable {
    pub fn len(&self) -> usize {
        self.rating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rating.is_empty()
    }

    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            student: rows.iter().map(|&r| self.student[r]).collect(),
            instructor: rows.iter().map(|&r| self.instructor[r]).collect(),
            department: rows.iter().map(|&r| self.department[r]).collect(),
            service: rows.iter().map(|&r| self.service[r]).collect(),
            rating: rows.iter().map(|&r| self.rating[r]).collect(),
        }
    }

    /// grouping ids of one row in the canonical order
    pub fn grouping_ids(&self, r: usize) -> [usize; N_GROUPINGS] {
        [self.student[r], self.instructor[r], self.department[r]]
    }
}

pub struct RatingData {
    pub train: RatingTable,
    pub test: RatingTable,
    pub students: Vocabulary,
    pub instructors: Vocabulary,
    pub departments: Vocabulary,
}

impl RatingData {
    pub fn group_sizes(&self) -> [usize; N_GROUPINGS] {
        [
            self.students.len(),
            self.instructors.len(),
            self.departments.len(),
        ]
    }

    pub fn vocabulary(&self, g: usize) -> &Vocabulary {
        match g {
            0 => &self.students,
            1 => &self.instructors,
            _ => &self.departments,
        }
    }
}

pub struct RatingInputArgs {
    pub data_file: Box<str>,
    pub test_fraction: f32,
    pub rseed: u64,
}

struct RawRow {
    student: Box<str>,
    instructor: Box<str>,
    department: Box<str>,
    service: f32,
    rating: f32,
}

fn parse_raw_row(row: usize, words: &[Box<str>]) -> anyhow::Result<RawRow> {
    if words.len() != 5 {
        anyhow::bail!(
            "row {}: expected 5 columns (student, instructor, department, service, rating), found {}",
            row + 1,
            words.len()
        );
    }

    let service: f32 = words[3]
        .parse()
        .map_err(|_| anyhow::anyhow!("row {}: unreadable service flag {:?}", row + 1, words[3]))?;

    if service != 0.0 && service != 1.0 {
        anyhow::bail!("row {}: service flag must be 0 or 1", row + 1);
    }

    let rating: f32 = words[4]
        .parse()
        .map_err(|_| anyhow::anyhow!("row {}: unreadable rating {:?}", row + 1, words[4]))?;

    Ok(RawRow {
        student: words[0].clone(),
        instructor: words[1].clone(),
        department: words[2].clone(),
        service,
        rating,
    })
}

fn looks_like_header(words: &[Box<str>]) -> bool {
    words.len() == 5 && words[4].parse::<f32>().is_err()
}

///
/// Read a rating table, remap the categorical columns to dense
/// indices, and split the rows into train and test partitions.
///
pub fn read_rating_data(args: &RatingInputArgs) -> anyhow::Result<RatingData> {
    if !(0.0..1.0).contains(&args.test_fraction) {
        anyhow::bail!("test fraction should be in [0, 1)");
    }

    let raw = read_lines_of_words_delim(args.data_file.as_ref(), &['\t', ',', ' '], -1)?.lines;

    let body = match raw.first() {
        Some(first) if looks_like_header(first) => &raw[1..],
        _ => &raw[..],
    };

    if body.is_empty() {
        anyhow::bail!("no data rows in {}", args.data_file);
    }

    let rows: Vec<RawRow> = body
        .par_iter()
        .enumerate()
        .map(|(r, words)| parse_raw_row(r, words))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let students = Vocabulary::from_names(rows.iter().map(|r| r.student.clone()));
    let instructors = Vocabulary::from_names(rows.iter().map(|r| r.instructor.clone()));
    let departments = Vocabulary::from_names(rows.iter().map(|r| r.department.clone()));

    let mut full = RatingTable::default();
    for row in rows.iter() {
        full.student
            .push(students.index_of(&row.student).expect("student vocabulary"));
        full.instructor.push(
            instructors
                .index_of(&row.instructor)
                .expect("instructor vocabulary"),
        );
        full.department.push(
            departments
                .index_of(&row.department)
                .expect("department vocabulary"),
        );
        full.service.push(row.service);
        full.rating.push(row.rating);
    }

    let (train_rows, test_rows) = split_rows(full.len(), args.test_fraction, args.rseed);

    Ok(RatingData {
        train: full.subset(&train_rows),
        test: full.subset(&test_rows),
        students,
        instructors,
        departments,
    })
}

///
/// Shuffle `[0, n_rows)` with a seeded generator and carve out the
/// test partition; the two sorted index lists are disjoint and cover
/// every row.
///
pub fn split_rows(n_rows: usize, test_fraction: f32, rseed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rows: Vec<usize> = (0..n_rows).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(rseed);
    rows.shuffle(&mut rng);

    let n_test = ((n_rows as f64) * (test_fraction as f64)).round() as usize;
    let (test, train) = rows.split_at(n_test.min(n_rows));

    let mut train = train.to_vec();
    let mut test = test.to_vec();
    train.sort_unstable();
    test.sort_unstable();

    (train, test)
}

///
/// Read a reference effect table with (level name, estimate) per line
///
pub fn read_reference_effects(input_file: &str) -> anyhow::Result<Vec<(Box<str>, f32)>> {
    let raw = read_lines_of_words_delim(input_file, &['\t', ',', ' '], -1)?.lines;

    let body = match raw.first() {
        Some(first) if first.len() >= 2 && first[1].parse::<f32>().is_err() => &raw[1..],
        _ => &raw[..],
    };

    let mut out = Vec::with_capacity(body.len());
    for (r, words) in body.iter().enumerate() {
        if words.len() < 2 {
            anyhow::bail!("row {}: expected (name, estimate) pairs", r + 1);
        }
        let value: f32 = words[1]
            .parse()
            .map_err(|_| anyhow::anyhow!("row {}: unreadable estimate {:?}", r + 1, words[1]))?;
        out.push((words[0].clone(), value));
    }

    Ok(out)
}
