use fnv::FnvHashMap as HashMap;
use std::hash::Hash;

/// partition membership vector into groups of indexes
/// # Arguments
/// * `membership` - a vector of membership (E.g., level assignment)
/// # Returns
/// A hashmap: level/group name -> indexes of the elements
pub fn partition_by_membership<T>(membership: &[T]) -> HashMap<T, Vec<usize>>
where
    T: Eq + Hash + Clone,
{
    let mut groups: HashMap<T, Vec<usize>> = HashMap::default();
    for (row, k) in membership.iter().enumerate() {
        groups.entry(k.clone()).or_default().push(row);
    }
    groups
}

/// partition a dense 0-based membership vector into a vector of index
/// lists, one per level in `[0, n_levels)`
pub fn partition_by_level(membership: &[usize], n_levels: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![vec![]; n_levels];
    for (row, &k) in membership.iter().enumerate() {
        debug_assert!(k < n_levels);
        groups[k].push(row);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_every_element() {
        let membership = vec![0_usize, 1, 0, 2, 1, 0];
        let groups = partition_by_level(&membership, 3);
        assert_eq!(groups[0], vec![0, 2, 5]);
        assert_eq!(groups[1], vec![1, 4]);
        assert_eq!(groups[2], vec![3]);

        let total: usize = groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, membership.len());
    }

    #[test]
    fn partition_by_membership_keeps_names() {
        let membership = vec!["a", "b", "a"];
        let groups = partition_by_membership(&membership);
        assert_eq!(groups[&"a"], vec![0, 2]);
        assert_eq!(groups[&"b"], vec![1]);
    }
}
