/// Keys to add and to remove to turn `current` into `desired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Differences<T> {
    /// Desired keys missing from current, in desired order.
    pub to_add: Vec<T>,
    /// Current keys missing from desired, in current order.
    pub to_remove: Vec<T>,
}

impl<T> Differences<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Order matters: the on-chain update calls are index based, so both sides keep
/// the order of the list they come from.
pub fn find_differences<T: PartialEq + Clone>(current: &[T], desired: &[T]) -> Differences<T> {
    let to_add = desired
        .iter()
        .filter(|item| !current.contains(item))
        .cloned()
        .collect();
    let to_remove = current
        .iter()
        .filter(|item| !desired.contains(item))
        .cloned()
        .collect();
    Differences { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&["a", "b", "c"], &["b", "c", "d"], &["d"], &["a"]; "overlap")]
    #[test_case(&[], &["a", "b"], &["a", "b"], &[]; "all additions")]
    #[test_case(&["a", "b"], &[], &[], &["a", "b"]; "all removals")]
    #[test_case(&[], &[], &[], &[]; "both empty")]
    #[test_case(&["c", "a", "b"], &["z", "b", "y"], &["z", "y"], &["c", "a"]; "keeps source order")]
    fn finds_differences(
        current: &[&str],
        desired: &[&str],
        to_add: &[&str],
        to_remove: &[&str],
    ) {
        let diff = find_differences(current, desired);
        assert_eq!(diff.to_add, to_add);
        assert_eq!(diff.to_remove, to_remove);
    }

    #[test]
    fn disjoint_union_yields_outer_sets() {
        let a = [1, 2, 3];
        let b = [10, 11];
        let c = [20, 21, 22, 23];

        let current: Vec<_> = a.iter().chain(&b).copied().collect();
        let desired: Vec<_> = b.iter().chain(&c).copied().collect();
        let diff = find_differences(&current, &desired);

        assert_eq!(diff.to_add, c);
        assert_eq!(diff.to_remove, a);
    }

    #[test]
    fn identical_lists_have_no_differences() {
        let list = ["0x1", "0x2", "0x3"];
        assert!(find_differences(&list, &list).is_empty());
    }
}
