//! Process exit codes. Scripts depend on these; do not renumber.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INVALID: i32 = 1; // At least one bag failed validation
pub const EXIT_LOAD_ERROR: i32 = 2; // Bag could not be loaded, or bad config/arguments
pub const EXIT_PARTIAL_REPAIR: i32 = 3; // A repair step or file failed

/// Combine per-bag codes: the highest code wins.
pub fn worst(codes: impl IntoIterator<Item = i32>) -> i32 {
    codes.into_iter().max().unwrap_or(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_code_wins() {
        assert_eq!(worst(Vec::new()), EXIT_SUCCESS);
        assert_eq!(worst([EXIT_SUCCESS, EXIT_INVALID]), EXIT_INVALID);
        assert_eq!(worst([EXIT_LOAD_ERROR, EXIT_INVALID]), EXIT_LOAD_ERROR);
    }
}
