//! Runtime invariant tracking for predictive property testing.
//!
//! Production code states its invariants with [`assert_invariant!`]. Every
//! check is recorded per thread, so a test can later demand that a given set
//! of invariants was actually exercised by the code path it drove.
//!
//! ```rust,ignore
//! use crabcapture::invariant_ppt::contract_test;
//!
//! let _ = crabcapture::format_selector::select(&formats, &criteria);
//! contract_test("selection", &["selected format is drawn from the candidates"]);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;

thread_local! {
    static CHECKED: RefCell<BTreeMap<&'static str, u64>> = const { RefCell::new(BTreeMap::new()) };
}

/// Assert an invariant and record that it was checked.
///
/// Panics with the message (and optional context) when the condition fails.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &'static str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(message).or_insert(0) += 1;
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// How many times an invariant was checked on this thread.
pub fn check_count(message: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(message).copied().unwrap_or(0))
}

/// Panics unless every listed invariant was checked at least once on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|inv| check_count(inv) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
