// crates/lodestone-core/src/citation.rs
// Per-dispatch citation ID allocation

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic, thread-safe citation ID issuer.
///
/// One allocator lives per dispatch invocation; IDs are unique within that
/// allocator and strictly increasing in allocation order. The first issued
/// ID is `"1"`.
#[derive(Debug, Default)]
pub struct CitationAllocator {
    counter: AtomicU64,
}

impl CitationAllocator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Issue the next citation ID as a decimal string.
    pub fn next(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        render_decimal(id)
    }

    /// Reset the counter so the next ID is `"1"` again. Test use only.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

/// Local integer-to-decimal conversion. Citation IDs are rendered on every
/// result item, so this stays a tight digit loop instead of going through
/// the formatting machinery.
fn render_decimal(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = [0u8; 20];
    let mut i = digits.len();
    while n > 0 {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    String::from_utf8_lossy(&digits[i..]).into_owned()
}
