//! Allocation-free text rendering of tracker state.
//!
//! Reports may be requested from contexts where calling into the global allocator is not
//! possible, so everything here writes into caller-provided byte buffers and converts
//! integers to text by hand.

use std::mem::size_of;

use crate::{AllocationRecord, CategoryId, MAX_CATEGORIES, Tracker};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Maximum number of decimal digits of a `usize`.
const MAX_DECIMAL_DIGITS: usize = 20;

/// Number of hex digits needed to show a full pointer-width value.
const POINTER_HEX_DIGITS: usize = size_of::<usize>() * 2;

/// Appends text to a fixed byte buffer, silently dropping whatever does not fit.
///
/// The last byte of the buffer is reserved for a NUL terminator, which `finish()` writes.
#[derive(Debug)]
pub(crate) struct ReportWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl<'a> ReportWriter<'a> {
    pub(crate) fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, len: 0 }
    }

    fn limit(&self) -> usize {
        self.buffer.len().saturating_sub(1)
    }

    pub(crate) fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let available = self.limit().saturating_sub(self.len);
        let count = bytes.len().min(available);

        let target = self.buffer.get_mut(self.len..self.len.wrapping_add(count));
        let source = bytes.get(..count);

        if let (Some(target), Some(source)) = (target, source) {
            target.copy_from_slice(source);
            self.len = self.len.wrapping_add(count);
        }
    }

    pub(crate) fn write_decimal(&mut self, mut value: usize) {
        let mut digits = [0_u8; MAX_DECIMAL_DIGITS];
        let mut start = MAX_DECIMAL_DIGITS;

        loop {
            start = start.wrapping_sub(1);

            if let Some(digit) = digits.get_mut(start) {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "remainder of division by 10 fits in u8"
                )]
                let remainder = (value % 10) as u8;
                *digit = b'0'.wrapping_add(remainder);
            }

            #[expect(
                clippy::integer_division,
                reason = "dropping the last decimal digit is the intent"
            )]
            let rest = value / 10;
            value = rest;

            if value == 0 {
                break;
            }
        }

        self.write_bytes(digits.get(start..).unwrap_or_default());
    }

    /// Writes `value` as uppercase hex zero-padded to the width of a pointer, without prefix.
    pub(crate) fn write_pointer_hex(&mut self, value: usize) {
        let mut digits = [0_u8; POINTER_HEX_DIGITS];
        let mut remaining = value;

        for digit in digits.iter_mut().rev() {
            *digit = HEX_DIGITS.get(remaining & 0xF).copied().unwrap_or(b'0');
            remaining >>= 4;
        }

        self.write_bytes(&digits);
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.buffer.get(..self.len).unwrap_or_default()
    }

    /// NUL-terminates the text and returns its length, excluding the terminator.
    pub(crate) fn finish(self) -> usize {
        if let Some(terminator) = self.buffer.get_mut(self.len) {
            *terminator = 0;
        }

        self.len
    }
}

/// Writes the totals and the statistics of every category that has seen an allocation.
pub(crate) fn write_summary(writer: &mut ReportWriter<'_>, tracker: &Tracker) {
    writer.write_str("=== alloc_ledger Memory Report ===\n");

    writer.write_str("Total: ");
    writer.write_decimal(tracker.total_bytes());
    writer.write_str(" bytes\n");

    writer.write_str("Peak:  ");
    writer.write_decimal(tracker.peak_bytes());
    writer.write_str(" bytes\n");

    writer.write_str("Active: ");
    writer.write_decimal(tracker.active_count());
    writer.write_str(" allocations\n");

    writer.write_str("Dropped: ");
    writer.write_decimal(tracker.dropped_count());
    writer.write_str(" (table full)\n");

    writer.write_str("\n--- Tag Statistics ---\n");

    for id in (0..MAX_CATEGORIES).filter_map(|id| CategoryId::try_from(id).ok()) {
        let Some(stats) = tracker.category_stats(id) else {
            continue;
        };

        if stats.alloc_count() == 0 {
            continue;
        }

        writer.write_str("[");
        if let Some(name) = tracker.category_name(id) {
            writer.write_str(name);
        } else {
            writer.write_str("Tag ");
            writer.write_decimal(usize::from(id));
        }
        writer.write_str("] Current: ");
        writer.write_decimal(stats.current_bytes());
        writer.write_str(" bytes, Peak: ");
        writer.write_decimal(stats.peak_bytes());
        writer.write_str(" bytes, Allocs: ");
        writer.write_decimal(stats.alloc_count());
        writer.write_str(", Frees: ");
        writer.write_decimal(stats.free_count());
        writer.write_str("\n");
    }
}

/// Writes one `Address: 0x..., Size: N, Tag: ...` line.
pub(crate) fn write_allocation_line(
    writer: &mut ReportWriter<'_>,
    record: &AllocationRecord,
    category_name: Option<&str>,
) {
    writer.write_str("Address: 0x");
    writer.write_pointer_hex(record.address());
    writer.write_str(", Size: ");
    writer.write_decimal(record.size());
    writer.write_str(", Tag: ");

    match category_name {
        Some(name) => writer.write_str(name),
        None => writer.write_decimal(usize::from(record.category())),
    }

    writer.write_str("\n");
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::AllocationKind;

    fn render(capacity: usize, f: impl FnOnce(&mut ReportWriter<'_>)) -> (Vec<u8>, usize) {
        let mut buffer = vec![0xFF; capacity];
        let mut writer = ReportWriter::new(&mut buffer);
        f(&mut writer);
        let len = writer.finish();
        (buffer, len)
    }

    #[test]
    fn decimal_conversion() {
        for (value, expected) in [
            (0, "0"),
            (7, "7"),
            (10, "10"),
            (123_456, "123456"),
            (usize::MAX, &*usize::MAX.to_string()),
        ] {
            let (buffer, len) = render(64, |w| w.write_decimal(value));
            assert_eq!(&buffer[..len], expected.as_bytes());
        }
    }

    #[test]
    fn pointer_hex_is_padded_and_uppercase() {
        let (buffer, len) = render(64, |w| w.write_pointer_hex(0xDEAD_BEEF));

        let expected = format!("{:0width$X}", 0xDEAD_BEEF_usize, width = POINTER_HEX_DIGITS);
        assert_eq!(&buffer[..len], expected.as_bytes());
    }

    #[test]
    fn output_is_nul_terminated() {
        let (buffer, len) = render(16, |w| w.write_str("abc"));

        assert_eq!(len, 3);
        assert_eq!(&buffer[..4], b"abc\0");
    }

    #[test]
    fn overflowing_text_is_truncated() {
        let (buffer, len) = render(8, |w| {
            w.write_str("Hello, ");
            w.write_decimal(123_456);
        });

        assert_eq!(len, 7);
        assert_eq!(&buffer[..8], b"Hello, \0");
    }

    #[test]
    fn partial_fit_keeps_prefix() {
        let (buffer, len) = render(6, |w| w.write_str("abcdefgh"));

        assert_eq!(len, 5);
        assert_eq!(&buffer, b"abcde\0");
    }

    #[test]
    fn empty_buffer_receives_nothing() {
        let (buffer, len) = render(0, |w| w.write_str("abc"));

        assert_eq!(len, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn single_byte_buffer_holds_only_terminator() {
        let (buffer, len) = render(1, |w| w.write_decimal(42));

        assert_eq!(len, 0);
        assert_eq!(buffer, [0]);
    }

    #[test]
    fn allocation_line_prefers_name_over_id() {
        let record = AllocationRecord::new(0x10, 64, 5, AllocationKind::Heap);

        let (named, named_len) = render(256, |w| write_allocation_line(w, &record, Some("Network")));
        let (anonymous, anonymous_len) = render(256, |w| write_allocation_line(w, &record, None));

        let padded = format!("{:0width$X}", 0x10, width = POINTER_HEX_DIGITS);
        assert_eq!(
            std::str::from_utf8(&named[..named_len]).unwrap(),
            format!("Address: 0x{padded}, Size: 64, Tag: Network\n")
        );
        assert_eq!(
            std::str::from_utf8(&anonymous[..anonymous_len]).unwrap(),
            format!("Address: 0x{padded}, Size: 64, Tag: 5\n")
        );
    }

    #[test]
    fn as_bytes_shows_text_so_far() {
        let mut buffer = [0_u8; 32];
        let mut writer = ReportWriter::new(&mut buffer);
        writer.write_str("Total: ");
        writer.write_decimal(5);

        assert_eq!(writer.as_bytes(), b"Total: 5");
    }
}
