//! The packed argument/result frame shared by both sides of a bridge.
//!
//! Arguments are laid out in order at their natural alignment. Results
//! start at the next pointer-aligned offset and the whole frame is padded
//! to a multiple of the pointer size. The managed trampoline, the native
//! wrapper and the runtime marshaler all agree on these offsets.

use serde::{Deserialize, Serialize};

/// One value in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSlot {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub align: u64,
}

/// Size, alignment and name of a value about to be placed in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: String,
    pub size: u64,
    pub align: u64,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, size: u64, align: u64) -> Self {
        SlotSpec {
            name: name.into(),
            size,
            align: align.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub params: Vec<FrameSlot>,
    pub results: Vec<FrameSlot>,
    pub size: u64,
    pub pointer_size: u64,
}

/// Round `offset` up to a multiple of `align`.
pub fn align_to(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

impl FrameLayout {
    pub fn new(params: &[SlotSpec], results: &[SlotSpec], pointer_size: u64) -> Self {
        let mut offset = 0;
        let place = |spec: &SlotSpec, offset: &mut u64| {
            *offset = align_to(*offset, spec.align);
            let slot = FrameSlot {
                name: spec.name.clone(),
                offset: *offset,
                size: spec.size,
                align: spec.align,
            };
            *offset += spec.size;
            slot
        };

        let params: Vec<FrameSlot> = params.iter().map(|p| place(p, &mut offset)).collect();
        offset = align_to(offset, pointer_size);
        let results: Vec<FrameSlot> = results.iter().map(|r| place(r, &mut offset)).collect();
        let size = align_to(offset, pointer_size);

        FrameLayout {
            params,
            results,
            size,
            pointer_size,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&FrameSlot> {
        self.params
            .iter()
            .chain(self.results.iter())
            .find(|s| s.name == name)
    }

    /// Slots in frame order.
    pub fn slots(&self) -> impl Iterator<Item = &FrameSlot> {
        self.params.iter().chain(self.results.iter())
    }

    /// Unused byte ranges `(offset, len)` between and after slots.
    pub fn padding(&self) -> Vec<(u64, u64)> {
        let mut gaps = Vec::new();
        let mut end = 0;
        for slot in self.slots() {
            if slot.offset > end {
                gaps.push((end, slot.offset - end));
            }
            end = slot.offset + slot.size;
        }
        if self.size > end {
            gaps.push((end, self.size - end));
        }
        gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_puts_frame() {
        // char *p0; int r; padded to 16
        let layout = FrameLayout::new(
            &[SlotSpec::new("p0", 8, 8)],
            &[SlotSpec::new("r", 4, 4)],
            8,
        );
        assert_eq!(layout.slot("r").unwrap().offset, 8);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.padding(), vec![(12, 4)]);
    }

    #[test]
    fn test_result_starts_pointer_aligned() {
        // char c; double r
        let layout = FrameLayout::new(
            &[SlotSpec::new("p0", 1, 1), SlotSpec::new("p1", 2, 2)],
            &[SlotSpec::new("r", 8, 8)],
            8,
        );
        assert_eq!(layout.params[1].offset, 2);
        assert_eq!(layout.results[0].offset, 8);
        assert_eq!(layout.padding(), vec![(1, 1), (4, 4)]);
    }

    #[test]
    fn test_empty_frame() {
        let layout = FrameLayout::new(&[], &[], 8);
        assert_eq!(layout.size, 0);
        assert!(layout.padding().is_empty());
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(9, 8), 16);
        assert_eq!(align_to(5, 1), 5);
    }
}
