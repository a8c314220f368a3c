//! Typed access to fields of memory-mapped registers
//!
//! A [`BitField`] names a run of bits inside a 32-bit register that lives at
//! a fixed byte offset from a peripheral base address. A [`RegisterBlock`]
//! is anything that can read and write those words. Field writes always go
//! through a read-modify-write that preserves every bit outside the field.
//!
//! ```
//! use hal_abstractions::BitField;
//!
//! // RCC_BDCR.RTCEN on STM32F4: offset 0x70, bit 15
//! const RTCEN: BitField = BitField::bit(0x70, 15);
//! assert_eq!(RTCEN.mask(), 0x0000_8000);
//! assert_eq!(RTCEN.insert(0x0000_0101, 1), 0x0000_8101);
//! ```

/// A named bit field inside a 32-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitField {
    offset: usize,
    bit: u8,
    width: u8,
}

impl BitField {
    /// Describe `width` bits starting at `bit` in the register `offset` bytes
    /// from the block base.
    ///
    /// Panics (at compile time when used in a `const`) if the field is empty,
    /// crosses bit 31, or the offset is not word aligned.
    pub const fn new(offset: usize, bit: u8, width: u8) -> Self {
        assert!(width > 0, "bit field must be at least one bit wide");
        assert!(
            bit as u32 + width as u32 <= 32,
            "bit field must fit in a 32-bit register"
        );
        assert!(offset % 4 == 0, "register offset must be word aligned");
        Self { offset, bit, width }
    }

    /// A single-bit field
    pub const fn bit(offset: usize, bit: u8) -> Self {
        Self::new(offset, bit, 1)
    }

    /// Byte offset of the containing register from the block base
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the least significant bit of the field
    pub const fn position(&self) -> u8 {
        self.bit
    }

    /// Number of bits in the field
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Mask of the field's bits in register position
    pub const fn mask(&self) -> u32 {
        let ones = if self.width == 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        ones << self.bit
    }

    /// Field value extracted from a full register word
    pub const fn extract(&self, word: u32) -> u32 {
        (word & self.mask()) >> self.bit
    }

    /// `word` with the field replaced by `value`; excess high bits of `value`
    /// are dropped and all bits outside the field are kept.
    pub const fn insert(&self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value << self.bit) & self.mask())
    }
}

/// A block of 32-bit registers addressed by byte offset
///
/// Takes `&self` for writes: the block stands for hardware that other code
/// may also hold a handle to.
pub trait RegisterBlock {
    /// Read the register at `offset`
    fn read_word(&self, offset: usize) -> u32;

    /// Write the whole register at `offset`
    fn write_word(&self, offset: usize, value: u32);

    /// Read one field
    fn read_field(&self, field: BitField) -> u32 {
        field.extract(self.read_word(field.offset()))
    }

    /// Read-modify-write one field, leaving every other bit untouched
    fn modify_field(&self, field: BitField, value: u32) {
        let word = self.read_word(field.offset());
        self.write_word(field.offset(), field.insert(word, value));
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &T {
    fn read_word(&self, offset: usize) -> u32 {
        (**self).read_word(offset)
    }

    fn write_word(&self, offset: usize, value: u32) {
        (**self).write_word(offset, value)
    }
}

/// A sticky one-bit control flag
///
/// Once set, the bit is expected to stay set until power loss; there is
/// deliberately no `clear`.
#[derive(Debug, Clone, Copy)]
pub struct ControlBit<R> {
    block: R,
    field: BitField,
}

impl<R: RegisterBlock> ControlBit<R> {
    /// Wrap a single-bit field of `block`
    pub fn new(block: R, field: BitField) -> Self {
        assert!(field.width == 1, "control bit must be one bit wide");
        Self { block, field }
    }

    /// The wrapped field
    pub fn field(&self) -> BitField {
        self.field
    }

    /// Whether the bit reads back as set
    pub fn is_set(&self) -> bool {
        self.block.read_field(self.field) != 0
    }

    /// Set the bit unless it is already set.
    ///
    /// Returns `true` if a write was issued.
    pub fn set(&self) -> bool {
        if self.is_set() {
            return false;
        }
        self.block.modify_field(self.field, 1);
        true
    }
}
