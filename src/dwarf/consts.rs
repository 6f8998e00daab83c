//! DWARF constants used by the reader.

// Tags
pub const DW_TAG_ARRAY_TYPE: u64 = 0x01;
pub const DW_TAG_ENUMERATION_TYPE: u64 = 0x04;
pub const DW_TAG_FORMAL_PARAMETER: u64 = 0x05;
pub const DW_TAG_MEMBER: u64 = 0x0d;
pub const DW_TAG_POINTER_TYPE: u64 = 0x0f;
pub const DW_TAG_COMPILE_UNIT: u64 = 0x11;
pub const DW_TAG_STRUCTURE_TYPE: u64 = 0x13;
pub const DW_TAG_SUBROUTINE_TYPE: u64 = 0x15;
pub const DW_TAG_TYPEDEF: u64 = 0x16;
pub const DW_TAG_UNION_TYPE: u64 = 0x17;
pub const DW_TAG_UNSPECIFIED_PARAMETERS: u64 = 0x18;
pub const DW_TAG_SUBRANGE_TYPE: u64 = 0x21;
pub const DW_TAG_BASE_TYPE: u64 = 0x24;
pub const DW_TAG_CONST_TYPE: u64 = 0x26;
pub const DW_TAG_ENUMERATOR: u64 = 0x28;
pub const DW_TAG_VARIABLE: u64 = 0x34;
pub const DW_TAG_VOLATILE_TYPE: u64 = 0x35;
pub const DW_TAG_RESTRICT_TYPE: u64 = 0x37;
pub const DW_TAG_ATOMIC_TYPE: u64 = 0x47;

// Attributes
pub const DW_AT_NAME: u64 = 0x03;
pub const DW_AT_BYTE_SIZE: u64 = 0x0b;
pub const DW_AT_BIT_SIZE: u64 = 0x0d;
pub const DW_AT_CONST_VALUE: u64 = 0x1c;
pub const DW_AT_UPPER_BOUND: u64 = 0x2f;
pub const DW_AT_COUNT: u64 = 0x37;
pub const DW_AT_DATA_MEMBER_LOCATION: u64 = 0x38;
pub const DW_AT_DECLARATION: u64 = 0x3c;
pub const DW_AT_PROTOTYPED: u64 = 0x27;
pub const DW_AT_ENCODING: u64 = 0x3e;
pub const DW_AT_TYPE: u64 = 0x49;
pub const DW_AT_DATA_BIT_OFFSET: u64 = 0x6b;
pub const DW_AT_STR_OFFSETS_BASE: u64 = 0x72;
pub const DW_AT_ALIGNMENT: u64 = 0x88;

// Forms
pub const DW_FORM_ADDR: u64 = 0x01;
pub const DW_FORM_BLOCK2: u64 = 0x03;
pub const DW_FORM_BLOCK4: u64 = 0x04;
pub const DW_FORM_DATA2: u64 = 0x05;
pub const DW_FORM_DATA4: u64 = 0x06;
pub const DW_FORM_DATA8: u64 = 0x07;
pub const DW_FORM_STRING: u64 = 0x08;
pub const DW_FORM_BLOCK: u64 = 0x09;
pub const DW_FORM_BLOCK1: u64 = 0x0a;
pub const DW_FORM_DATA1: u64 = 0x0b;
pub const DW_FORM_FLAG: u64 = 0x0c;
pub const DW_FORM_SDATA: u64 = 0x0d;
pub const DW_FORM_STRP: u64 = 0x0e;
pub const DW_FORM_UDATA: u64 = 0x0f;
pub const DW_FORM_REF_ADDR: u64 = 0x10;
pub const DW_FORM_REF1: u64 = 0x11;
pub const DW_FORM_REF2: u64 = 0x12;
pub const DW_FORM_REF4: u64 = 0x13;
pub const DW_FORM_REF8: u64 = 0x14;
pub const DW_FORM_REF_UDATA: u64 = 0x15;
pub const DW_FORM_INDIRECT: u64 = 0x16;
pub const DW_FORM_SEC_OFFSET: u64 = 0x17;
pub const DW_FORM_EXPRLOC: u64 = 0x18;
pub const DW_FORM_FLAG_PRESENT: u64 = 0x19;
pub const DW_FORM_STRX: u64 = 0x1a;
pub const DW_FORM_ADDRX: u64 = 0x1b;
pub const DW_FORM_REF_SUP4: u64 = 0x1c;
pub const DW_FORM_STRP_SUP: u64 = 0x1d;
pub const DW_FORM_DATA16: u64 = 0x1e;
pub const DW_FORM_LINE_STRP: u64 = 0x1f;
pub const DW_FORM_REF_SIG8: u64 = 0x20;
pub const DW_FORM_IMPLICIT_CONST: u64 = 0x21;
pub const DW_FORM_LOCLISTX: u64 = 0x22;
pub const DW_FORM_RNGLISTX: u64 = 0x23;
pub const DW_FORM_REF_SUP8: u64 = 0x24;
pub const DW_FORM_STRX1: u64 = 0x25;
pub const DW_FORM_STRX2: u64 = 0x26;
pub const DW_FORM_STRX3: u64 = 0x27;
pub const DW_FORM_STRX4: u64 = 0x28;
pub const DW_FORM_ADDRX1: u64 = 0x29;
pub const DW_FORM_ADDRX2: u64 = 0x2a;
pub const DW_FORM_ADDRX3: u64 = 0x2b;
pub const DW_FORM_ADDRX4: u64 = 0x2c;

// Base type encodings
pub const DW_ATE_BOOLEAN: u64 = 0x02;
pub const DW_ATE_COMPLEX_FLOAT: u64 = 0x03;
pub const DW_ATE_FLOAT: u64 = 0x04;
pub const DW_ATE_SIGNED: u64 = 0x05;
pub const DW_ATE_SIGNED_CHAR: u64 = 0x06;
pub const DW_ATE_UNSIGNED: u64 = 0x07;
pub const DW_ATE_UNSIGNED_CHAR: u64 = 0x08;

// Unit types (DWARF 5)
pub const DW_UT_TYPE: u8 = 0x02;
pub const DW_UT_SKELETON: u8 = 0x04;
pub const DW_UT_SPLIT_COMPILE: u8 = 0x05;
pub const DW_UT_SPLIT_TYPE: u8 = 0x06;

// Location operations
pub const DW_OP_PLUS_UCONST: u8 = 0x23;
