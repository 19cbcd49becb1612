// ─── Binary Layout ──────────────────────────────────────────────────────────
//
//  Records are FlatBuffers tables. Every reference points backwards in
//  write order, which after the builder's back-to-front fill means
//  forwards in the finished buffer.
//
//  ┌──────────────────────────────────────────────┐
//  │ Root                                         │
//  │   root_offset: u32 (LE) → root table         │
//  │   [file_identifier: [u8; 4]]   (optional)    │
//  ├──────────────────────────────────────────────┤
//  │ VTable (per table shape)                     │
//  │   vtable_len:  u16 (LE)                      │
//  │   table_len:   u16 (LE)                      │
//  │   slot[i]:     u16 (LE)  0 = field absent    │
//  ├──────────────────────────────────────────────┤
//  │ Table                                        │
//  │   vtable_soffset: i32 (LE)  vtable = pos - x │
//  │   inline scalars / u32 offsets at slot[i]    │
//  ├──────────────────────────────────────────────┤
//  │ String:  len: u32, bytes, NUL                │
//  │ Vector:  len: u32, elements                  │
//  │   (strings/tables: u32 offset per element)   │
//  └──────────────────────────────────────────────┘

pub const SIZE_UOFFSET: usize = 4;
pub const SIZE_VOFFSET: usize = 2;
pub const FILE_IDENTIFIER_LEN: usize = 4;

/// Byte offset of the first field slot inside a vtable.
pub const VTABLE_FIELDS_START: u16 = 4;

/// Largest declaration id whose slot offset fits in a u16.
pub const MAX_FIELD_ID: u16 = (u16::MAX - VTABLE_FIELDS_START) / SIZE_VOFFSET as u16;

/// Vtable byte offset for the field with the given declaration id.
///
/// Ids above [`MAX_FIELD_ID`] map to 0, which is never a valid slot and
/// is rejected when a catalog is validated.
#[inline]
pub const fn field_offset(id: u16) -> u16 {
    if id > MAX_FIELD_ID {
        return 0;
    }
    VTABLE_FIELDS_START + id * SIZE_VOFFSET as u16
}
