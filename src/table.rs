use crate::error::RecordError;
use crate::types::*;

// ─── Scalar decoding ────────────────────────────────────────────────────────

/// Little-endian scalar that can be read from a table slot or vector element.
pub trait LeScalar: Sized + Copy {
    const SIZE: usize;
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_le_scalar {
    ($($ty:ty),*) => {
        $(
            impl LeScalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_le_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl LeScalar for bool {
    const SIZE: usize = 1;

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[inline]
fn read_at<T: LeScalar>(buf: &[u8], pos: usize) -> Result<T, RecordError> {
    let end = pos.checked_add(T::SIZE).ok_or(RecordError::InvalidBuffer("offset overflow"))?;
    let bytes = buf
        .get(pos..end)
        .ok_or(RecordError::InvalidBuffer("read past end of buffer"))?;
    Ok(T::read_le(bytes))
}

/// Follow the u32 offset stored at `pos`.
#[inline]
fn follow_uoffset(buf: &[u8], pos: usize) -> Result<usize, RecordError> {
    let rel = read_at::<u32>(buf, pos)? as usize;
    let target = pos
        .checked_add(rel)
        .ok_or(RecordError::InvalidBuffer("offset overflow"))?;
    if target >= buf.len() {
        return Err(RecordError::InvalidBuffer("offset points past end of buffer"));
    }
    Ok(target)
}

// ─── TableView (zero-copy) ──────────────────────────────────────────────────

/// Zero-copy, bounds-checked view of one serialized table.
/// Every read validates against the underlying slice, so arbitrary input
/// yields `InvalidBuffer` rather than undefined behaviour.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    buf: &'a [u8],
    loc: usize,
    vtable: usize,
    vtable_len: usize,
}

impl<'a> TableView<'a> {
    /// View the root table of a finished buffer.
    pub fn root(buf: &'a [u8]) -> Result<Self, RecordError> {
        let loc = follow_uoffset(buf, 0)?;
        Self::at(buf, loc)
    }

    /// View the table starting at `loc`.
    pub fn at(buf: &'a [u8], loc: usize) -> Result<Self, RecordError> {
        let soffset = read_at::<i32>(buf, loc)? as i64;
        let vtable = loc as i64 - soffset;
        if vtable < 0 || vtable as usize + SIZE_VOFFSET * 2 > buf.len() {
            return Err(RecordError::InvalidBuffer("vtable out of bounds"));
        }
        let vtable = vtable as usize;
        let vtable_len = read_at::<u16>(buf, vtable)? as usize;
        if vtable_len < SIZE_VOFFSET * 2 || vtable + vtable_len > buf.len() {
            return Err(RecordError::InvalidBuffer("vtable length out of bounds"));
        }
        Ok(Self {
            buf,
            loc,
            vtable,
            vtable_len,
        })
    }

    /// Absolute position of a present field, `None` if the slot is absent.
    pub fn field_pos(&self, offset: u16) -> Result<Option<usize>, RecordError> {
        let offset = offset as usize;
        if offset + SIZE_VOFFSET > self.vtable_len {
            return Ok(None);
        }
        match read_at::<u16>(self.buf, self.vtable + offset)? {
            0 => Ok(None),
            rel => Ok(Some(self.loc + rel as usize)),
        }
    }

    /// Presence check against the vtable. Distinguishes "never written"
    /// from "written with the default value".
    #[inline]
    pub fn has_field(&self, offset: u16) -> bool {
        matches!(self.field_pos(offset), Ok(Some(_)))
    }

    /// Slot offsets the vtable marks as present.
    pub fn present_offsets(&self) -> impl Iterator<Item = u16> + '_ {
        (VTABLE_FIELDS_START as usize..self.vtable_len)
            .step_by(SIZE_VOFFSET)
            .map(|o| o as u16)
            .filter(move |o| self.has_field(*o))
    }

    pub fn scalar<T: LeScalar>(&self, offset: u16) -> Result<Option<T>, RecordError> {
        match self.field_pos(offset)? {
            Some(pos) => read_at::<T>(self.buf, pos).map(Some),
            None => Ok(None),
        }
    }

    pub fn string(&self, offset: u16) -> Result<Option<&'a str>, RecordError> {
        match self.field_pos(offset)? {
            Some(pos) => read_string(self.buf, follow_uoffset(self.buf, pos)?).map(Some),
            None => Ok(None),
        }
    }

    pub fn table(&self, offset: u16) -> Result<Option<TableView<'a>>, RecordError> {
        match self.field_pos(offset)? {
            Some(pos) => TableView::at(self.buf, follow_uoffset(self.buf, pos)?).map(Some),
            None => Ok(None),
        }
    }

    pub fn vector(&self, offset: u16) -> Result<Option<VectorView<'a>>, RecordError> {
        match self.field_pos(offset)? {
            Some(pos) => VectorView::at(self.buf, follow_uoffset(self.buf, pos)?).map(Some),
            None => Ok(None),
        }
    }
}

fn read_string(buf: &[u8], pos: usize) -> Result<&str, RecordError> {
    let len = read_at::<u32>(buf, pos)? as usize;
    let start = pos + SIZE_UOFFSET;
    let bytes = start
        .checked_add(len)
        .and_then(|end| buf.get(start..end))
        .ok_or(RecordError::InvalidBuffer("string out of bounds"))?;
    std::str::from_utf8(bytes).map_err(|_| RecordError::InvalidBuffer("string is not UTF-8"))
}

// ─── VectorView ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a> {
    buf: &'a [u8],
    start: usize,
    len: usize,
}

impl<'a> VectorView<'a> {
    fn at(buf: &'a [u8], pos: usize) -> Result<Self, RecordError> {
        let len = read_at::<u32>(buf, pos)? as usize;
        Ok(Self {
            buf,
            start: pos + SIZE_UOFFSET,
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check that `len` elements of `size` bytes fit in the buffer before
    /// anything is decoded.
    pub(crate) fn check_span(&self, size: usize) -> Result<(), RecordError> {
        let fits = self
            .len
            .checked_mul(size)
            .and_then(|n| n.checked_add(self.start))
            .is_some_and(|end| end <= self.buf.len());
        if fits {
            Ok(())
        } else {
            Err(RecordError::InvalidBuffer("vector out of bounds"))
        }
    }

    pub fn scalars<T: LeScalar>(&self) -> Result<Vec<T>, RecordError> {
        self.check_span(T::SIZE)?;
        (0..self.len)
            .map(|i| read_at::<T>(self.buf, self.start + i * T::SIZE))
            .collect()
    }

    pub fn strings(&self) -> Result<Vec<&'a str>, RecordError> {
        self.check_span(SIZE_UOFFSET)?;
        (0..self.len)
            .map(|i| {
                let pos = follow_uoffset(self.buf, self.start + i * SIZE_UOFFSET)?;
                read_string(self.buf, pos)
            })
            .collect()
    }

    /// Element tables, decoded lazily so a bad element surfaces only when
    /// it is reached.
    pub fn tables(&self) -> Result<impl Iterator<Item = Result<TableView<'a>, RecordError>> + 'a, RecordError> {
        self.check_span(SIZE_UOFFSET)?;
        let vector = *self;
        Ok((0..self.len).map(move |i| vector.table_at(i)))
    }

    /// Element table `i` of a vector of tables.
    pub fn table_at(&self, i: usize) -> Result<TableView<'a>, RecordError> {
        if i >= self.len {
            return Err(RecordError::InvalidBuffer("vector index out of range"));
        }
        let pos = follow_uoffset(self.buf, self.start + i * SIZE_UOFFSET)?;
        TableView::at(self.buf, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatbuffers::FlatBufferBuilder;

    fn build_sample() -> Vec<u8> {
        let mut fbb = FlatBufferBuilder::new();
        let name = fbb.create_string("Ana");
        let pets = [fbb.create_string("Rex"), fbb.create_string("Mia")];
        let pets = fbb.create_vector(&pets);
        let scores = fbb.create_vector(&[1i32, 2, 3]);
        let start = fbb.start_table();
        fbb.push_slot::<i32>(field_offset(1), 30, 0);
        fbb.push_slot::<i32>(field_offset(5), 0, 0); // elided
        fbb.push_slot_always(field_offset(0), name);
        fbb.push_slot_always(field_offset(2), pets);
        fbb.push_slot_always(field_offset(3), scores);
        let root = fbb.end_table(start);
        fbb.finish(root, None);
        fbb.finished_data().to_vec()
    }

    #[test]
    fn test_reads_flatbuffers_builder_output() {
        let buf = build_sample();
        let table = TableView::root(&buf).unwrap();
        assert_eq!(table.string(field_offset(0)).unwrap(), Some("Ana"));
        assert_eq!(table.scalar::<i32>(field_offset(1)).unwrap(), Some(30));
        let pets = table.vector(field_offset(2)).unwrap().unwrap();
        assert_eq!(pets.strings().unwrap(), vec!["Rex", "Mia"]);
        let scores = table.vector(field_offset(3)).unwrap().unwrap();
        assert_eq!(scores.scalars::<i32>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_presence_follows_vtable() {
        let buf = build_sample();
        let table = TableView::root(&buf).unwrap();
        assert!(table.has_field(field_offset(1)));
        assert!(!table.has_field(field_offset(5)));
        assert!(!table.has_field(field_offset(40)));
        assert_eq!(table.scalar::<i32>(field_offset(5)).unwrap(), None);
        let present: Vec<u16> = table.present_offsets().collect();
        assert_eq!(present, vec![4, 6, 8, 10]);
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let buf = build_sample();
        assert!(matches!(
            TableView::root(&buf[..2]),
            Err(RecordError::InvalidBuffer(_))
        ));
        assert!(TableView::root(&[0xff, 0xff, 0xff, 0x7f]).is_err());
    }

    #[test]
    fn test_vector_length_is_bounds_checked() {
        let mut buf = build_sample();
        let table = TableView::root(&buf).unwrap();
        let pos = table.field_pos(field_offset(3)).unwrap().unwrap();
        let vec_pos = follow_uoffset(&buf, pos).unwrap();
        buf[vec_pos..vec_pos + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let table = TableView::root(&buf).unwrap();
        let scores = table.vector(field_offset(3)).unwrap().unwrap();
        assert!(matches!(scores.scalars::<i32>(), Err(RecordError::InvalidBuffer(_))));
    }
}
