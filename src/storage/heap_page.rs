use super::error::{StorageError, StorageResult};
use super::schema::TupleDesc;
use super::tuple::{RecordId, Tuple};
use super::{page_size, PageNumber, TableId};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Identity of one page: the owning table's id plus the page's position in
/// the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapPageId {
    pub table_id: TableId,
    pub page_no: PageNumber,
}

impl HeapPageId {
    pub fn new(table_id: TableId, page_no: PageNumber) -> Self {
        Self { table_id, page_no }
    }
}

/// In-memory form of one on-disk page.
///
/// On disk a page is a slot bitmap followed by `num_slots` fixed-size tuple
/// slots and zero padding. Bit `i` of the bitmap (low bit first within each
/// byte) is set iff slot `i` holds a live tuple. With `ts = tuple_size`:
///
///   num_slots   = floor((page_size * 8) / (ts * 8 + 1))
///   header_size = ceil(num_slots / 8)
pub struct HeapPage {
    pid: HeapPageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Number of tuple slots a page holds for the given schema.
    pub fn num_slots(desc: &TupleDesc) -> usize {
        (page_size() * 8) / (desc.tuple_size() * 8 + 1)
    }

    /// Size of the slot bitmap in bytes for the given schema.
    pub fn header_size(desc: &TupleDesc) -> usize {
        Self::num_slots(desc).div_ceil(8)
    }

    /// Byte buffer of an empty page, suitable for appending to a file.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    /// Parse a page from exactly `page_size()` bytes.
    ///
    /// Live tuples are decoded slot by slot in schema order and stamped with
    /// their `RecordId`; unused slots are skipped. The raw buffer is retained
    /// as the page's before-image.
    pub fn parse(pid: HeapPageId, data: &[u8], desc: Arc<TupleDesc>) -> StorageResult<HeapPage> {
        if data.len() != page_size() {
            return Err(StorageError::InvalidPageData(format!(
                "expected {} bytes, got {}",
                page_size(),
                data.len()
            )));
        }

        let num_slots = Self::num_slots(&desc);
        let header_size = Self::header_size(&desc);
        let tuple_size = desc.tuple_size();

        let header = data[..header_size].to_vec();
        let mut tuples = Vec::with_capacity(num_slots);
        let mut offset = header_size;
        for slot in 0..num_slots {
            if Self::header_bit(&header, slot) {
                let mut t = Tuple::deserialize(desc.clone(), &data[offset..offset + tuple_size])?;
                t.set_record_id(Some(RecordId::new(pid, slot)));
                tuples.push(Some(t));
            } else {
                tuples.push(None);
            }
            offset += tuple_size;
        }

        Ok(HeapPage {
            pid,
            desc,
            header,
            tuples,
            dirtier: None,
            before_image: data.to_vec(),
        })
    }

    /// Emit the page in its on-disk form: header, slots (zeroes for unused
    /// ones), zero padding up to `page_size()`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(page_size());
        out.extend_from_slice(&self.header);
        let tuple_size = self.desc.tuple_size();
        for tuple in &self.tuples {
            match tuple {
                Some(t) => t.serialize(&mut out),
                None => out.extend(std::iter::repeat(0u8).take(tuple_size)),
            }
        }
        out.resize(page_size(), 0);
        out
    }

    pub fn id(&self) -> HeapPageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    fn header_bit(header: &[u8], slot: usize) -> bool {
        (header[slot / 8] >> (slot % 8)) & 1 == 1
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.tuples.len() && Self::header_bit(&self.header, slot)
    }

    /// Set or clear the used bit for `slot`.
    pub fn mark_slot_used(&mut self, slot: usize, used: bool) -> StorageResult<()> {
        if slot >= self.tuples.len() {
            return Err(StorageError::InvalidSlot(slot));
        }
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
        Ok(())
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.tuples.len())
            .filter(|&slot| !Self::header_bit(&self.header, slot))
            .count()
    }

    /// Live tuples in slot-ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().filter_map(|slot| slot.as_ref())
    }

    /// Place `t` in the lowest-numbered free slot, stamping its `RecordId`
    /// and dirtying the page on behalf of `tid`.
    pub fn insert_tuple(&mut self, tid: TransactionId, mut t: Tuple) -> StorageResult<()> {
        if t.tuple_desc().as_ref() != self.desc.as_ref() {
            return Err(StorageError::SchemaMismatch(
                "tuple schema does not match page schema".to_string(),
            ));
        }
        let slot = (0..self.tuples.len())
            .find(|&slot| !Self::header_bit(&self.header, slot))
            .ok_or(StorageError::NoEmptySlot)?;
        t.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.tuples[slot] = Some(t);
        self.mark_slot_used(slot, true)?;
        self.mark_dirty(true, tid);
        Ok(())
    }

    /// Remove the tuple at `t`'s recorded location and dirty the page.
    ///
    /// The tuple must carry a `RecordId` naming this page and a currently
    /// used slot.
    pub fn delete_tuple(&mut self, tid: TransactionId, t: &Tuple) -> StorageResult<()> {
        let rid = t.record_id().ok_or(StorageError::TupleNotOnPage)?;
        if rid.page_id != self.pid || rid.slot >= self.tuples.len() || !self.is_slot_used(rid.slot)
        {
            return Err(StorageError::TupleNotOnPage);
        }
        self.tuples[rid.slot] = None;
        self.mark_slot_used(rid.slot, false)?;
        self.mark_dirty(true, tid);
        Ok(())
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtier = if dirty { Some(tid) } else { None };
    }

    /// The transaction that last dirtied this page, if it is dirty.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// The page as it looked when last snapshotted (recovery hook).
    pub fn before_image(&self) -> StorageResult<HeapPage> {
        HeapPage::parse(self.pid, &self.before_image, self.desc.clone())
    }

    /// Snapshot the current contents as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image = self.serialize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Field, Type};

    fn int_pair_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::from_types(vec![Type::Int, Type::Int]))
    }

    fn pair(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
        Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    fn tid() -> TransactionId {
        TransactionId::new()
    }

    #[test]
    fn test_slot_geometry() {
        let desc = int_pair_desc();
        // 4096-byte page, 8-byte tuples: (4096 * 8) / (8 * 8 + 1) = 504
        assert_eq!(HeapPage::num_slots(&desc), 504);
        assert_eq!(HeapPage::header_size(&desc), 63);
    }

    #[test]
    fn test_parse_empty_page() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let page = HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        assert_eq!(page.num_empty_slots(), HeapPage::num_slots(&desc));
        assert_eq!(page.iter().count(), 0);
        assert!(page.is_dirty().is_none());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let result = HeapPage::parse(pid, &[0u8; 100], desc);
        assert!(matches!(result, Err(StorageError::InvalidPageData(_))));
    }

    #[test]
    fn test_round_trip_sparse_slots() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(7, 3);
        let mut page =
            HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();

        // Occupy slots 0, 2 and 5 by hand to leave a gap pattern.
        for (slot, (a, b)) in [(0, (1, 2)), (2, (3, 4)), (5, (5, 6))] {
            let mut t = pair(&desc, a, b);
            t.set_record_id(Some(RecordId::new(pid, slot)));
            page.tuples[slot] = Some(t);
            page.mark_slot_used(slot, true).unwrap();
        }

        let bytes = page.serialize();
        assert_eq!(bytes.len(), crate::storage::page_size());

        let parsed = HeapPage::parse(pid, &bytes, desc.clone()).unwrap();
        let live: Vec<&Tuple> = parsed.iter().collect();
        assert_eq!(live.len(), 3);
        for (t, (slot, (a, b))) in live.iter().zip([(0, (1, 2)), (2, (3, 4)), (5, (5, 6))]) {
            assert_eq!(t.fields(), &[Field::Int(a), Field::Int(b)]);
            assert_eq!(t.record_id(), Some(RecordId::new(pid, slot)));
        }
        assert_eq!(parsed.num_empty_slots(), HeapPage::num_slots(&desc) - 3);
    }

    #[test]
    fn test_insert_fills_lowest_slot_and_dirties() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let mut page =
            HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        let empty_before = page.num_empty_slots();

        let t = tid();
        page.insert_tuple(t, pair(&desc, 10, 20)).unwrap();
        assert_eq!(page.num_empty_slots(), empty_before - 1);
        assert_eq!(page.is_dirty(), Some(t));
        assert!(page.is_slot_used(0));

        // Free slot 0 and insert again: the hole is refilled first.
        let first = page.iter().next().unwrap().clone();
        page.delete_tuple(t, &first).unwrap();
        page.insert_tuple(t, pair(&desc, 30, 40)).unwrap();
        let refilled = page.iter().next().unwrap();
        assert_eq!(refilled.record_id(), Some(RecordId::new(pid, 0)));
        assert_eq!(refilled.fields(), &[Field::Int(30), Field::Int(40)]);
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let desc = int_pair_desc();
        let other = Arc::new(TupleDesc::from_types(vec![Type::Int]));
        let pid = HeapPageId::new(1, 0);
        let mut page = HeapPage::parse(pid, &HeapPage::empty_page_data(), desc).unwrap();
        let t = Tuple::new(other, vec![Field::Int(1)]).unwrap();
        assert!(matches!(
            page.insert_tuple(tid(), t),
            Err(StorageError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_insert_into_full_page() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let mut page =
            HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        let t = tid();
        for i in 0..HeapPage::num_slots(&desc) {
            page.insert_tuple(t, pair(&desc, i as i32, 0)).unwrap();
        }
        assert_eq!(page.num_empty_slots(), 0);
        assert!(matches!(
            page.insert_tuple(t, pair(&desc, -1, -1)),
            Err(StorageError::NoEmptySlot)
        ));
    }

    #[test]
    fn test_delete_rejects_foreign_tuple() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let mut page =
            HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        let t = tid();

        // No record id at all.
        let detached = pair(&desc, 1, 2);
        assert!(matches!(
            page.delete_tuple(t, &detached),
            Err(StorageError::TupleNotOnPage)
        ));

        // Record id naming another page.
        let mut foreign = pair(&desc, 1, 2);
        foreign.set_record_id(Some(RecordId::new(HeapPageId::new(1, 9), 0)));
        assert!(matches!(
            page.delete_tuple(t, &foreign),
            Err(StorageError::TupleNotOnPage)
        ));

        // Unused slot on this page.
        let mut unused = pair(&desc, 1, 2);
        unused.set_record_id(Some(RecordId::new(pid, 3)));
        assert!(matches!(
            page.delete_tuple(t, &unused),
            Err(StorageError::TupleNotOnPage)
        ));
    }

    #[test]
    fn test_before_image_is_load_snapshot() {
        let desc = int_pair_desc();
        let pid = HeapPageId::new(1, 0);
        let mut page =
            HeapPage::parse(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        page.insert_tuple(tid(), pair(&desc, 1, 1)).unwrap();

        let before = page.before_image().unwrap();
        assert_eq!(before.iter().count(), 0);

        page.set_before_image();
        let after = page.before_image().unwrap();
        assert_eq!(after.iter().count(), 1);
    }
}
