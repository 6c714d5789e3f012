use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SmallError;
use crate::field::Field;
use crate::page_id::{PageId, RecordId};
use crate::row::Schema;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;

pub const DEFAULT_PAGE_SIZE: usize = 4096;
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Page size is process-global and settable at startup; changing it
/// invalidates on-disk layout, so this should only ever be called before
/// any file is opened.
pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Number of heap-page slots that fit in one page of `page_size()` bytes
/// for tuples of `tuple_size` bytes: the largest N such that
/// `ceil(N/8) + N*tuple_size <= page_size`.
pub fn heap_slot_count(tuple_size: usize) -> usize {
    // N*8*tuple_size + N <= page_size*8
    (page_size() * 8) / (tuple_size * 8 + 1)
}

pub fn heap_header_size(slot_count: usize) -> usize {
    (slot_count + 7) / 8
}

/// The capability set every page kind in the pool exposes: identity,
/// byte encoding, and the in-memory dirty marker. The buffer pool only
/// ever touches pages through this surface.
pub trait Page {
    fn id(&self) -> PageId;
    fn get_page_data(&self) -> Vec<u8>;
    fn is_dirty(&self) -> Option<TransactionId>;
    fn mark_dirty(&mut self, dirty: Option<TransactionId>);
}

/// `[header bitmap: ceil(N/8) bytes][tuple 0][tuple 1]...[tuple N-1]`.
/// Bitmap byte i, bit j addresses slot `8*i + j`. Unused slots read as
/// zero; `INSERT` picks the lowest cleared bit; `DELETE` clears a bit and
/// zeroes its payload.
pub struct HeapPage {
    id: PageId,
    schema: Schema,
    header: Vec<u8>,
    slot_count: usize,
    tuple_size: usize,
    slots: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
}

impl HeapPage {
    pub fn new_empty(id: PageId, schema: Schema) -> Self {
        let tuple_size = schema.byte_size();
        let slot_count = heap_slot_count(tuple_size);
        let header = vec![0u8; heap_header_size(slot_count)];
        Self {
            id,
            schema,
            header,
            slot_count,
            tuple_size,
            slots: vec![None; slot_count],
            dirty: None,
        }
    }

    pub fn from_bytes(id: PageId, schema: Schema, bytes: &[u8]) -> Self {
        let tuple_size = schema.byte_size();
        let slot_count = heap_slot_count(tuple_size);
        let header_size = heap_header_size(slot_count);
        let header = bytes[..header_size].to_vec();

        let mut slots = Vec::with_capacity(slot_count);
        let mut offset = header_size;
        for slot in 0..slot_count {
            let tuple_bytes = &bytes[offset..offset + tuple_size];
            if Self::slot_used(&header, slot) {
                let mut tuple = Tuple::decode(std::sync::Arc::new(schema.clone()), tuple_bytes);
                tuple.set_record_id(RecordId::new(id, slot));
                slots.push(Some(tuple));
            } else {
                slots.push(None);
            }
            offset += tuple_size;
        }

        Self {
            id,
            schema,
            header,
            slot_count,
            tuple_size,
            slots,
            dirty: None,
        }
    }

    fn slot_used(header: &[u8], slot: usize) -> bool {
        let byte = header[slot / 8];
        (byte & (1 << (slot % 8))) != 0
    }

    fn set_slot_used(header: &mut [u8], slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            header[slot / 8] |= mask;
        } else {
            header[slot / 8] &= !mask;
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn num_used_slots(&self) -> usize {
        self.slot_count - self.num_empty_slots()
    }

    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Insert into the lowest cleared bit. Fails if the page has no empty
    /// slot.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<(), SmallError> {
        let slot = (0..self.slot_count)
            .find(|&i| self.slots[i].is_none())
            .ok_or_else(|| SmallError::db_exception("heap page has no empty slot"))?;

        Self::set_slot_used(&mut self.header, slot, true);
        tuple.set_record_id(RecordId::new(self.id, slot));
        self.slots[slot] = Some(tuple);
        Ok(())
    }

    /// Clear the slot the record id names and zero its payload.
    pub fn delete_tuple(&mut self, rid: RecordId) -> Result<(), SmallError> {
        if rid.page_id != self.id {
            return Err(SmallError::db_exception(
                "tuple does not belong to this page",
            ));
        }
        if self.slots[rid.slot_index].is_none() {
            return Err(SmallError::db_exception("slot is already empty"));
        }
        Self::set_slot_used(&mut self.header, rid.slot_index, false);
        self.slots[rid.slot_index] = None;
        Ok(())
    }
}

impl Page for HeapPage {
    fn id(&self) -> PageId {
        self.id
    }

    fn get_page_data(&self) -> Vec<u8> {
        let mut bytes = self.header.clone();
        bytes.resize(heap_header_size(self.slot_count), 0);
        let empty_tuple = vec![0u8; self.tuple_size];
        for slot in &self.slots {
            match slot {
                Some(t) => bytes.extend(t.encode()),
                None => bytes.extend(empty_tuple.iter().copied()),
            }
        }
        bytes.resize(page_size(), 0);
        bytes
    }

    fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    fn mark_dirty(&mut self, dirty: Option<TransactionId>) {
        self.dirty = dirty;
    }
}
