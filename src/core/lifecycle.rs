//! Lifecycle untuk value hasil decode
//!
//! Dua tanggung jawab:
//! - Alokasi sequence hasil decode: count sudah divalidasi terhadap bound,
//!   lalu di-reserve secara fallible. Kalau elemen gagal, Vec di-drop
//!   bersama elemen yang sudah jadi.
//! - `ReplyStore`: pemilik response yang sudah di-decode sampai caller
//!   secara eksplisit memanggil `dispose` atau `take`.

use tracing::{debug, trace};

use crate::error::{Result, XdrError};
use crate::protocol::{decode_compound_res, CompoundRes};

/// Reserve Vec untuk `count` elemen tanpa panic saat alokasi gagal
pub(crate) fn alloc_seq<T>(count: usize, what: &'static str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|_| XdrError::Alloc { what, count })?;
    Ok(items)
}

/// Handle ke reply di dalam `ReplyStore`.
///
/// Slot bisa dipakai ulang setelah reply dilepas, tapi generation slot
/// naik setiap kali dilepas. Handle lama tidak pernah cocok dengan reply
/// baru di slot yang sama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyHandle {
    index: usize,
    generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    reply: Option<CompoundRes>,
}

/// Pemilik response CB_COMPOUND yang sudah di-decode
///
/// Jumlah slot dibatasi oleh jumlah reply hidup terbanyak, bukan oleh
/// total reply yang pernah disimpan.
#[derive(Debug, Default)]
pub struct ReplyStore {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl ReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode response dan simpan hasilnya.
    ///
    /// Kalau decode gagal, tidak ada yang disimpan: semua array yang sudah
    /// teralokasi untuk response ini di-drop sebelum fungsi return.
    pub fn decode(&mut self, buf: &[u8]) -> Result<ReplyHandle> {
        let res = decode_compound_res(buf)?;
        Ok(self.insert(res))
    }

    /// Simpan response yang sudah dimiliki caller
    pub fn insert(&mut self, res: CompoundRes) -> ReplyHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.reply = Some(res);
        self.live += 1;

        let handle = ReplyHandle {
            index,
            generation: slot.generation,
        };
        trace!(target: "cb-lifecycle", index, live = self.live, "reply stored");
        handle
    }

    fn slot(&self, handle: ReplyHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
    }

    /// Akses reply yang masih hidup
    pub fn get(&self, handle: ReplyHandle) -> Option<&CompoundRes> {
        self.slot(handle)?.reply.as_ref()
    }

    /// Pindahkan ownership reply ke caller. Slot langsung bisa dipakai ulang.
    pub fn take(&mut self, handle: ReplyHandle) -> Option<CompoundRes> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)?;
        let res = slot.reply.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(res)
    }

    /// Lepas reply. Returns `false` jika handle sudah di-dispose,
    /// sudah di-take, atau slotnya sudah dipakai reply lain.
    pub fn dispose(&mut self, handle: ReplyHandle) -> bool {
        match self.take(handle) {
            Some(res) => {
                drop(res);
                trace!(target: "cb-lifecycle", index = handle.index, live = self.live, "reply disposed");
                true
            }
            None => {
                debug!(target: "cb-lifecycle", index = handle.index, "dispose of released handle ignored");
                false
            }
        }
    }

    /// Jumlah reply yang belum di-dispose
    #[inline(always)]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Lepas semua reply. Semua handle lama menjadi invalid.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.reply.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.live = 0;
    }

    /// Iterasi reply yang masih hidup, urut sesuai index slot
    pub fn iter(&self) -> impl Iterator<Item = (ReplyHandle, &CompoundRes)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.reply.as_ref().map(|res| {
                (
                    ReplyHandle {
                        index,
                        generation: slot.generation,
                    },
                    res,
                )
            })
        })
    }
}
