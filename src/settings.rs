use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use log::warn;

use crate::error::StorageError;
use crate::pump::DEFAULT_THRESHOLD;
use crate::schedule::{Interval, MAX_INTERVALS, TimeOfDay, Weekdays};

const MAGIC: [u8; 4] = *b"BRUN";
const VERSION: u8 = 1;

// magic + version + sequence + threshold (LE) + record count
const HEADER_LEN: usize = 4 + 1 + 1 + 2 + 1;
// start hour, start minute, stop hour, stop minute, day mask
const RECORD_LEN: usize = 5;
// Padded to the 4-byte flash write unit
const IMAGE_LEN: usize = (HEADER_LEN + MAX_INTERVALS * RECORD_LEN).next_multiple_of(4);

type Loaded = (Vec<Interval, MAX_INTERVALS>, u16);

/// Schedule and threshold persisted as one fixed-size image, written to two
/// flash sectors in alternation with a wrapping sequence number. `load`
/// picks the newest valid slot; a store only ever erases the stale slot,
/// never the one holding the current image. With no valid slot anywhere the
/// defaults apply instead of failing the boot.
pub struct Settings<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> Settings<F> {
    /// `offset` must be aligned to the flash erase unit. The store occupies
    /// two erase units starting there.
    pub fn new(flash: F, offset: u32) -> Self {
        Self { flash, offset }
    }

    pub fn load(&mut self) -> Loaded {
        match self.newest() {
            Some((_, _, loaded)) => loaded,
            None => {
                warn!("settings: no valid image, using defaults");
                defaults()
            }
        }
    }

    pub fn store(&mut self, windows: &[Interval], threshold: u16) -> Result<(), StorageError> {
        let (target, sequence) = match self.newest() {
            Some((slot, sequence, _)) => (1 - slot, sequence.wrapping_add(1)),
            None => (0, 0),
        };
        let image = encode(sequence, windows, threshold);
        let start = self.slot_offset(target);
        self.flash
            .erase(start, start + F::ERASE_SIZE as u32)
            .map_err(|_| StorageError::Flash)?;
        self.flash
            .write(start, &image)
            .map_err(|_| StorageError::Flash)
    }

    fn slot_offset(&self, slot: usize) -> u32 {
        self.offset + slot as u32 * F::ERASE_SIZE as u32
    }

    fn read_slot(&mut self, slot: usize) -> Option<(u8, Loaded)> {
        let mut image = [0u8; IMAGE_LEN];
        self.flash.read(self.slot_offset(slot), &mut image).ok()?;
        decode(&image).ok()
    }

    fn newest(&mut self) -> Option<(usize, u8, Loaded)> {
        match (self.read_slot(0), self.read_slot(1)) {
            (Some((first, a)), Some((second, b))) => {
                // Serial-number comparison so the sequence may wrap
                if first.wrapping_sub(second) as i8 > 0 {
                    Some((0, first, a))
                } else {
                    Some((1, second, b))
                }
            }
            (Some((first, a)), None) => Some((0, first, a)),
            (None, Some((second, b))) => Some((1, second, b)),
            (None, None) => None,
        }
    }
}

fn defaults() -> Loaded {
    (Vec::new(), DEFAULT_THRESHOLD)
}

fn encode(sequence: u8, windows: &[Interval], threshold: u16) -> [u8; IMAGE_LEN] {
    let mut image = [0u8; IMAGE_LEN];
    image[0..4].copy_from_slice(&MAGIC);
    image[4] = VERSION;
    image[5] = sequence;
    image[6..8].copy_from_slice(&threshold.to_le_bytes());

    let count = windows.len().min(MAX_INTERVALS);
    image[8] = count as u8;

    let sentinel = Interval::default();
    for slot in 0..MAX_INTERVALS {
        let window = windows.get(slot).unwrap_or(&sentinel);
        let record = &mut image[HEADER_LEN + slot * RECORD_LEN..][..RECORD_LEN];
        record[0] = window.start.hour;
        record[1] = window.start.minute;
        record[2] = window.stop.hour;
        record[3] = window.stop.minute;
        record[4] = window.days.bits();
    }
    image
}

fn decode(image: &[u8; IMAGE_LEN]) -> Result<(u8, Loaded), StorageError> {
    if image[0..4] != MAGIC || image[4] != VERSION {
        return Err(StorageError::BadImage);
    }
    let sequence = image[5];
    let threshold = u16::from_le_bytes([image[6], image[7]]);
    let count = image[8] as usize;
    if count > MAX_INTERVALS {
        return Err(StorageError::BadImage);
    }

    let mut windows = Vec::new();
    for slot in 0..count {
        let record = &image[HEADER_LEN + slot * RECORD_LEN..][..RECORD_LEN];
        if record[0] > 23 || record[1] > 59 || record[2] > 23 || record[3] > 59 {
            return Err(StorageError::BadImage);
        }
        if record[4] & !0x7f != 0 {
            return Err(StorageError::BadImage);
        }
        let window = Interval::new(
            TimeOfDay::new(record[0], record[1]),
            TimeOfDay::new(record[2], record[3]),
            Weekdays::from_bits(record[4]),
        );
        // Slots are bounded by count, which was checked above.
        windows.push(window).ok();
    }
    Ok((sequence, (windows, threshold)))
}
