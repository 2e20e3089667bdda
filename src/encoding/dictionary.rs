//! DICTIONARY: a value-to-id map with the id stream stored run-length
//! encoded. Entries are assigned ids in first-seen order.

use std::collections::HashMap;

use crate::error::{Result, TsFileError};
use crate::io::{write_var_bytes, write_var_u64};

use super::rle::{decode_u64, encode_u64};
use super::{uleb128, Decoder, Encoder};

pub struct DictionaryEncoder {
    map: HashMap<Vec<u8>, u64>,
    entries: Vec<Vec<u8>>,
    ids: Vec<u64>,
    entry_bytes: usize,
}

impl DictionaryEncoder {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            entries: vec![],
            ids: vec![],
            entry_bytes: 0,
        }
    }
}

impl Default for DictionaryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Vec<u8>> for DictionaryEncoder {
    fn encode(&mut self, value: Vec<u8>) {
        let next_id = self.entries.len() as u64;
        let id = match self.map.get(&value) {
            Some(id) => *id,
            None => {
                self.entry_bytes += value.len() + 5;
                self.entries.push(value.clone());
                self.map.insert(value, next_id);
                next_id
            }
        };
        self.ids.push(id);
    }

    fn size(&self) -> usize {
        10 + self.entry_bytes + self.ids.len() * 9
    }

    fn count(&self) -> usize {
        self.ids.len()
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        write_var_u64(buffer, self.entries.len() as u64)?;
        for entry in &self.entries {
            write_var_bytes(buffer, entry)?;
        }
        encode_u64(&self.ids, buffer)?;

        self.map.clear();
        self.entries.clear();
        self.ids.clear();
        self.entry_bytes = 0;
        Ok(())
    }
}

pub struct DictionaryDecoder {
    entries: Vec<Vec<u8>>,
    ids: Vec<u64>,
    offset: usize,
}

impl DictionaryDecoder {
    pub fn new(data: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let (entry_count, consumed) = uleb128::decode(data);
        pos += consumed;

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            if pos >= data.len() {
                return Err(corrupted_err!("dictionary entries truncated"));
            }
            let (length, consumed) = uleb128::decode(&data[pos..]);
            pos += consumed;
            let length = length as usize;
            if pos + length > data.len() {
                return Err(corrupted_err!("dictionary entry truncated"));
            }
            entries.push(data[pos..pos + length].to_vec());
            pos += length;
        }

        let ids = decode_u64(&data[pos..])?;
        for id in &ids {
            if *id as usize >= entries.len() {
                return Err(corrupted_err!(
                    "dictionary id {} out of range for {} entries",
                    id,
                    entries.len()
                ));
            }
        }
        Ok(Self {
            entries,
            ids,
            offset: 0,
        })
    }
}

impl Decoder<Vec<u8>> for DictionaryDecoder {
    fn has_next(&self) -> bool {
        self.offset < self.ids.len()
    }

    fn next(&mut self) -> Result<Vec<u8>> {
        if self.offset >= self.ids.len() {
            return Err(TsFileError::NoMoreData);
        }
        let id = self.ids[self.offset] as usize;
        self.offset += 1;
        Ok(self.entries[id].clone())
    }
}
