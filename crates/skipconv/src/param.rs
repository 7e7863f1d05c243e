//! Parameter dictionary and model weight sources.
//!
//! The enclosing framework hands layers an integer-keyed parameter
//! dictionary and a binary weight stream. [`ParamDict`] is the typed dict
//! with per-key defaults; [`ModelBin`] abstracts the weight stream so tests
//! can feed slices while deployments read little-endian f32 files.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{Result, SkipConvError};

/// A single parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Floats(Vec<f32>),
}

/// Integer-keyed parameter dictionary with typed, defaulting getters.
#[derive(Clone, Debug, Default)]
pub struct ParamDict {
    entries: HashMap<i32, ParamValue>,
}

impl ParamDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_int(&mut self, id: i32, value: i32) -> &mut Self {
        self.entries.insert(id, ParamValue::Int(value));
        self
    }

    pub fn set_float(&mut self, id: i32, value: f32) -> &mut Self {
        self.entries.insert(id, ParamValue::Float(value));
        self
    }

    pub fn set_floats(&mut self, id: i32, value: Vec<f32>) -> &mut Self {
        self.entries.insert(id, ParamValue::Floats(value));
        self
    }

    /// Integer getter; float entries are truncated like the C framework.
    pub fn get_int(&self, id: i32, default: i32) -> i32 {
        match self.entries.get(&id) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i32,
            _ => default,
        }
    }

    pub fn get_float(&self, id: i32, default: f32) -> f32 {
        match self.entries.get(&id) {
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f32,
            _ => default,
        }
    }

    pub fn get_floats(&self, id: i32) -> Vec<f32> {
        match self.entries.get(&id) {
            Some(ParamValue::Floats(v)) => v.clone(),
            _ => Vec::new(),
        }
    }
}

/// Source of flat f32 weight data consumed by `load_model`.
pub trait ModelBin {
    /// Read exactly `count` f32 values, advancing the stream.
    fn load(&mut self, count: usize) -> Result<Vec<f32>>;
}

/// Slice-backed weight source for tests and in-memory models.
pub struct SliceModelBin<'a> {
    data: &'a [f32],
    pos: usize,
}

impl<'a> SliceModelBin<'a> {
    pub fn new(data: &'a [f32]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ModelBin for SliceModelBin<'_> {
    fn load(&mut self, count: usize) -> Result<Vec<f32>> {
        let end = self.pos.checked_add(count).ok_or_else(|| {
            SkipConvError::Allocation(format!("weight read of {count} values overflows"))
        })?;
        if end > self.data.len() {
            return Err(SkipConvError::ModelData(format!(
                "weight source exhausted: need {count} values at offset {}, have {}",
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let out = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(out)
    }
}

/// Reader-backed weight source decoding little-endian f32 values.
pub struct ReaderModelBin<R: Read> {
    reader: R,
}

impl<R: Read> ReaderModelBin<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> ModelBin for ReaderModelBin<R> {
    fn load(&mut self, count: usize) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(count);
        let mut buf = [0u8; 4];
        for _ in 0..count {
            self.reader.read_exact(&mut buf)?;
            out.push(f32::from_le_bytes(buf));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_dict_defaults() {
        let mut pd = ParamDict::new();
        pd.set_int(1, 3);
        assert_eq!(pd.get_int(1, 0), 3);
        // kernel_h (11) defaults to kernel_w
        assert_eq!(pd.get_int(11, pd.get_int(1, 0)), 3);
        assert_eq!(pd.get_float(18, 0.0), 0.0);
        assert!(pd.get_floats(10).is_empty());
    }

    #[test]
    fn test_param_dict_int_float_coercion() {
        let mut pd = ParamDict::new();
        pd.set_float(0, 7.9);
        pd.set_int(18, 2);
        assert_eq!(pd.get_int(0, 0), 7);
        assert_eq!(pd.get_float(18, 0.0), 2.0);
    }

    #[test]
    fn test_slice_model_bin_sequential_reads() {
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let mut mb = SliceModelBin::new(&data);
        assert_eq!(mb.load(3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(mb.load(2).unwrap(), vec![4.0, 5.0]);
        assert!(mb.load(1).is_err());
    }

    #[test]
    fn test_reader_model_bin_le_decoding() {
        let mut bytes = Vec::new();
        for v in [0.5f32, -2.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut mb = ReaderModelBin::new(bytes.as_slice());
        assert_eq!(mb.load(2).unwrap(), vec![0.5, -2.0]);
        assert!(mb.load(1).is_err());
    }
}
