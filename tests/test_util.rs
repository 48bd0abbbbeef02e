#![allow(dead_code)]

use std::io::Cursor;

use ebml_stream::{EbmlReader, VInt};

pub fn id(value: u32) -> VInt {
    VInt::make_id(value).expect("test ids should be valid")
}

pub fn size(value: u64) -> Vec<u8> {
    VInt::encode_size(value, None).expect("test sizes should be valid").as_bytes()
}

///
/// Builds a complete element with a minimal size field.
///
pub fn element(element_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = id(element_id).as_bytes();
    data.extend(size(payload.len() as u64));
    data.extend_from_slice(payload);
    data
}

///
/// Builds a master element whose size field is the one byte "unknown" pattern.
///
pub fn unknown_size_element(element_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = id(element_id).as_bytes();
    data.push(0xFF);
    data.extend_from_slice(payload);
    data
}

pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn reader(data: Vec<u8>) -> EbmlReader<Cursor<Vec<u8>>> {
    EbmlReader::new(Cursor::new(data)).expect("cursor position is always available")
}

pub fn read_all_binary(reader: &mut EbmlReader<Cursor<Vec<u8>>>) -> Vec<u8> {
    let mut result = Vec::new();
    let mut buffer = [0u8; 3];
    while let Some(read) = reader.read_binary(&mut buffer).expect("binary read should succeed") {
        result.extend_from_slice(&buffer[..read]);
    }
    result
}
