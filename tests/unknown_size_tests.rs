mod test_util;

pub mod unknown_size_tests {
    use std::io::Cursor;

    use ebml_stream::error::{CorruptedDataError, ReaderError};
    use ebml_stream::{DeclaredSize, EbmlReader, VInt};

    use super::test_util::{concat, element, id, reader, unknown_size_element};

    #[test]
    pub fn unknown_size_at_root_is_rejected() {
        let mut reader = reader(unknown_size_element(0x1000, b"test"));
        match reader.read_next() {
            Err(e @ ReaderError::CorruptedData(CorruptedDataError::UnknownSizeAtRoot { .. })) => {
                assert!(e.to_string().contains("unknown-size elements are not allowed at root level"));
            }
            other => panic!("expected unknown size error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    pub fn unknown_size_at_root_is_rejected_for_every_length() {
        for length in 1..=8 {
            let mut data = id(0x1000).as_bytes();
            data.extend(VInt::unknown_size(length).unwrap().as_bytes());
            data.extend_from_slice(b"test");

            let mut reader = EbmlReader::with_size(Cursor::new(data), 1000).unwrap();
            assert!(
                matches!(reader.read_next(), Err(ReaderError::CorruptedData(CorruptedDataError::UnknownSizeAtRoot { .. }))),
                "length {}",
                length
            );
        }
    }

    #[test]
    pub fn unknown_size_takes_remaining_parent_size() {
        let inner = unknown_size_element(0x1100, &element(0x2000, b"test"));
        let data = element(0x1000, &inner);
        let mut reader = reader(data);

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert_eq!(DeclaredSize::Unknown, reader.declared_size().unwrap());
        assert!(reader.declared_size().unwrap().is_unknown());
        // parent payload is 10 bytes, the unknown-size header takes 3 of them
        assert_eq!(7, reader.element_size().unwrap());
    }

    #[test]
    pub fn leave_unknown_size_container_then_read_sibling() {
        let inner = unknown_size_element(0x1100, &element(0x2000, b"test"));
        let outer = element(0x1000, &concat(&[inner, element(0x2100, b"end")]));
        let mut reader = reader(outer);

        assert!(reader.read_next().unwrap());
        assert_eq!(16, reader.element_size().unwrap());
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!(0x5100, reader.element_id().unwrap().encoded_value());
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!(0x6000, reader.element_id().unwrap().encoded_value());
        assert_eq!("test", reader.read_utf8().unwrap());

        reader.leave_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!(0x6100, reader.element_id().unwrap().encoded_value());
        assert_eq!("end", reader.read_utf8().unwrap());
        assert_eq!(false, reader.read_next().unwrap());

        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
    }

    #[test]
    pub fn leave_unknown_size_container_skips_partially_read_child() {
        let inner = unknown_size_element(0x1100, &element(0x2000, b"payload"));
        let outer = element(0x1000, &concat(&[inner, element(0x2100, b"end")]));
        let mut reader = reader(outer);

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        let mut buffer = [0u8; 2];
        assert_eq!(Some(2), reader.read_binary(&mut buffer).unwrap());

        reader.leave_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert_eq!("end", reader.read_utf8().unwrap());
    }

    #[test]
    pub fn unentered_unknown_size_element_skips_to_parent_end() {
        let inner = unknown_size_element(0x1100, &element(0x2000, b"test"));
        let outer = element(0x1000, &inner);
        let data = concat(&[outer, element(0x2100, b"after")]);
        let mut reader = reader(data);

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!("after", reader.read_utf8().unwrap());
    }

    #[test]
    pub fn empty_unknown_size_container() {
        let root = element(0x0A00, &unknown_size_element(0x1000, &[]));
        let mut reader = reader(root);

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert_eq!(0, reader.element_size().unwrap());
        reader.enter_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();
    }

    #[test]
    pub fn root_container_larger_than_data() {
        let mut data = id(0x0A00).as_bytes();
        data.extend(VInt::encode_size(800, None).unwrap().as_bytes());
        data.extend(unknown_size_element(0x1000, &element(0x2000, b"test")));
        let len = data.len() as u64;
        let mut reader = EbmlReader::with_size(Cursor::new(data), std::cmp::max(len * 2, 1000)).unwrap();

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert!(reader.element_size().unwrap() > 0);
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!("test", reader.read_utf8().unwrap());
        assert_eq!(false, reader.read_next().unwrap());

        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
    }

    #[test]
    pub fn two_levels_of_nested_unknown_sizes() {
        let innermost = element(0x2000, b"hello");
        let middle = unknown_size_element(0x1100, &innermost);
        let outer = unknown_size_element(0x1000, &middle);
        let root = element(0x0A00, &outer);
        let mut reader = reader(root);

        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!(11, reader.element_size().unwrap());
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!(DeclaredSize::Unknown, reader.declared_size().unwrap());
        assert_eq!(8, reader.element_size().unwrap());
        reader.enter_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!("hello", reader.read_utf8().unwrap());
        assert_eq!(false, reader.read_next().unwrap());

        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();
        assert_eq!(false, reader.read_next().unwrap());
    }

    #[test]
    pub fn three_levels_of_nested_unknown_sizes_with_siblings() {
        let level3 = unknown_size_element(0x1200, &element(0x2000, b"a"));
        let level2 = unknown_size_element(0x1100, &level3);
        let level1 = unknown_size_element(0x1000, &level2);
        let root = element(0x0A00, &concat(&[level1, element(0x2100, b"b")]));
        let root_size = root.len() as u64 - 3;
        let data = concat(&[root, element(0x2200, b"c")]);
        let mut reader = reader(data);

        assert!(reader.read_next().unwrap());
        assert_eq!(root_size, reader.element_size().unwrap());
        reader.enter_container().unwrap();

        let mut expected_size = root_size;
        for _ in 0..3 {
            assert!(reader.read_next().unwrap());
            expected_size -= 3;
            assert_eq!(expected_size, reader.element_size().unwrap());
            reader.enter_container().unwrap();
        }

        assert!(reader.read_next().unwrap());
        assert_eq!("a", reader.read_utf8().unwrap());

        for _ in 0..3 {
            reader.leave_container().unwrap();
        }

        assert!(reader.read_next().unwrap());
        assert_eq!("b", reader.read_utf8().unwrap());
        assert_eq!(false, reader.read_next().unwrap());
        reader.leave_container().unwrap();

        assert!(reader.read_next().unwrap());
        assert_eq!("c", reader.read_utf8().unwrap());
    }

    #[test]
    pub fn unknown_size_bounded_by_known_root_element() {
        let data = element(0x0A00, &unknown_size_element(0x1000, &element(0x2000, b"x")));
        let total = data.len() as u64;
        let mut reader = reader(data);
        assert!(reader.read_next().unwrap());
        reader.enter_container().unwrap();
        assert!(reader.read_next().unwrap());
        assert_eq!(total - reader.element_position().unwrap() - 3, reader.element_size().unwrap());
    }
}
