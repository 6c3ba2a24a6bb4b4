use crate::*;

use rstest::rstest;

#[test]
fn data_atom_round_trip_all_lengths() {
    for len in 0..=MAX_INLINE_DATA_LEN {
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let atom = data_atom(&payload).unwrap();
        assert_eq!(atom.len(), len + 1);

        let (parsed, consumed) = RawAtom::parse(&atom).unwrap();
        assert_eq!(consumed, atom.len());
        assert_eq!(parsed, RawAtom::Data(&payload[..]));
        assert_eq!(parsed.prefix_len(), 1);
    }

    assert_eq!(data_prefix(128), Err(PrefixError::DataTooLong(128)));
    assert!(data_atom(&[0u8; 200]).is_err());
}

#[test]
fn short_call_round_trip_whole_range() {
    for code in 0..=Opcode::LAST_SHORT_FUN {
        let op = Opcode::new(code);
        let prefix = CallPrefix::short(op).unwrap();
        assert_eq!(prefix.as_slice().len(), 1);

        let (parsed, consumed) = RawAtom::parse(prefix.as_slice()).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(parsed, RawAtom::ShortCall(op));
    }

    assert!(CallPrefix::short(Opcode::new(Opcode::FIRST_LONG_FUN)).is_err());
}

#[test]
fn long_call_round_trip_whole_range() {
    for code in Opcode::FIRST_LONG_FUN..=Opcode::LAST_EXTENDED_FUN {
        for arity in [0u8, 1, 7, 15] {
            let op = Opcode::new(code);
            let prefix = CallPrefix::long(op, arity).unwrap();
            assert_eq!(prefix.as_slice().len(), 2);

            let (parsed, consumed) = RawAtom::parse(prefix.as_slice()).unwrap();
            assert_eq!(consumed, 2);
            assert_eq!(parsed, RawAtom::LongCall { opcode: op, arity });
        }
    }
}

#[test]
fn long_call_rejects_out_of_range_input() {
    let op = Opcode::new(Opcode::FIRST_LONG_FUN);
    assert_eq!(CallPrefix::long(op, 16), Err(PrefixError::ArityTooLarge(16)));
    assert_eq!(
        CallPrefix::long(Opcode::new(5), 1),
        Err(PrefixError::OpcodeRange(Opcode::new(5)))
    );
    assert_eq!(
        CallPrefix::long(Opcode::new(Opcode::LOCAL_LIBRARY_MARKER), 1),
        Err(PrefixError::OpcodeRange(Opcode::new(Opcode::LOCAL_LIBRARY_MARKER)))
    );
}

#[rstest]
#[case(0, 0)]
#[case(0, 15)]
#[case(1, 3)]
#[case(255, 15)]
fn local_call_round_trip(#[case] slot: u8, #[case] arity: u8) {
    let prefix = CallPrefix::local(slot, arity).unwrap();
    assert_eq!(prefix.as_slice().len(), 3);

    let (parsed, consumed) = RawAtom::parse(prefix.as_slice()).unwrap();
    assert_eq!(consumed, 3);
    assert_eq!(parsed, RawAtom::LocalCall { slot, arity });
    assert_eq!(parsed.prefix_len(), 3);
}

#[test]
fn truncated_atoms_are_rejected() {
    // Empty input.
    assert_eq!(RawAtom::parse(&[]), Err(PrefixError::UnexpectedEnd));

    // Data prefix announcing more payload than present.
    assert_eq!(RawAtom::parse(&[0x83, 1, 2]), Err(PrefixError::UnexpectedEnd));

    // Long call cut after the first byte.
    let long = CallPrefix::long(Opcode::new(100), 2).unwrap();
    assert_eq!(
        RawAtom::parse(&long.as_slice()[..1]),
        Err(PrefixError::UnexpectedEnd)
    );

    // Local call cut before the slot byte.
    let local = CallPrefix::local(7, 1).unwrap();
    assert_eq!(
        RawAtom::parse(&local.as_slice()[..2]),
        Err(PrefixError::UnexpectedEnd)
    );
}

#[test]
fn prefix_byte_layout_is_stable() {
    // Short call: the byte is the opcode.
    assert_eq!(CallPrefix::short(Opcode::new(0x21)).unwrap().as_slice(), &[0x21]);

    // Long call: 0b01AAAACC CCCCCCCC, arity in bits 13..10.
    let prefix = CallPrefix::long(Opcode::new(0x40), 3).unwrap();
    assert_eq!(prefix.as_slice(), &[0x4c, 0x40]);

    // Local marker is opcode 1023 with the slot byte appended.
    let prefix = CallPrefix::local(0xab, 2).unwrap();
    assert_eq!(prefix.as_slice(), &[0x4b, 0xff, 0xab]);

    // Inline data: bit 7 plus the 7-bit length.
    assert_eq!(data_atom(&[0xde, 0xad]).unwrap(), vec![0x82, 0xde, 0xad]);
    assert_eq!(data_atom(&[]).unwrap(), vec![0x80]);
}
