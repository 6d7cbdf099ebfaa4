use crate::*;

#[test]
fn mnemonic_round_trip() {
    let mut seen = std::collections::HashSet::new();
    for opcode in OpCode::ALL {
        assert_eq!(OpCode::from_mnemonic(opcode.mnemonic()), Some(opcode));
        assert_eq!(opcode.to_string(), opcode.mnemonic());
        assert!(seen.insert(opcode.mnemonic()), "duplicate mnemonic {opcode}");
    }
}

#[test]
fn mnemonics_are_case_sensitive() {
    assert_eq!(OpCode::from_mnemonic("add"), None);
    assert!("add".parse::<OpCode>().is_err());
    assert_eq!("BISZ".parse::<OpCode>(), Ok(OpCode::Bisz));
}

#[test]
fn operand_usage() {
    let usage = OpCode::Add.operand_usage();
    assert!(usage.a && usage.b && usage.dst && usage.writes_dst);

    let usage = OpCode::Stm.operand_usage();
    assert!(usage.a && !usage.b && usage.dst && !usage.writes_dst);

    let usage = OpCode::Undef.operand_usage();
    assert!(!usage.a && !usage.b && usage.dst);

    for opcode in [OpCode::Nop, OpCode::Unkn] {
        let usage = opcode.operand_usage();
        assert!(!usage.a && !usage.b && !usage.dst);
    }
}
