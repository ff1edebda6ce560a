//! Tests over the printable artifacts: disassembly, symbol dump, tree
//! output, and the persisted bytecode format.

use cairn::{Compilation, NoIncludes, Opcode, Program, SysFn, TreeOptions};
use pretty_assertions::assert_eq;

fn compiled(source: &str) -> Compilation {
    Compilation::compile(source, &NoIncludes).expect("compile should succeed")
}

#[test]
fn program_starts_with_the_entry_wiring() {
    let compilation = compiled("fn main() { __exit__(0); }");
    let decoded = compilation.program.decode_all().unwrap();
    // push 0; call <main>; syscall exit
    assert_eq!(decoded[0].opcode, Opcode::Push);
    assert_eq!(decoded[0].immediate, Some(0));
    assert_eq!(decoded[1].opcode, Opcode::Call);
    assert!(decoded[1].immediate.is_some(), "call target is fused inline");
    assert_eq!(decoded[2].opcode, Opcode::SysCall);
    assert_eq!(decoded[2].funccode, SysFn::Exit as u8);
}

#[test]
fn call_targets_resolve_within_the_program() {
    let compilation = compiled(concat!(
        "fn f(a) { return a; } ",
        "fn main() { __exit__(f(5)); }"
    ));
    let len = compilation.program.len() as u32;
    let decoded = compilation.program.decode_all().unwrap();
    for instr in decoded {
        if matches!(instr.opcode, Opcode::Call | Opcode::Jump | Opcode::BrTrue | Opcode::BrFalse)
            && let Some(target) = instr.immediate
        {
            assert!(target < len, "target {target} outside program of {len} words");
        }
    }
}

#[test]
fn decode_round_trips_every_instruction() {
    let compilation = compiled(concat!(
        "fn fact(n) { if (__ile__(n, 1)) return 1; ",
        "return __imul__(n, fact(__isub__(n, 1))); } ",
        "fn main() { __exit__(fact(6)); }"
    ));
    let program = &compilation.program;
    let decoded = program.decode_all().unwrap();

    // re-encode and compare against the original word stream
    let mut words = vec![];
    for instr in &decoded {
        let has_imm = instr.immediate.is_some();
        let word = (instr.opcode as u32) | (u32::from(has_imm) << 7) | (u32::from(instr.funccode) << 8);
        words.push(word);
        if let Some(imm) = instr.immediate {
            words.push(imm);
        }
    }
    assert_eq!(words, program.words());
}

#[test]
fn bytecode_persists_as_little_endian_words() {
    let compilation = compiled("fn main() { __exit__(7); }");
    let bytes = compilation.program.to_bytes();
    assert_eq!(bytes.len(), compilation.program.len() * 4);
    let reloaded = Program::from_bytes(&bytes).unwrap();
    assert_eq!(reloaded, compilation.program);
    // first word is `push` with an immediate: opcode 4, flag bit 7
    assert_eq!(bytes[0], 0x84);
    assert_eq!(bytes[1], 0);
}

#[test]
fn disassembly_lists_word_indices_and_mnemonics() {
    let compilation = compiled("fn main() { __exit__(0); }");
    let text = compilation.disassemble();
    assert!(text.starts_with("     0: push 0"), "{text}");
    assert!(text.contains("call"), "{text}");
    assert!(text.contains("syscall exit"), "{text}");
}

#[test]
fn symbol_dump_lists_intrinsics_and_user_symbols() {
    let compilation = compiled("fn main() { var counter = 0; __exit__(counter); }");
    let dump = compilation.dump_symbols();
    assert!(dump.contains("<null>"), "{dump}");
    assert!(dump.contains("<entry>"), "{dump}");
    assert!(dump.contains("__exit__"), "{dump}");
    assert!(dump.contains("counter"), "{dump}");
    assert!(dump.contains("main"), "{dump}");
}

#[test]
fn tree_print_annotates_on_request() {
    let compilation = compiled("fn main() { var x = 1; __exit__(x); }");
    let plain = compilation.print_tree(TreeOptions::default());
    assert!(plain.contains("fn main/0"), "{plain}");
    assert!(!plain.contains("[id="), "{plain}");

    let annotated = compilation.print_tree(TreeOptions::all());
    assert!(annotated.contains("[id="), "{annotated}");
    assert!(annotated.contains("[p="), "{annotated}");
}

#[test]
fn global_data_words_sit_at_the_file_tail() {
    let compilation = compiled("var g = 41; fn main() { __exit__(*g); }");
    let words = compilation.program.words();
    assert_eq!(
        *words.last().unwrap(),
        41,
        "initializer should be the last data word"
    );
}
