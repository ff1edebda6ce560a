//! One test per error category of the pipeline; the first error aborts.

use cairn::{BufferConsole, Compilation, CompileError, NoIncludes, NoopTracer, VmError};

fn compile_err(source: &str) -> CompileError {
    Compilation::compile(source, &NoIncludes).expect_err("compile should fail")
}

#[test]
fn lexical_unrecognized_character() {
    let err = compile_err("fn main() { $ }");
    assert!(matches!(err, CompileError::Lexical { .. }), "{err}");
    assert!(err.to_string().contains("unrecognized character"), "{err}");
}

#[test]
fn lexical_newline_in_char_literal() {
    let err = compile_err("fn main() { __exit__('a\nb'); }");
    assert!(matches!(err, CompileError::Lexical { .. }), "{err}");
}

#[test]
fn syntax_expected_token() {
    let err = compile_err("fn main() { __exit__(0) }");
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
}

#[test]
fn syntax_unexpected_end_of_file() {
    let err = compile_err("fn main() {");
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
}

#[test]
fn syntax_assignment_to_non_lvalue() {
    let err = compile_err("fn main() { 1 = 2; }");
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
}

#[test]
fn syntax_address_of_non_lvalue() {
    let err = compile_err("fn main() { var p = &(1 + 2); }");
    assert!(matches!(err, CompileError::Syntax { .. }), "{err}");
}

#[test]
fn semantic_undeclared_symbol() {
    let err = compile_err("fn main() { __exit__(nope); }");
    assert!(err.to_string().contains("undeclared symbol"), "{err}");
}

#[test]
fn semantic_redeclared_symbol() {
    let err = compile_err("fn main() { var x = 1; var x = 2; __exit__(x); }");
    assert!(err.to_string().contains("redeclared symbol"), "{err}");
}

#[test]
fn semantic_missing_entry_point() {
    let err = compile_err("fn helper() { return 0; }");
    assert!(err.to_string().contains("'main' was not defined"), "{err}");
}

#[test]
fn semantic_overload_ambiguity() {
    let err = compile_err(concat!(
        "fn f(a) { return a; } fn f(b) { return b; } ",
        "fn main() { __exit__(f(1)); }"
    ));
    assert!(err.to_string().contains("ambiguous"), "{err}");
}

#[test]
fn semantic_no_matching_overload() {
    let err = compile_err("fn f(a) { return a; } fn main() { __exit__(f(1, 2)); }");
    assert!(err.to_string().contains("no matching overload"), "{err}");
}

#[test]
fn semantic_inline_parameter_reuse() {
    let err = compile_err(concat!(
        "inline dbl(x) { return __iadd__(x, x); } ",
        "fn main() { __exit__(dbl(5)); }"
    ));
    assert!(err.to_string().contains("used once"), "{err}");
}

#[test]
fn semantic_intrinsic_arity() {
    let err = compile_err("fn main() { __exit__(__iadd__(1)); }");
    assert!(err.to_string().contains("arguments"), "{err}");
}

#[test]
fn semantic_alias_cycle() {
    let err = compile_err(concat!(
        "alias a for b; alias b for a; ",
        "fn main() { __exit__(a); }"
    ));
    // either the forward reference or the cycle trips first; both are
    // semantic and fatal
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}

#[test]
fn semantic_global_initializer_must_be_constant() {
    let err = compile_err("var g = __iadd__(1, 2); fn main() { __exit__(*g); }");
    assert!(err.to_string().contains("constant"), "{err}");
}

#[test]
fn semantic_address_of_global() {
    let err = compile_err("var g; fn main() { var p = &g; __exit__(0); }");
    assert!(err.to_string().contains("address"), "{err}");
}

#[test]
fn semantic_type_mismatch() {
    let err = compile_err(concat!(
        "typedef word; typedef other; ",
        "fn main() { var a: word = 1; var b: other = 2; a = b; __exit__(a); }"
    ));
    assert!(err.to_string().contains("disagree"), "{err}");
}

#[test]
fn runtime_division_by_zero() {
    let compilation =
        Compilation::compile("fn main() { __exit__(__idiv__(1, 0)); }", &NoIncludes).unwrap();
    let err = compilation
        .run(BufferConsole::default(), NoopTracer)
        .expect_err("run should fail");
    assert!(matches!(err, VmError::DivisionByZero { .. }), "{err}");
}

#[test]
fn runtime_modulo_by_zero() {
    let compilation =
        Compilation::compile("fn main() { __exit__(__imod__(1, 0)); }", &NoIncludes).unwrap();
    let err = compilation
        .run(BufferConsole::default(), NoopTracer)
        .expect_err("run should fail");
    assert!(matches!(err, VmError::DivisionByZero { .. }), "{err}");
}

#[test]
fn errors_carry_source_positions() {
    let err = compile_err("fn main() {\n    __exit__(nope);\n}");
    let text = err.to_string();
    assert!(text.contains("2:"), "position should point at line 2: {text}");
}
